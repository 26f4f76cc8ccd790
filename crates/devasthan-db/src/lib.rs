//! Database layer for the Devasthan platform.
//!
//! Provides SQLite connection pooling (via `r2d2`), WAL-mode initialization,
//! and embedded SQL migrations. The telemetry series and the SOS alert table
//! are both created through versioned migrations managed by this crate.
//!
//! Every pooled connection runs with `synchronous = FULL`: a statement that
//! returns successfully has been flushed to disk, which is what lets the
//! telemetry store acknowledge a write only once it is durable.

mod migrations;
mod pool;

pub use migrations::{run_migrations, MigrationError};
pub use pool::{create_pool, DbPool, DbRuntimeSettings, PoolError};
