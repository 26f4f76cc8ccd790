//! Crowd telemetry storage for the Devasthan platform.
//!
//! Samples of `(timestamp, zone, count)` are appended to the `crowd_data`
//! table and never updated or deleted here; retention is a storage-level
//! concern outside this crate.
//!
//! # Identity
//!
//! A sample is identified by its `(timestamp, zone)` pair. When the clock
//! reading is not after the newest stored instant, [`record_sample`] assigns
//! the next microsecond instead of overwriting or failing, so N calls always
//! produce N stored samples.
//!
//! # Usage
//!
//! ```rust,ignore
//! use devasthan_telemetry::{record_sample, latest_sample};
//!
//! let stored = record_sample(&conn, &zone, 320, Utc::now())?;
//! let newest = latest_sample(&conn)?;
//! ```

mod error;
mod sample;
mod store;

pub use error::TelemetryError;
pub use sample::TelemetrySample;
pub use store::{latest_for_zone, latest_per_zone, latest_sample, latest_samples, record_sample};
