//! Schema migrations for the telemetry and alert tables.
//!
//! SQL files are compiled in and applied in list order, each inside its own
//! transaction. Applied names are recorded in `_devasthan_migrations`.

use rusqlite::Connection;
use thiserror::Error;

struct Migration {
    name: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        name: "000_init",
        sql: include_str!("migrations/000_init.sql"),
    },
    Migration {
        name: "001_crowd_data",
        sql: include_str!("migrations/001_crowd_data.sql"),
    },
    Migration {
        name: "002_sos_alerts",
        sql: include_str!("migrations/002_sos_alerts.sql"),
    },
];

#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("migration '{name}' failed: {source}")]
    ExecutionFailed {
        name: String,
        source: rusqlite::Error,
    },

    #[error("could not read applied migrations: {0}")]
    StateQuery(rusqlite::Error),
}

/// Brings the schema up to date and returns how many migrations ran.
///
/// # Errors
///
/// Returns `MigrationError` if a migration fails; that migration is rolled back.
pub fn run_migrations(conn: &Connection) -> Result<usize, MigrationError> {
    run_migrations_from_list(conn, MIGRATIONS)
}

fn run_migrations_from_list(
    conn: &Connection,
    migrations: &[Migration],
) -> Result<usize, MigrationError> {
    conn.execute_batch(MIGRATIONS[0].sql)
        .map_err(|source| MigrationError::ExecutionFailed {
            name: MIGRATIONS[0].name.to_string(),
            source,
        })?;

    let mut applied = 0;
    for migration in migrations {
        if is_applied(conn, migration.name)? {
            continue;
        }

        let failed = |source| MigrationError::ExecutionFailed {
            name: migration.name.to_string(),
            source,
        };
        let tx = conn.unchecked_transaction().map_err(failed)?;
        tx.execute_batch(migration.sql).map_err(failed)?;
        tx.execute(
            "INSERT INTO _devasthan_migrations (name) VALUES (?1)",
            [migration.name],
        )
        .map_err(failed)?;
        tx.commit().map_err(failed)?;

        tracing::info!(migration = migration.name, "applied migration");
        applied += 1;
    }

    Ok(applied)
}

fn is_applied(conn: &Connection, name: &str) -> Result<bool, MigrationError> {
    conn.query_row(
        "SELECT EXISTS (SELECT 1 FROM _devasthan_migrations WHERE name = ?1)",
        [name],
        |row| row.get(0),
    )
    .map_err(MigrationError::StateQuery)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn run_migrations_on_fresh_db() {
        let conn = Connection::open_in_memory().expect("should open in-memory db");
        let applied = run_migrations(&conn).expect("migrations should succeed");
        assert_eq!(applied, MIGRATIONS.len());

        let count: usize = conn
            .query_row("SELECT COUNT(*) FROM _devasthan_migrations", [], |row| {
                row.get(0)
            })
            .expect("should query migration count");
        assert_eq!(count, MIGRATIONS.len());
    }

    #[test]
    fn run_migrations_idempotent() {
        let conn = Connection::open_in_memory().expect("should open in-memory db");

        let first = run_migrations(&conn).expect("first run should succeed");
        assert_eq!(first, 3);

        let second = run_migrations(&conn).expect("second run should succeed");
        assert_eq!(second, 0, "no new migrations to apply");
    }

    #[test]
    fn crowd_data_rejects_duplicate_instant_for_same_zone() {
        let conn = Connection::open_in_memory().expect("should open in-memory db");
        run_migrations(&conn).expect("migrations should succeed");

        conn.execute(
            "INSERT INTO crowd_data (recorded_at_us, zone_id, person_count) VALUES (1, 'gate', 10)",
            [],
        )
        .expect("first insert should succeed");
        let dup = conn.execute(
            "INSERT INTO crowd_data (recorded_at_us, zone_id, person_count) VALUES (1, 'gate', 11)",
            [],
        );
        assert!(dup.is_err(), "composite key must be enforced");

        conn.execute(
            "INSERT INTO crowd_data (recorded_at_us, zone_id, person_count) VALUES (1, 'hall', 12)",
            [],
        )
        .expect("same instant in another zone is allowed");
    }

    #[test]
    fn sos_alerts_rejects_unknown_status() {
        let conn = Connection::open_in_memory().expect("should open in-memory db");
        run_migrations(&conn).expect("migrations should succeed");

        let bad = conn.execute(
            "INSERT INTO sos_alerts (created_at_us, latitude, longitude, status)
             VALUES (0, 0.0, 0.0, 'closed')",
            [],
        );
        assert!(bad.is_err());
    }

    #[test]
    fn failing_migration_is_rolled_back() {
        let conn = Connection::open_in_memory().expect("should open in-memory db");
        let broken = [Migration {
            name: "999_broken",
            sql: "CREATE TABLE half (id INTEGER); THIS IS NOT SQL;",
        }];

        let err = run_migrations_from_list(&conn, &broken).unwrap_err();
        assert!(matches!(err, MigrationError::ExecutionFailed { ref name, .. } if name == "999_broken"));

        let exists: bool = conn
            .query_row(
                "SELECT COUNT(*) > 0 FROM sqlite_master WHERE name = 'half'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert!(!exists, "partial migration must not persist");
    }
}
