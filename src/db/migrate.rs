//! Schema migrations, keyed on `PRAGMA user_version`.
//!
//! Each entry of [`MIGRATIONS`] moves the schema one version forward and is
//! applied inside its own transaction. The partial unique indexes created in
//! version 1 settle the "one active shift per driver" and
//! "one active ride per shift" races at the storage level.

use crate::db::log::ttlog;
use crate::errors::{AppError, AppResult};
use rusqlite::{Connection, Transaction, TransactionBehavior};

struct Migration {
    version: i64,
    name: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "create_core_tables",
        sql: r#"
        CREATE TABLE IF NOT EXISTS log (
            id        INTEGER PRIMARY KEY AUTOINCREMENT,
            date      TEXT NOT NULL,
            operation TEXT NOT NULL,
            target    TEXT DEFAULT '',
            message   TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS shifts (
            id                   INTEGER PRIMARY KEY AUTOINCREMENT,
            driver_id            TEXT    NOT NULL,
            start_time           INTEGER NOT NULL,
            end_time             INTEGER,
            planned_duration_ms  INTEGER,
            total_duration_ms    INTEGER,
            work_time_ms         INTEGER,
            break_time_ms        INTEGER,
            num_breaks           INTEGER,
            avg_break_ms         INTEGER,
            total_earnings_cents INTEGER,
            total_distance_km    REAL,
            number_of_rides      INTEGER,
            deleted_at           INTEGER,
            created_at           TEXT    NOT NULL
        );

        CREATE UNIQUE INDEX IF NOT EXISTS ux_shifts_active_driver
            ON shifts(driver_id) WHERE end_time IS NULL;
        CREATE INDEX IF NOT EXISTS idx_shifts_driver_start
            ON shifts(driver_id, start_time);

        CREATE TABLE IF NOT EXISTS shift_signals (
            id                        INTEGER PRIMARY KEY AUTOINCREMENT,
            shift_id                  INTEGER NOT NULL REFERENCES shifts(id) ON DELETE CASCADE,
            signal                    TEXT    NOT NULL
                CHECK(signal IN ('start','pause','continue','stop')),
            timestamp                 INTEGER NOT NULL,
            planned_pause_duration_ms INTEGER
        );

        CREATE INDEX IF NOT EXISTS idx_signals_shift_timestamp
            ON shift_signals(shift_id, timestamp);

        CREATE TABLE IF NOT EXISTS pauses (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            shift_id    INTEGER NOT NULL REFERENCES shifts(id) ON DELETE CASCADE,
            pause_start INTEGER NOT NULL,
            pause_end   INTEGER NOT NULL,
            duration_ms INTEGER NOT NULL CHECK(duration_ms >= 0)
        );

        CREATE INDEX IF NOT EXISTS idx_pauses_shift_start
            ON pauses(shift_id, pause_start);

        CREATE TABLE IF NOT EXISTS rides (
            id                    INTEGER PRIMARY KEY AUTOINCREMENT,
            shift_id              INTEGER NOT NULL REFERENCES shifts(id),
            driver_id             TEXT    NOT NULL,
            start_latitude        REAL    NOT NULL,
            start_longitude       REAL    NOT NULL,
            destination_latitude  REAL    NOT NULL,
            destination_longitude REAL    NOT NULL,
            address               TEXT    NOT NULL DEFAULT '',
            start_time            INTEGER NOT NULL,
            end_time              INTEGER,
            predicted_score       INTEGER NOT NULL CHECK(predicted_score BETWEEN 1 AND 5),
            earning_cents         INTEGER,
            earning_per_min       INTEGER,
            distance_km           REAL,
            deleted_at            INTEGER
        );

        CREATE UNIQUE INDEX IF NOT EXISTS ux_rides_active_shift
            ON rides(shift_id) WHERE end_time IS NULL;
        CREATE INDEX IF NOT EXISTS idx_rides_driver_start
            ON rides(driver_id, start_time);
        CREATE INDEX IF NOT EXISTS idx_rides_open_start
            ON rides(start_time) WHERE end_time IS NULL;
        "#,
    },
];

pub fn current_version(conn: &Connection) -> AppResult<i64> {
    let v: i64 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
    Ok(v)
}

pub fn latest_version() -> i64 {
    MIGRATIONS.last().map(|m| m.version).unwrap_or(0)
}

/// Apply every migration newer than the database's `user_version`.
/// Returns the number of migrations applied.
pub fn run_pending_migrations(conn: &Connection) -> AppResult<usize> {
    let mut applied = 0;
    let version = current_version(conn)?;

    if version > latest_version() {
        return Err(AppError::Migration(format!(
            "database schema version {} is newer than this build supports ({})",
            version,
            latest_version()
        )));
    }

    for m in MIGRATIONS.iter().filter(|m| m.version > version) {
        let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;

        tx.execute_batch(m.sql)
            .map_err(|e| AppError::Migration(format!("{} (v{}): {}", m.name, m.version, e)))?;
        tx.pragma_update(None, "user_version", m.version)?;
        ttlog(
            &tx,
            "migration_applied",
            m.name,
            &format!("Schema upgraded to version {}", m.version),
        )?;

        tx.commit()?;
        log::info!("applied migration {} (v{})", m.name, m.version);
        applied += 1;
    }

    Ok(applied)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrations_are_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        assert_eq!(run_pending_migrations(&conn).unwrap(), MIGRATIONS.len());
        assert_eq!(current_version(&conn).unwrap(), latest_version());
        assert_eq!(run_pending_migrations(&conn).unwrap(), 0);
    }
}
