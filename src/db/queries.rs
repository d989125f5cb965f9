use crate::errors::{AppError, AppResult};
use crate::models::pause::Pause;
use crate::models::ride::Ride;
use crate::models::shift::{Shift, ShiftStatsUpdate};
use crate::models::signal::ShiftSignal;
use crate::models::signal_type::SignalType;
use chrono::Local;
use rusqlite::types::ToSql;
use rusqlite::{Connection, ErrorCode, OptionalExtension, Result, Row, params};

// ---------------------------------------------------------------------------
// Constraint translation
// ---------------------------------------------------------------------------

/// True when `err` is a UNIQUE failure reported on `table.column`.
fn is_unique_violation(err: &rusqlite::Error, target: &str) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(e, Some(msg)) => {
            e.code == ErrorCode::ConstraintViolation
                && msg.contains("UNIQUE")
                && msg.contains(target)
        }
        _ => false,
    }
}

// ---------------------------------------------------------------------------
// Shifts
// ---------------------------------------------------------------------------

const SHIFT_COLUMNS: &str = "id, driver_id, start_time, end_time, planned_duration_ms,
    total_duration_ms, work_time_ms, break_time_ms, num_breaks, avg_break_ms,
    total_earnings_cents, total_distance_km, number_of_rides, deleted_at";

pub fn map_shift(row: &Row) -> Result<Shift> {
    Ok(Shift {
        id: row.get("id")?,
        driver_id: row.get("driver_id")?,
        start_time: row.get("start_time")?,
        end_time: row.get("end_time")?,
        planned_duration_ms: row.get("planned_duration_ms")?,
        total_duration_ms: row.get("total_duration_ms")?,
        work_time_ms: row.get("work_time_ms")?,
        break_time_ms: row.get("break_time_ms")?,
        num_breaks: row.get("num_breaks")?,
        avg_break_ms: row.get("avg_break_ms")?,
        total_earnings_cents: row.get("total_earnings_cents")?,
        total_distance_km: row.get("total_distance_km")?,
        number_of_rides: row.get("number_of_rides")?,
        deleted_at: row.get("deleted_at")?,
    })
}

/// Insert a new active shift. A concurrent second active shift for the same
/// driver is rejected by `ux_shifts_active_driver`.
pub fn insert_shift(conn: &Connection, shift: &Shift) -> AppResult<i64> {
    conn.execute(
        "INSERT INTO shifts (driver_id, start_time, end_time, planned_duration_ms, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            shift.driver_id,
            shift.start_time,
            shift.end_time,
            shift.planned_duration_ms,
            Local::now().to_rfc3339(),
        ],
    )
    .map_err(|e| {
        if is_unique_violation(&e, "shifts.driver_id") {
            AppError::ActiveShiftConflict(format!(
                "Driver {} already has an active shift",
                shift.driver_id
            ))
        } else {
            AppError::Db(e)
        }
    })?;

    Ok(conn.last_insert_rowid())
}

pub fn find_shift(conn: &Connection, id: i64, include_deleted: bool) -> AppResult<Option<Shift>> {
    let sql = if include_deleted {
        format!("SELECT {SHIFT_COLUMNS} FROM shifts WHERE id = ?1")
    } else {
        format!("SELECT {SHIFT_COLUMNS} FROM shifts WHERE id = ?1 AND deleted_at IS NULL")
    };
    let mut stmt = conn.prepare_cached(&sql)?;
    Ok(stmt.query_row([id], map_shift).optional()?)
}

pub fn find_active_shift(conn: &Connection, driver_id: &str) -> AppResult<Option<Shift>> {
    let sql = format!(
        "SELECT {SHIFT_COLUMNS} FROM shifts
         WHERE driver_id = ?1 AND end_time IS NULL
         LIMIT 1"
    );
    let mut stmt = conn.prepare_cached(&sql)?;
    Ok(stmt.query_row([driver_id], map_shift).optional()?)
}

/// All active shifts, optionally restricted to one driver.
pub fn list_active_shifts(conn: &Connection, driver_id: Option<&str>) -> AppResult<Vec<Shift>> {
    let sql = format!(
        "SELECT {SHIFT_COLUMNS} FROM shifts
         WHERE end_time IS NULL AND (?1 IS NULL OR driver_id = ?1)
         ORDER BY start_time ASC"
    );
    let mut stmt = conn.prepare_cached(&sql)?;
    let rows = stmt.query_map([driver_id], map_shift)?;

    let mut out = Vec::new();
    for r in rows {
        out.push(r?);
    }
    Ok(out)
}

/// Non-deleted shifts of a driver, newest first.
pub fn shifts_for_driver(conn: &Connection, driver_id: &str) -> AppResult<Vec<Shift>> {
    let sql = format!(
        "SELECT {SHIFT_COLUMNS} FROM shifts
         WHERE driver_id = ?1 AND deleted_at IS NULL
         ORDER BY start_time DESC"
    );
    let mut stmt = conn.prepare_cached(&sql)?;
    let rows = stmt.query_map([driver_id], map_shift)?;

    let mut out = Vec::new();
    for r in rows {
        out.push(r?);
    }
    Ok(out)
}

pub fn update_shift_window(
    conn: &Connection,
    id: i64,
    start_time: i64,
    end_time: Option<i64>,
) -> AppResult<()> {
    conn.execute(
        "UPDATE shifts SET start_time = ?1, end_time = ?2 WHERE id = ?3",
        params![start_time, end_time, id],
    )?;
    Ok(())
}

/// Write the computed aggregates; fields left `None` keep their stored value.
pub fn apply_stats_update(conn: &Connection, id: i64, update: &ShiftStatsUpdate) -> AppResult<()> {
    let mut sets: Vec<&str> = Vec::new();
    let mut values: Vec<&dyn ToSql> = Vec::new();

    let int_fields: [(&str, &Option<i64>); 7] = [
        ("total_duration_ms", &update.total_duration_ms),
        ("work_time_ms", &update.work_time_ms),
        ("break_time_ms", &update.break_time_ms),
        ("num_breaks", &update.num_breaks),
        ("avg_break_ms", &update.avg_break_ms),
        ("total_earnings_cents", &update.total_earnings_cents),
        ("number_of_rides", &update.number_of_rides),
    ];

    for &(column, value) in int_fields.iter() {
        if let Some(v) = value {
            sets.push(column);
            values.push(v);
        }
    }

    if let Some(km) = &update.total_distance_km {
        sets.push("total_distance_km");
        values.push(km);
    }

    if sets.is_empty() {
        return Ok(());
    }

    let assignments: Vec<String> = sets
        .iter()
        .enumerate()
        .map(|(i, c)| format!("{} = ?{}", c, i + 1))
        .collect();

    let sql = format!(
        "UPDATE shifts SET {} WHERE id = ?{}",
        assignments.join(", "),
        sets.len() + 1
    );
    values.push(&id);

    conn.execute(&sql, rusqlite::params_from_iter(values))?;
    Ok(())
}

pub fn set_shift_deleted(conn: &Connection, id: i64, deleted_at: Option<i64>) -> AppResult<()> {
    conn.execute(
        "UPDATE shifts SET deleted_at = ?1 WHERE id = ?2",
        params![deleted_at, id],
    )?;
    Ok(())
}

/// Physically remove a shift together with its signals and pauses.
pub fn delete_shift_hard(conn: &Connection, id: i64) -> AppResult<()> {
    conn.execute("DELETE FROM shift_signals WHERE shift_id = ?1", [id])?;
    conn.execute("DELETE FROM pauses WHERE shift_id = ?1", [id])?;
    conn.execute("DELETE FROM shifts WHERE id = ?1", [id])?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Signals
// ---------------------------------------------------------------------------

pub fn map_signal(row: &Row) -> Result<ShiftSignal> {
    let raw: String = row.get("signal")?;
    let signal = SignalType::from_db_str(&raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            0,
            rusqlite::types::Type::Text,
            Box::new(AppError::InvalidSignalType(raw.clone())),
        )
    })?;

    Ok(ShiftSignal {
        id: row.get("id")?,
        shift_id: row.get("shift_id")?,
        signal,
        timestamp: row.get("timestamp")?,
        planned_pause_duration_ms: row.get("planned_pause_duration_ms")?,
    })
}

pub fn insert_signal(conn: &Connection, sig: &ShiftSignal) -> AppResult<i64> {
    let mut stmt = conn.prepare_cached(
        "INSERT INTO shift_signals (shift_id, signal, timestamp, planned_pause_duration_ms)
         VALUES (?1, ?2, ?3, ?4)",
    )?;
    stmt.execute(params![
        sig.shift_id,
        sig.signal.to_db_str(),
        sig.timestamp,
        sig.planned_pause_duration_ms,
    ])?;
    Ok(conn.last_insert_rowid())
}

/// The `limit` most recent signals of a shift, newest first.
/// Ordering is by signal timestamp; equal timestamps fall back to insertion order.
pub fn recent_signals(
    conn: &Connection,
    shift_id: i64,
    limit: usize,
) -> AppResult<Vec<ShiftSignal>> {
    let mut stmt = conn.prepare_cached(
        "SELECT id, shift_id, signal, timestamp, planned_pause_duration_ms
         FROM shift_signals
         WHERE shift_id = ?1
         ORDER BY timestamp DESC, id DESC
         LIMIT ?2",
    )?;
    let rows = stmt.query_map(params![shift_id, limit as i64], map_signal)?;

    let mut out = Vec::new();
    for r in rows {
        out.push(r?);
    }
    Ok(out)
}

pub fn last_signal(conn: &Connection, shift_id: i64) -> AppResult<Option<ShiftSignal>> {
    Ok(recent_signals(conn, shift_id, 1)?.into_iter().next())
}

pub fn last_signal_of_type(
    conn: &Connection,
    shift_id: i64,
    signal: SignalType,
) -> AppResult<Option<ShiftSignal>> {
    let mut stmt = conn.prepare_cached(
        "SELECT id, shift_id, signal, timestamp, planned_pause_duration_ms
         FROM shift_signals
         WHERE shift_id = ?1 AND signal = ?2
         ORDER BY timestamp DESC, id DESC
         LIMIT 1",
    )?;
    Ok(stmt
        .query_row(params![shift_id, signal.to_db_str()], map_signal)
        .optional()?)
}

/// Every signal of a shift in chronological order.
pub fn signals_for_shift(conn: &Connection, shift_id: i64) -> AppResult<Vec<ShiftSignal>> {
    let mut stmt = conn.prepare_cached(
        "SELECT id, shift_id, signal, timestamp, planned_pause_duration_ms
         FROM shift_signals
         WHERE shift_id = ?1
         ORDER BY timestamp ASC, id ASC",
    )?;
    let rows = stmt.query_map([shift_id], map_signal)?;

    let mut out = Vec::new();
    for r in rows {
        out.push(r?);
    }
    Ok(out)
}

pub fn delete_signals(conn: &Connection, shift_id: i64) -> AppResult<usize> {
    Ok(conn.execute("DELETE FROM shift_signals WHERE shift_id = ?1", [shift_id])?)
}

// ---------------------------------------------------------------------------
// Pauses
// ---------------------------------------------------------------------------

pub fn map_pause(row: &Row) -> Result<Pause> {
    Ok(Pause {
        id: row.get("id")?,
        shift_id: row.get("shift_id")?,
        pause_start: row.get("pause_start")?,
        pause_end: row.get("pause_end")?,
        duration_ms: row.get("duration_ms")?,
    })
}

pub fn insert_pause(conn: &Connection, pause: &Pause) -> AppResult<i64> {
    conn.execute(
        "INSERT INTO pauses (shift_id, pause_start, pause_end, duration_ms)
         VALUES (?1, ?2, ?3, ?4)",
        params![
            pause.shift_id,
            pause.pause_start,
            pause.pause_end,
            pause.duration_ms
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn pauses_for_shift(conn: &Connection, shift_id: i64) -> AppResult<Vec<Pause>> {
    let mut stmt = conn.prepare_cached(
        "SELECT id, shift_id, pause_start, pause_end, duration_ms
         FROM pauses
         WHERE shift_id = ?1
         ORDER BY pause_start ASC",
    )?;
    let rows = stmt.query_map([shift_id], map_pause)?;

    let mut out = Vec::new();
    for r in rows {
        out.push(r?);
    }
    Ok(out)
}

// ---------------------------------------------------------------------------
// Rides
// ---------------------------------------------------------------------------

const RIDE_COLUMNS: &str = "id, shift_id, driver_id, start_latitude, start_longitude,
    destination_latitude, destination_longitude, address, start_time, end_time,
    predicted_score, earning_cents, earning_per_min, distance_km, deleted_at";

pub fn map_ride(row: &Row) -> Result<Ride> {
    Ok(Ride {
        id: row.get("id")?,
        shift_id: row.get("shift_id")?,
        driver_id: row.get("driver_id")?,
        start_latitude: row.get("start_latitude")?,
        start_longitude: row.get("start_longitude")?,
        destination_latitude: row.get("destination_latitude")?,
        destination_longitude: row.get("destination_longitude")?,
        address: row.get("address")?,
        start_time: row.get("start_time")?,
        end_time: row.get("end_time")?,
        predicted_score: row.get("predicted_score")?,
        earning_cents: row.get("earning_cents")?,
        earning_per_min: row.get("earning_per_min")?,
        distance_km: row.get("distance_km")?,
        deleted_at: row.get("deleted_at")?,
    })
}

/// Insert a new ride. A second active ride on the same shift is rejected by
/// `ux_rides_active_shift` and reported as [`AppError::ActiveRideConflict`].
pub fn insert_ride(conn: &Connection, ride: &Ride) -> AppResult<i64> {
    conn.execute(
        "INSERT INTO rides (shift_id, driver_id, start_latitude, start_longitude,
                            destination_latitude, destination_longitude, address,
                            start_time, end_time, predicted_score,
                            earning_cents, earning_per_min, distance_km)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
        params![
            ride.shift_id,
            ride.driver_id,
            ride.start_latitude,
            ride.start_longitude,
            ride.destination_latitude,
            ride.destination_longitude,
            ride.address,
            ride.start_time,
            ride.end_time,
            ride.predicted_score,
            ride.earning_cents,
            ride.earning_per_min,
            ride.distance_km,
        ],
    )
    .map_err(|e| {
        if is_unique_violation(&e, "rides.shift_id") {
            AppError::ActiveRideConflict(format!(
                "Shift {} already has a ride in progress",
                ride.shift_id
            ))
        } else {
            AppError::Db(e)
        }
    })?;

    Ok(conn.last_insert_rowid())
}

pub fn find_ride(conn: &Connection, id: i64, include_deleted: bool) -> AppResult<Option<Ride>> {
    let sql = if include_deleted {
        format!("SELECT {RIDE_COLUMNS} FROM rides WHERE id = ?1")
    } else {
        format!("SELECT {RIDE_COLUMNS} FROM rides WHERE id = ?1 AND deleted_at IS NULL")
    };
    let mut stmt = conn.prepare_cached(&sql)?;
    Ok(stmt.query_row([id], map_ride).optional()?)
}

pub fn find_active_ride(conn: &Connection, shift_id: i64) -> AppResult<Option<Ride>> {
    let sql = format!(
        "SELECT {RIDE_COLUMNS} FROM rides
         WHERE shift_id = ?1 AND end_time IS NULL
         ORDER BY start_time DESC
         LIMIT 1"
    );
    let mut stmt = conn.prepare_cached(&sql)?;
    Ok(stmt.query_row([shift_id], map_ride).optional()?)
}

/// Rides of a shift ordered by start time.
pub fn rides_for_shift(
    conn: &Connection,
    shift_id: i64,
    include_deleted: bool,
) -> AppResult<Vec<Ride>> {
    let sql = format!(
        "SELECT {RIDE_COLUMNS} FROM rides
         WHERE shift_id = ?1 AND (?2 OR deleted_at IS NULL)
         ORDER BY start_time ASC, id ASC"
    );
    let mut stmt = conn.prepare_cached(&sql)?;
    let rows = stmt.query_map(params![shift_id, include_deleted], map_ride)?;

    let mut out = Vec::new();
    for r in rows {
        out.push(r?);
    }
    Ok(out)
}

pub fn rides_for_driver(conn: &Connection, driver_id: &str) -> AppResult<Vec<Ride>> {
    let sql = format!(
        "SELECT {RIDE_COLUMNS} FROM rides
         WHERE driver_id = ?1 AND deleted_at IS NULL
         ORDER BY start_time DESC"
    );
    let mut stmt = conn.prepare_cached(&sql)?;
    let rows = stmt.query_map([driver_id], map_ride)?;

    let mut out = Vec::new();
    for r in rows {
        out.push(r?);
    }
    Ok(out)
}

/// Open rides that started before `started_before`, optionally for one driver.
pub fn expired_rides(
    conn: &Connection,
    started_before: i64,
    driver_id: Option<&str>,
) -> AppResult<Vec<Ride>> {
    let sql = format!(
        "SELECT {RIDE_COLUMNS} FROM rides
         WHERE end_time IS NULL AND start_time < ?1
           AND (?2 IS NULL OR driver_id = ?2)
         ORDER BY start_time ASC"
    );
    let mut stmt = conn.prepare_cached(&sql)?;
    let rows = stmt.query_map(params![started_before, driver_id], map_ride)?;

    let mut out = Vec::new();
    for r in rows {
        out.push(r?);
    }
    Ok(out)
}

/// Update every mutable ride column (all fields except identity and origin).
pub fn update_ride(conn: &Connection, ride: &Ride) -> AppResult<()> {
    conn.execute(
        "UPDATE rides
         SET destination_latitude = ?1, destination_longitude = ?2, address = ?3,
             end_time = ?4, earning_cents = ?5, earning_per_min = ?6,
             distance_km = ?7
         WHERE id = ?8",
        params![
            ride.destination_latitude,
            ride.destination_longitude,
            ride.address,
            ride.end_time,
            ride.earning_cents,
            ride.earning_per_min,
            ride.distance_km,
            ride.id,
        ],
    )?;
    Ok(())
}

pub fn set_ride_deleted(conn: &Connection, id: i64, deleted_at: Option<i64>) -> AppResult<()> {
    conn.execute(
        "UPDATE rides SET deleted_at = ?1 WHERE id = ?2",
        params![deleted_at, id],
    )?;
    Ok(())
}
