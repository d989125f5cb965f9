//! Completed breaks, derived from pause → continue signal pairs.

use crate::db::queries;
use crate::errors::{AppError, AppResult};
use crate::models::pause::Pause;
use crate::models::signal_type::SignalType;
use rusqlite::Connection;
use serde::Serialize;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PauseInfo {
    pub is_paused: bool,
    pub pause_start: Option<i64>,
    pub last_pause_end: Option<i64>,
    pub elapsed_pause_ms: Option<i64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PauseStats {
    pub count: i64,
    pub total_ms: i64,
    pub average_ms: i64,
}

pub struct PauseLedger<'a> {
    conn: &'a Connection,
}

impl<'a> PauseLedger<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Persist the break that the newest `continue` signal just closed.
    ///
    /// The two most recent signals must be `[continue, pause]`, newest first.
    /// Anything else means the signal history is corrupt.
    pub fn record_completed_pause(&self, shift_id: i64) -> AppResult<Pause> {
        let recent = queries::recent_signals(self.conn, shift_id, 2)?;

        let (cont, pause) = match recent.as_slice() {
            [newest, previous]
                if newest.signal == SignalType::Continue && previous.signal == SignalType::Pause =>
            {
                (newest, previous)
            }
            other => {
                let found: Vec<&str> = other.iter().map(|s| s.signal.to_db_str()).collect();
                let msg = format!(
                    "shift {shift_id}: expected [continue, pause], found [{}]",
                    found.join(", ")
                );
                log::error!("{msg}");
                return Err(AppError::InconsistentSignalSequence(msg));
            }
        };

        let mut record = Pause::new(shift_id, pause.timestamp, cont.timestamp);
        if record.duration_ms < 0 {
            return Err(AppError::TemporalConstraintViolation(format!(
                "continue at {} precedes pause at {}",
                cont.timestamp, pause.timestamp
            )));
        }

        record.id = queries::insert_pause(self.conn, &record)?;
        Ok(record)
    }

    /// Break state of the driver's active shift, measured against `now`.
    pub fn pause_info(&self, driver_id: &str, now: i64) -> AppResult<PauseInfo> {
        let Some(shift) = queries::find_active_shift(self.conn, driver_id)? else {
            return Ok(PauseInfo::default());
        };

        let last = queries::last_signal(self.conn, shift.id)?;
        let last_continue =
            queries::last_signal_of_type(self.conn, shift.id, SignalType::Continue)?;

        let pause_start = last
            .filter(|s| s.signal.is_pause())
            .map(|s| s.timestamp);

        Ok(PauseInfo {
            is_paused: pause_start.is_some(),
            pause_start,
            last_pause_end: last_continue.map(|s| s.timestamp),
            elapsed_pause_ms: pause_start.map(|start| (now - start).max(0)),
        })
    }

    pub fn stats_for_shift(&self, shift_id: i64) -> AppResult<PauseStats> {
        let pauses = self.pauses_for_shift(shift_id)?;

        let count = pauses.len() as i64;
        let total_ms: i64 = pauses.iter().map(|p| p.duration_ms).sum();
        let average_ms = if count == 0 { 0 } else { total_ms / count };

        Ok(PauseStats {
            count,
            total_ms,
            average_ms,
        })
    }

    pub fn pauses_for_shift(&self, shift_id: i64) -> AppResult<Vec<Pause>> {
        queries::pauses_for_shift(self.conn, shift_id)
    }
}
