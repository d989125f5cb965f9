//! Shift lifecycle: signal ingestion, termination and history edits.
//!
//! Every signal handler runs in one `IMMEDIATE` transaction: the active-ride
//! freeze, the transition check and the write commit together or not at all.

use crate::config::Config;
use crate::core::calculator::statistics::{RecomputeMode, recompute_and_store};
use crate::core::clock::Clock;
use crate::core::pause_ledger::PauseLedger;
use crate::core::signal_validator::check_transition;
use crate::db::log::ttlog;
use crate::db::queries;
use crate::errors::{AppError, AppResult};
use crate::models::pause::Pause;
use crate::models::shift::{Shift, ShiftEdit, ShiftStatus, ShiftSummary};
use crate::models::signal::ShiftSignal;
use crate::models::signal_type::SignalType;
use rusqlite::{Connection, Transaction, TransactionBehavior};

/// Result of an accepted signal.
#[derive(Debug, Clone)]
pub enum SignalOutcome {
    Started(Shift),
    Paused(ShiftSignal),
    Continued(Pause),
    Stopped(ShiftSummary),
}

pub struct ShiftLogic<'a> {
    conn: &'a Connection,
    clock: &'a dyn Clock,
    cfg: &'a Config,
}

impl<'a> ShiftLogic<'a> {
    pub fn new(conn: &'a Connection, clock: &'a dyn Clock, cfg: &'a Config) -> Self {
        Self { conn, clock, cfg }
    }

    fn begin(&self) -> AppResult<Transaction<'a>> {
        Ok(Transaction::new_unchecked(
            self.conn,
            TransactionBehavior::Immediate,
        )?)
    }

    /// Dispatch a signal to its handler.
    pub fn handle_signal(
        &self,
        driver_id: &str,
        signal: SignalType,
        timestamp: i64,
        planned_duration_ms: Option<i64>,
    ) -> AppResult<SignalOutcome> {
        match signal {
            SignalType::Start => self
                .handle_start(driver_id, timestamp, planned_duration_ms)
                .map(SignalOutcome::Started),
            SignalType::Pause => self
                .handle_pause(driver_id, timestamp, planned_duration_ms)
                .map(SignalOutcome::Paused),
            SignalType::Continue => self
                .handle_continue(driver_id, timestamp)
                .map(SignalOutcome::Continued),
            SignalType::Stop => self
                .handle_stop(driver_id, timestamp)
                .map(SignalOutcome::Stopped),
        }
    }

    /// Preconditions shared by every signal: no ride in progress, a legal
    /// transition from the newest signal, and a non-decreasing timestamp.
    /// Returns the driver's active shift, if any.
    fn prepare(
        conn: &Connection,
        driver_id: &str,
        candidate: SignalType,
        timestamp: i64,
    ) -> AppResult<Option<Shift>> {
        let shift = queries::find_active_shift(conn, driver_id)?;

        let last = match &shift {
            Some(s) => {
                if queries::find_active_ride(conn, s.id)?.is_some() {
                    return Err(AppError::ActiveRideConflict(format!(
                        "Cannot {candidate} shift {} while a ride is in progress",
                        s.id
                    )));
                }
                queries::last_signal(conn, s.id)?
            }
            None => None,
        };

        check_transition(last.as_ref().map(|s| s.signal), candidate)?;

        if let Some(prev) = &last
            && timestamp < prev.timestamp
        {
            return Err(AppError::TemporalConstraintViolation(format!(
                "{candidate} at {timestamp} precedes the last {} at {}",
                prev.signal, prev.timestamp
            )));
        }

        Ok(shift)
    }

    pub fn handle_start(
        &self,
        driver_id: &str,
        timestamp: i64,
        planned_duration_ms: Option<i64>,
    ) -> AppResult<Shift> {
        let planned = planned_duration_ms.unwrap_or(self.cfg.default_planned_duration_ms);
        if planned <= 0 {
            return Err(AppError::Validation(format!(
                "Planned duration must be positive, got {planned}"
            )));
        }

        let tx = self.begin()?;
        if let Some(active) = queries::find_active_shift(&tx, driver_id)? {
            return Err(AppError::ActiveShiftConflict(format!(
                "Driver {driver_id} already has active shift {}",
                active.id
            )));
        }
        Self::prepare(&tx, driver_id, SignalType::Start, timestamp)?;

        let mut shift = Shift::new(driver_id, timestamp, Some(planned));
        shift.id = queries::insert_shift(&tx, &shift)?;
        queries::insert_signal(
            &tx,
            &ShiftSignal::new(shift.id, SignalType::Start, timestamp, None),
        )?;

        ttlog(
            &tx,
            "shift_start",
            driver_id,
            &format!("Shift {} started at {}", shift.id, timestamp),
        )?;
        tx.commit()?;

        log::info!("driver {driver_id}: shift {} started", shift.id);
        Ok(shift)
    }

    pub fn handle_pause(
        &self,
        driver_id: &str,
        timestamp: i64,
        planned_pause_duration_ms: Option<i64>,
    ) -> AppResult<ShiftSignal> {
        let tx = self.begin()?;
        let shift = Self::prepare(&tx, driver_id, SignalType::Pause, timestamp)?
            .ok_or_else(|| AppError::NotFound("No active shift".into()))?;

        let mut sig = ShiftSignal::new(
            shift.id,
            SignalType::Pause,
            timestamp,
            planned_pause_duration_ms,
        );
        sig.id = queries::insert_signal(&tx, &sig)?;

        ttlog(
            &tx,
            "shift_pause",
            driver_id,
            &format!("Shift {} paused at {}", shift.id, timestamp),
        )?;
        tx.commit()?;

        Ok(sig)
    }

    /// Append the continue signal, then record the pause it closes.
    pub fn handle_continue(&self, driver_id: &str, timestamp: i64) -> AppResult<Pause> {
        let tx = self.begin()?;
        let shift = Self::prepare(&tx, driver_id, SignalType::Continue, timestamp)?
            .ok_or_else(|| AppError::NotFound("No active shift".into()))?;

        queries::insert_signal(
            &tx,
            &ShiftSignal::new(shift.id, SignalType::Continue, timestamp, None),
        )?;
        let pause = PauseLedger::new(&tx).record_completed_pause(shift.id)?;

        ttlog(
            &tx,
            "shift_continue",
            driver_id,
            &format!("Shift {} resumed after {} ms", shift.id, pause.duration_ms),
        )?;
        tx.commit()?;

        Ok(pause)
    }

    /// Register a zero-length break: pause and continue at the same instant.
    pub fn skip_pause(&self, driver_id: &str, timestamp: i64) -> AppResult<Pause> {
        let tx = self.begin()?;
        let shift = Self::prepare(&tx, driver_id, SignalType::Pause, timestamp)?
            .ok_or_else(|| AppError::NotFound("No active shift".into()))?;

        queries::insert_signal(
            &tx,
            &ShiftSignal::new(shift.id, SignalType::Pause, timestamp, None),
        )?;
        check_transition(Some(SignalType::Pause), SignalType::Continue)?;
        queries::insert_signal(
            &tx,
            &ShiftSignal::new(shift.id, SignalType::Continue, timestamp, None),
        )?;
        let pause = PauseLedger::new(&tx).record_completed_pause(shift.id)?;

        ttlog(
            &tx,
            "shift_skip_pause",
            driver_id,
            &format!("Shift {} skipped a pause at {}", shift.id, timestamp),
        )?;
        tx.commit()?;

        Ok(pause)
    }

    pub fn handle_stop(&self, driver_id: &str, timestamp: i64) -> AppResult<ShiftSummary> {
        let tx = self.begin()?;
        let shift = Self::prepare(&tx, driver_id, SignalType::Stop, timestamp)?
            .ok_or_else(|| AppError::NotFound("No active shift".into()))?;

        let ended = finalize_shift(&tx, &shift, timestamp)?;

        ttlog(
            &tx,
            "shift_stop",
            driver_id,
            &format!("Shift {} stopped at {}", shift.id, timestamp),
        )?;
        tx.commit()?;

        log::info!("driver {driver_id}: shift {} stopped", shift.id);
        Ok(ended.summary())
    }

    /// Stop a specific shift through the regular stop path.
    pub fn end_shift_by_id(
        &self,
        driver_id: &str,
        shift_id: i64,
        timestamp: i64,
    ) -> AppResult<ShiftSummary> {
        let tx = self.begin()?;
        let shift = owned_shift(&tx, driver_id, shift_id)?;

        if !shift.is_active() {
            return Err(AppError::AlreadyEnded(format!("Shift {shift_id}")));
        }
        if queries::find_active_ride(&tx, shift_id)?.is_some() {
            return Err(AppError::ActiveRideConflict(format!(
                "Shift {shift_id} has a ride in progress"
            )));
        }
        if let Some(last) = queries::last_signal(&tx, shift_id)? {
            check_transition(Some(last.signal), SignalType::Stop)?;
            if timestamp < last.timestamp {
                return Err(AppError::TemporalConstraintViolation(format!(
                    "stop at {timestamp} precedes the last {} at {}",
                    last.signal, last.timestamp
                )));
            }
        }

        let ended = finalize_shift(&tx, &shift, timestamp)?;
        ttlog(
            &tx,
            "shift_stop",
            driver_id,
            &format!("Shift {shift_id} ended by id at {timestamp}"),
        )?;
        tx.commit()?;

        Ok(ended.summary())
    }

    pub fn current_status(&self, driver_id: &str) -> AppResult<Option<ShiftStatus>> {
        let Some(shift) = queries::find_active_shift(self.conn, driver_id)? else {
            return Ok(None);
        };

        let last = queries::last_signal(self.conn, shift.id)?;
        let last_continue =
            queries::last_signal_of_type(self.conn, shift.id, SignalType::Continue)?;
        let open_pause = last.filter(|s| s.signal.is_pause());

        Ok(Some(ShiftStatus {
            shift_id: shift.id,
            is_on_shift: true,
            shift_start_time: shift.start_time,
            is_paused: open_pause.is_some(),
            pause_start_time: open_pause.as_ref().map(|s| s.timestamp),
            last_pause_end_time: last_continue.map(|s| s.timestamp),
            planned_duration_ms: shift.planned_duration_ms,
            planned_pause_duration_ms: open_pause.and_then(|s| s.planned_pause_duration_ms),
        }))
    }

    /// On shift and currently working (last signal is start or continue).
    pub fn driver_is_available(&self, driver_id: &str) -> AppResult<bool> {
        let Some(shift) = queries::find_active_shift(self.conn, driver_id)? else {
            return Ok(false);
        };
        Ok(queries::last_signal(self.conn, shift.id)?.is_some_and(|s| s.signal.is_working()))
    }

    pub fn shifts_for_driver(&self, driver_id: &str) -> AppResult<Vec<Shift>> {
        queries::shifts_for_driver(self.conn, driver_id)
    }

    pub fn shift_by_id(&self, driver_id: &str, shift_id: i64) -> AppResult<Shift> {
        owned_shift(self.conn, driver_id, shift_id)
    }

    /// Move the window of an ended shift and recompute its aggregates.
    pub fn edit_shift(&self, driver_id: &str, shift_id: i64, edit: &ShiftEdit) -> AppResult<Shift> {
        if edit.start_time.is_none() && edit.end_time.is_none() {
            return Err(AppError::Validation("Nothing to edit".into()));
        }

        let tx = self.begin()?;
        let shift = owned_shift(&tx, driver_id, shift_id)?;
        let Some(current_end) = shift.end_time else {
            return Err(AppError::ActiveShiftConflict(format!(
                "Shift {shift_id} is still active"
            )));
        };

        let start = edit.start_time.unwrap_or(shift.start_time);
        let end = edit.end_time.unwrap_or(current_end);

        if start >= end {
            return Err(AppError::TemporalConstraintViolation(format!(
                "Shift start {start} must precede its end {end}"
            )));
        }
        if end - start > self.cfg.max_shift_duration_ms() {
            return Err(AppError::TemporalConstraintViolation(format!(
                "Shift would last {} ms, more than the {} h limit",
                end - start,
                self.cfg.max_shift_duration_hours
            )));
        }

        for ride in queries::rides_for_shift(&tx, shift_id, false)? {
            if ride.start_time < start || ride.last_activity() > end {
                return Err(AppError::TemporalConstraintViolation(format!(
                    "Ride {} falls outside the new window",
                    ride.id
                )));
            }
        }
        for pause in PauseLedger::new(&tx).pauses_for_shift(shift_id)? {
            if !pause.lies_within(start, Some(end)) {
                return Err(AppError::TemporalConstraintViolation(format!(
                    "Pause {} falls outside the new window",
                    pause.id
                )));
            }
        }

        queries::update_shift_window(&tx, shift_id, start, Some(end))?;
        let updated = recompute_and_store(&tx, shift_id, RecomputeMode::Full)?;

        ttlog(
            &tx,
            "shift_edit",
            driver_id,
            &format!("Shift {shift_id} window set to {start}..{end}"),
        )?;
        tx.commit()?;

        Ok(updated)
    }

    pub fn delete_shift(&self, driver_id: &str, shift_id: i64) -> AppResult<()> {
        let tx = self.begin()?;
        let shift = owned_shift(&tx, driver_id, shift_id)?;

        if shift.is_active() {
            return Err(AppError::ActiveShiftConflict(format!(
                "Shift {shift_id} is still active"
            )));
        }
        if !queries::rides_for_shift(&tx, shift_id, true)?.is_empty() {
            return Err(AppError::Validation(format!(
                "Shift {shift_id} has rides and cannot be deleted"
            )));
        }

        queries::set_shift_deleted(&tx, shift_id, Some(self.clock.now_ms()))?;
        ttlog(&tx, "shift_delete", driver_id, &format!("Shift {shift_id} deleted"))?;
        tx.commit()?;

        Ok(())
    }

    pub fn restore_shift(&self, driver_id: &str, shift_id: i64) -> AppResult<Shift> {
        let tx = self.begin()?;
        let mut shift = queries::find_shift(&tx, shift_id, true)?
            .ok_or_else(|| AppError::NotFound(format!("Shift {shift_id}")))?;
        ensure_owner(&shift, driver_id)?;

        if !shift.is_deleted() {
            return Err(AppError::Validation(format!("Shift {shift_id} is not deleted")));
        }

        queries::set_shift_deleted(&tx, shift_id, None)?;
        ttlog(&tx, "shift_restore", driver_id, &format!("Shift {shift_id} restored"))?;
        tx.commit()?;

        shift.deleted_at = None;
        Ok(shift)
    }
}

fn ensure_owner(shift: &Shift, driver_id: &str) -> AppResult<()> {
    if shift.driver_id != driver_id {
        return Err(AppError::NotAuthorized(format!(
            "Shift {} does not belong to driver {driver_id}",
            shift.id
        )));
    }
    Ok(())
}

fn owned_shift(conn: &Connection, driver_id: &str, shift_id: i64) -> AppResult<Shift> {
    let shift = queries::find_shift(conn, shift_id, false)?
        .ok_or_else(|| AppError::NotFound(format!("Shift {shift_id}")))?;
    ensure_owner(&shift, driver_id)?;
    Ok(shift)
}

/// The stop path: close the window, append the stop signal, compute the full
/// aggregates and purge the signal history. Callers own the transaction.
pub(crate) fn finalize_shift(conn: &Connection, shift: &Shift, end_time: i64) -> AppResult<Shift> {
    if end_time < shift.start_time {
        return Err(AppError::TemporalConstraintViolation(format!(
            "Stop at {end_time} precedes shift start {}",
            shift.start_time
        )));
    }

    queries::insert_signal(
        conn,
        &ShiftSignal::new(shift.id, SignalType::Stop, end_time, None),
    )?;
    queries::update_shift_window(conn, shift.id, shift.start_time, Some(end_time))?;
    let ended = recompute_and_store(conn, shift.id, RecomputeMode::Full)?;
    let purged = queries::delete_signals(conn, shift.id)?;

    log::debug!("shift {}: purged {purged} signals", shift.id);
    Ok(ended)
}
