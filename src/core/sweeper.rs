//! Reconciliation of abandoned rides and stale shifts.
//!
//! Each candidate is handled in its own transaction and re-read inside it,
//! so a sweep running next to live traffic never closes something that was
//! just stopped or resumed. One failing candidate does not stop the sweep.

use crate::config::Config;
use crate::core::clock::Clock;
use crate::core::ride::refresh_ended_shift;
use crate::core::shift::finalize_shift;
use crate::db::log::ttlog;
use crate::db::queries;
use crate::errors::AppResult;
use crate::models::ride::Ride;
use crate::models::shift::Shift;
use crate::models::signal_type::SignalType;
use rusqlite::{Connection, Transaction, TransactionBehavior};
use serde::Serialize;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub expired_rides: usize,
    pub closed_shifts: usize,
    pub purged_shifts: usize,
    pub skipped_shifts: usize,
    pub failures: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ShiftOutcome {
    Skipped,
    Closed,
    Purged,
}

pub struct Sweeper<'a> {
    conn: &'a Connection,
    clock: &'a dyn Clock,
    cfg: &'a Config,
}

impl<'a> Sweeper<'a> {
    pub fn new(conn: &'a Connection, clock: &'a dyn Clock, cfg: &'a Config) -> Self {
        Self { conn, clock, cfg }
    }

    fn begin(&self) -> AppResult<Transaction<'a>> {
        Ok(Transaction::new_unchecked(
            self.conn,
            TransactionBehavior::Immediate,
        )?)
    }

    /// Reconcile every driver.
    pub fn sweep(&self) -> AppResult<SweepReport> {
        self.run(None)
    }

    /// Reconcile a single driver's leftovers.
    pub fn sweep_driver(&self, driver_id: &str) -> AppResult<SweepReport> {
        self.run(Some(driver_id))
    }

    fn run(&self, driver_id: Option<&str>) -> AppResult<SweepReport> {
        let now = self.clock.now_ms();
        let mut report = SweepReport::default();

        let ride_cutoff = now - self.cfg.ride_expiry_ms();
        for ride in queries::expired_rides(self.conn, ride_cutoff, driver_id)? {
            match self.expire_ride(&ride, now) {
                Ok(true) => report.expired_rides += 1,
                Ok(false) => {}
                Err(e) => {
                    log::warn!("sweep: could not expire ride {}: {}", ride.id, e);
                    report.failures += 1;
                }
            }
        }

        for shift in queries::list_active_shifts(self.conn, driver_id)? {
            match self.reconcile_shift(&shift, now) {
                Ok(ShiftOutcome::Skipped) => report.skipped_shifts += 1,
                Ok(ShiftOutcome::Closed) => report.closed_shifts += 1,
                Ok(ShiftOutcome::Purged) => report.purged_shifts += 1,
                Err(e) => {
                    log::warn!("sweep: could not reconcile shift {}: {}", shift.id, e);
                    report.failures += 1;
                }
            }
        }

        log::info!(
            "sweep done: {} rides expired, {} shifts closed, {} purged, {} failures",
            report.expired_rides,
            report.closed_shifts,
            report.purged_shifts,
            report.failures
        );
        Ok(report)
    }

    /// Force-end an abandoned ride as unpaid. Returns false if it was ended
    /// in the meantime.
    fn expire_ride(&self, candidate: &Ride, now: i64) -> AppResult<bool> {
        let tx = self.begin()?;

        let Some(mut ride) = queries::find_ride(&tx, candidate.id, true)? else {
            return Ok(false);
        };
        if !ride.is_active() {
            return Ok(false);
        }

        ride.end_time = Some(now);
        ride.earning_cents = Some(0);
        ride.earning_per_min = Some(0);
        ride.distance_km = Some(0.0);
        queries::update_ride(&tx, &ride)?;
        refresh_ended_shift(&tx, ride.shift_id)?;

        ttlog(
            &tx,
            "sweep_ride",
            &ride.driver_id,
            &format!("Ride {} expired after {} h", ride.id, self.cfg.ride_expiry_hours),
        )?;
        tx.commit()?;

        Ok(true)
    }

    fn is_stale(&self, conn: &Connection, shift_id: i64, now: i64) -> AppResult<bool> {
        let Some(last) = queries::last_signal(conn, shift_id)? else {
            return Ok(false);
        };
        if last.signal == SignalType::Stop {
            return Ok(false);
        }
        Ok(now - last.timestamp > self.cfg.shift_expiry_ms())
    }

    fn reconcile_shift(&self, candidate: &Shift, now: i64) -> AppResult<ShiftOutcome> {
        let tx = self.begin()?;

        let Some(shift) = queries::find_shift(&tx, candidate.id, true)? else {
            return Ok(ShiftOutcome::Skipped);
        };
        if !shift.is_active() || !self.is_stale(&tx, shift.id, now)? {
            return Ok(ShiftOutcome::Skipped);
        }
        if queries::find_active_ride(&tx, shift.id)?.is_some() {
            log::warn!("sweep: shift {} still has a ride in progress", shift.id);
            return Ok(ShiftOutcome::Skipped);
        }

        let rides = queries::rides_for_shift(&tx, shift.id, true)?;
        let last_ride = rides.iter().max_by_key(|r| (r.start_time, r.id));

        let outcome = match last_ride {
            Some(ride) => {
                let stop_at = ride.last_activity();
                finalize_shift(&tx, &shift, stop_at)?;
                ttlog(
                    &tx,
                    "sweep_shift",
                    &shift.driver_id,
                    &format!("Stale shift {} closed at {}", shift.id, stop_at),
                )?;
                ShiftOutcome::Closed
            }
            None => {
                queries::delete_shift_hard(&tx, shift.id)?;
                ttlog(
                    &tx,
                    "sweep_shift",
                    &shift.driver_id,
                    &format!("Empty stale shift {} removed", shift.id),
                )?;
                ShiftOutcome::Purged
            }
        };

        tx.commit()?;
        Ok(outcome)
    }
}
