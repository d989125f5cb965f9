//! Shift-level aggregates derived from pauses and rides.

use crate::db::queries;
use crate::errors::{AppError, AppResult};
use crate::models::pause::Pause;
use crate::models::ride::Ride;
use crate::models::shift::{Shift, ShiftStatsUpdate};
use rusqlite::Connection;

/// Which half of the aggregates to recompute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecomputeMode {
    Full,
    OnlyPauseData,
    OnlyRideData,
}

impl RecomputeMode {
    pub fn includes_pauses(self) -> bool {
        self != RecomputeMode::OnlyRideData
    }

    pub fn includes_rides(self) -> bool {
        self != RecomputeMode::OnlyPauseData
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PauseTotals {
    pub total_break_ms: i64,
    pub num_breaks: i64,
    pub avg_break_ms: i64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RideTotals {
    pub total_earnings_cents: i64,
    pub total_distance_km: f64,
    pub number_of_rides: i64,
}

/// Break statistics over the pauses lying inside the shift window.
pub fn pause_totals(shift: &Shift, pauses: &[Pause]) -> PauseTotals {
    let valid: Vec<&Pause> = pauses
        .iter()
        .filter(|p| p.lies_within(shift.start_time, shift.end_time))
        .collect();

    let total_break_ms: i64 = valid.iter().map(|p| p.duration_ms).sum();
    let num_breaks = valid.len() as i64;
    let avg_break_ms = if num_breaks > 0 {
        total_break_ms / num_breaks
    } else {
        0
    };

    PauseTotals {
        total_break_ms,
        num_breaks,
        avg_break_ms,
    }
}

/// Earnings and distance over billable rides (not deleted, earning > 0).
pub fn ride_totals(rides: &[Ride]) -> RideTotals {
    rides
        .iter()
        .filter(|r| r.is_billable())
        .fold(RideTotals::default(), |mut acc, r| {
            acc.total_earnings_cents += r.earning_cents.unwrap_or(0);
            acc.total_distance_km += r.distance_km.unwrap_or(0.0);
            acc.number_of_rides += 1;
            acc
        })
}

/// Compute the partial update for `shift`.
///
/// The duration is only set once the shift has ended, and work time only
/// when both the duration and the pauses are part of this computation.
/// Fields outside `mode`, or whose input was not supplied, stay `None`.
pub fn recompute(
    shift: &Shift,
    mode: RecomputeMode,
    pauses: Option<&[Pause]>,
    rides: Option<&[Ride]>,
) -> ShiftStatsUpdate {
    let mut update = ShiftStatsUpdate {
        total_duration_ms: shift.end_time.map(|end| end - shift.start_time),
        ..ShiftStatsUpdate::default()
    };

    if mode.includes_pauses()
        && let Some(pauses) = pauses
    {
        let totals = pause_totals(shift, pauses);
        update.break_time_ms = Some(totals.total_break_ms);
        update.num_breaks = Some(totals.num_breaks);
        update.avg_break_ms = Some(totals.avg_break_ms);
        update.work_time_ms = update
            .total_duration_ms
            .map(|total| total - totals.total_break_ms);
    }

    if mode.includes_rides()
        && let Some(rides) = rides
    {
        let totals = ride_totals(rides);
        update.total_earnings_cents = Some(totals.total_earnings_cents);
        update.total_distance_km = Some(totals.total_distance_km);
        update.number_of_rides = Some(totals.number_of_rides);
    }

    update
}

/// Load what `mode` needs, recompute and write the result onto the shift row.
/// Returns the refreshed shift.
pub fn recompute_and_store(
    conn: &Connection,
    shift_id: i64,
    mode: RecomputeMode,
) -> AppResult<Shift> {
    let mut shift = queries::find_shift(conn, shift_id, true)?
        .ok_or_else(|| AppError::NotFound(format!("Shift {shift_id}")))?;

    let pauses = if mode.includes_pauses() {
        Some(queries::pauses_for_shift(conn, shift_id)?)
    } else {
        None
    };
    let rides = if mode.includes_rides() {
        Some(queries::rides_for_shift(conn, shift_id, true)?)
    } else {
        None
    };

    let update = recompute(&shift, mode, pauses.as_deref(), rides.as_deref());
    queries::apply_stats_update(conn, shift_id, &update)?;
    update.apply_to(&mut shift);

    Ok(shift)
}
