//! Day-by-day earnings and work-time report over a date range.
//!
//! Days are UTC calendar days. Rides and shifts are attributed to the day
//! they started on.

use crate::db::queries;
use crate::errors::{AppError, AppResult};
use crate::models::ride::Ride;
use crate::models::shift::Shift;
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use rusqlite::Connection;
use serde::Serialize;
use std::collections::BTreeMap;

/// Longest range a single report may cover.
pub const MAX_PERIOD_DAYS: i64 = 366;

/// Only changes how days are labelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PeriodView {
    Weekly,
    Monthly,
}

impl PeriodView {
    pub fn from_name(s: &str) -> AppResult<Self> {
        match s.trim().to_lowercase().as_str() {
            "weekly" | "week" => Ok(PeriodView::Weekly),
            "monthly" | "month" => Ok(PeriodView::Monthly),
            other => Err(AppError::Validation(format!(
                "Unknown view '{other}', expected weekly or monthly"
            ))),
        }
    }

    /// `Mon`, `Tue`, ... for weekly views, day of month for monthly ones.
    pub fn label(self, day: NaiveDate) -> String {
        match self {
            PeriodView::Weekly => day.format("%a").to_string(),
            PeriodView::Monthly => day.day().to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DayShift {
    pub shift: Shift,
    pub rides: Vec<Ride>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DayReport {
    pub date: NaiveDate,
    pub label: String,
    pub earnings_cents: i64,
    pub with_passenger_ms: i64,
    pub empty_ms: i64,
    pub has_ride: bool,
    pub ride_count: usize,
    pub shifts: Vec<DayShift>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PeriodReport {
    pub view: PeriodView,
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub total_earnings_cents: i64,
    pub days: Vec<DayReport>,
}

fn day_of(ms: i64) -> Option<NaiveDate> {
    DateTime::<Utc>::from_timestamp_millis(ms).map(|dt| dt.date_naive())
}

/// Every date from `from` to `to`, both included.
pub fn days_between(from: NaiveDate, to: NaiveDate) -> Vec<NaiveDate> {
    let mut out = Vec::new();
    let mut d = from;
    while d <= to {
        out.push(d);
        match d.succ_opt() {
            Some(next) => d = next,
            None => break,
        }
    }
    out
}

/// Time spent with a passenger and idle gaps between consecutive rides of
/// one day. Only ended rides count.
pub fn work_time(rides: &[&Ride]) -> (i64, i64) {
    let mut ended: Vec<(i64, i64)> = rides
        .iter()
        .filter_map(|r| r.end_time.map(|end| (r.start_time, end)))
        .collect();
    ended.sort_unstable();

    let with_passenger: i64 = ended.iter().map(|(start, end)| end - start).sum();
    let empty: i64 = ended
        .windows(2)
        .map(|pair| (pair[1].0 - pair[0].1).max(0))
        .sum();

    (with_passenger, empty)
}

/// Assemble the report from already loaded shifts and rides.
pub fn build_report(
    shifts: &[Shift],
    rides: &[Ride],
    from: NaiveDate,
    to: NaiveDate,
    view: PeriodView,
) -> AppResult<PeriodReport> {
    if from > to {
        return Err(AppError::Validation(format!(
            "Period start {from} is after its end {to}"
        )));
    }
    if (to - from).num_days() >= MAX_PERIOD_DAYS {
        return Err(AppError::Validation(format!(
            "Period {from}..{to} is longer than {MAX_PERIOD_DAYS} days"
        )));
    }

    let mut shifts_by_day: BTreeMap<NaiveDate, Vec<&Shift>> = BTreeMap::new();
    for s in shifts.iter().filter(|s| !s.is_deleted()) {
        if let Some(day) = day_of(s.start_time) {
            shifts_by_day.entry(day).or_default().push(s);
        }
    }

    let mut rides_by_day: BTreeMap<NaiveDate, Vec<&Ride>> = BTreeMap::new();
    for r in rides.iter().filter(|r| !r.is_deleted()) {
        if let Some(day) = day_of(r.start_time) {
            rides_by_day.entry(day).or_default().push(r);
        }
    }

    let mut days = Vec::new();
    let mut total_earnings_cents = 0;

    for date in days_between(from, to) {
        let day_rides = rides_by_day.get(&date).map(Vec::as_slice).unwrap_or(&[]);
        let day_shifts = shifts_by_day.get(&date).map(Vec::as_slice).unwrap_or(&[]);

        let earnings_cents: i64 = day_rides
            .iter()
            .filter(|r| r.is_billable())
            .map(|r| r.earning_cents.unwrap_or(0))
            .sum();
        let (with_passenger_ms, empty_ms) = work_time(day_rides);
        total_earnings_cents += earnings_cents;

        let shifts = day_shifts
            .iter()
            .map(|s| DayShift {
                shift: (*s).clone(),
                rides: day_rides
                    .iter()
                    .filter(|r| r.shift_id == s.id)
                    .map(|r| (*r).clone())
                    .collect(),
            })
            .collect();

        days.push(DayReport {
            date,
            label: view.label(date),
            earnings_cents,
            with_passenger_ms,
            empty_ms,
            has_ride: !day_rides.is_empty(),
            ride_count: day_rides.len(),
            shifts,
        });
    }

    Ok(PeriodReport {
        view,
        from,
        to,
        total_earnings_cents,
        days,
    })
}

/// Load a driver's shifts and rides and build the report for `from..=to`.
pub fn period_report(
    conn: &Connection,
    driver_id: &str,
    from: NaiveDate,
    to: NaiveDate,
    view: PeriodView,
) -> AppResult<PeriodReport> {
    let shifts = queries::shifts_for_driver(conn, driver_id)?;
    let rides = queries::rides_for_driver(conn, driver_id)?;
    build_report(&shifts, &rides, from, to, view)
}
