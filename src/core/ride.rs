//! Ride lifecycle inside an active shift.
//!
//! `can_start` is an optimistic check. `start` repeats it inside its
//! `IMMEDIATE` transaction, so a shift stopped in the meantime is seen.
//! A second active ride on a shift is rejected by `ux_rides_active_shift`.

use crate::config::Config;
use crate::core::calculator::statistics::{RecomputeMode, recompute_and_store};
use crate::core::clock::Clock;
use crate::db::log::ttlog;
use crate::db::queries;
use crate::errors::{AppError, AppResult};
use crate::models::ride::{
    Coordinates, Ride, RideBlock, RideEdit, RideEligibility, RideMetrics, RideStatus, SCORE_RANGE,
    StartedRide, earning_per_minute, validate_latitude, validate_longitude,
};
use rusqlite::{Connection, Transaction, TransactionBehavior};

pub struct RideLogic<'a> {
    conn: &'a Connection,
    clock: &'a dyn Clock,
    cfg: &'a Config,
}

impl<'a> RideLogic<'a> {
    pub fn new(conn: &'a Connection, clock: &'a dyn Clock, cfg: &'a Config) -> Self {
        Self { conn, clock, cfg }
    }

    fn begin(&self) -> AppResult<Transaction<'a>> {
        Ok(Transaction::new_unchecked(
            self.conn,
            TransactionBehavior::Immediate,
        )?)
    }

    pub fn can_start(&self, driver_id: &str) -> AppResult<RideEligibility> {
        eligibility(self.conn, driver_id)
    }

    pub fn start(
        &self,
        driver_id: &str,
        shift_id: i64,
        coords: Coordinates,
        predicted_score: i64,
        timestamp: Option<i64>,
        address: Option<&str>,
    ) -> AppResult<StartedRide> {
        coords.validate()?;
        if !(SCORE_RANGE.0..=SCORE_RANGE.1).contains(&predicted_score) {
            return Err(AppError::Validation(format!(
                "Predicted score must be between {} and {}, got {predicted_score}",
                SCORE_RANGE.0, SCORE_RANGE.1
            )));
        }

        let tx = self.begin()?;
        let shift = queries::find_shift(&tx, shift_id, false)?
            .ok_or_else(|| AppError::NotFound(format!("Shift {shift_id}")))?;
        if shift.driver_id != driver_id {
            return Err(AppError::NotAuthorized(format!(
                "Shift {shift_id} does not belong to driver {driver_id}"
            )));
        }

        if let Some(reason) = eligibility(&tx, driver_id)?.reason {
            return Err(reason.into_error());
        }
        if !shift.is_active() {
            return Err(AppError::Validation(format!(
                "Shift {shift_id} is not the active shift"
            )));
        }

        let start_time = timestamp.unwrap_or_else(|| self.clock.now_ms());
        if start_time < shift.start_time {
            return Err(AppError::TemporalConstraintViolation(format!(
                "Ride start {start_time} precedes shift start {}",
                shift.start_time
            )));
        }

        let address = address
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .unwrap_or(self.cfg.default_address.as_str());
        let mut ride = Ride::new(shift_id, driver_id, coords, address, start_time, predicted_score);
        ride.id = queries::insert_ride(&tx, &ride)?;
        ttlog(
            &tx,
            "ride_start",
            driver_id,
            &format!("Ride {} started on shift {shift_id}", ride.id),
        )?;
        tx.commit()?;

        log::info!("driver {driver_id}: ride {} started", ride.id);
        Ok(StartedRide {
            ride_id: ride.id,
            start_time,
            predicted_score,
        })
    }

    pub fn end(
        &self,
        driver_id: &str,
        ride_id: i64,
        fare_cents: i64,
        distance_km: f64,
        timestamp: Option<i64>,
    ) -> AppResult<RideMetrics> {
        if fare_cents < 0 {
            return Err(AppError::Validation(format!("Fare cannot be negative: {fare_cents}")));
        }
        if !distance_km.is_finite() || distance_km < 0.0 {
            return Err(AppError::Validation(format!("Invalid distance: {distance_km}")));
        }

        let tx = self.begin()?;
        let mut ride = owned_ride(&tx, driver_id, ride_id)?;
        if !ride.is_active() {
            return Err(AppError::AlreadyEnded(format!("Ride {ride_id}")));
        }

        let end_time = timestamp.unwrap_or_else(|| self.clock.now_ms());
        let elapsed = end_time - ride.start_time;
        if elapsed <= 0 {
            return Err(AppError::TemporalConstraintViolation(format!(
                "Ride {ride_id} cannot end at {end_time}, it started at {}",
                ride.start_time
            )));
        }

        let epm = earning_per_minute(fare_cents, elapsed);
        ride.end_time = Some(end_time);
        ride.earning_cents = Some(fare_cents);
        ride.distance_km = Some(distance_km);
        ride.earning_per_min = Some(epm);

        queries::update_ride(&tx, &ride)?;
        refresh_ended_shift(&tx, ride.shift_id)?;
        ttlog(
            &tx,
            "ride_end",
            driver_id,
            &format!("Ride {ride_id} ended: {fare_cents} cents, {distance_km} km"),
        )?;
        tx.commit()?;

        Ok(RideMetrics {
            ride_id,
            total_time_ms: elapsed,
            distance_km,
            earning_cents: fare_cents,
            earning_per_min: epm,
        })
    }

    pub fn status(&self, driver_id: &str) -> AppResult<RideStatus> {
        let shift = queries::find_active_shift(self.conn, driver_id)?
            .ok_or_else(|| AppError::NotFound(RideBlock::NoActiveShift.message().into()))?;
        let ride = queries::find_active_ride(self.conn, shift.id)?
            .ok_or_else(|| AppError::NotFound("No active ride".into()))?;

        Ok(RideStatus {
            ride_id: ride.id,
            shift_id: shift.id,
            start_latitude: ride.start_latitude,
            start_longitude: ride.start_longitude,
            destination_latitude: ride.destination_latitude,
            destination_longitude: ride.destination_longitude,
            address: ride.address,
            start_time: ride.start_time,
            elapsed_time_ms: (self.clock.now_ms() - ride.start_time).max(0),
        })
    }

    pub fn edit(&self, driver_id: &str, ride_id: i64, edit: &RideEdit) -> AppResult<Ride> {
        if edit.is_empty() {
            return Err(AppError::Validation("Nothing to edit".into()));
        }

        let tx = self.begin()?;
        let mut ride = owned_ride(&tx, driver_id, ride_id)?;
        if ride.is_active() {
            return Err(AppError::ActiveRideConflict(format!(
                "Ride {ride_id} is still in progress"
            )));
        }

        if let Some(lat) = edit.destination_latitude {
            validate_latitude(lat)?;
            ride.destination_latitude = lat;
        }
        if let Some(lng) = edit.destination_longitude {
            validate_longitude(lng)?;
            ride.destination_longitude = lng;
        }
        if let Some(address) = &edit.address {
            ride.address = address.clone();
        }
        if let Some(cents) = edit.earning_cents {
            if cents <= 0 {
                return Err(AppError::Validation(format!("Earning must be positive: {cents}")));
            }
            ride.earning_cents = Some(cents);
        }
        if let Some(km) = edit.distance_km {
            if !km.is_finite() || km <= 0.0 {
                return Err(AppError::Validation(format!("Distance must be positive: {km}")));
            }
            ride.distance_km = Some(km);
        }
        if let Some(end) = edit.end_time {
            ride.end_time = Some(end);
        }

        let end = ride.last_activity();
        if end <= ride.start_time {
            return Err(AppError::TemporalConstraintViolation(format!(
                "Ride {ride_id} must end after it starts ({})",
                ride.start_time
            )));
        }
        if edit.end_time.is_some() || edit.earning_cents.is_some() {
            ride.earning_per_min = Some(earning_per_minute(
                ride.earning_cents.unwrap_or(0),
                end - ride.start_time,
            ));
        }

        queries::update_ride(&tx, &ride)?;
        refresh_ended_shift(&tx, ride.shift_id)?;
        ttlog(&tx, "ride_edit", driver_id, &format!("Ride {ride_id} edited"))?;
        tx.commit()?;

        Ok(ride)
    }

    pub fn delete(&self, driver_id: &str, ride_id: i64) -> AppResult<()> {
        let tx = self.begin()?;
        let ride = owned_ride(&tx, driver_id, ride_id)?;
        if ride.is_active() {
            return Err(AppError::ActiveRideConflict(format!(
                "Ride {ride_id} is still in progress"
            )));
        }

        queries::set_ride_deleted(&tx, ride_id, Some(self.clock.now_ms()))?;
        refresh_ended_shift(&tx, ride.shift_id)?;
        ttlog(&tx, "ride_delete", driver_id, &format!("Ride {ride_id} deleted"))?;
        tx.commit()?;

        Ok(())
    }

    pub fn restore(&self, driver_id: &str, ride_id: i64) -> AppResult<Ride> {
        let tx = self.begin()?;
        let mut ride = queries::find_ride(&tx, ride_id, true)?
            .ok_or_else(|| AppError::NotFound(format!("Ride {ride_id}")))?;
        ensure_owner(&ride, driver_id)?;
        if !ride.is_deleted() {
            return Err(AppError::Validation(format!("Ride {ride_id} is not deleted")));
        }

        queries::set_ride_deleted(&tx, ride_id, None)?;
        refresh_ended_shift(&tx, ride.shift_id)?;
        ttlog(&tx, "ride_restore", driver_id, &format!("Ride {ride_id} restored"))?;
        tx.commit()?;

        ride.deleted_at = None;
        Ok(ride)
    }

    pub fn has_active_ride(&self, driver_id: &str) -> AppResult<bool> {
        let Some(shift) = queries::find_active_shift(self.conn, driver_id)? else {
            return Ok(false);
        };
        Ok(queries::find_active_ride(self.conn, shift.id)?.is_some())
    }

    pub fn rides_for_driver(&self, driver_id: &str) -> AppResult<Vec<Ride>> {
        queries::rides_for_driver(self.conn, driver_id)
    }
}

/// Shift state checks shared by `can_start` and `start`.
fn eligibility(conn: &Connection, driver_id: &str) -> AppResult<RideEligibility> {
    let Some(shift) = queries::find_active_shift(conn, driver_id)? else {
        return Ok(RideEligibility::blocked(RideBlock::NoActiveShift));
    };

    if queries::last_signal(conn, shift.id)?.is_some_and(|s| s.signal.is_pause()) {
        return Ok(RideEligibility::blocked(RideBlock::ShiftPaused));
    }
    if queries::find_active_ride(conn, shift.id)?.is_some() {
        return Ok(RideEligibility::blocked(RideBlock::RideInProgress));
    }

    Ok(RideEligibility::allowed())
}

fn ensure_owner(ride: &Ride, driver_id: &str) -> AppResult<()> {
    if ride.driver_id != driver_id {
        return Err(AppError::NotAuthorized(format!(
            "Ride {} does not belong to driver {driver_id}",
            ride.id
        )));
    }
    Ok(())
}

fn owned_ride(conn: &Connection, driver_id: &str, ride_id: i64) -> AppResult<Ride> {
    let ride = queries::find_ride(conn, ride_id, false)?
        .ok_or_else(|| AppError::NotFound(format!("Ride {ride_id}")))?;
    ensure_owner(&ride, driver_id)?;
    Ok(ride)
}

/// Keep the ride aggregates of an ended shift in step with its rides.
/// Active shifts are left alone until they stop.
pub(crate) fn refresh_ended_shift(conn: &Connection, shift_id: i64) -> AppResult<()> {
    if let Some(shift) = queries::find_shift(conn, shift_id, true)?
        && !shift.is_active()
    {
        recompute_and_store(conn, shift_id, RecomputeMode::OnlyRideData)?;
    }
    Ok(())
}
