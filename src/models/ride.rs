use crate::errors::{AppError, AppResult};
use serde::Serialize;

pub const LATITUDE_RANGE: (f64, f64) = (-90.0, 90.0);
pub const LONGITUDE_RANGE: (f64, f64) = (-180.0, 180.0);
pub const SCORE_RANGE: (i64, i64) = (1, 5);

/// Start and destination of a ride.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Coordinates {
    pub start_lat: f64,
    pub start_lng: f64,
    pub dest_lat: f64,
    pub dest_lng: f64,
}

impl Coordinates {
    pub fn new(start_lat: f64, start_lng: f64, dest_lat: f64, dest_lng: f64) -> Self {
        Self {
            start_lat,
            start_lng,
            dest_lat,
            dest_lng,
        }
    }

    pub fn validate(&self) -> AppResult<()> {
        validate_latitude(self.start_lat)?;
        validate_longitude(self.start_lng)?;
        validate_latitude(self.dest_lat)?;
        validate_longitude(self.dest_lng)?;
        Ok(())
    }
}

pub fn validate_latitude(lat: f64) -> AppResult<()> {
    if !(LATITUDE_RANGE.0..=LATITUDE_RANGE.1).contains(&lat) {
        return Err(AppError::Validation(format!("Invalid latitude provided: {lat}")));
    }
    Ok(())
}

pub fn validate_longitude(lng: f64) -> AppResult<()> {
    if !(LONGITUDE_RANGE.0..=LONGITUDE_RANGE.1).contains(&lng) {
        return Err(AppError::Validation(format!("Invalid longitude provided: {lng}")));
    }
    Ok(())
}

/// One passenger trip within a shift. `end_time = None` means in progress.
#[derive(Debug, Clone, Serialize)]
pub struct Ride {
    pub id: i64,
    pub shift_id: i64,
    pub driver_id: String,
    pub start_latitude: f64,
    pub start_longitude: f64,
    pub destination_latitude: f64,
    pub destination_longitude: f64,
    pub address: String,
    pub start_time: i64,
    pub end_time: Option<i64>,
    pub predicted_score: i64,
    pub earning_cents: Option<i64>,
    pub earning_per_min: Option<i64>,
    pub distance_km: Option<f64>,
    pub deleted_at: Option<i64>,
}

impl Ride {
    pub fn new(
        shift_id: i64,
        driver_id: &str,
        coords: Coordinates,
        address: &str,
        start_time: i64,
        predicted_score: i64,
    ) -> Self {
        Self {
            id: 0,
            shift_id,
            driver_id: driver_id.to_string(),
            start_latitude: coords.start_lat,
            start_longitude: coords.start_lng,
            destination_latitude: coords.dest_lat,
            destination_longitude: coords.dest_lng,
            address: address.to_string(),
            start_time,
            end_time: None,
            predicted_score,
            earning_cents: None,
            earning_per_min: None,
            distance_km: None,
            deleted_at: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.end_time.is_none()
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Counts towards shift earnings: not deleted and actually paid.
    pub fn is_billable(&self) -> bool {
        !self.is_deleted() && self.earning_cents.unwrap_or(0) > 0
    }

    /// End of the ride, or its start if it never ended.
    pub fn last_activity(&self) -> i64 {
        self.end_time.unwrap_or(self.start_time)
    }
}

/// round(fare / elapsed minutes). Callers guarantee `elapsed_ms > 0`.
pub fn earning_per_minute(fare_cents: i64, elapsed_ms: i64) -> i64 {
    let minutes = elapsed_ms as f64 / 60_000.0;
    (fare_cents as f64 / minutes).round() as i64
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct StartedRide {
    pub ride_id: i64,
    pub start_time: i64,
    pub predicted_score: i64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RideMetrics {
    pub ride_id: i64,
    pub total_time_ms: i64,
    pub distance_km: f64,
    pub earning_cents: i64,
    pub earning_per_min: i64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RideStatus {
    pub ride_id: i64,
    pub shift_id: i64,
    pub start_latitude: f64,
    pub start_longitude: f64,
    pub destination_latitude: f64,
    pub destination_longitude: f64,
    pub address: String,
    pub start_time: i64,
    pub elapsed_time_ms: i64,
}

/// Why a ride cannot start right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RideBlock {
    NoActiveShift,
    ShiftPaused,
    RideInProgress,
}

impl RideBlock {
    pub fn message(&self) -> &'static str {
        match self {
            RideBlock::NoActiveShift => {
                "No active shift found. Please start a shift before starting a ride."
            }
            RideBlock::ShiftPaused => {
                "Cannot start ride while on break. Please continue your shift first."
            }
            RideBlock::RideInProgress => {
                "Another ride is already in progress. Please end the current ride first."
            }
        }
    }

    pub fn into_error(self) -> AppError {
        match self {
            RideBlock::NoActiveShift => AppError::NotFound(self.message().into()),
            RideBlock::ShiftPaused => AppError::Validation(self.message().into()),
            RideBlock::RideInProgress => AppError::ActiveRideConflict(self.message().into()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RideEligibility {
    pub allowed: bool,
    pub reason: Option<RideBlock>,
}

impl RideEligibility {
    pub fn allowed() -> Self {
        Self {
            allowed: true,
            reason: None,
        }
    }

    pub fn blocked(reason: RideBlock) -> Self {
        Self {
            allowed: false,
            reason: Some(reason),
        }
    }
}

/// Fields a driver may change on an ended ride.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RideEdit {
    pub destination_latitude: Option<f64>,
    pub destination_longitude: Option<f64>,
    pub address: Option<String>,
    pub end_time: Option<i64>,
    pub earning_cents: Option<i64>,
    pub distance_km: Option<f64>,
}

/// Fields that identify a ride or record its origin, fixed once started.
pub const FORBIDDEN_EDIT_FIELDS: [&str; 8] = [
    "id",
    "shift_id",
    "driver_id",
    "start_latitude",
    "start_longitude",
    "start_time",
    "predicted_score",
    "earning_per_min",
];

impl RideEdit {
    pub fn is_empty(&self) -> bool {
        *self == RideEdit::default()
    }

    /// Build an edit from `field=value` assignments.
    pub fn from_assignments<S: AsRef<str>>(assignments: &[S]) -> AppResult<Self> {
        let mut edit = RideEdit::default();

        for raw in assignments {
            let raw = raw.as_ref();
            let (field, value) = raw.split_once('=').ok_or_else(|| {
                AppError::Validation(format!("Expected FIELD=VALUE, got '{raw}'"))
            })?;
            let field = field.trim();
            let value = value.trim();

            if FORBIDDEN_EDIT_FIELDS.contains(&field) {
                return Err(AppError::Validation(format!(
                    "Field '{field}' cannot be edited"
                )));
            }

            match field {
                "destination_latitude" => {
                    edit.destination_latitude = Some(parse_f64(field, value)?)
                }
                "destination_longitude" => {
                    edit.destination_longitude = Some(parse_f64(field, value)?)
                }
                "address" => edit.address = Some(value.to_string()),
                "end_time" => {
                    edit.end_time = Some(crate::utils::time::parse_timestamp(value)?);
                }
                "earning_cents" => {
                    edit.earning_cents = Some(value.parse::<i64>().map_err(|_| {
                        AppError::Validation(format!("Invalid value for {field}: '{value}'"))
                    })?)
                }
                "distance_km" => edit.distance_km = Some(parse_f64(field, value)?),
                other => {
                    return Err(AppError::Validation(format!("Unknown ride field '{other}'")));
                }
            }
        }

        Ok(edit)
    }
}

fn parse_f64(field: &str, value: &str) -> AppResult<f64> {
    value
        .parse::<f64>()
        .map_err(|_| AppError::Validation(format!("Invalid value for {field}: '{value}'")))
}
