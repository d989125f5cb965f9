use serde::Serialize;

/// One work session for a driver. `end_time = None` means the shift is active.
#[derive(Debug, Clone, Serialize)]
pub struct Shift {
    pub id: i64,
    pub driver_id: String,
    pub start_time: i64,
    pub end_time: Option<i64>,
    pub planned_duration_ms: Option<i64>,

    // Aggregates, all NULL until the shift ends.
    pub total_duration_ms: Option<i64>,
    pub work_time_ms: Option<i64>,
    pub break_time_ms: Option<i64>,
    pub num_breaks: Option<i64>,
    pub avg_break_ms: Option<i64>,
    pub total_earnings_cents: Option<i64>,
    pub total_distance_km: Option<f64>,
    pub number_of_rides: Option<i64>,

    pub deleted_at: Option<i64>,
}

impl Shift {
    pub fn new(driver_id: &str, start_time: i64, planned_duration_ms: Option<i64>) -> Self {
        Self {
            id: 0,
            driver_id: driver_id.to_string(),
            start_time,
            end_time: None,
            planned_duration_ms,
            total_duration_ms: None,
            work_time_ms: None,
            break_time_ms: None,
            num_breaks: None,
            avg_break_ms: None,
            total_earnings_cents: None,
            total_distance_km: None,
            number_of_rides: None,
            deleted_at: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.end_time.is_none()
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    pub fn summary(&self) -> ShiftSummary {
        ShiftSummary {
            shift_id: self.id,
            total_duration_ms: self.total_duration_ms.unwrap_or(0),
            work_time_ms: self.work_time_ms.unwrap_or(0),
            break_time_ms: self.break_time_ms.unwrap_or(0),
            num_breaks: self.num_breaks.unwrap_or(0),
            avg_break_ms: self.avg_break_ms.unwrap_or(0),
            total_earnings_cents: self.total_earnings_cents.unwrap_or(0),
            total_distance_km: self.total_distance_km.unwrap_or(0.0),
            number_of_rides: self.number_of_rides.unwrap_or(0),
        }
    }
}

/// Figures reported when a shift is closed.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ShiftSummary {
    pub shift_id: i64,
    pub total_duration_ms: i64,
    pub work_time_ms: i64,
    pub break_time_ms: i64,
    pub num_breaks: i64,
    pub avg_break_ms: i64,
    pub total_earnings_cents: i64,
    pub total_distance_km: f64,
    pub number_of_rides: i64,
}

/// Live view of the driver's active shift.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ShiftStatus {
    pub shift_id: i64,
    pub is_on_shift: bool,
    pub shift_start_time: i64,
    pub is_paused: bool,
    pub pause_start_time: Option<i64>,
    pub last_pause_end_time: Option<i64>,
    pub planned_duration_ms: Option<i64>,
    pub planned_pause_duration_ms: Option<i64>,
}

/// Requested changes to a terminated shift's window.
#[derive(Debug, Clone, Default)]
pub struct ShiftEdit {
    pub start_time: Option<i64>,
    pub end_time: Option<i64>,
}

/// Partial update produced by the statistics aggregator.
/// `None` leaves the stored column untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ShiftStatsUpdate {
    pub total_duration_ms: Option<i64>,
    pub work_time_ms: Option<i64>,
    pub break_time_ms: Option<i64>,
    pub num_breaks: Option<i64>,
    pub avg_break_ms: Option<i64>,
    pub total_earnings_cents: Option<i64>,
    pub total_distance_km: Option<f64>,
    pub number_of_rides: Option<i64>,
}

impl ShiftStatsUpdate {
    /// Copy the computed fields onto an in-memory shift.
    pub fn apply_to(&self, shift: &mut Shift) {
        if let Some(v) = self.total_duration_ms {
            shift.total_duration_ms = Some(v);
        }
        if let Some(v) = self.work_time_ms {
            shift.work_time_ms = Some(v);
        }
        if let Some(v) = self.break_time_ms {
            shift.break_time_ms = Some(v);
        }
        if let Some(v) = self.num_breaks {
            shift.num_breaks = Some(v);
        }
        if let Some(v) = self.avg_break_ms {
            shift.avg_break_ms = Some(v);
        }
        if let Some(v) = self.total_earnings_cents {
            shift.total_earnings_cents = Some(v);
        }
        if let Some(v) = self.total_distance_km {
            shift.total_distance_km = Some(v);
        }
        if let Some(v) = self.number_of_rides {
            shift.number_of_rides = Some(v);
        }
    }
}
