use super::signal_type::SignalType;
use serde::Serialize;

/// Immutable timestamped event belonging to a shift.
#[derive(Debug, Clone, Serialize)]
pub struct ShiftSignal {
    pub id: i64,
    pub shift_id: i64,       // ⇔ shift_signals.shift_id
    pub signal: SignalType,  // ⇔ shift_signals.signal ('start' | 'pause' | 'continue' | 'stop')
    pub timestamp: i64,      // ⇔ shift_signals.timestamp (epoch ms)
    pub planned_pause_duration_ms: Option<i64>, // only meaningful for 'pause'
}

impl ShiftSignal {
    /// Builds a signal that has not been persisted yet (`id = 0`).
    /// The planned pause duration is dropped for anything but `pause`.
    pub fn new(
        shift_id: i64,
        signal: SignalType,
        timestamp: i64,
        planned_pause_duration_ms: Option<i64>,
    ) -> Self {
        Self {
            id: 0,
            shift_id,
            signal,
            timestamp,
            planned_pause_duration_ms: if signal.is_pause() {
                planned_pause_duration_ms
            } else {
                None
            },
        }
    }
}
