//! Shift signal state machine.
//!
//! ```text
//! none     -> start
//! start    -> pause | stop
//! pause    -> continue | stop
//! continue -> pause | stop
//! stop     -> (terminal)
//! ```
//!
//! This table is the only place the legal transitions are defined.

use crate::errors::{AppError, AppResult};
use crate::models::signal_type::SignalType;

/// Candidates allowed after `last` (`None` = no signal yet).
pub fn allowed_after(last: Option<SignalType>) -> &'static [SignalType] {
    match last {
        None => &[SignalType::Start],
        Some(SignalType::Start) => &[SignalType::Pause, SignalType::Stop],
        Some(SignalType::Pause) => &[SignalType::Continue, SignalType::Stop],
        Some(SignalType::Continue) => &[SignalType::Pause, SignalType::Stop],
        Some(SignalType::Stop) => &[],
    }
}

pub fn is_valid_transition(last: Option<SignalType>, candidate: SignalType) -> bool {
    allowed_after(last).contains(&candidate)
}

/// Like [`is_valid_transition`] but reports the offending candidate.
pub fn check_transition(last: Option<SignalType>, candidate: SignalType) -> AppResult<()> {
    if is_valid_transition(last, candidate) {
        Ok(())
    } else {
        Err(AppError::InvalidTransition(candidate))
    }
}

/// Whether a whole sequence is a walk through the graph starting from none.
pub fn is_valid_sequence(signals: &[SignalType]) -> bool {
    let mut last = None;
    for &s in signals {
        if !is_valid_transition(last, s) {
            return false;
        }
        last = Some(s);
    }
    true
}
