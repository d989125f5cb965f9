use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SignalType {
    Start,
    Pause,
    Continue,
    Stop,
}

impl SignalType {
    pub const ALL: [SignalType; 4] = [
        SignalType::Start,
        SignalType::Pause,
        SignalType::Continue,
        SignalType::Stop,
    ];

    /// Convert enum → DB string
    pub fn to_db_str(&self) -> &'static str {
        match self {
            SignalType::Start => "start",
            SignalType::Pause => "pause",
            SignalType::Continue => "continue",
            SignalType::Stop => "stop",
        }
    }

    /// Convert DB string → enum
    pub fn from_db_str(s: &str) -> Option<Self> {
        match s {
            "start" => Some(SignalType::Start),
            "pause" => Some(SignalType::Pause),
            "continue" => Some(SignalType::Continue),
            "stop" => Some(SignalType::Stop),
            _ => None,
        }
    }

    pub fn is_pause(&self) -> bool {
        matches!(self, SignalType::Pause)
    }

    /// Signals after which the driver counts as working (not on break).
    pub fn is_working(&self) -> bool {
        matches!(self, SignalType::Start | SignalType::Continue)
    }
}

impl fmt::Display for SignalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_db_str())
    }
}
