use serde::Serialize;

/// A completed break, derived from a pause → continue signal pair.
#[derive(Debug, Clone, Serialize)]
pub struct Pause {
    pub id: i64,
    pub shift_id: i64,
    pub pause_start: i64,
    pub pause_end: i64,
    pub duration_ms: i64,
}

impl Pause {
    pub fn new(shift_id: i64, pause_start: i64, pause_end: i64) -> Self {
        Self {
            id: 0,
            shift_id,
            pause_start,
            pause_end,
            duration_ms: pause_end - pause_start,
        }
    }

    /// Whether the break lies entirely within `[start, end]`.
    /// An open window (`end = None`) only bounds the start.
    pub fn lies_within(&self, start: i64, end: Option<i64>) -> bool {
        self.pause_start >= start && end.is_none_or(|e| self.pause_end <= e)
    }
}
