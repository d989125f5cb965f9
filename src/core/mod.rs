pub mod calculator;
pub mod clock;
pub mod log;
pub mod pause_ledger;
pub mod ride;
pub mod shift;
pub mod signal_validator;
pub mod sweeper;
