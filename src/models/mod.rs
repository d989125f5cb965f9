pub mod pause;
pub mod ride;
pub mod shift;
pub mod signal;
pub mod signal_type;
