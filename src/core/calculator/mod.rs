pub mod period;
pub mod statistics;
