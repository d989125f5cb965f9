//! Unified application error type.
//! All modules (db, core, cli, utils) return AppError so that every
//! operation ends in either a payload or exactly one typed error.

use crate::models::signal_type::SignalType;
use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    // ---------------------------
    // IO
    // ---------------------------
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    // ---------------------------
    // Database-related
    // ---------------------------
    #[error("Database error: {0}")]
    Db(#[from] rusqlite::Error),

    #[error("Database migration error: {0}")]
    Migration(String),

    // ---------------------------
    // Parsing errors
    // ---------------------------
    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("Invalid duration: {0}")]
    InvalidDuration(String),

    #[error("Invalid signal type: {0}")]
    InvalidSignalType(String),

    // ---------------------------
    // Lifecycle errors
    // ---------------------------
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Not authorized: {0}")]
    NotAuthorized(String),

    #[error("Invalid signal transition: {0}")]
    InvalidTransition(SignalType),

    #[error("Active ride conflict: {0}")]
    ActiveRideConflict(String),

    #[error("Active shift conflict: {0}")]
    ActiveShiftConflict(String),

    #[error("Already ended: {0}")]
    AlreadyEnded(String),

    #[error("Inconsistent signal sequence: {0}")]
    InconsistentSignalSequence(String),

    #[error("Temporal constraint violation: {0}")]
    TemporalConstraintViolation(String),

    #[error("Validation error: {0}")]
    Validation(String),

    // ---------------------------
    // Config errors
    // ---------------------------
    #[error("Configuration error: {0}")]
    Config(String),

    // ---------------------------
    // Generic fallback
    // ---------------------------
    #[error("Internal error: {0}")]
    Other(String),
}

impl AppError {
    /// Stable name of the error kind, independent of the message text.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Io(_) => "Io",
            AppError::Db(_) => "Database",
            AppError::Migration(_) => "Migration",
            AppError::InvalidTimestamp(_) => "InvalidTimestamp",
            AppError::InvalidDuration(_) => "InvalidDuration",
            AppError::InvalidSignalType(_) => "InvalidSignalType",
            AppError::NotFound(_) => "NotFound",
            AppError::NotAuthorized(_) => "NotAuthorized",
            AppError::InvalidTransition(_) => "InvalidTransition",
            AppError::ActiveRideConflict(_) => "ActiveRideConflict",
            AppError::ActiveShiftConflict(_) => "ActiveShiftConflict",
            AppError::AlreadyEnded(_) => "AlreadyEnded",
            AppError::InconsistentSignalSequence(_) => "InconsistentSignalSequence",
            AppError::TemporalConstraintViolation(_) => "TemporalConstraintViolation",
            AppError::Validation(_) => "ValidationError",
            AppError::Config(_) => "Config",
            AppError::Other(_) => "Other",
        }
    }

    /// True for the two constraint-backed race outcomes.
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            AppError::ActiveRideConflict(_) | AppError::ActiveShiftConflict(_)
        )
    }
}

pub type AppResult<T> = Result<T, AppError>;
