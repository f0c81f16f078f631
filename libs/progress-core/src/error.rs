//! Error types for progress-core.

use thiserror::Error;

/// Result type alias using CoreError.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors raised when validating domain values.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoreError {
    #[error("unknown activity type: {0}")]
    UnknownActivityType(String),

    #[error("box number {0} is outside 1..=8")]
    InvalidBox(i32),

    #[error("duration must be positive, got {0}")]
    NonPositiveDuration(i64),
}
