//! Database error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("invalid data: {0}")]
    InvalidData(String),

    #[error("repository lock poisoned")]
    LockPoisoned,
}

impl From<progress_core::CoreError> for DbError {
    fn from(err: progress_core::CoreError) -> Self {
        DbError::InvalidData(err.to_string())
    }
}
