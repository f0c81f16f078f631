//! Shared client state.

use crate::db::{DbError, SqliteRepository};
use std::sync::{Arc, Mutex};

/// Local database shared by the timer manager and the flusher.
#[derive(Clone)]
pub struct SharedRepository {
    inner: Arc<Mutex<SqliteRepository>>,
}

impl SharedRepository {
    pub fn new(repository: SqliteRepository) -> Self {
        Self {
            inner: Arc::new(Mutex::new(repository)),
        }
    }

    /// Run `f` with the repository locked.
    pub fn with<T>(
        &self,
        f: impl FnOnce(&SqliteRepository) -> Result<T, DbError>,
    ) -> Result<T, DbError> {
        let repo = self.inner.lock().map_err(|_| DbError::LockPoisoned)?;
        f(&repo)
    }
}
