//! Repository pattern for database access.

use crate::db::date_utils::day_string;
use crate::db::error::DbError;
use chrono::{DateTime, NaiveDate, Utc};
use progress_core::types::ActivityType;
use rusqlite::{params, Connection, OptionalExtension};
use std::fmt;
use std::path::Path;
use uuid::Uuid;

type Result<T> = std::result::Result<T, DbError>;

/// Identity of one running timer.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TimerKey {
    pub owner_id: Uuid,
    pub activity_type: ActivityType,
    pub content_id: Option<String>,
}

impl TimerKey {
    pub fn new(owner_id: Uuid, activity_type: ActivityType, content_id: Option<String>) -> Self {
        Self {
            owner_id,
            activity_type,
            content_id,
        }
    }

    fn content_column(&self) -> &str {
        self.content_id.as_deref().unwrap_or("")
    }
}

impl fmt::Display for TimerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.owner_id, self.activity_type)?;
        if let Some(content_id) = &self.content_id {
            write!(f, ":{}", content_id)?;
        }
        Ok(())
    }
}

/// Persisted state of a running timer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimerEntry {
    pub pathname: String,
    /// Last time elapsed seconds were banked into `accumulated_seconds`.
    pub started_at: DateTime<Utc>,
    pub accumulated_seconds: u32,
}

/// Dedup cache row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DedupStatus {
    pub activity_type: ActivityType,
    pub day: NaiveDate,
    pub processed: bool,
    pub last_processed_at: Option<DateTime<Utc>>,
}

/// Flush waiting for the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingFlush {
    pub id: i64,
    pub owner_id: Uuid,
    pub activity_type: ActivityType,
    pub duration_seconds: u32,
    pub content_id: Option<String>,
    pub pathname: String,
    pub timestamp: DateTime<Utc>,
}

/// Repository for running timers.
pub trait TimerRepository {
    fn save_timer(&self, key: &TimerKey, entry: &TimerEntry) -> Result<()>;
    fn delete_timer(&self, key: &TimerKey) -> Result<()>;
    fn get_timers_for_owner(&self, owner_id: Uuid) -> Result<Vec<(TimerKey, TimerEntry)>>;
}

/// Repository for the per-day dedup cache.
pub trait DedupRepository {
    fn get_dedup_status(
        &self,
        owner_id: Uuid,
        activity_type: ActivityType,
        day: NaiveDate,
    ) -> Result<Option<DedupStatus>>;
    fn is_processed(&self, owner_id: Uuid, activity_type: ActivityType, day: NaiveDate)
        -> Result<bool>;
    fn mark_processed(
        &self,
        owner_id: Uuid,
        activity_type: ActivityType,
        day: NaiveDate,
        processed_at: DateTime<Utc>,
    ) -> Result<()>;
    /// Delete entries for days before `cutoff`; returns the number removed.
    fn purge_dedup_before(&self, cutoff: NaiveDate) -> Result<usize>;
}

/// Repository for the pending-flush retry queue.
pub trait RetryQueueRepository {
    /// Append a flush, dropping the oldest entries beyond `max_len`.
    fn enqueue_flush(&self, flush: &PendingFlush, max_len: usize) -> Result<i64>;
    fn get_pending_flushes(&self, owner_id: Uuid) -> Result<Vec<PendingFlush>>;
    fn remove_flushes(&self, ids: &[i64]) -> Result<()>;
    fn count_pending_flushes(&self) -> Result<usize>;
}

/// SQLite implementation of repositories.
pub struct SqliteRepository {
    conn: Connection,
}

impl SqliteRepository {
    /// Open database at path, creating if necessary.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        let repo = Self { conn };
        repo.initialize()?;
        Ok(repo)
    }

    /// Open in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let repo = Self { conn };
        repo.initialize()?;
        Ok(repo)
    }

    fn initialize(&self) -> Result<()> {
        self.conn.execute_batch(super::schema::SCHEMA)?;
        self.conn.execute(
            "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
            params![super::schema::SCHEMA_VERSION],
        )?;
        Ok(())
    }
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| DbError::InvalidData(format!("timestamp {value}: {e}")))
}

impl TimerRepository for SqliteRepository {
    fn save_timer(&self, key: &TimerKey, entry: &TimerEntry) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO timer_state (owner_id, activity_type, content_id, pathname, started_at, accumulated_seconds)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                key.owner_id.to_string(),
                key.activity_type.as_str(),
                key.content_column(),
                entry.pathname,
                entry.started_at.to_rfc3339(),
                entry.accumulated_seconds,
            ],
        )?;
        Ok(())
    }

    fn delete_timer(&self, key: &TimerKey) -> Result<()> {
        self.conn.execute(
            "DELETE FROM timer_state WHERE owner_id = ?1 AND activity_type = ?2 AND content_id = ?3",
            params![
                key.owner_id.to_string(),
                key.activity_type.as_str(),
                key.content_column(),
            ],
        )?;
        Ok(())
    }

    fn get_timers_for_owner(&self, owner_id: Uuid) -> Result<Vec<(TimerKey, TimerEntry)>> {
        let mut stmt = self.conn.prepare(
            "SELECT activity_type, content_id, pathname, started_at, accumulated_seconds
             FROM timer_state WHERE owner_id = ?1",
        )?;

        let rows = stmt
            .query_map(params![owner_id.to_string()], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, u32>(4)?,
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut timers = Vec::with_capacity(rows.len());
        for (activity_type, content_id, pathname, started_at, accumulated_seconds) in rows {
            let key = TimerKey::new(
                owner_id,
                activity_type.parse()?,
                Some(content_id).filter(|c| !c.is_empty()),
            );
            let entry = TimerEntry {
                pathname,
                started_at: parse_timestamp(&started_at)?,
                accumulated_seconds,
            };
            timers.push((key, entry));
        }
        Ok(timers)
    }
}

impl DedupRepository for SqliteRepository {
    fn get_dedup_status(
        &self,
        owner_id: Uuid,
        activity_type: ActivityType,
        day: NaiveDate,
    ) -> Result<Option<DedupStatus>> {
        let row = self
            .conn
            .query_row(
                "SELECT processed, last_processed_at FROM dedup_status
                 WHERE owner_id = ?1 AND activity_type = ?2 AND day = ?3",
                params![owner_id.to_string(), activity_type.as_str(), day_string(day)],
                |row| Ok((row.get::<_, bool>(0)?, row.get::<_, Option<String>>(1)?)),
            )
            .optional()?;

        row.map(|(processed, last_processed_at)| {
            Ok(DedupStatus {
                activity_type,
                day,
                processed,
                last_processed_at: last_processed_at
                    .as_deref()
                    .map(parse_timestamp)
                    .transpose()?,
            })
        })
        .transpose()
    }

    fn is_processed(
        &self,
        owner_id: Uuid,
        activity_type: ActivityType,
        day: NaiveDate,
    ) -> Result<bool> {
        Ok(self
            .get_dedup_status(owner_id, activity_type, day)?
            .is_some_and(|status| status.processed))
    }

    fn mark_processed(
        &self,
        owner_id: Uuid,
        activity_type: ActivityType,
        day: NaiveDate,
        processed_at: DateTime<Utc>,
    ) -> Result<()> {
        self.conn.execute(
            "INSERT INTO dedup_status (owner_id, activity_type, day, processed, last_processed_at)
             VALUES (?1, ?2, ?3, 1, ?4)
             ON CONFLICT(owner_id, activity_type, day)
             DO UPDATE SET processed = 1, last_processed_at = excluded.last_processed_at",
            params![
                owner_id.to_string(),
                activity_type.as_str(),
                day_string(day),
                processed_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    fn purge_dedup_before(&self, cutoff: NaiveDate) -> Result<usize> {
        let removed = self.conn.execute(
            "DELETE FROM dedup_status WHERE day < ?1",
            params![day_string(cutoff)],
        )?;
        Ok(removed)
    }
}

impl RetryQueueRepository for SqliteRepository {
    fn enqueue_flush(&self, flush: &PendingFlush, max_len: usize) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO pending_flushes (owner_id, activity_type, duration_seconds, content_id, pathname, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                flush.owner_id.to_string(),
                flush.activity_type.as_str(),
                flush.duration_seconds,
                flush.content_id,
                flush.pathname,
                flush.timestamp.to_rfc3339(),
            ],
        )?;
        let id = self.conn.last_insert_rowid();

        self.conn.execute(
            "DELETE FROM pending_flushes WHERE id NOT IN
                (SELECT id FROM pending_flushes ORDER BY id DESC LIMIT ?1)",
            params![max_len as i64],
        )?;
        Ok(id)
    }

    fn get_pending_flushes(&self, owner_id: Uuid) -> Result<Vec<PendingFlush>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, activity_type, duration_seconds, content_id, pathname, timestamp
             FROM pending_flushes WHERE owner_id = ?1 ORDER BY id",
        )?;

        let rows = stmt
            .query_map(params![owner_id.to_string()], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, u32>(2)?,
                    row.get::<_, Option<String>>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, String>(5)?,
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut flushes = Vec::with_capacity(rows.len());
        for (id, activity_type, duration_seconds, content_id, pathname, timestamp) in rows {
            flushes.push(PendingFlush {
                id,
                owner_id,
                activity_type: activity_type.parse()?,
                duration_seconds,
                content_id,
                pathname,
                timestamp: parse_timestamp(&timestamp)?,
            });
        }
        Ok(flushes)
    }

    fn remove_flushes(&self, ids: &[i64]) -> Result<()> {
        for id in ids {
            self.conn
                .execute("DELETE FROM pending_flushes WHERE id = ?1", params![id])?;
        }
        Ok(())
    }

    fn count_pending_flushes(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM pending_flushes", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}
