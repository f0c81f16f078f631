//! Client configuration.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use uuid::Uuid;

/// Timer and flush tuning knobs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimerConfig {
    /// Accumulated seconds at which a running timer flushes during ticks.
    pub periodic_flush_floor: u32,
    /// Minimum seconds for the final flush on stop.
    pub exit_flush_floor: u32,
    pub tick_interval: Duration,
    /// Persisted timers older than this are discarded on recovery.
    pub staleness_window: chrono::Duration,
    pub dedup_retention_days: u32,
    pub flush_timeout: Duration,
    pub max_pending_flushes: usize,
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            periodic_flush_floor: 10,
            exit_flush_floor: 5,
            tick_interval: Duration::from_secs(10),
            staleness_window: chrono::Duration::minutes(5),
            dedup_retention_days: 30,
            flush_timeout: Duration::from_secs(5),
            max_pending_flushes: 500,
        }
    }
}

/// Connection settings for the progress backend.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub backend_url: String,
    /// Credentials from a previous registration; both or neither.
    pub owner_id: Option<Uuid>,
    pub token: Option<String>,
    pub db_path: PathBuf,
    pub timers: TimerConfig,
}

impl ClientConfig {
    /// Load configuration from environment variables (after `.env`).
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let backend_url = std::env::var("PROGRESS_BACKEND_URL")
            .context("PROGRESS_BACKEND_URL must be set")?;
        let owner_id = std::env::var("PROGRESS_OWNER_ID")
            .ok()
            .map(|id| Uuid::parse_str(&id))
            .transpose()
            .context("PROGRESS_OWNER_ID must be a UUID")?;
        let token = std::env::var("PROGRESS_TOKEN").ok().filter(|t| !t.is_empty());
        let db_path = match std::env::var("PROGRESS_DB_PATH") {
            Ok(path) => PathBuf::from(path),
            Err(_) => default_db_path()?,
        };

        Ok(Self {
            backend_url: backend_url.trim_end_matches('/').to_string(),
            owner_id,
            token,
            db_path,
            timers: TimerConfig::default(),
        })
    }
}

/// `<data_local_dir>/lingo-progress/client.db`
pub fn default_db_path() -> anyhow::Result<PathBuf> {
    let dir = dirs::data_local_dir()
        .context("no local data directory on this platform")?
        .join("lingo-progress");
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("creating {}", dir.display()))?;
    Ok(dir.join("client.db"))
}
