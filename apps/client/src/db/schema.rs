//! SQLite schema definitions.

/// Current schema version for migrations.
pub const SCHEMA_VERSION: i32 = 1;

/// Complete schema for the local progress database.
pub const SCHEMA: &str = r#"
-- Running activity timers, one row per timer key
CREATE TABLE IF NOT EXISTS timer_state (
    owner_id TEXT NOT NULL,
    activity_type TEXT NOT NULL,
    content_id TEXT NOT NULL DEFAULT '',
    pathname TEXT NOT NULL,
    started_at TEXT NOT NULL,
    accumulated_seconds INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (owner_id, activity_type, content_id)
);

-- Activity types already credited server-side, per day
CREATE TABLE IF NOT EXISTS dedup_status (
    owner_id TEXT NOT NULL,
    activity_type TEXT NOT NULL,
    day TEXT NOT NULL,
    processed INTEGER NOT NULL DEFAULT 0,
    last_processed_at TEXT,
    PRIMARY KEY (owner_id, activity_type, day)
);

-- Flushes that failed to reach the backend
CREATE TABLE IF NOT EXISTS pending_flushes (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    owner_id TEXT NOT NULL,
    activity_type TEXT NOT NULL,
    duration_seconds INTEGER NOT NULL,
    content_id TEXT,
    pathname TEXT NOT NULL,
    timestamp TEXT NOT NULL
);

-- Schema version
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY
);

CREATE INDEX IF NOT EXISTS idx_timer_state_owner ON timer_state(owner_id);
CREATE INDEX IF NOT EXISTS idx_dedup_status_day ON dedup_status(day);
CREATE INDEX IF NOT EXISTS idx_pending_flushes_owner ON pending_flushes(owner_id);
"#;
