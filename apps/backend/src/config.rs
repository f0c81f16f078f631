//! Server configuration read from the environment.

use progress_core::ActivityThresholds;

use crate::error::{ApiError, Result};

/// Runtime settings for the backend.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub max_connections: u32,
    pub thresholds: ActivityThresholds,
}

impl ServerConfig {
    /// Load from environment variables (after `.env` has been applied).
    pub fn from_env() -> Result<Self> {
        let database_url = std::env::var("DATABASE_URL")
            .map_err(|_| ApiError::Internal("DATABASE_URL must be set".to_string()))?;

        let defaults = ActivityThresholds::default();
        let thresholds = ActivityThresholds {
            video: env_or("ACTIVITY_THRESHOLD_VIDEO_SECS", defaults.video)?,
            podcast: env_or("ACTIVITY_THRESHOLD_PODCAST_SECS", defaults.podcast)?,
            words: env_or("ACTIVITY_THRESHOLD_WORDS_SECS", defaults.words)?,
            article: env_or("ACTIVITY_THRESHOLD_ARTICLE_SECS", defaults.article)?,
        };

        Ok(Self {
            database_url,
            host: std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env_or("PORT", 3000)?,
            max_connections: env_or("DB_MAX_CONNECTIONS", 10)?,
            thresholds,
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> Result<T> {
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ApiError::Internal(format!("{} has an invalid value: {}", key, raw))),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_or_falls_back_to_default() {
        let value: u32 = env_or("LINGO_PROGRESS_TEST_UNSET_KEY", 42).unwrap();
        assert_eq!(value, 42);
    }

    #[test]
    fn env_or_rejects_garbage() {
        std::env::set_var("LINGO_PROGRESS_TEST_BAD_PORT", "not-a-port");
        let result: Result<u16> = env_or("LINGO_PROGRESS_TEST_BAD_PORT", 3000);
        assert!(result.is_err());
    }

    #[test]
    fn env_or_parses_value() {
        std::env::set_var("LINGO_PROGRESS_TEST_THRESHOLD", " 30 ");
        let value: u32 = env_or("LINGO_PROGRESS_TEST_THRESHOLD", 10).unwrap();
        assert_eq!(value, 30);
    }
}
