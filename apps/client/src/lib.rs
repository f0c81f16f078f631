//! Client side of the activity progress engine.
//!
//! Times learner activity per route, persists timer and dedup state in a
//! local SQLite file, and flushes time-on-task to the progress backend.

pub mod api;
pub mod config;
pub mod db;
pub mod session;
pub mod state;
pub mod timer;

pub use api::{ActivitySink, ApiClient, ClientError, FlushRequest, HttpSink, RetryReport};
pub use config::{ClientConfig, TimerConfig};
pub use db::{DbError, SqliteRepository, TimerKey};
pub use session::{run_ticker, InitReport, ProgressSession};
pub use state::SharedRepository;
pub use timer::{FlushOutcome, RecoveryReport, TimerManager};

use anyhow::Context;
use chrono::Utc;
use tracing::info;

/// Build a session from `config`, registering a new owner when no
/// credentials are configured, and run its startup pass.
pub async fn connect(config: &ClientConfig) -> anyhow::Result<ProgressSession> {
    let mut config = config.clone();

    let owner_id = match (config.owner_id, config.token.as_ref()) {
        (Some(owner_id), Some(_)) => owner_id,
        _ => {
            let api = ApiClient::new(&config.backend_url, None, config.timers.flush_timeout)?;
            let registration = api
                .register_owner(None)
                .await
                .context("registering with the progress backend")?;
            info!(owner_id = %registration.owner_id, "registered new owner");
            config.token = Some(registration.token);
            registration.owner_id
        }
    };

    let mut session = ProgressSession::open(&config, owner_id)?;
    session.initialize(Utc::now()).await?;
    Ok(session)
}
