//! Lifecycle wiring between the host application and the timer manager.
//!
//! The host reports route changes, visibility changes, exit, and ticks;
//! the session translates them into timer transitions for one owner.

use std::sync::Arc;

use anyhow::Context;
use chrono::{DateTime, Utc};
use tokio::runtime::Handle;
use tokio::sync::{watch, Mutex};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::api::{ApiClient, ClientError, HttpSink, RetryReport};
use crate::config::{ClientConfig, TimerConfig};
use crate::db::date_utils::{activity_day, retention_cutoff};
use crate::db::{DbError, DedupRepository, SqliteRepository, TimerKey};
use crate::state::SharedRepository;
use crate::timer::{FlushOutcome, RecoveryReport, TimerManager};
use progress_core::route::classify_route;
use progress_core::types::DailyProgress;

/// Summary of [`ProgressSession::initialize`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InitReport {
    pub purged_dedup_entries: usize,
    pub recovery: RecoveryReport,
    pub retry: Option<RetryReport>,
}

struct CurrentRoute {
    pathname: String,
    key: Option<TimerKey>,
}

/// Progress tracking for one signed-in owner.
pub struct ProgressSession {
    owner_id: Uuid,
    repository: SharedRepository,
    api: ApiClient,
    sink: HttpSink,
    timers: TimerManager,
    route: Option<CurrentRoute>,
    visible: bool,
}

impl ProgressSession {
    pub fn new(
        owner_id: Uuid,
        repository: SharedRepository,
        api: ApiClient,
        config: TimerConfig,
        runtime: Handle,
    ) -> Self {
        let sink = HttpSink::new(
            api.clone(),
            repository.clone(),
            runtime,
            config.max_pending_flushes,
        );
        let timers = TimerManager::new(repository.clone(), Arc::new(sink.clone()), config);
        Self {
            owner_id,
            repository,
            api,
            sink,
            timers,
            route: None,
            visible: true,
        }
    }

    /// Open the local database and API client described by `config`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn open(config: &ClientConfig, owner_id: Uuid) -> anyhow::Result<Self> {
        let repository = SqliteRepository::open(&config.db_path)
            .with_context(|| format!("opening {}", config.db_path.display()))?;
        let api = ApiClient::new(
            &config.backend_url,
            config.token.clone(),
            config.timers.flush_timeout,
        )?;
        let runtime = Handle::try_current().context("no tokio runtime")?;

        Ok(Self::new(
            owner_id,
            SharedRepository::new(repository),
            api,
            config.timers.clone(),
            runtime,
        ))
    }

    pub fn owner_id(&self) -> Uuid {
        self.owner_id
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub fn timers(&self) -> &TimerManager {
        &self.timers
    }

    /// Purge old dedup entries, recover persisted timers, retry queued flushes.
    pub async fn initialize(&mut self, now: DateTime<Utc>) -> Result<InitReport, ClientError> {
        let config = self.timers.config();
        let cutoff = retention_cutoff(activity_day(now), config.dedup_retention_days);
        let purged_dedup_entries = self
            .repository
            .with(|repo| repo.purge_dedup_before(cutoff))?;

        let recovery = self.timers.recover(self.owner_id, now)?;

        let retry = match self.sink.retry_pending(self.owner_id, now).await {
            Ok(report) => Some(report),
            Err(e) => {
                warn!(error = %e, "retrying pending flushes failed");
                None
            }
        };

        info!(
            owner_id = %self.owner_id,
            purged = purged_dedup_entries,
            resumed = recovery.resumed.len(),
            discarded = recovery.discarded.len(),
            "progress session initialized"
        );

        Ok(InitReport {
            purged_dedup_entries,
            recovery,
            retry,
        })
    }

    /// Route change. Stops timers for anything but the new route's key.
    pub fn navigate(
        &mut self,
        pathname: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<(TimerKey, FlushOutcome)>, DbError> {
        let key = classify_route(pathname)
            .map(|m| TimerKey::new(self.owner_id, m.activity_type, m.content_id));

        let stale: Vec<TimerKey> = self
            .timers
            .active_keys()
            .filter(|active| Some(*active) != key.as_ref())
            .cloned()
            .collect();
        let mut outcomes = Vec::with_capacity(stale.len());
        for old in stale {
            let outcome = self.timers.stop(&old, now)?;
            outcomes.push((old, outcome));
        }

        if let Some(key) = &key {
            if self.visible && !self.timers.is_running(key) {
                self.timers.start(key.clone(), pathname, now)?;
            }
        }
        debug!(pathname, tracked = key.is_some(), "navigated");

        self.route = Some(CurrentRoute {
            pathname: pathname.to_string(),
            key,
        });
        Ok(outcomes)
    }

    /// Visibility change. Hiding stops all timers; showing restarts the
    /// current route's timer.
    pub fn set_visible(
        &mut self,
        visible: bool,
        now: DateTime<Utc>,
    ) -> Result<Vec<(TimerKey, FlushOutcome)>, DbError> {
        if visible == self.visible {
            return Ok(Vec::new());
        }
        self.visible = visible;

        if !visible {
            return self.timers.stop_all(now);
        }

        if let Some(CurrentRoute {
            pathname,
            key: Some(key),
        }) = &self.route
        {
            self.timers.start(key.clone(), pathname.as_str(), now)?;
        }
        Ok(Vec::new())
    }

    /// Page exit: final flush for every running timer.
    ///
    /// Each flush is queued locally before this returns, so it survives a
    /// shutdown that interrupts delivery.
    pub fn exit(&mut self, now: DateTime<Utc>) -> Result<Vec<(TimerKey, FlushOutcome)>, DbError> {
        self.route = None;
        self.timers.stop_all(now)
    }

    pub fn tick(&mut self, now: DateTime<Utc>) -> Result<Vec<(TimerKey, FlushOutcome)>, DbError> {
        self.timers.flush_if_due(now)
    }

    /// Running seconds for the current route, if it is tracked.
    pub fn current_elapsed(&self, now: DateTime<Utc>) -> Option<u32> {
        let key = self.route.as_ref()?.key.as_ref()?;
        self.timers.elapsed(key, now)
    }

    /// Trigger aggregation for today and record credited types locally.
    ///
    /// Returns `None` when another aggregation for this owner is running.
    pub async fn sync_progress(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Option<DailyProgress>, ClientError> {
        let response = self.api.process_activities(Some(activity_day(now))).await?;
        if response.already_running {
            info!(owner_id = %self.owner_id, "aggregation already running");
            return Ok(None);
        }
        let Some(data) = response.data else {
            return Ok(None);
        };

        let progress = data.progress;
        let owner_id = self.owner_id;
        self.repository.with(|repo| {
            for activity_type in progress.achieved() {
                repo.mark_processed(owner_id, activity_type, progress.day, now)?;
            }
            Ok(())
        })?;

        if !data.newly_achieved.is_empty() {
            info!(
                owner_id = %owner_id,
                newly_achieved = ?data.newly_achieved,
                percent = progress.progress_percent,
                "daily goals reached"
            );
        }
        Ok(Some(progress))
    }
}

/// Drive `tick` on the configured interval until `shutdown` flips to true.
pub async fn run_ticker(session: Arc<Mutex<ProgressSession>>, mut shutdown: watch::Receiver<bool>) {
    let period = session.lock().await.timers().config().tick_interval;
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                if let Err(e) = session.lock().await.tick(Utc::now()) {
                    warn!(error = %e, "timer tick failed");
                }
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }
    debug!("ticker stopped");
}
