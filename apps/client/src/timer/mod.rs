//! Per-activity timers with persisted state.
//!
//! All transitions take an explicit `now` and run on the caller's thread;
//! network delivery is handed to an [`ActivitySink`] and never awaited.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::api::{ActivitySink, FlushRequest};
use crate::config::TimerConfig;
use crate::db::date_utils::activity_day;
use crate::db::{DbError, DedupRepository, TimerEntry, TimerKey, TimerRepository};
use crate::state::SharedRepository;

type Result<T> = std::result::Result<T, DbError>;

/// What happened to a timer's accumulated time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushOutcome {
    /// Handed to the sink.
    Sent { seconds: u32 },
    /// Type already credited today; no network call.
    Suppressed { seconds: u32 },
    /// Too short for the applicable floor; dropped.
    BelowFloor { seconds: u32 },
    NotRunning,
}

/// Result of [`TimerManager::recover`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecoveryReport {
    pub resumed: Vec<TimerKey>,
    pub discarded: Vec<TimerKey>,
}

struct ActiveTimer {
    entry: TimerEntry,
    /// Seconds already flushed or suppressed, kept for the elapsed readout.
    credited_seconds: u32,
}

fn seconds_between(from: DateTime<Utc>, to: DateTime<Utc>) -> u32 {
    u32::try_from((to - from).num_seconds().max(0)).unwrap_or(u32::MAX)
}

/// Move whole seconds since `started_at` into the accumulator.
///
/// The clock advances by the banked seconds only, so the sub-second
/// remainder carries into the next bank.
fn bank(entry: &mut TimerEntry, now: DateTime<Utc>) {
    let elapsed = seconds_between(entry.started_at, now);
    entry.accumulated_seconds = entry.accumulated_seconds.saturating_add(elapsed);
    entry.started_at += Duration::seconds(i64::from(elapsed));
}

/// Timer manager.
pub struct TimerManager {
    repository: SharedRepository,
    sink: Arc<dyn ActivitySink>,
    config: TimerConfig,
    active: HashMap<TimerKey, ActiveTimer>,
}

impl TimerManager {
    pub fn new(
        repository: SharedRepository,
        sink: Arc<dyn ActivitySink>,
        config: TimerConfig,
    ) -> Self {
        Self {
            repository,
            sink,
            config,
            active: HashMap::new(),
        }
    }

    pub fn config(&self) -> &TimerConfig {
        &self.config
    }

    pub fn is_running(&self, key: &TimerKey) -> bool {
        self.active.contains_key(key)
    }

    pub fn active_keys(&self) -> impl Iterator<Item = &TimerKey> {
        self.active.keys()
    }

    /// Start timing `key`.
    ///
    /// Starting a key that is already running banks its elapsed time and
    /// restarts the clock; other keys are untouched.
    pub fn start(
        &mut self,
        key: TimerKey,
        pathname: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let pathname = pathname.into();
        let timer = match self.active.entry(key.clone()) {
            Entry::Occupied(occupied) => {
                let timer = occupied.into_mut();
                bank(&mut timer.entry, now);
                timer.entry.pathname = pathname;
                debug!(%key, accumulated = timer.entry.accumulated_seconds, "timer restarted");
                timer
            }
            Entry::Vacant(vacant) => {
                debug!(%key, "timer started");
                vacant.insert(ActiveTimer {
                    entry: TimerEntry {
                        pathname,
                        started_at: now,
                        accumulated_seconds: 0,
                    },
                    credited_seconds: 0,
                })
            }
        };

        let entry = timer.entry.clone();
        self.repository.with(|repo| repo.save_timer(&key, &entry))
    }

    /// Stop `key` and make the final flush if it clears the exit floor.
    pub fn stop(&mut self, key: &TimerKey, now: DateTime<Utc>) -> Result<FlushOutcome> {
        let Some(mut timer) = self.active.remove(key) else {
            return Ok(FlushOutcome::NotRunning);
        };
        self.repository.with(|repo| repo.delete_timer(key))?;

        bank(&mut timer.entry, now);
        let seconds = timer.entry.accumulated_seconds;
        if seconds < self.config.exit_flush_floor {
            debug!(%key, seconds, "session below exit floor, not flushed");
            return Ok(FlushOutcome::BelowFloor { seconds });
        }

        Ok(dispatch(
            &self.repository,
            self.sink.as_ref(),
            key,
            &timer.entry.pathname,
            seconds,
            now,
        ))
    }

    /// Stop every running timer.
    pub fn stop_all(&mut self, now: DateTime<Utc>) -> Result<Vec<(TimerKey, FlushOutcome)>> {
        let keys: Vec<TimerKey> = self.active.keys().cloned().collect();
        let mut outcomes = Vec::with_capacity(keys.len());
        for key in keys {
            let outcome = self.stop(&key, now)?;
            outcomes.push((key, outcome));
        }
        Ok(outcomes)
    }

    /// Periodic tick: bank elapsed time and flush keys at the periodic floor.
    ///
    /// Returns the keys that flushed.
    pub fn flush_if_due(&mut self, now: DateTime<Utc>) -> Result<Vec<(TimerKey, FlushOutcome)>> {
        let mut flushed = Vec::new();

        for (key, timer) in self.active.iter_mut() {
            bank(&mut timer.entry, now);

            let seconds = timer.entry.accumulated_seconds;
            if seconds >= self.config.periodic_flush_floor {
                let outcome = dispatch(
                    &self.repository,
                    self.sink.as_ref(),
                    key,
                    &timer.entry.pathname,
                    seconds,
                    now,
                );
                timer.credited_seconds = timer.credited_seconds.saturating_add(seconds);
                timer.entry.accumulated_seconds = 0;
                flushed.push((key.clone(), outcome));
            }

            self.repository
                .with(|repo| repo.save_timer(key, &timer.entry))?;
        }

        Ok(flushed)
    }

    /// Reload persisted timers for `owner_id`.
    ///
    /// Entries last touched longer ago than the staleness window are
    /// discarded without credit. Fresher ones keep their banked seconds and
    /// restart the clock at `now`; time spent closed is never credited.
    pub fn recover(&mut self, owner_id: Uuid, now: DateTime<Utc>) -> Result<RecoveryReport> {
        let persisted = self
            .repository
            .with(|repo| repo.get_timers_for_owner(owner_id))?;
        let mut report = RecoveryReport::default();

        for (key, entry) in persisted {
            if self.active.contains_key(&key) {
                continue;
            }

            let age = now - entry.started_at;
            if age > self.config.staleness_window {
                self.repository.with(|repo| repo.delete_timer(&key))?;
                info!(
                    %key,
                    age_seconds = age.num_seconds(),
                    accumulated = entry.accumulated_seconds,
                    "discarding stale timer"
                );
                report.discarded.push(key);
            } else {
                let entry = TimerEntry {
                    started_at: now,
                    ..entry
                };
                self.repository.with(|repo| repo.save_timer(&key, &entry))?;
                debug!(%key, accumulated = entry.accumulated_seconds, "timer resumed");
                self.active.insert(
                    key.clone(),
                    ActiveTimer {
                        entry,
                        credited_seconds: 0,
                    },
                );
                report.resumed.push(key);
            }
        }

        Ok(report)
    }

    /// Seconds shown for a running timer, including suppressed time.
    pub fn elapsed(&self, key: &TimerKey, now: DateTime<Utc>) -> Option<u32> {
        self.active.get(key).map(|timer| {
            timer
                .credited_seconds
                .saturating_add(timer.entry.accumulated_seconds)
                .saturating_add(seconds_between(timer.entry.started_at, now))
        })
    }
}

fn dispatch(
    repository: &SharedRepository,
    sink: &dyn ActivitySink,
    key: &TimerKey,
    pathname: &str,
    seconds: u32,
    now: DateTime<Utc>,
) -> FlushOutcome {
    let day = activity_day(now);
    let processed = repository
        .with(|repo| repo.is_processed(key.owner_id, key.activity_type, day))
        .unwrap_or_else(|e| {
            warn!(error = %e, %key, "dedup lookup failed, flushing anyway");
            false
        });

    if processed {
        debug!(%key, seconds, %day, "already credited today, flush suppressed");
        return FlushOutcome::Suppressed { seconds };
    }

    sink.submit(FlushRequest {
        owner_id: key.owner_id,
        activity_type: key.activity_type,
        content_id: key.content_id.clone(),
        duration_seconds: seconds,
        pathname: pathname.to_string(),
        timestamp: now,
    });
    FlushOutcome::Sent { seconds }
}
