//! Daily aggregation of activity events into progress records.

use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use progress_core::{aggregate_events, ActivityThresholds};
use uuid::Uuid;

use crate::db::Database;
use crate::error::Result;
use crate::models::{ActivityEvent, ActivityType, DailyProgress};
use crate::services::owner_lock::OwnerLocks;

/// Storage the aggregator reads from and commits to.
pub trait AggregationStore: Send + Sync {
    fn unconsumed_events(
        &self,
        owner_id: Uuid,
        day: NaiveDate,
    ) -> impl Future<Output = Result<Vec<ActivityEvent>>> + Send;

    fn daily_progress(
        &self,
        owner_id: Uuid,
        day: NaiveDate,
    ) -> impl Future<Output = Result<Option<DailyProgress>>> + Send;

    /// Persist the merged record and consumed flags together. `None` means
    /// the events were consumed elsewhere and nothing was written.
    fn commit(
        &self,
        progress: &DailyProgress,
        consumed_event_ids: &[Uuid],
        now: DateTime<Utc>,
    ) -> impl Future<Output = Result<Option<DailyProgress>>> + Send;
}

impl AggregationStore for Database {
    async fn unconsumed_events(&self, owner_id: Uuid, day: NaiveDate) -> Result<Vec<ActivityEvent>> {
        let rows = self.get_unconsumed_events(owner_id, day).await?;
        let events = rows
            .iter()
            .filter_map(|row| match row.to_core() {
                Ok(event) => Some(event),
                Err(e) => {
                    tracing::warn!(event_id = %row.id, error = %e, "skipping malformed activity event");
                    None
                }
            })
            .collect();
        Ok(events)
    }

    async fn daily_progress(&self, owner_id: Uuid, day: NaiveDate) -> Result<Option<DailyProgress>> {
        Ok(self
            .get_daily_progress(owner_id, day)
            .await?
            .map(|row| row.to_core()))
    }

    async fn commit(
        &self,
        progress: &DailyProgress,
        consumed_event_ids: &[Uuid],
        now: DateTime<Utc>,
    ) -> Result<Option<DailyProgress>> {
        Ok(self
            .commit_aggregation(progress, consumed_event_ids, now)
            .await?
            .map(|row| row.to_core()))
    }
}

/// Outcome of a finished run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregationReport {
    pub updated: bool,
    pub progress: DailyProgress,
    pub newly_achieved: Vec<ActivityType>,
}

/// Result of asking for a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AggregationRun {
    /// Another run for the same owner holds the guard; nothing was touched.
    AlreadyRunning,
    Completed(AggregationReport),
}

/// Idempotent, owner-scoped aggregation service.
pub struct Aggregator<S = Database> {
    store: Arc<S>,
    locks: OwnerLocks,
    thresholds: ActivityThresholds,
}

impl<S: AggregationStore> Aggregator<S> {
    pub fn new(store: Arc<S>, thresholds: ActivityThresholds) -> Self {
        Self {
            store,
            locks: OwnerLocks::new(),
            thresholds,
        }
    }

    pub fn locks(&self) -> &OwnerLocks {
        &self.locks
    }

    /// Fold the owner's unconsumed events for `day` into their progress record.
    pub async fn aggregate(&self, owner_id: Uuid, day: NaiveDate) -> Result<AggregationRun> {
        self.aggregate_at(owner_id, day, Utc::now()).await
    }

    pub async fn aggregate_at(
        &self,
        owner_id: Uuid,
        day: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<AggregationRun> {
        let Some(_guard) = self.locks.try_acquire(owner_id) else {
            tracing::info!(%owner_id, %day, "aggregation already running");
            return Ok(AggregationRun::AlreadyRunning);
        };

        let events = self.store.unconsumed_events(owner_id, day).await?;
        let current = self
            .store
            .daily_progress(owner_id, day)
            .await?
            .unwrap_or_else(|| DailyProgress::empty(owner_id, day));

        if events.is_empty() {
            return Ok(AggregationRun::Completed(AggregationReport {
                updated: false,
                progress: current,
                newly_achieved: Vec::new(),
            }));
        }

        let outcome = aggregate_events(&current, &events, &self.thresholds, now);
        if !outcome.has_changes(&current) {
            tracing::debug!(%owner_id, %day, pending = events.len(), "events below threshold, nothing to commit");
            return Ok(AggregationRun::Completed(AggregationReport {
                updated: false,
                progress: current,
                newly_achieved: Vec::new(),
            }));
        }

        let Some(merged) = self
            .store
            .commit(&outcome.progress, &outcome.consumed_event_ids, now)
            .await?
        else {
            tracing::info!(%owner_id, %day, "events consumed by a concurrent run");
            return Ok(AggregationRun::AlreadyRunning);
        };

        let newly_achieved: Vec<ActivityType> = merged
            .achieved()
            .into_iter()
            .filter(|t| !current.is_achieved(*t))
            .collect();

        tracing::info!(
            %owner_id,
            %day,
            consumed = outcome.consumed_event_ids.len(),
            percent = merged.progress_percent,
            newly_achieved = ?newly_achieved,
            "aggregation committed"
        );

        Ok(AggregationRun::Completed(AggregationReport {
            updated: true,
            progress: merged,
            newly_achieved,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;
    use tokio::sync::Mutex;

    /// In-memory store mirroring the database semantics.
    #[derive(Default)]
    struct MemoryStore {
        events: Mutex<Vec<ActivityEvent>>,
        progress: Mutex<HashMap<(Uuid, NaiveDate), DailyProgress>>,
        commits: Mutex<usize>,
    }

    impl AggregationStore for MemoryStore {
        async fn unconsumed_events(&self, owner_id: Uuid, day: NaiveDate) -> Result<Vec<ActivityEvent>> {
            Ok(self
                .events
                .lock()
                .await
                .iter()
                .filter(|e| e.owner_id == owner_id && !e.consumed && e.created_at.date_naive() == day)
                .cloned()
                .collect())
        }

        async fn daily_progress(&self, owner_id: Uuid, day: NaiveDate) -> Result<Option<DailyProgress>> {
            Ok(self.progress.lock().await.get(&(owner_id, day)).cloned())
        }

        async fn commit(
            &self,
            progress: &DailyProgress,
            consumed_event_ids: &[Uuid],
            now: DateTime<Utc>,
        ) -> Result<Option<DailyProgress>> {
            let mut events = self.events.lock().await;
            for event in events.iter_mut().filter(|e| consumed_event_ids.contains(&e.id)) {
                event.consumed = true;
                event.consumed_at = Some(now);
            }
            self.progress
                .lock()
                .await
                .insert((progress.owner_id, progress.day), progress.clone());
            *self.commits.lock().await += 1;
            Ok(Some(progress.clone()))
        }
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 1).unwrap()
    }

    fn noon() -> DateTime<Utc> {
        day().and_hms_opt(12, 0, 0).unwrap().and_utc()
    }

    fn event(owner_id: Uuid, activity_type: ActivityType, secs: u32) -> ActivityEvent {
        ActivityEvent {
            id: Uuid::new_v4(),
            owner_id,
            activity_type,
            content_id: None,
            duration_seconds: secs,
            pathname: "/videos/v1".to_string(),
            created_at: noon() - Duration::minutes(5),
            consumed: false,
            consumed_at: None,
        }
    }

    fn aggregator(events: Vec<ActivityEvent>) -> (Arc<MemoryStore>, Aggregator<MemoryStore>) {
        let store = Arc::new(MemoryStore {
            events: Mutex::new(events),
            ..Default::default()
        });
        let aggregator = Aggregator::new(Arc::clone(&store), ActivityThresholds::default());
        (store, aggregator)
    }

    fn completed(run: AggregationRun) -> AggregationReport {
        match run {
            AggregationRun::Completed(report) => report,
            AggregationRun::AlreadyRunning => panic!("expected a completed run"),
        }
    }

    #[tokio::test]
    async fn single_video_event_credits_quarter() {
        let owner = Uuid::new_v4();
        let (store, aggregator) = aggregator(vec![event(owner, ActivityType::Video, 12)]);

        let report = completed(aggregator.aggregate_at(owner, day(), noon()).await.unwrap());

        assert!(report.updated);
        assert!(report.progress.video_watched);
        assert_eq!(report.progress.progress_percent, 25);
        assert_eq!(report.newly_achieved, vec![ActivityType::Video]);
        assert!(store.events.lock().await.iter().all(|e| e.consumed));
    }

    #[tokio::test]
    async fn second_run_without_new_events_is_identical() {
        let owner = Uuid::new_v4();
        let (store, aggregator) = aggregator(vec![
            event(owner, ActivityType::Video, 4),
            event(owner, ActivityType::Video, 7),
        ]);

        let first = completed(aggregator.aggregate_at(owner, day(), noon()).await.unwrap());
        let second = completed(
            aggregator
                .aggregate_at(owner, day(), noon() + Duration::hours(1))
                .await
                .unwrap(),
        );

        assert!(first.progress.video_watched);
        assert!(!second.updated);
        assert_eq!(second.progress, first.progress);
        assert!(second.newly_achieved.is_empty());
        assert_eq!(*store.commits.lock().await, 1);
    }

    #[tokio::test]
    async fn concurrent_run_for_same_owner_is_rejected_without_side_effects() {
        let owner = Uuid::new_v4();
        let (store, aggregator) = aggregator(vec![event(owner, ActivityType::Words, 30)]);

        let guard = aggregator.locks().try_acquire(owner).unwrap();
        let run = aggregator.aggregate_at(owner, day(), noon()).await.unwrap();
        assert_eq!(run, AggregationRun::AlreadyRunning);
        assert!(store.events.lock().await.iter().all(|e| !e.consumed));
        assert_eq!(*store.commits.lock().await, 0);

        drop(guard);
        let report = completed(aggregator.aggregate_at(owner, day(), noon()).await.unwrap());
        assert!(report.progress.words_reviewed);
    }

    #[tokio::test]
    async fn other_owners_are_not_blocked() {
        let busy = Uuid::new_v4();
        let free = Uuid::new_v4();
        let (_store, aggregator) = aggregator(vec![event(free, ActivityType::Article, 15)]);

        let _guard = aggregator.locks().try_acquire(busy).unwrap();
        let report = completed(aggregator.aggregate_at(free, day(), noon()).await.unwrap());
        assert!(report.progress.article_read);
    }

    #[tokio::test]
    async fn completing_all_types_sets_completed_at_once() {
        let owner = Uuid::new_v4();
        let events = ActivityType::ALL
            .into_iter()
            .map(|t| event(owner, t, 10))
            .collect();
        let (store, aggregator) = aggregator(events);

        let report = completed(aggregator.aggregate_at(owner, day(), noon()).await.unwrap());
        assert_eq!(report.progress.progress_percent, 100);
        assert_eq!(report.progress.completed_at, Some(noon()));
        assert_eq!(report.newly_achieved.len(), 4);

        store
            .events
            .lock()
            .await
            .push(event(owner, ActivityType::Video, 40));
        let later = completed(
            aggregator
                .aggregate_at(owner, day(), noon() + Duration::hours(2))
                .await
                .unwrap(),
        );
        assert_eq!(later.progress.completed_at, Some(noon()));
        assert!(later.newly_achieved.is_empty());
    }

    #[tokio::test]
    async fn empty_day_returns_empty_snapshot() {
        let owner = Uuid::new_v4();
        let (store, aggregator) = aggregator(Vec::new());

        let report = completed(aggregator.aggregate_at(owner, day(), noon()).await.unwrap());
        assert!(!report.updated);
        assert_eq!(report.progress, DailyProgress::empty(owner, day()));
        assert!(store.progress.lock().await.is_empty());
    }
}
