//! Folding raw activity events into a daily progress record.
//!
//! The fold is pure: the caller loads the unconsumed events and the current
//! record, then persists the outcome (record + consumed ids) in one commit.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{ActivityEvent, ActivityType, DailyProgress};

pub const DEFAULT_THRESHOLD_SECS: u32 = 10;

/// Minimum summed seconds per type for the daily goal to count as met.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityThresholds {
    pub video: u32,
    pub podcast: u32,
    pub words: u32,
    pub article: u32,
}

impl Default for ActivityThresholds {
    fn default() -> Self {
        Self {
            video: DEFAULT_THRESHOLD_SECS,
            podcast: DEFAULT_THRESHOLD_SECS,
            words: DEFAULT_THRESHOLD_SECS,
            article: DEFAULT_THRESHOLD_SECS,
        }
    }
}

impl ActivityThresholds {
    pub fn get(&self, activity_type: ActivityType) -> u32 {
        match activity_type {
            ActivityType::Video => self.video,
            ActivityType::Podcast => self.podcast,
            ActivityType::Words => self.words,
            ActivityType::Article => self.article,
        }
    }
}

/// Result of one fold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregationOutcome {
    /// Merged record; never has fewer flags than the input record.
    pub progress: DailyProgress,
    /// Types that turned true in this fold.
    pub newly_achieved: Vec<ActivityType>,
    /// Events to mark consumed together with the record write.
    pub consumed_event_ids: Vec<Uuid>,
    /// Summed seconds per type over this batch.
    pub totals: BTreeMap<ActivityType, u64>,
}

impl AggregationOutcome {
    /// Whether anything needs to be written.
    pub fn has_changes(&self, current: &DailyProgress) -> bool {
        self.progress != *current || !self.consumed_event_ids.is_empty()
    }
}

#[derive(Default)]
struct TypeBatch<'a> {
    total: u64,
    latest: Option<&'a ActivityEvent>,
    ids: Vec<Uuid>,
}

/// Fold unconsumed events into `current`.
///
/// Per type, the batch's durations are summed; a sum at or above the type's
/// threshold sets the flag and records the content id of the latest event
/// that carries one. Flags already true stay true. Events of achieved types
/// are consumed; events of types still under threshold stay pending so their
/// time adds up with later events.
pub fn aggregate_events(
    current: &DailyProgress,
    events: &[ActivityEvent],
    thresholds: &ActivityThresholds,
    now: DateTime<Utc>,
) -> AggregationOutcome {
    let mut batches: BTreeMap<ActivityType, TypeBatch<'_>> = BTreeMap::new();

    for event in events
        .iter()
        .filter(|e| !e.consumed && e.owner_id == current.owner_id)
    {
        let batch = batches.entry(event.activity_type).or_default();
        batch.total += u64::from(event.duration_seconds);
        batch.ids.push(event.id);
        if event.content_id.is_some()
            && batch
                .latest
                .map_or(true, |latest| event.created_at >= latest.created_at)
        {
            batch.latest = Some(event);
        }
    }

    let mut progress = current.clone();
    let mut newly_achieved = Vec::new();
    let mut consumed_event_ids = Vec::new();
    let mut totals = BTreeMap::new();

    for (activity_type, batch) in batches {
        totals.insert(activity_type, batch.total);

        let met = batch.total >= u64::from(thresholds.get(activity_type));
        if met {
            if !progress.is_achieved(activity_type) {
                newly_achieved.push(activity_type);
            }
            let content_id = batch.latest.and_then(|e| e.content_id.clone());
            progress.mark_achieved(activity_type, content_id);
        }

        if progress.is_achieved(activity_type) {
            consumed_event_ids.extend(batch.ids);
        }
    }

    progress.progress_percent = progress.compute_percent();
    if progress.is_complete() && progress.completed_at.is_none() {
        progress.completed_at = Some(now);
    }

    AggregationOutcome {
        progress,
        newly_achieved,
        consumed_event_ids,
        totals,
    }
}
