//! Core types for the progress engine.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CoreError;

/// Kind of content a learner spends time on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityType {
    Video,
    Podcast,
    Words,
    Article,
}

impl ActivityType {
    /// Every activity type, in daily-goal order.
    pub const ALL: [ActivityType; 4] = [Self::Video, Self::Podcast, Self::Words, Self::Article];

    /// Get the activity type as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Video => "video",
            Self::Podcast => "podcast",
            Self::Words => "words",
            Self::Article => "article",
        }
    }
}

impl fmt::Display for ActivityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActivityType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "video" => Ok(Self::Video),
            "podcast" => Ok(Self::Podcast),
            "words" => Ok(Self::Words),
            "article" => Ok(Self::Article),
            other => Err(CoreError::UnknownActivityType(other.to_string())),
        }
    }
}

/// Flashcard owned by a single learner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlashCard {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub front: String,
    pub back: String,
    pub box_number: u8,
    pub next_review_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// One immutable record of time spent on a content type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityEvent {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub activity_type: ActivityType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_id: Option<String>,
    pub duration_seconds: u32,
    pub pathname: String,
    pub created_at: DateTime<Utc>,
    pub consumed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub consumed_at: Option<DateTime<Utc>>,
}

/// Per-owner, per-day summary of which activity goals were met.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyProgress {
    pub owner_id: Uuid,
    pub day: NaiveDate,
    pub video_watched: bool,
    pub podcast_listened: bool,
    pub words_reviewed: bool,
    pub article_read: bool,
    pub video_content_id: Option<String>,
    pub podcast_content_id: Option<String>,
    pub words_content_id: Option<String>,
    pub article_content_id: Option<String>,
    pub progress_percent: u8,
    pub completed_at: Option<DateTime<Utc>>,
}

impl DailyProgress {
    /// Record with nothing achieved yet.
    pub fn empty(owner_id: Uuid, day: NaiveDate) -> Self {
        Self {
            owner_id,
            day,
            video_watched: false,
            podcast_listened: false,
            words_reviewed: false,
            article_read: false,
            video_content_id: None,
            podcast_content_id: None,
            words_content_id: None,
            article_content_id: None,
            progress_percent: 0,
            completed_at: None,
        }
    }

    pub fn is_achieved(&self, activity_type: ActivityType) -> bool {
        match activity_type {
            ActivityType::Video => self.video_watched,
            ActivityType::Podcast => self.podcast_listened,
            ActivityType::Words => self.words_reviewed,
            ActivityType::Article => self.article_read,
        }
    }

    pub fn content_id(&self, activity_type: ActivityType) -> Option<&str> {
        match activity_type {
            ActivityType::Video => self.video_content_id.as_deref(),
            ActivityType::Podcast => self.podcast_content_id.as_deref(),
            ActivityType::Words => self.words_content_id.as_deref(),
            ActivityType::Article => self.article_content_id.as_deref(),
        }
    }

    /// Mark a type achieved. Flags only ever move from false to true.
    pub fn mark_achieved(&mut self, activity_type: ActivityType, content_id: Option<String>) {
        let (flag, slot) = match activity_type {
            ActivityType::Video => (&mut self.video_watched, &mut self.video_content_id),
            ActivityType::Podcast => (&mut self.podcast_listened, &mut self.podcast_content_id),
            ActivityType::Words => (&mut self.words_reviewed, &mut self.words_content_id),
            ActivityType::Article => (&mut self.article_read, &mut self.article_content_id),
        };
        *flag = true;
        if content_id.is_some() {
            *slot = content_id;
        }
    }

    /// Activity types achieved so far.
    pub fn achieved(&self) -> Vec<ActivityType> {
        ActivityType::ALL
            .into_iter()
            .filter(|t| self.is_achieved(*t))
            .collect()
    }

    /// Derived percentage: achieved count / 4 * 100.
    pub fn compute_percent(&self) -> u8 {
        let achieved = self.achieved().len() as u32;
        (achieved * 100 / ActivityType::ALL.len() as u32) as u8
    }

    pub fn is_complete(&self) -> bool {
        self.compute_percent() == 100
    }
}
