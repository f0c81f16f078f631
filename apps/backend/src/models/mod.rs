//! Database models and API types

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use progress_core::algorithm::leitner::Leitner;
use progress_core::CoreError;

// Re-export shared types from progress-core
pub use progress_core::types::{ActivityEvent, ActivityType, DailyProgress, FlashCard};

// === Database Entity Types ===

/// Learner resolved from a bearer token
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Owner {
    pub id: Uuid,
    pub token: String,
    pub name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
}

/// Flashcard stored in PostgreSQL
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct DbFlashCard {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub front: String,
    pub back: String,
    pub box_number: i32,
    pub next_review_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl DbFlashCard {
    /// Convert to progress-core FlashCard
    pub fn to_core(&self) -> Result<FlashCard, CoreError> {
        Ok(FlashCard {
            id: self.id,
            owner_id: self.owner_id,
            front: self.front.clone(),
            back: self.back.clone(),
            box_number: Leitner::check_box(self.box_number)?,
            next_review_at: self.next_review_at,
            created_at: self.created_at,
        })
    }
}

/// Activity event stored in PostgreSQL
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct DbActivityEvent {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub activity_type: String,
    pub content_id: Option<String>,
    pub duration_seconds: i32,
    pub pathname: String,
    pub created_at: DateTime<Utc>,
    pub consumed: bool,
    pub consumed_at: Option<DateTime<Utc>>,
}

impl DbActivityEvent {
    /// Convert to progress-core ActivityEvent
    pub fn to_core(&self) -> Result<ActivityEvent, CoreError> {
        if self.duration_seconds <= 0 {
            return Err(CoreError::NonPositiveDuration(self.duration_seconds.into()));
        }
        Ok(ActivityEvent {
            id: self.id,
            owner_id: self.owner_id,
            activity_type: self.activity_type.parse()?,
            content_id: self.content_id.clone(),
            duration_seconds: self.duration_seconds as u32,
            pathname: self.pathname.clone(),
            created_at: self.created_at,
            consumed: self.consumed,
            consumed_at: self.consumed_at,
        })
    }
}

/// Daily progress row in PostgreSQL
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct DbDailyProgress {
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
    pub progress_percent: i32,
    pub completed_at: Option<DateTime<Utc>>,
}

impl DbDailyProgress {
    /// Convert to progress-core DailyProgress
    pub fn to_core(&self) -> DailyProgress {
        DailyProgress {
            owner_id: self.owner_id,
            day: self.day,
            video_watched: self.video_watched,
            podcast_listened: self.podcast_listened,
            words_reviewed: self.words_reviewed,
            article_read: self.article_read,
            video_content_id: self.video_content_id.clone(),
            podcast_content_id: self.podcast_content_id.clone(),
            words_content_id: self.words_content_id.clone(),
            article_content_id: self.article_content_id.clone(),
            progress_percent: self.progress_percent.clamp(0, 100) as u8,
            completed_at: self.completed_at,
        }
    }
}

// === API Request/Response Types ===

/// Owner registration request
#[derive(Debug, Deserialize)]
pub struct OwnerRegisterRequest {
    pub name: Option<String>,
}

/// Owner registration response
#[derive(Debug, Serialize, Deserialize)]
pub struct OwnerRegisterResponse {
    pub owner_id: Uuid,
    pub token: String,
}

/// Activity ingestion request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackActivityRequest {
    #[serde(default)]
    pub owner_id: Option<Uuid>,
    pub activity_type: ActivityType,
    #[serde(default)]
    pub content_id: Option<String>,
    pub duration_seconds: i64,
    pub pathname: String,
}

/// Activity ingestion response
#[derive(Debug, Serialize, Deserialize)]
pub struct TrackActivityResponse {
    pub event_id: Uuid,
}

/// Aggregation trigger request
#[derive(Debug, Default, Deserialize)]
pub struct ProcessActivitiesRequest {
    #[serde(default)]
    pub day: Option<NaiveDate>,
}

/// Payload of a finished aggregation run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessActivitiesData {
    pub updated: bool,
    pub progress: DailyProgress,
    pub newly_achieved: Vec<ActivityType>,
}

/// Aggregation trigger response
#[derive(Debug, Serialize, Deserialize)]
pub struct ProcessActivitiesResponse {
    pub success: bool,
    pub already_running: bool,
    pub data: Option<ProcessActivitiesData>,
}

/// Daily progress query
#[derive(Debug, Deserialize)]
pub struct DailyProgressQuery {
    pub day: Option<NaiveDate>,
}

/// Card creation request
#[derive(Debug, Deserialize)]
pub struct CreateCardRequest {
    pub front: String,
    pub back: String,
}

/// Review submission request
#[derive(Debug, Deserialize)]
pub struct ReviewCardRequest {
    pub card_id: Uuid,
    pub is_correct: bool,
}

/// Review submission response
#[derive(Debug, Serialize, Deserialize)]
pub struct ReviewCardResponse {
    pub box_number: u8,
    pub next_review_at: DateTime<Utc>,
}

/// Bulk delete request
#[derive(Debug, Deserialize)]
pub struct BulkDeleteRequest {
    pub card_ids: Vec<Uuid>,
}

/// Bulk delete response
#[derive(Debug, Serialize, Deserialize)]
pub struct BulkDeleteResponse {
    pub deleted_count: u64,
}
