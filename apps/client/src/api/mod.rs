//! HTTP client for the progress backend.

pub mod flusher;

use chrono::{DateTime, NaiveDate, Utc};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::db::DbError;
use progress_core::types::{ActivityType, DailyProgress, FlashCard};

pub use flusher::{ActivitySink, HttpSink, RetryReport};

/// Client errors.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Backend error: {status} - {message}")]
    Backend { status: u16, message: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Database error: {0}")]
    Database(#[from] DbError),

    #[error("Not authenticated - please register first")]
    NotAuthenticated,
}

// === API Request/Response Types ===

/// One flush of accumulated time, as sent to the ingestion endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlushRequest {
    pub owner_id: Uuid,
    pub activity_type: ActivityType,
    pub content_id: Option<String>,
    pub duration_seconds: u32,
    pub pathname: String,
    #[serde(skip)]
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct TrackActivityResponse {
    event_id: Uuid,
}

#[derive(Debug, Serialize)]
struct OwnerRegisterRequest {
    name: Option<String>,
}

/// Credentials issued by the backend.
#[derive(Debug, Clone, Deserialize)]
pub struct OwnerRegistration {
    pub owner_id: Uuid,
    pub token: String,
}

#[derive(Debug, Serialize)]
struct ProcessActivitiesRequest {
    day: Option<NaiveDate>,
}

/// Payload of a finished aggregation run.
#[derive(Debug, Clone, Deserialize)]
pub struct ProcessActivitiesData {
    pub updated: bool,
    pub progress: DailyProgress,
    pub newly_achieved: Vec<ActivityType>,
}

/// Aggregation trigger result.
#[derive(Debug, Clone, Deserialize)]
pub struct ProcessActivitiesResponse {
    pub success: bool,
    pub already_running: bool,
    pub data: Option<ProcessActivitiesData>,
}

#[derive(Debug, Serialize)]
struct CreateCardRequest<'a> {
    front: &'a str,
    back: &'a str,
}

#[derive(Debug, Serialize)]
struct ReviewCardRequest {
    card_id: Uuid,
    is_correct: bool,
}

/// New schedule after a review.
#[derive(Debug, Clone, Deserialize)]
pub struct ReviewCardResponse {
    pub box_number: u8,
    pub next_review_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
struct BulkDeleteRequest<'a> {
    card_ids: &'a [Uuid],
}

#[derive(Debug, Deserialize)]
struct BulkDeleteResponse {
    deleted_count: u64,
}

struct ApiClientInner {
    client: Client,
    backend_url: String,
    token: Option<String>,
}

/// Backend API client.
///
/// Cheap to clone; every request carries the configured timeout.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ApiClientInner>,
}

impl ApiClient {
    pub fn new(
        backend_url: &str,
        token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, ClientError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ClientError::Network(e.to_string()))?;

        Ok(Self {
            inner: Arc::new(ApiClientInner {
                client,
                backend_url: backend_url.trim_end_matches('/').to_string(),
                token,
            }),
        })
    }

    pub fn backend_url(&self) -> &str {
        &self.inner.backend_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.inner.backend_url, path)
    }

    fn authorized(&self, request: RequestBuilder) -> Result<RequestBuilder, ClientError> {
        let token = self
            .inner
            .token
            .as_deref()
            .ok_or(ClientError::NotAuthenticated)?;
        Ok(request.bearer_auth(token))
    }

    async fn send<T: DeserializeOwned>(request: RequestBuilder) -> Result<T, ClientError> {
        let resp = request
            .send()
            .await
            .map_err(|e| ClientError::Network(e.to_string()))?;
        Self::parse(resp).await
    }

    async fn parse<T: DeserializeOwned>(resp: Response) -> Result<T, ClientError> {
        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let message = resp.text().await.unwrap_or_default();
            return Err(ClientError::Backend { status, message });
        }

        resp.json()
            .await
            .map_err(|e| ClientError::Parse(e.to_string()))
    }

    /// Register a new owner with the backend.
    pub async fn register_owner(
        &self,
        name: Option<String>,
    ) -> Result<OwnerRegistration, ClientError> {
        let request = self
            .inner
            .client
            .post(self.url("/api/owner/register"))
            .json(&OwnerRegisterRequest { name });
        Self::send(request).await
    }

    /// Submit one activity event; returns the stored event id.
    pub async fn track(&self, flush: &FlushRequest) -> Result<Uuid, ClientError> {
        let request = self.authorized(
            self.inner
                .client
                .post(self.url("/api/activity-track"))
                .json(flush),
        )?;
        let response: TrackActivityResponse = Self::send(request).await?;
        Ok(response.event_id)
    }

    /// Ask the backend to fold pending events into the daily record.
    pub async fn process_activities(
        &self,
        day: Option<NaiveDate>,
    ) -> Result<ProcessActivitiesResponse, ClientError> {
        let request = self.authorized(
            self.inner
                .client
                .post(self.url("/api/planner/process-activities"))
                .json(&ProcessActivitiesRequest { day }),
        )?;
        Self::send(request).await
    }

    pub async fn daily_progress(
        &self,
        day: Option<NaiveDate>,
    ) -> Result<DailyProgress, ClientError> {
        let mut request = self
            .inner
            .client
            .get(self.url("/api/user/daily-progress"));
        if let Some(day) = day {
            request = request.query(&[("day", day.to_string())]);
        }
        Self::send(self.authorized(request)?).await
    }

    pub async fn due_cards(&self) -> Result<Vec<FlashCard>, ClientError> {
        let request = self.authorized(self.inner.client.get(self.url("/api/cards/due")))?;
        Self::send(request).await
    }

    pub async fn create_card(&self, front: &str, back: &str) -> Result<FlashCard, ClientError> {
        let request = self.authorized(
            self.inner
                .client
                .post(self.url("/api/cards"))
                .json(&CreateCardRequest { front, back }),
        )?;
        Self::send(request).await
    }

    pub async fn review_card(
        &self,
        card_id: Uuid,
        is_correct: bool,
    ) -> Result<ReviewCardResponse, ClientError> {
        let request = self.authorized(
            self.inner
                .client
                .post(self.url("/api/cards/review"))
                .json(&ReviewCardRequest {
                    card_id,
                    is_correct,
                }),
        )?;
        Self::send(request).await
    }

    /// Delete cards; ids owned by someone else are skipped server-side.
    pub async fn bulk_delete(&self, card_ids: &[Uuid]) -> Result<u64, ClientError> {
        let request = self.authorized(
            self.inner
                .client
                .delete(self.url("/api/cards/bulk-delete"))
                .json(&BulkDeleteRequest { card_ids }),
        )?;
        let response: BulkDeleteResponse = Self::send(request).await?;
        Ok(response.deleted_count)
    }
}
