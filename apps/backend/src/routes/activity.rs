//! Activity ingestion endpoint

use axum::{extract::State, Extension, Json};
use chrono::Utc;
use progress_core::CoreError;
use uuid::Uuid;

use crate::error::{ApiError, Result};
use crate::models::*;
use crate::routes::auth::AuthenticatedOwner;
use crate::AppState;

/// POST /api/activity-track
/// Appends one event; duplicates are accepted and settled by aggregation.
pub async fn track(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedOwner>,
    Json(payload): Json<TrackActivityRequest>,
) -> Result<Json<TrackActivityResponse>> {
    auth.check_claimed(payload.owner_id)?;

    if payload.duration_seconds <= 0 {
        return Err(CoreError::NonPositiveDuration(payload.duration_seconds).into());
    }
    let duration_seconds = i32::try_from(payload.duration_seconds)
        .map_err(|_| ApiError::BadRequest("duration_seconds is too large".to_string()))?;

    let event = DbActivityEvent {
        id: Uuid::new_v4(),
        owner_id: auth.owner_id,
        activity_type: payload.activity_type.as_str().to_string(),
        content_id: payload.content_id,
        duration_seconds,
        pathname: payload.pathname,
        created_at: Utc::now(),
        consumed: false,
        consumed_at: None,
    };

    let event_id = state.db.insert_event(&event).await?;

    tracing::debug!(
        owner_id = %auth.owner_id,
        activity_type = %payload.activity_type,
        duration_seconds,
        "activity event stored"
    );

    Ok(Json(TrackActivityResponse { event_id }))
}
