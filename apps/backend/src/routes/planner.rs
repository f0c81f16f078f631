//! Aggregation trigger endpoint

use axum::{extract::State, Extension, Json};
use chrono::Utc;

use crate::error::Result;
use crate::models::*;
use crate::routes::auth::AuthenticatedOwner;
use crate::services::aggregator::AggregationRun;
use crate::AppState;

/// POST /api/planner/process-activities
/// Folds the owner's unconsumed events for the day (default: today, UTC).
pub async fn process_activities(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedOwner>,
    Json(payload): Json<Option<ProcessActivitiesRequest>>,
) -> Result<Json<ProcessActivitiesResponse>> {
    let day = payload
        .and_then(|p| p.day)
        .unwrap_or_else(|| Utc::now().date_naive());

    let response = match state.aggregator.aggregate(auth.owner_id, day).await? {
        AggregationRun::AlreadyRunning => ProcessActivitiesResponse {
            success: true,
            already_running: true,
            data: None,
        },
        AggregationRun::Completed(report) => ProcessActivitiesResponse {
            success: true,
            already_running: false,
            data: Some(ProcessActivitiesData {
                updated: report.updated,
                progress: report.progress,
                newly_achieved: report.newly_achieved,
            }),
        },
    };

    Ok(Json(response))
}
