//! Daily progress endpoint

use axum::{
    extract::{Query, State},
    Extension, Json,
};
use chrono::Utc;

use crate::error::Result;
use crate::models::*;
use crate::routes::auth::AuthenticatedOwner;
use crate::AppState;

/// GET /api/user/daily-progress
/// Missing rows read as an empty record for the day.
pub async fn daily(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedOwner>,
    Query(query): Query<DailyProgressQuery>,
) -> Result<Json<DailyProgress>> {
    let day = query.day.unwrap_or_else(|| Utc::now().date_naive());

    let progress = state
        .db
        .get_daily_progress(auth.owner_id, day)
        .await?
        .map(|row| row.to_core())
        .unwrap_or_else(|| DailyProgress::empty(auth.owner_id, day));

    Ok(Json(progress))
}
