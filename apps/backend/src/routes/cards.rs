//! Flashcard endpoints

use axum::{extract::State, Extension, Json};
use chrono::Utc;
use progress_core::Leitner;
use uuid::Uuid;

use crate::error::{ApiError, Result};
use crate::models::*;
use crate::routes::auth::AuthenticatedOwner;
use crate::AppState;

/// Attempts before a contended review gives up.
const REVIEW_CAS_ATTEMPTS: usize = 3;

/// GET /api/cards/due
pub async fn due(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedOwner>,
) -> Result<Json<Vec<FlashCard>>> {
    let cards = state
        .db
        .get_due_cards(auth.owner_id, Utc::now())
        .await?
        .iter()
        .map(|c| c.to_core())
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(Json(cards))
}

/// POST /api/cards
/// New cards start in box 1 and are due immediately.
pub async fn create(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedOwner>,
    Json(payload): Json<CreateCardRequest>,
) -> Result<Json<FlashCard>> {
    let front = payload.front.trim();
    let back = payload.back.trim();
    if front.is_empty() || back.is_empty() {
        return Err(ApiError::BadRequest("front and back must not be empty".to_string()));
    }

    let now = Utc::now();
    let placement = state.scheduler.initial(now);
    let card = state
        .db
        .insert_card(&DbFlashCard {
            id: Uuid::new_v4(),
            owner_id: auth.owner_id,
            front: front.to_string(),
            back: back.to_string(),
            box_number: i32::from(placement.box_number),
            next_review_at: placement.next_review_at,
            created_at: now,
        })
        .await?;

    Ok(Json(card.to_core()?))
}

/// POST /api/cards/review
pub async fn review(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedOwner>,
    Json(payload): Json<ReviewCardRequest>,
) -> Result<Json<ReviewCardResponse>> {
    for attempt in 1..=REVIEW_CAS_ATTEMPTS {
        let card = state
            .db
            .get_card(payload.card_id)
            .await?
            .ok_or_else(|| ApiError::NotFound("Card not found".to_string()))?;

        if card.owner_id != auth.owner_id {
            return Err(ApiError::Forbidden("Card belongs to another owner".to_string()));
        }

        let current_box = Leitner::check_box(card.box_number)?;
        let result = state
            .scheduler
            .schedule(current_box, payload.is_correct, Utc::now());

        let written = state
            .db
            .update_card_schedule(&card, i32::from(result.box_number), result.next_review_at)
            .await?;

        if written {
            return Ok(Json(ReviewCardResponse {
                box_number: result.box_number,
                next_review_at: result.next_review_at,
            }));
        }

        tracing::warn!(card_id = %card.id, attempt, "card changed during review, retrying");
    }

    Err(ApiError::Conflict(
        "Card was updated concurrently, please retry".to_string(),
    ))
}

/// DELETE /api/cards/bulk-delete
/// Ids the caller does not own are skipped silently.
pub async fn bulk_delete(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthenticatedOwner>,
    Json(payload): Json<BulkDeleteRequest>,
) -> Result<Json<BulkDeleteResponse>> {
    let deleted_count = if payload.card_ids.is_empty() {
        0
    } else {
        state.db.delete_cards(auth.owner_id, &payload.card_ids).await?
    };

    Ok(Json(BulkDeleteResponse { deleted_count }))
}
