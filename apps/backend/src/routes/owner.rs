//! Owner registration endpoint

use axum::{extract::State, Json};

use crate::error::Result;
use crate::models::{OwnerRegisterRequest, OwnerRegisterResponse};
use crate::AppState;

/// POST /api/owner/register
/// Creates a new owner and returns the token
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<Option<OwnerRegisterRequest>>,
) -> Result<Json<OwnerRegisterResponse>> {
    let name = payload.and_then(|p| p.name);
    let owner = state.db.create_owner(name.as_deref()).await?;

    tracing::info!("Registered new owner: {}", owner.id);

    Ok(Json(OwnerRegisterResponse {
        owner_id: owner.id,
        token: owner.token,
    }))
}
