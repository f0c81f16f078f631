//! Authentication middleware

use axum::{
    body::Body,
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

use crate::error::{ApiError, Result};
use crate::AppState;

/// Authenticated owner stored in request extensions
#[derive(Clone, Debug)]
pub struct AuthenticatedOwner {
    pub owner_id: Uuid,
    pub token: String,
}

impl AuthenticatedOwner {
    /// Reject a request body that names a different owner.
    pub fn check_claimed(&self, claimed: Option<Uuid>) -> Result<()> {
        match claimed {
            Some(owner_id) if owner_id != self.owner_id => Err(ApiError::Forbidden(
                "owner_id does not match the authenticated owner".to_string(),
            )),
            _ => Ok(()),
        }
    }
}

/// Auth middleware - resolves the bearer token to an owner
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response> {
    // Skip auth for register endpoint and health check
    let path = request.uri().path();
    if path == "/api/owner/register" || path == "/health" {
        return Ok(next.run(request).await);
    }

    // Extract Bearer token
    let auth_header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| ApiError::Unauthorized("Missing Authorization header".to_string()))?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or_else(|| ApiError::Unauthorized("Invalid Authorization format".to_string()))?
        .to_string();

    // Look up owner by token
    let owner = state
        .db
        .get_owner_by_token(&token)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("Invalid owner token".to_string()))?;

    // Update last_seen
    state.db.update_last_seen(owner.id).await?;

    // Store authenticated owner in request extensions
    request.extensions_mut().insert(AuthenticatedOwner {
        owner_id: owner.id,
        token,
    });

    Ok(next.run(request).await)
}
