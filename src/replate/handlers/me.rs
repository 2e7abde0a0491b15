//! Endpoints for the signed-in principal.

use std::sync::Arc;

use axum::{
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};
use tracing::error;
use utoipa::ToSchema;

use super::extract_bearer_token;
use crate::replate::AppState;
use crate::session::{IdentityId, Profile, SessionState};
use crate::store::ProfileStore;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct Me {
    pub id: IdentityId,
    pub email: String,
    pub email_verified: bool,
    pub profile: Profile,
}

/// Identity and profile behind the bearer token.
#[utoipa::path(
    get,
    path = "/v1/me",
    responses(
        (status = 200, description = "Signed-in principal", body = Me),
        (status = 401, description = "No session"),
        (status = 503, description = "Session still resolving")
    ),
    tag = "me"
)]
pub async fn me(state: Extension<Arc<AppState>>, headers: HeaderMap) -> impl IntoResponse {
    let session = extract_bearer_token(&headers).and_then(|token| state.sessions.state(token));
    match session {
        Some(SessionState::Active { identity, profile }) => Json(Me {
            id: identity.id,
            email: identity.email,
            email_verified: identity.email_verified,
            profile,
        })
        .into_response(),
        // Resolution in flight or store unavailable; the client retries.
        Some(SessionState::Unresolved) => (
            StatusCode::SERVICE_UNAVAILABLE,
            "Session resolving".to_string(),
        )
            .into_response(),
        Some(SessionState::SignedOut) | None => {
            (StatusCode::UNAUTHORIZED, "No session".to_string()).into_response()
        }
    }
}

/// Record that the principal acknowledged the food safety policies. The
/// session observes the write through its subscription.
#[utoipa::path(
    post,
    path = "/v1/me/policies",
    responses(
        (status = 204, description = "Acknowledgement recorded"),
        (status = 401, description = "No session"),
        (status = 404, description = "Profile record missing")
    ),
    tag = "me"
)]
pub async fn accept_policies(
    state: Extension<Arc<AppState>>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let Some(id) = extract_bearer_token(&headers)
        .and_then(|token| state.sessions.identity_id(token))
    else {
        return (StatusCode::UNAUTHORIZED, "No session".to_string()).into_response();
    };

    match write_acknowledgement(&state, &id).await {
        Ok(true) => StatusCode::NO_CONTENT.into_response(),
        Ok(false) => (StatusCode::NOT_FOUND, "Profile not found".to_string()).into_response(),
        Err(err) => {
            error!("Failed to record policy acknowledgement: {err}");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                "Store unavailable".to_string(),
            )
                .into_response()
        }
    }
}

async fn write_acknowledgement(
    state: &AppState,
    id: &IdentityId,
) -> Result<bool, crate::store::StoreError> {
    // Read fresh instead of trusting the session snapshot; another writer may
    // have raced this request.
    let Some(mut profile) = state.store.get(id).await? else {
        return Ok(false);
    };
    profile.accepted_policies = true;
    state.store.put(id, profile).await?;
    Ok(true)
}
