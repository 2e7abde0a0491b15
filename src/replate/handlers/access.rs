//! Session and access snapshot endpoints.
//!
//! Always 200 with a tagged body: an unknown or expired token is reported as
//! `signed_out`, not as an HTTP error, so clients route on one shape.

use std::sync::Arc;

use axum::{
    extract::{Extension, Query},
    http::HeaderMap,
    response::Json,
};
use serde::Deserialize;
use utoipa::IntoParams;

use super::extract_bearer_token;
use crate::replate::AppState;
use crate::session::{AccessState, Area};

#[derive(Debug, Deserialize, IntoParams)]
pub struct AccessQuery {
    /// Area to gate on; defaults to the role's home area.
    pub area: Option<Area>,
}

/// Access snapshot for the bearer token's session, gated on its home area.
#[utoipa::path(
    get,
    path = "/v1/session",
    responses(
        (status = 200, description = "Current access snapshot", body = AccessState)
    ),
    tag = "session"
)]
pub async fn session(
    state: Extension<Arc<AppState>>,
    headers: HeaderMap,
) -> Json<AccessState> {
    Json(snapshot(&state, &headers, None))
}

/// Access snapshot gated on an explicit area.
#[utoipa::path(
    get,
    path = "/v1/session/access",
    params(AccessQuery),
    responses(
        (status = 200, description = "Access snapshot for the requested area", body = AccessState)
    ),
    tag = "session"
)]
pub async fn access(
    state: Extension<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<AccessQuery>,
) -> Json<AccessState> {
    Json(snapshot(&state, &headers, query.area))
}

fn snapshot(state: &AppState, headers: &HeaderMap, area: Option<Area>) -> AccessState {
    extract_bearer_token(headers)
        .and_then(|token| state.sessions.access(token, area))
        .unwrap_or(AccessState::SignedOut)
}
