//! Admin review queue for receiving organizations.
//!
//! Non-admin callers get 404 on every route, the same as a missing resource,
//! so the admin surface is not enumerable.

use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use tracing::{error, info};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use super::extract_bearer_token;
use crate::replate::AppState;
use crate::session::{AccessState, AccountStatus, Area, IdentityId, Profile, Role, SessionState};
use crate::store::ProfileStore;

#[derive(Debug, Deserialize, IntoParams)]
pub struct StatusQuery {
    /// Standing to filter on; defaults to pending.
    pub status: Option<AccountStatus>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ReceiverSummary {
    pub id: IdentityId,
    pub profile: Profile,
}

/// Receiving organizations in the given standing, oldest first.
#[utoipa::path(
    get,
    path = "/v1/admin/receivers",
    params(StatusQuery),
    responses(
        (status = 200, description = "Receivers in the requested standing", body = [ReceiverSummary]),
        (status = 404, description = "Not found")
    ),
    tag = "admin"
)]
pub async fn list_receivers(
    state: Extension<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<StatusQuery>,
) -> Response {
    if let Err(response) = require_admin(&state, &headers) {
        return response;
    }

    let status = query.status.unwrap_or(AccountStatus::Pending);
    let receivers: Vec<ReceiverSummary> = state
        .store
        .receivers_with_status(status)
        .into_iter()
        .map(|(id, profile)| ReceiverSummary { id, profile })
        .collect();
    Json(receivers).into_response()
}

/// Approve a pending receiver. Live sessions observe the write immediately.
#[utoipa::path(
    post,
    path = "/v1/admin/receivers/{id}/approve",
    params(("id" = String, Path, description = "Receiver identity id")),
    responses(
        (status = 204, description = "Receiver approved"),
        (status = 404, description = "Not found"),
        (status = 409, description = "Not a receiver account")
    ),
    tag = "admin"
)]
pub async fn approve_receiver(
    state: Extension<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Response {
    set_receiver_status(&state, &headers, id, AccountStatus::Active).await
}

/// Reject a receiver application.
#[utoipa::path(
    post,
    path = "/v1/admin/receivers/{id}/reject",
    params(("id" = String, Path, description = "Receiver identity id")),
    responses(
        (status = 204, description = "Receiver rejected"),
        (status = 404, description = "Not found"),
        (status = 409, description = "Not a receiver account")
    ),
    tag = "admin"
)]
pub async fn reject_receiver(
    state: Extension<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Response {
    set_receiver_status(&state, &headers, id, AccountStatus::Rejected).await
}

/// Suspend an approved receiver.
#[utoipa::path(
    post,
    path = "/v1/admin/receivers/{id}/suspend",
    params(("id" = String, Path, description = "Receiver identity id")),
    responses(
        (status = 204, description = "Receiver suspended"),
        (status = 404, description = "Not found"),
        (status = 409, description = "Not a receiver account")
    ),
    tag = "admin"
)]
pub async fn suspend_receiver(
    state: Extension<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Response {
    set_receiver_status(&state, &headers, id, AccountStatus::Suspended).await
}

async fn set_receiver_status(
    state: &AppState,
    headers: &HeaderMap,
    id: Uuid,
    status: AccountStatus,
) -> Response {
    if let Err(response) = require_admin(state, headers) {
        return response;
    }

    let id = IdentityId::from(id);
    let mut profile = match state.store.get(&id).await {
        Ok(Some(profile)) => profile,
        Ok(None) => return not_found(),
        Err(err) => {
            error!("Failed to load receiver profile: {err}");
            return (
                StatusCode::SERVICE_UNAVAILABLE,
                "Store unavailable".to_string(),
            )
                .into_response();
        }
    };
    if profile.role != Role::InstitutionalReceiver {
        return (StatusCode::CONFLICT, "Not a receiver account".to_string()).into_response();
    }

    profile.status = status;
    if let Err(err) = state.store.put(&id, profile).await {
        error!("Failed to update receiver standing: {err}");
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            "Store unavailable".to_string(),
        )
            .into_response();
    }
    info!(receiver = %id, ?status, "receiver standing updated");
    StatusCode::NO_CONTENT.into_response()
}

fn require_admin(state: &AppState, headers: &HeaderMap) -> Result<(), Response> {
    let token = extract_bearer_token(headers);
    let session = token.and_then(|token| state.sessions.state(token));
    match session {
        Some(session @ SessionState::Active { .. }) => {
            if session.access(Some(Area::Admin)) == (AccessState::Allowed { area: Area::Admin }) {
                Ok(())
            } else {
                Err(not_found())
            }
        }
        // An unresolved admin session is a retry, not a denial.
        Some(SessionState::Unresolved) => Err((
            StatusCode::SERVICE_UNAVAILABLE,
            "Session resolving".to_string(),
        )
            .into_response()),
        _ => Err(not_found()),
    }
}

fn not_found() -> Response {
    (StatusCode::NOT_FOUND, "Not found".to_string()).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{header::AUTHORIZATION, HeaderValue};
    use secrecy::SecretString;
    use std::time::Duration;

    fn bearer(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        let value = HeaderValue::from_str(&format!("Bearer {token}")).expect("header value");
        headers.insert(AUTHORIZATION, value);
        headers
    }

    async fn wait_for_active(state: &AppState, token: &str) {
        tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                if matches!(
                    state.sessions.state(token),
                    Some(SessionState::Active { .. })
                ) {
                    return;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("session resolves within deadline");
    }

    async fn admin_token(state: &Arc<AppState>) -> String {
        let password = SecretString::from("admin-password".to_string());
        let identity = state
            .directory
            .seed_admin("admin@example.com", &password)
            .expect("seed admin");
        state
            .store
            .put(
                &identity.id,
                Profile::new_admin("Admin".to_string(), identity.email.clone()),
            )
            .await
            .expect("seed admin profile");
        let token = state.sessions.create(identity);
        wait_for_active(state, &token).await;
        token
    }

    async fn pending_receiver(state: &Arc<AppState>) -> IdentityId {
        let identity = state
            .directory
            .sign_up_with_password(
                "shelter@example.com",
                &SecretString::from("hunter2hunter2".to_string()),
                Some("Shelter".to_string()),
            )
            .expect("sign up")
            .0;
        state
            .store
            .put(
                &identity.id,
                Profile::new_receiver(
                    "Shelter".to_string(),
                    identity.email.clone(),
                    "NGO-42".to_string(),
                    true,
                ),
            )
            .await
            .expect("seed receiver profile");
        identity.id
    }

    #[tokio::test]
    async fn non_admins_get_not_found_not_forbidden() {
        let state = AppState::new("http://localhost:5173".to_string());
        let donor = state
            .directory
            .sign_in_federated("donor@example.com", None)
            .expect("sign in");
        let token = state.sessions.create(donor);
        wait_for_active(&state, &token).await;

        let response = list_receivers(
            Extension(state.clone()),
            bearer(&token),
            Query(StatusQuery { status: None }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        // Same answer with no token at all.
        let response = list_receivers(
            Extension(state),
            HeaderMap::new(),
            Query(StatusQuery { status: None }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn approval_moves_the_receiver_out_of_the_queue() {
        let state = AppState::new("http://localhost:5173".to_string());
        let token = admin_token(&state).await;
        let receiver = pending_receiver(&state).await;

        let response = list_receivers(
            Extension(state.clone()),
            bearer(&token),
            Query(StatusQuery { status: None }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let response = approve_receiver(
            Extension(state.clone()),
            bearer(&token),
            Path(Uuid::from(receiver)),
        )
        .await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let profile = state
            .store
            .get(&receiver)
            .await
            .expect("store reachable")
            .expect("profile exists");
        assert_eq!(profile.status, AccountStatus::Active);
        assert!(state
            .store
            .receivers_with_status(AccountStatus::Pending)
            .is_empty());
    }

    #[tokio::test]
    async fn donor_accounts_cannot_be_reviewed() {
        let state = AppState::new("http://localhost:5173".to_string());
        let token = admin_token(&state).await;
        let donor = state
            .directory
            .sign_in_federated("donor@example.com", None)
            .expect("sign in");
        state
            .store
            .put(
                &donor.id,
                Profile::new_donor("Donor".to_string(), donor.email.clone()),
            )
            .await
            .expect("seed donor profile");

        let response = reject_receiver(
            Extension(state),
            bearer(&token),
            Path(Uuid::from(donor.id)),
        )
        .await;
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn unknown_receiver_is_not_found() {
        let state = AppState::new("http://localhost:5173".to_string());
        let token = admin_token(&state).await;
        let response = suspend_receiver(
            Extension(state),
            bearer(&token),
            Path(Uuid::new_v4()),
        )
        .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
