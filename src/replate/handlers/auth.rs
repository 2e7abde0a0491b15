//! Registration, sign-in and credential lifecycle endpoints.
//!
//! Every response that could reveal whether an email is registered collapses
//! into the same status: logout and reset requests always answer 204.

use std::sync::Arc;

use axum::{
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use tracing::{error, info};
use utoipa::ToSchema;

use super::extract_bearer_token;
use crate::auth::AuthError;
use crate::replate::AppState;
use crate::session::profile::{Profile, FALLBACK_DONOR_NAME};
use crate::store::ProfileStore;

#[derive(Debug, Deserialize, ToSchema)]
pub struct SignupRequest {
    pub email: String,
    pub password: String,
    pub name: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SignupReceiverRequest {
    pub email: String,
    pub password: String,
    /// Organization name shown in the admin review queue.
    pub name: String,
    /// Government or NGO registration identifier.
    pub registration_id: String,
    pub geo_verified: Option<bool>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct FederatedLoginRequest {
    pub email: String,
    pub name: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct LoginResponse {
    pub token: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct VerifyEmailRequest {
    pub token: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct PasswordResetRequest {
    pub email: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct PasswordResetConfirmRequest {
    pub token: String,
    pub password: String,
}

/// Register a donor account. The account starts unverified; the profile is
/// active right away.
#[utoipa::path(
    post,
    path = "/v1/auth/signup",
    request_body = SignupRequest,
    responses(
        (status = 201, description = "Account created, verification email queued"),
        (status = 400, description = "Invalid email or weak password"),
        (status = 409, description = "Email already registered")
    ),
    tag = "auth"
)]
pub async fn signup(
    state: Extension<Arc<AppState>>,
    payload: Option<Json<SignupRequest>>,
) -> impl IntoResponse {
    let Some(Json(request)) = payload else {
        return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response();
    };

    let password = SecretString::from(request.password);
    let (identity, token) =
        match state
            .directory
            .sign_up_with_password(&request.email, &password, request.name.clone())
        {
            Ok(created) => created,
            Err(err) => return signup_error(&err),
        };

    let name = request
        .name
        .unwrap_or_else(|| FALLBACK_DONOR_NAME.to_string());
    let profile = Profile::new_donor(name, identity.email.clone());
    if let Err(err) = state.store.put(&identity.id, profile).await {
        error!("Failed to store donor profile: {err}");
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Signup failed".to_string(),
        )
            .into_response();
    }

    state
        .directory
        .announce_verification(&state.frontend_base_url, &identity.email, &token);
    StatusCode::CREATED.into_response()
}

/// Register a receiving organization. The profile starts pending and stays
/// locked out of every area until an admin approves it.
#[utoipa::path(
    post,
    path = "/v1/auth/signup/receiver",
    request_body = SignupReceiverRequest,
    responses(
        (status = 201, description = "Account created, pending admin review"),
        (status = 400, description = "Invalid email or weak password"),
        (status = 409, description = "Email already registered")
    ),
    tag = "auth"
)]
pub async fn signup_receiver(
    state: Extension<Arc<AppState>>,
    payload: Option<Json<SignupReceiverRequest>>,
) -> impl IntoResponse {
    let Some(Json(request)) = payload else {
        return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response();
    };
    if request.name.trim().is_empty() || request.registration_id.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            "Missing organization details".to_string(),
        )
            .into_response();
    }

    let password = SecretString::from(request.password);
    let (identity, token) = match state.directory.sign_up_with_password(
        &request.email,
        &password,
        Some(request.name.clone()),
    ) {
        Ok(created) => created,
        Err(err) => return signup_error(&err),
    };

    let profile = Profile::new_receiver(
        request.name,
        identity.email.clone(),
        request.registration_id,
        request.geo_verified.unwrap_or(false),
    );
    if let Err(err) = state.store.put(&identity.id, profile).await {
        error!("Failed to store receiver profile: {err}");
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Signup failed".to_string(),
        )
            .into_response();
    }

    state
        .directory
        .announce_verification(&state.frontend_base_url, &identity.email, &token);
    StatusCode::CREATED.into_response()
}

/// Password sign-in; issues a bearer token backed by a live session.
#[utoipa::path(
    post,
    path = "/v1/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Signed in", body = LoginResponse),
        (status = 401, description = "Invalid credentials")
    ),
    tag = "auth"
)]
pub async fn login(
    state: Extension<Arc<AppState>>,
    payload: Option<Json<LoginRequest>>,
) -> impl IntoResponse {
    let Some(Json(request)) = payload else {
        return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response();
    };

    let password = SecretString::from(request.password);
    match state
        .directory
        .sign_in_with_password(&request.email, &password)
    {
        Ok(identity) => {
            let token = state.sessions.create(identity);
            Json(LoginResponse { token }).into_response()
        }
        Err(_) => {
            (StatusCode::UNAUTHORIZED, "Invalid credentials".to_string()).into_response()
        }
    }
}

/// Federated sign-in. First use creates a verified account; a missing
/// profile is repaired by the session controller.
#[utoipa::path(
    post,
    path = "/v1/auth/login/federated",
    request_body = FederatedLoginRequest,
    responses(
        (status = 200, description = "Signed in", body = LoginResponse),
        (status = 400, description = "Invalid email")
    ),
    tag = "auth"
)]
pub async fn login_federated(
    state: Extension<Arc<AppState>>,
    payload: Option<Json<FederatedLoginRequest>>,
) -> impl IntoResponse {
    let Some(Json(request)) = payload else {
        return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response();
    };

    match state
        .directory
        .sign_in_federated(&request.email, request.name)
    {
        Ok(identity) => {
            let token = state.sessions.create(identity);
            Json(LoginResponse { token }).into_response()
        }
        Err(_) => (StatusCode::BAD_REQUEST, "Invalid email".to_string()).into_response(),
    }
}

/// Drop the session behind the bearer token. Always 204, even for unknown
/// tokens.
#[utoipa::path(
    post,
    path = "/v1/auth/logout",
    responses(
        (status = 204, description = "Signed out")
    ),
    tag = "auth"
)]
pub async fn logout(state: Extension<Arc<AppState>>, headers: HeaderMap) -> impl IntoResponse {
    if let Some(token) = extract_bearer_token(&headers) {
        state.sessions.remove(token);
    }
    StatusCode::NO_CONTENT
}

/// Redeem an email verification token. Live sessions of the principal pick
/// the refreshed identity up without a new sign-in.
#[utoipa::path(
    post,
    path = "/v1/auth/verify-email",
    request_body = VerifyEmailRequest,
    responses(
        (status = 204, description = "Email verified"),
        (status = 400, description = "Invalid token")
    ),
    tag = "auth"
)]
pub async fn verify_email(
    state: Extension<Arc<AppState>>,
    payload: Option<Json<VerifyEmailRequest>>,
) -> impl IntoResponse {
    let Some(Json(request)) = payload else {
        return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response();
    };
    let token = request.token.trim();
    if token.is_empty() {
        return (StatusCode::BAD_REQUEST, "Missing token".to_string()).into_response();
    }

    match state.directory.verify_email(token) {
        Ok(identity) => {
            state.sessions.refresh_identity(&identity);
            StatusCode::NO_CONTENT.into_response()
        }
        Err(_) => (StatusCode::BAD_REQUEST, "Invalid token".to_string()).into_response(),
    }
}

/// Request a password reset (always returns 204 to avoid user enumeration).
#[utoipa::path(
    post,
    path = "/v1/auth/password-reset",
    request_body = PasswordResetRequest,
    responses(
        (status = 204, description = "Reset accepted")
    ),
    tag = "auth"
)]
pub async fn request_password_reset(
    state: Extension<Arc<AppState>>,
    payload: Option<Json<PasswordResetRequest>>,
) -> impl IntoResponse {
    let Some(Json(request)) = payload else {
        return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response();
    };

    match state.directory.request_password_reset(&request.email) {
        Ok(Some(token)) => {
            let base = state.frontend_base_url.trim_end_matches('/');
            // Stand-in for the outbound email service.
            info!(
                email = %request.email,
                url = %format!("{base}/reset-password#token={token}"),
                "password reset email queued"
            );
        }
        Ok(None) => {}
        Err(err) => error!("Failed to issue reset token: {err}"),
    }
    StatusCode::NO_CONTENT.into_response()
}

/// Redeem a reset token and set a new password.
#[utoipa::path(
    post,
    path = "/v1/auth/password-reset/confirm",
    request_body = PasswordResetConfirmRequest,
    responses(
        (status = 204, description = "Password updated"),
        (status = 400, description = "Invalid token or weak password")
    ),
    tag = "auth"
)]
pub async fn confirm_password_reset(
    state: Extension<Arc<AppState>>,
    payload: Option<Json<PasswordResetConfirmRequest>>,
) -> impl IntoResponse {
    let Some(Json(request)) = payload else {
        return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response();
    };

    let password = SecretString::from(request.password);
    match state.directory.reset_password(request.token.trim(), &password) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(AuthError::WeakPassword) => {
            (StatusCode::BAD_REQUEST, AuthError::WeakPassword.to_string()).into_response()
        }
        Err(AuthError::TokenGeneration) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Reset failed".to_string(),
        )
            .into_response(),
        Err(_) => (StatusCode::BAD_REQUEST, "Invalid token".to_string()).into_response(),
    }
}

fn signup_error(err: &AuthError) -> axum::response::Response {
    match err {
        AuthError::EmailTaken => {
            (StatusCode::CONFLICT, "Email already registered".to_string()).into_response()
        }
        AuthError::InvalidEmail | AuthError::WeakPassword => {
            (StatusCode::BAD_REQUEST, err.to_string()).into_response()
        }
        _ => {
            error!("Signup failed: {err}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Signup failed".to_string(),
            )
                .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::profile::{AccountStatus, Role};

    fn state() -> Extension<Arc<AppState>> {
        Extension(AppState::new("http://localhost:5173".to_string()))
    }

    fn donor_signup(email: &str) -> SignupRequest {
        SignupRequest {
            email: email.to_string(),
            password: "hunter2hunter2".to_string(),
            name: Some("Alice".to_string()),
        }
    }

    #[tokio::test]
    async fn signup_creates_an_active_donor_profile() {
        let state = state();
        let response = signup(state.clone(), Some(Json(donor_signup("alice@example.com"))))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::CREATED);

        let identity = state
            .directory
            .sign_in_with_password(
                "alice@example.com",
                &SecretString::from("hunter2hunter2".to_string()),
            )
            .expect("account exists");
        let profile = state
            .store
            .get(&identity.id)
            .await
            .expect("store reachable")
            .expect("profile stored");
        assert_eq!(profile.role, Role::IndividualDonor);
        assert_eq!(profile.status, AccountStatus::Active);
    }

    #[tokio::test]
    async fn signup_without_a_name_falls_back_to_the_default() {
        let state = state();
        let request = SignupRequest {
            name: None,
            ..donor_signup("anon@example.com")
        };
        signup(state.clone(), Some(Json(request))).await;

        let identity = state
            .directory
            .sign_in_with_password(
                "anon@example.com",
                &SecretString::from("hunter2hunter2".to_string()),
            )
            .expect("account exists");
        let profile = state
            .store
            .get(&identity.id)
            .await
            .expect("store reachable")
            .expect("profile stored");
        assert_eq!(profile.name, FALLBACK_DONOR_NAME);
    }

    #[tokio::test]
    async fn duplicate_signup_conflicts() {
        let state = state();
        signup(state.clone(), Some(Json(donor_signup("alice@example.com")))).await;
        let response = signup(state, Some(Json(donor_signup("alice@example.com"))))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn receiver_signup_starts_pending() {
        let state = state();
        let request = SignupReceiverRequest {
            email: "shelter@example.com".to_string(),
            password: "hunter2hunter2".to_string(),
            name: "Shelter".to_string(),
            registration_id: "NGO-42".to_string(),
            geo_verified: Some(true),
        };
        let response = signup_receiver(state.clone(), Some(Json(request)))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::CREATED);

        let pending = state.store.receivers_with_status(AccountStatus::Pending);
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].1.role, Role::InstitutionalReceiver);
    }

    #[tokio::test]
    async fn login_rejects_bad_credentials() {
        let state = state();
        signup(state.clone(), Some(Json(donor_signup("alice@example.com")))).await;

        let response = login(
            state,
            Some(Json(LoginRequest {
                email: "alice@example.com".to_string(),
                password: "wrong-password".to_string(),
            })),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn missing_payload_is_bad_request() {
        let response = signup(state(), None).await.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn logout_is_always_no_content() {
        let state = state();
        let response = logout(state, HeaderMap::new()).await.into_response();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn reset_request_never_reveals_registration() {
        let state = state();
        let response = request_password_reset(
            state,
            Some(Json(PasswordResetRequest {
                email: "ghost@example.com".to_string(),
            })),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }
}
