//! HTTP surface: routing, state wiring, and server startup.

use anyhow::{anyhow, Context, Result};
use axum::{
    body::Body,
    extract::MatchedPath,
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        HeaderName, HeaderValue, Method, Request,
    },
    routing::{get, post},
    Extension, Router,
};
use secrecy::SecretString;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    request_id::PropagateRequestIdLayer,
    set_header::SetRequestHeaderLayer,
    trace::TraceLayer,
};
use tracing::{info, info_span, Span};
use ulid::Ulid;
use url::Url;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::auth::AccountDirectory;
use crate::session::{Profile, SessionConfig};
use crate::store::{MemoryProfileStore, ProfileStore};

pub(crate) mod handlers;
pub mod sessions;

use handlers::{access, admin, auth, health, me};
use sessions::SessionRegistry;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

/// Shared state behind an [`Extension`] layer.
pub struct AppState {
    pub directory: AccountDirectory,
    pub store: Arc<MemoryProfileStore>,
    pub sessions: SessionRegistry<MemoryProfileStore>,
    pub frontend_base_url: String,
}

impl AppState {
    #[must_use]
    pub fn new(frontend_base_url: String) -> Arc<Self> {
        let store = Arc::new(MemoryProfileStore::new());
        let sessions = SessionRegistry::new(store.clone(), SessionConfig::default());
        Arc::new(Self {
            directory: AccountDirectory::new(),
            store,
            sessions,
            frontend_base_url,
        })
    }
}

/// Bootstrap admin credentials, taken from the CLI at startup.
pub struct AdminSeed {
    pub email: String,
    pub password: SecretString,
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "replate",
        description = "Food donation coordination API",
        license(name = "BSD-3-Clause")
    ),
    paths(
        health::health,
        auth::signup,
        auth::signup_receiver,
        auth::login,
        auth::login_federated,
        auth::logout,
        auth::verify_email,
        auth::request_password_reset,
        auth::confirm_password_reset,
        access::session,
        access::access,
        me::me,
        me::accept_policies,
        admin::list_receivers,
        admin::approve_receiver,
        admin::reject_receiver,
        admin::suspend_receiver,
    ),
    components(schemas(
        health::Health,
        auth::SignupRequest,
        auth::SignupReceiverRequest,
        auth::LoginRequest,
        auth::FederatedLoginRequest,
        auth::LoginResponse,
        auth::VerifyEmailRequest,
        auth::PasswordResetRequest,
        auth::PasswordResetConfirmRequest,
        me::Me,
        admin::ReceiverSummary,
        crate::session::AccessState,
        crate::session::Area,
        crate::session::DenyReason,
        crate::session::Profile,
        crate::session::Role,
        crate::session::AccountStatus,
        crate::session::IdentityId,
        crate::session::profile::DonorDetails,
        crate::session::profile::DonorBadge,
        crate::session::profile::ReceiverDetails,
    )),
    tags(
        (name = "health", description = "Service health"),
        (name = "auth", description = "Registration and sign-in"),
        (name = "session", description = "Session and access snapshots"),
        (name = "me", description = "Signed-in principal"),
        (name = "admin", description = "Receiver review queue"),
    )
)]
struct ApiDoc;

/// Start the server
/// # Errors
/// Return error if failed to start the server
pub async fn new(port: u16, frontend_base_url: String, admin: Option<AdminSeed>) -> Result<()> {
    let state = AppState::new(frontend_base_url.clone());

    if let Some(seed) = admin {
        let identity = state.directory.seed_admin(&seed.email, &seed.password)?;
        state
            .store
            .put(
                &identity.id,
                Profile::new_admin("Admin".to_string(), identity.email.clone()),
            )
            .await
            .context("Failed to seed admin profile")?;
        info!(email = %identity.email, "admin account seeded");
    }

    let frontend_origin = frontend_origin(&frontend_base_url)?;
    let cors = CorsLayer::new()
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .allow_methods([Method::GET, Method::POST])
        .allow_origin(AllowOrigin::exact(frontend_origin));

    let app = Router::new()
        .route("/v1/auth/signup", post(auth::signup))
        .route("/v1/auth/signup/receiver", post(auth::signup_receiver))
        .route("/v1/auth/login", post(auth::login))
        .route("/v1/auth/login/federated", post(auth::login_federated))
        .route("/v1/auth/logout", post(auth::logout))
        .route("/v1/auth/verify-email", post(auth::verify_email))
        .route("/v1/auth/password-reset", post(auth::request_password_reset))
        .route(
            "/v1/auth/password-reset/confirm",
            post(auth::confirm_password_reset),
        )
        .route("/v1/session", get(access::session))
        .route("/v1/session/access", get(access::access))
        .route("/v1/me", get(me::me))
        .route("/v1/me/policies", post(me::accept_policies))
        .route("/v1/admin/receivers", get(admin::list_receivers))
        .route(
            "/v1/admin/receivers/:id/approve",
            post(admin::approve_receiver),
        )
        .route(
            "/v1/admin/receivers/:id/reject",
            post(admin::reject_receiver),
        )
        .route(
            "/v1/admin/receivers/:id/suspend",
            post(admin::suspend_receiver),
        )
        .route("/health", get(health::health).options(health::health))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static("x-request-id"),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    "x-request-id",
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(cors)
                .layer(Extension(state.clone())),
        )
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Gracefully shutdown");
        })
        .await?;

    Ok(())
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}

fn frontend_origin(frontend_base_url: &str) -> Result<HeaderValue> {
    let parsed = Url::parse(frontend_base_url)
        .with_context(|| format!("Invalid frontend base URL: {frontend_base_url}"))?;
    let host = parsed.host_str().ok_or_else(|| {
        anyhow!("Frontend base URL must include a valid host: {frontend_base_url}")
    })?;
    let port = parsed
        .port()
        .map_or_else(String::new, |port| format!(":{port}"));
    let origin = format!("{}://{}{}", parsed.scheme(), host, port);
    HeaderValue::from_str(&origin).context("Failed to build frontend origin header")
}
