//! Session and access authorization core.
//!
//! One controller task per session: it follows the authentication-state
//! stream, resolves the principal's profile (repairing orphaned accounts),
//! keeps the profile synchronized against the store, and publishes access
//! snapshots through a watch channel. Switching principals cancels any
//! in-flight resolution together with its subscription, so a late result can
//! never overwrite the state of a newer session.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{info_span, warn, Instrument};
use ulid::Ulid;
use utoipa::ToSchema;

use crate::store::ProfileStore;

pub mod gate;
pub mod identity;
pub mod profile;
pub mod resolver;
mod sync;

pub use gate::{AccessDecision, Area, DenyReason};
pub use identity::{AuthMethod, Identity, IdentityId};
pub use profile::{AccountStatus, Profile, Role};

const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_millis(500);

/// Tuning for the session controller.
#[derive(Clone, Debug)]
pub struct SessionConfig {
    retry_backoff: Duration,
}

impl SessionConfig {
    #[must_use]
    pub fn new() -> Self {
        Self {
            retry_backoff: DEFAULT_RETRY_BACKOFF,
        }
    }

    /// Pause between resolution attempts while the store is unavailable.
    #[must_use]
    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    #[must_use]
    pub fn retry_backoff(&self) -> Duration {
        self.retry_backoff
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolved view of the current principal.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionState {
    /// Resolution in flight or backend unavailable. Not signed out; callers
    /// show a retry indicator, never an access-denied message.
    Unresolved,
    SignedOut,
    Active { identity: Identity, profile: Profile },
}

impl SessionState {
    /// Access snapshot for `requested`, defaulting to the role's home area
    /// so `Allowed` always names a concrete destination.
    #[must_use]
    pub fn access(&self, requested: Option<Area>) -> AccessState {
        match self {
            Self::Unresolved => AccessState::Unresolved,
            Self::SignedOut => AccessState::SignedOut,
            Self::Active { identity, profile } => {
                let area = requested.unwrap_or_else(|| profile.role.home_area());
                match gate::evaluate(Some((identity, profile)), area) {
                    AccessDecision::Allow(area) => AccessState::Allowed { area },
                    AccessDecision::Deny { reason, suggested } => {
                        AccessState::Denied { reason, suggested }
                    }
                }
            }
        }
    }
}

/// Caller-facing access snapshot; what routers and dashboards subscribe to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AccessState {
    Unresolved,
    SignedOut,
    Allowed {
        area: Area,
    },
    Denied {
        reason: DenyReason,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        suggested: Option<Area>,
    },
}

/// Handle to a running session controller.
///
/// Dropping the handle aborts the controller task, which tears down its
/// profile subscription with it.
#[derive(Debug)]
pub struct SessionHandle {
    states: watch::Receiver<SessionState>,
    task: JoinHandle<()>,
}

impl SessionHandle {
    /// Spawn a controller following `auth`, the authentication-state stream
    /// (`Some(identity)` on sign-in, `None` on sign-out).
    pub fn spawn<S: ProfileStore>(
        auth: watch::Receiver<Option<Identity>>,
        store: Arc<S>,
        config: SessionConfig,
    ) -> Self {
        let (states_tx, states_rx) = watch::channel(SessionState::Unresolved);
        let task = tokio::spawn(run(auth, store, config, states_tx));
        Self {
            states: states_rx,
            task,
        }
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        self.states.borrow().clone()
    }

    /// Access snapshot for `requested` (the role's home area when `None`).
    #[must_use]
    pub fn access(&self, requested: Option<Area>) -> AccessState {
        self.state().access(requested)
    }

    /// Reactive subscription for guards and routers.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.states.clone()
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn run<S: ProfileStore>(
    mut auth: watch::Receiver<Option<Identity>>,
    store: Arc<S>,
    config: SessionConfig,
    states: watch::Sender<SessionState>,
) {
    loop {
        let current = auth.borrow_and_update().clone();
        match current {
            None => {
                publish(&states, SessionState::SignedOut);
                if auth.changed().await.is_err() {
                    return;
                }
            }
            Some(identity) => {
                // The session token tags every log line for this sign-in.
                let session = Ulid::new();
                let span = info_span!("session", %session, identity = %identity.id);
                publish(&states, SessionState::Unresolved);
                tokio::select! {
                    changed = auth.changed() => {
                        // Principal switched or provider gone; the branch
                        // below is dropped along with any in-flight store
                        // call, so its result can never be applied here.
                        if changed.is_err() {
                            return;
                        }
                    }
                    () = run_session(store.as_ref(), &identity, &config, &states).instrument(span) => {}
                }
            }
        }
    }
}

/// Resolve and synchronize one signed-in principal, retrying forever.
/// Only cancellation by the caller ends this future.
async fn run_session<S: ProfileStore>(
    store: &S,
    identity: &Identity,
    config: &SessionConfig,
    states: &watch::Sender<SessionState>,
) {
    loop {
        match resolver::resolve(store, identity).await {
            Ok(resolution) => match sync::synchronize(store, identity, resolution.profile, states).await {
                sync::SyncExit::RecordMissing => {
                    // The record vanished out from under the session;
                    // resolving again repairs the orphan.
                    publish(states, SessionState::Unresolved);
                }
                sync::SyncExit::SubscriptionLost => {
                    publish(states, SessionState::Unresolved);
                    warn!(identity = %identity.id, "profile subscription lost, re-subscribing");
                    sleep(config.retry_backoff()).await;
                }
            },
            Err(err) => {
                // Transient backend failure is never a deny.
                publish(states, SessionState::Unresolved);
                warn!(identity = %identity.id, "profile resolution failed: {err}");
                sleep(config.retry_backoff()).await;
            }
        }
    }
}

/// Replace the published state, dropping re-delivered identical snapshots so
/// downstream consumers stay idempotent.
fn publish(states: &watch::Sender<SessionState>, next: SessionState) {
    states.send_if_modified(|current| {
        if *current == next {
            false
        } else {
            *current = next;
            true
        }
    });
}
