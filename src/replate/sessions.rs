//! Bearer-token registry of live session controllers.
//!
//! One [`SessionHandle`] per issued token. The registry keys entries by the
//! SHA-256 of the token, so raw bearer values never sit in memory longer than
//! a request. Expired entries are swept on insert and rejected on lookup.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tokio::sync::watch;
use ulid::Ulid;

use crate::auth::hash_token;
use crate::session::{AccessState, Area, Identity, IdentityId, SessionConfig, SessionHandle, SessionState};
use crate::store::ProfileStore;

const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(12 * 60 * 60);

struct SessionEntry {
    auth: watch::Sender<Option<Identity>>,
    handle: SessionHandle,
    identity_id: IdentityId,
    created_at: Instant,
}

pub struct SessionRegistry<S: ProfileStore> {
    store: Arc<S>,
    config: SessionConfig,
    ttl: Duration,
    sessions: Mutex<HashMap<Vec<u8>, SessionEntry>>,
}

impl<S: ProfileStore> SessionRegistry<S> {
    #[must_use]
    pub fn new(store: Arc<S>, config: SessionConfig) -> Self {
        Self {
            store,
            config,
            ttl: DEFAULT_SESSION_TTL,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Spawn a controller for `identity` and hand back the bearer token.
    /// Only the token's hash is retained.
    #[must_use]
    pub fn create(&self, identity: Identity) -> String {
        let token = Ulid::new().to_string();
        let (auth, auth_rx) = watch::channel(Some(identity.clone()));
        let handle = SessionHandle::spawn(auth_rx, self.store.clone(), self.config.clone());

        let mut sessions = self.lock();
        sessions.retain(|_, entry| entry.created_at.elapsed() < self.ttl);
        sessions.insert(
            hash_token(&token),
            SessionEntry {
                auth,
                handle,
                identity_id: identity.id,
                created_at: Instant::now(),
            },
        );
        token
    }

    /// Current session state for `token`; `None` for unknown or expired
    /// tokens.
    #[must_use]
    pub fn state(&self, token: &str) -> Option<SessionState> {
        self.with_entry(token, |entry| entry.handle.state())
    }

    /// Access snapshot for `token`, gated on `requested` (the role's home
    /// area when `None`).
    #[must_use]
    pub fn access(&self, token: &str, requested: Option<Area>) -> Option<AccessState> {
        self.with_entry(token, |entry| entry.handle.access(requested))
    }

    /// Identity behind `token`, for handlers that write to the store.
    #[must_use]
    pub fn identity_id(&self, token: &str) -> Option<IdentityId> {
        self.with_entry(token, |entry| entry.identity_id)
    }

    /// Push a refreshed identity snapshot into every live session of that
    /// principal, e.g. after email verification. Controllers re-resolve
    /// without a new sign-in.
    pub fn refresh_identity(&self, identity: &Identity) {
        let sessions = self.lock();
        for entry in sessions.values() {
            if entry.identity_id == identity.id {
                entry.auth.send_replace(Some(identity.clone()));
            }
        }
    }

    /// Drop the session for `token`. Returns false when nothing matched.
    pub fn remove(&self, token: &str) -> bool {
        let mut sessions = self.lock();
        sessions.remove(hash_token(token).as_slice()).is_some()
    }

    fn with_entry<T>(&self, token: &str, read: impl FnOnce(&SessionEntry) -> T) -> Option<T> {
        let mut sessions = self.lock();
        let hash = hash_token(token);
        let expired = sessions
            .get(hash.as_slice())
            .is_some_and(|entry| entry.created_at.elapsed() >= self.ttl);
        if expired {
            sessions.remove(hash.as_slice());
            return None;
        }
        sessions.get(hash.as_slice()).map(read)
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<Vec<u8>, SessionEntry>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
