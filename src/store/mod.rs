//! Profile store boundary.
//!
//! The store is the single source of truth for account profiles; the session
//! core only reads it, except for the one orphan-repair write. Change
//! notifications arrive through watch subscriptions in the order the backend
//! applies them; consumers must be idempotent.

use std::future::Future;

use thiserror::Error;
use tokio::sync::watch;

use crate::session::identity::IdentityId;
use crate::session::profile::Profile;

pub mod memory;

pub use memory::MemoryProfileStore;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    /// Backend unreachable. Transient: callers retry, they never translate
    /// this into an access denial.
    #[error("profile store unavailable")]
    Unavailable,
}

/// Minimal contract against the remote document store.
pub trait ProfileStore: Send + Sync + 'static {
    /// Fetch the profile keyed by `id`; `Ok(None)` when no record exists.
    fn get(
        &self,
        id: &IdentityId,
    ) -> impl Future<Output = Result<Option<Profile>, StoreError>> + Send;

    /// Upsert the record keyed by `id`.
    fn put(
        &self,
        id: &IdentityId,
        profile: Profile,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Live subscription to the record keyed by `id`. The receiver holds the
    /// latest snapshot, `None` until the record exists. Dropping the receiver
    /// unsubscribes; a closed channel means the backing subscription is gone
    /// and the caller should re-subscribe.
    fn subscribe(&self, id: &IdentityId) -> watch::Receiver<Option<Profile>>;
}
