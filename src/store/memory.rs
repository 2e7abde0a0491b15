//! In-memory, watch-backed profile store.
//!
//! Stands in for the hosted document database behind the [`ProfileStore`]
//! boundary. Every record is a watch channel so subscribers observe writes
//! in application order without polling.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use tokio::sync::watch;

use super::{ProfileStore, StoreError};
use crate::session::identity::IdentityId;
use crate::session::profile::{AccountStatus, Profile, Role};

#[derive(Debug, Default)]
pub struct MemoryProfileStore {
    records: Mutex<HashMap<IdentityId, watch::Sender<Option<Profile>>>>,
}

impl MemoryProfileStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of receiver profiles in the given standing, for the admin
    /// review queue. A store-specific query, deliberately outside the
    /// [`ProfileStore`] contract.
    #[must_use]
    pub fn receivers_with_status(&self, status: AccountStatus) -> Vec<(IdentityId, Profile)> {
        let records = self.lock();
        let mut matches: Vec<(IdentityId, Profile)> = records
            .iter()
            .filter_map(|(id, sender)| {
                let profile = sender.borrow().clone()?;
                (profile.role == Role::InstitutionalReceiver && profile.status == status)
                    .then_some((*id, profile))
            })
            .collect();
        matches.sort_by_key(|(_, profile)| profile.created_at_unix);
        matches
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<IdentityId, watch::Sender<Option<Profile>>>> {
        // A poisoned map only means another writer panicked mid-insert; the
        // data itself is still a valid snapshot.
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn sender(&self, id: &IdentityId) -> watch::Sender<Option<Profile>> {
        let mut records = self.lock();
        records
            .entry(*id)
            .or_insert_with(|| watch::channel(None).0)
            .clone()
    }
}

impl ProfileStore for MemoryProfileStore {
    async fn get(&self, id: &IdentityId) -> Result<Option<Profile>, StoreError> {
        let records = self.lock();
        Ok(records
            .get(id)
            .and_then(|sender| sender.borrow().clone()))
    }

    async fn put(&self, id: &IdentityId, profile: Profile) -> Result<(), StoreError> {
        self.sender(id).send_replace(Some(profile));
        Ok(())
    }

    fn subscribe(&self, id: &IdentityId) -> watch::Receiver<Option<Profile>> {
        self.sender(id).subscribe()
    }
}
