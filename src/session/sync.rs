//! Live profile synchronization for a resolved session.

use tokio::sync::watch;
use tracing::debug;

use super::identity::Identity;
use super::profile::Profile;
use super::{publish, SessionState};
use crate::store::ProfileStore;

/// Why the synchronizer stopped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(super) enum SyncExit {
    /// The record disappeared mid-session; the caller re-resolves, which
    /// repairs the orphan.
    RecordMissing,
    /// The subscription channel closed; the caller re-subscribes after a
    /// pause.
    SubscriptionLost,
}

/// Publish gate-ready snapshots for `identity` until the subscription dies.
///
/// The controller cancels this future when the principal changes, which
/// drops the watch receiver and with it the subscription — there is never a
/// live subscription against a stale identifier.
pub(super) async fn synchronize<S: ProfileStore>(
    store: &S,
    identity: &Identity,
    resolved: Profile,
    states: &watch::Sender<SessionState>,
) -> SyncExit {
    let mut profiles = store.subscribe(&identity.id);

    // The subscription may lag the resolver's read (or its repair write);
    // "not present yet" at this point is a race, not an absence.
    let profile = profiles.borrow_and_update().clone().unwrap_or(resolved);
    publish(
        states,
        SessionState::Active {
            identity: identity.clone(),
            profile,
        },
    );

    loop {
        if profiles.changed().await.is_err() {
            return SyncExit::SubscriptionLost;
        }
        match profiles.borrow_and_update().clone() {
            Some(profile) => {
                debug!(identity = %identity.id, "profile snapshot updated");
                publish(
                    states,
                    SessionState::Active {
                        identity: identity.clone(),
                        profile,
                    },
                );
            }
            None => return SyncExit::RecordMissing,
        }
    }
}
