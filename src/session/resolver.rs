//! Session resolution: turn an authenticated identity into a stored profile.

use tracing::info;

use super::identity::Identity;
use super::profile::Profile;
use crate::store::{ProfileStore, StoreError};

/// Result of a single resolution attempt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Resolution {
    pub profile: Profile,
    /// True when the profile record was missing and a default one was
    /// written back (orphaned account).
    pub repaired: bool,
}

/// Look up the profile for `identity`, writing a default donor record when
/// none exists so an authenticated principal is never left unresolvable.
///
/// One attempt only; the controller owns retry pacing. A failed lookup or
/// repair write surfaces as [`StoreError`], which callers report as a
/// transient unresolved state, never as signed-out or denied.
pub async fn resolve<S: ProfileStore>(
    store: &S,
    identity: &Identity,
) -> Result<Resolution, StoreError> {
    if let Some(profile) = store.get(&identity.id).await? {
        return Ok(Resolution {
            profile,
            repaired: false,
        });
    }

    let profile = Profile::synthesized_for(identity);
    store.put(&identity.id, profile.clone()).await?;
    info!(identity = %identity.id, "repaired orphaned account with a default donor profile");

    Ok(Resolution {
        profile,
        repaired: true,
    })
}
