//! The authenticated principal as issued by the identity provider.

use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;
use uuid::Uuid;

/// Opaque identifier for an authenticated principal.
///
/// The identity provider owns the value for the principal's lifetime; the
/// profile store uses it as the record key, so a principal can never map to
/// more than one profile.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
#[schema(value_type = String)]
pub struct IdentityId(Uuid);

impl IdentityId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for IdentityId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for IdentityId {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

impl From<IdentityId> for Uuid {
    fn from(value: IdentityId) -> Self {
        value.0
    }
}

impl fmt::Display for IdentityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// How the principal proved who they are.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AuthMethod {
    /// Email and password held by the directory; the email must be verified
    /// before any dashboard is reachable.
    Password,
    /// Federated (Google) sign-in; the provider already verified the email.
    Federated,
}

/// Snapshot of an authenticated principal.
///
/// Owned and mutated only by the authentication provider; the session core
/// treats it as read-only. `email_verified` flips false to true exactly once.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Identity {
    pub id: IdentityId,
    pub email: String,
    pub email_verified: bool,
    pub display_name: Option<String>,
    pub method: AuthMethod,
}
