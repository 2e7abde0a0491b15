//! Pure access decisions for the role-gated dashboard areas.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::identity::{AuthMethod, Identity};
use super::profile::{AccountStatus, Profile, Role};

/// Role-scoped dashboard area a caller may ask for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Area {
    Donor,
    Ngo,
    Admin,
}

/// Why access was blocked. Every reason maps to actionable user-facing text;
/// `WrongRole` is a routing mismatch, not an account problem, and always
/// comes with the correct destination.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum DenyReason {
    NotAuthenticated,
    EmailUnverified,
    PendingApproval,
    Suspended,
    Rejected,
    WrongRole,
}

/// Outcome of a gate evaluation. Derived, never persisted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AccessDecision {
    Allow(Area),
    Deny {
        reason: DenyReason,
        suggested: Option<Area>,
    },
}

const fn deny(reason: DenyReason) -> AccessDecision {
    AccessDecision::Deny {
        reason,
        suggested: None,
    }
}

/// Decide whether `principal` may enter `requested`. First match wins.
///
/// Ordering matters twice: the email check runs before the status gates
/// because an unverified account's role and status are not yet trustworthy,
/// and the role/area match runs last so a suspended receiver asking for the
/// donor area hears about the suspension, not the mismatch.
///
/// Pure function, no side effects; safe to re-evaluate on every profile
/// change and idempotent for identical snapshots.
#[must_use]
pub fn evaluate(principal: Option<(&Identity, &Profile)>, requested: Area) -> AccessDecision {
    let Some((identity, profile)) = principal else {
        return deny(DenyReason::NotAuthenticated);
    };

    // Federated identities arrive pre-verified by the provider.
    if identity.method == AuthMethod::Password && !identity.email_verified {
        return deny(DenyReason::EmailUnverified);
    }

    if profile.role == Role::InstitutionalReceiver {
        match profile.status {
            AccountStatus::Pending => return deny(DenyReason::PendingApproval),
            AccountStatus::Suspended => return deny(DenyReason::Suspended),
            AccountStatus::Rejected => return deny(DenyReason::Rejected),
            AccountStatus::Active => {}
        }
    }

    let home = profile.role.home_area();
    if requested != home {
        return AccessDecision::Deny {
            reason: DenyReason::WrongRole,
            suggested: Some(home),
        };
    }

    AccessDecision::Allow(home)
}
