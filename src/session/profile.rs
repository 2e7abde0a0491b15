//! Application-side account records, keyed 1:1 by identity.

use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use utoipa::ToSchema;

use super::gate::Area;
use super::identity::Identity;

/// Display name used when the provider gives us nothing better.
pub const FALLBACK_DONOR_NAME: &str = "Valued Donor";

/// Account role. Immutable after registration; no code path changes an
/// existing account's role.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    IndividualDonor,
    InstitutionalReceiver,
    Admin,
}

impl Role {
    /// Dashboard area this role belongs to.
    #[must_use]
    pub const fn home_area(self) -> Area {
        match self {
            Self::IndividualDonor => Area::Donor,
            Self::InstitutionalReceiver => Area::Ngo,
            Self::Admin => Area::Admin,
        }
    }
}

/// Account standing. Only receiver accounts ever leave `Active`; transitions
/// out of `Pending` are an administrator action.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AccountStatus {
    Active,
    Pending,
    Suspended,
    Rejected,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum DonorBadge {
    Bronze,
    Silver,
    Gold,
}

/// Donation counters shown on the donor dashboard.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct DonorDetails {
    pub total_donations: u32,
    pub total_meals_donated: u32,
    pub badge: DonorBadge,
}

impl Default for DonorDetails {
    fn default() -> Self {
        Self {
            total_donations: 0,
            total_meals_donated: 0,
            badge: DonorBadge::Bronze,
        }
    }
}

/// Receiver (NGO) registration details reviewed by the administrator.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ReceiverDetails {
    pub registration_id: String,
    pub geo_verified: bool,
}

/// The stored account record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Profile {
    pub role: Role,
    pub status: AccountStatus,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    pub karma_points: i64,
    pub accepted_policies: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub donor: Option<DonorDetails>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receiver: Option<ReceiverDetails>,
    pub created_at_unix: i64,
}

impl Profile {
    /// Donor profiles start active with zeroed counters and a Bronze badge.
    #[must_use]
    pub fn new_donor(name: String, email: String) -> Self {
        Self {
            role: Role::IndividualDonor,
            status: AccountStatus::Active,
            name,
            email,
            phone: None,
            karma_points: 0,
            accepted_policies: false,
            donor: Some(DonorDetails::default()),
            receiver: None,
            created_at_unix: now_unix(),
        }
    }

    /// Receiver profiles always start pending administrator approval.
    #[must_use]
    pub fn new_receiver(
        name: String,
        email: String,
        registration_id: String,
        geo_verified: bool,
    ) -> Self {
        Self {
            role: Role::InstitutionalReceiver,
            status: AccountStatus::Pending,
            name,
            email,
            phone: None,
            karma_points: 0,
            accepted_policies: false,
            donor: None,
            receiver: Some(ReceiverDetails {
                registration_id,
                geo_verified,
            }),
            created_at_unix: now_unix(),
        }
    }

    #[must_use]
    pub fn new_admin(name: String, email: String) -> Self {
        Self {
            role: Role::Admin,
            status: AccountStatus::Active,
            name,
            email,
            phone: None,
            karma_points: 0,
            accepted_policies: false,
            donor: None,
            receiver: None,
            created_at_unix: now_unix(),
        }
    }

    /// Default record written when an identity has no matching profile.
    ///
    /// The role is a guess, not a verified fact: an authenticated principal
    /// must never be left stuck without a resolvable profile, so the repair
    /// materializes a donor record.
    #[must_use]
    pub fn synthesized_for(identity: &Identity) -> Self {
        let name = identity
            .display_name
            .clone()
            .unwrap_or_else(|| FALLBACK_DONOR_NAME.to_string());
        Self::new_donor(name, identity.email.clone())
    }
}

fn now_unix() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| elapsed.as_secs() as i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::identity::{AuthMethod, IdentityId};

    #[test]
    fn receiver_profiles_start_pending() {
        let profile = Profile::new_receiver(
            "Shelter".to_string(),
            "shelter@example.com".to_string(),
            "NGO-42".to_string(),
            true,
        );
        assert_eq!(profile.role, Role::InstitutionalReceiver);
        assert_eq!(profile.status, AccountStatus::Pending);
        assert!(profile.donor.is_none());
        assert_eq!(
            profile.receiver.as_ref().map(|r| r.registration_id.as_str()),
            Some("NGO-42")
        );
    }

    #[test]
    fn donor_profiles_start_active_with_bronze_badge() {
        let profile = Profile::new_donor("Alice".to_string(), "alice@example.com".to_string());
        assert_eq!(profile.status, AccountStatus::Active);
        assert_eq!(
            profile.donor.as_ref().map(|d| d.badge),
            Some(DonorBadge::Bronze)
        );
        assert_eq!(profile.karma_points, 0);
        assert!(!profile.accepted_policies);
    }

    #[test]
    fn roles_serialize_with_legacy_strings() {
        assert_eq!(
            serde_json::to_value(Role::IndividualDonor).expect("serialize role"),
            serde_json::json!("individual_donor")
        );
        assert_eq!(
            serde_json::to_value(Role::InstitutionalReceiver).expect("serialize role"),
            serde_json::json!("institutional_receiver")
        );
    }

    #[test]
    fn synthesized_profile_falls_back_on_display_name() {
        let identity = Identity {
            id: IdentityId::new(),
            email: "ghost@example.com".to_string(),
            email_verified: true,
            display_name: None,
            method: AuthMethod::Federated,
        };
        let profile = Profile::synthesized_for(&identity);
        assert_eq!(profile.name, FALLBACK_DONOR_NAME);
        assert_eq!(profile.role, Role::IndividualDonor);
        assert_eq!(profile.status, AccountStatus::Active);
    }
}
