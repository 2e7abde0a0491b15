//! End-to-end session flows against the public library surface.

use std::time::Duration;

use secrecy::SecretString;

use replate::replate::AppState;
use replate::session::{
    AccessState, AccountStatus, Area, DenyReason, Profile, SessionState,
};
use replate::store::ProfileStore;

const FRONTEND: &str = "http://localhost:5173";

fn password(value: &str) -> SecretString {
    SecretString::from(value.to_string())
}

async fn wait_for_active(state: &AppState, token: &str) {
    tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            if matches!(
                state.sessions.state(token),
                Some(SessionState::Active { .. })
            ) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("session resolves within deadline");
}

async fn wait_for_access(state: &AppState, token: &str, area: Area, expected: AccessState) {
    tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            if state.sessions.access(token, Some(area)) == Some(expected) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("access snapshot reaches the expected state");
}

#[tokio::test]
async fn receiver_approval_unlocks_a_live_session() {
    let state = AppState::new(FRONTEND.to_string());

    // A shelter registers and verifies its email.
    let (identity, token) = state
        .directory
        .sign_up_with_password(
            "shelter@example.com",
            &password("hunter2hunter2"),
            Some("Shelter".to_string()),
        )
        .expect("sign up");
    state
        .store
        .put(
            &identity.id,
            Profile::new_receiver(
                "Shelter".to_string(),
                identity.email.clone(),
                "NGO-42".to_string(),
                true,
            ),
        )
        .await
        .expect("store profile");
    state.directory.verify_email(&token).expect("verify email");

    // Sign in; the account is pending so every area is locked.
    let identity = state
        .directory
        .sign_in_with_password("shelter@example.com", &password("hunter2hunter2"))
        .expect("sign in");
    let session_token = state.sessions.create(identity.clone());
    wait_for_active(&state, &session_token).await;
    assert_eq!(
        state.sessions.access(&session_token, Some(Area::Ngo)),
        Some(AccessState::Denied {
            reason: DenyReason::PendingApproval,
            suggested: None
        })
    );

    // Admin approval lands in the store while the session is live.
    let mut profile = state
        .store
        .get(&identity.id)
        .await
        .expect("store reachable")
        .expect("profile exists");
    profile.status = AccountStatus::Active;
    state
        .store
        .put(&identity.id, profile)
        .await
        .expect("approve receiver");

    // The session observes the write; no new sign-in happened.
    wait_for_access(
        &state,
        &session_token,
        Area::Ngo,
        AccessState::Allowed { area: Area::Ngo },
    )
    .await;
}

#[tokio::test]
async fn donor_is_redirected_away_from_the_ngo_area() {
    let state = AppState::new(FRONTEND.to_string());
    let identity = state
        .directory
        .sign_in_federated("donor@example.com", Some("Donor".to_string()))
        .expect("federated sign in");
    let token = state.sessions.create(identity);
    wait_for_active(&state, &token).await;

    // Federated accounts skip email verification; the donor area opens.
    assert_eq!(
        state.sessions.access(&token, None),
        Some(AccessState::Allowed { area: Area::Donor })
    );
    // The wrong area names where the donor belongs instead.
    assert_eq!(
        state.sessions.access(&token, Some(Area::Ngo)),
        Some(AccessState::Denied {
            reason: DenyReason::WrongRole,
            suggested: Some(Area::Donor)
        })
    );
}

#[tokio::test]
async fn email_verification_unlocks_a_live_session() {
    let state = AppState::new(FRONTEND.to_string());
    let (_, verification_token) = state
        .directory
        .sign_up_with_password(
            "alice@example.com",
            &password("hunter2hunter2"),
            Some("Alice".to_string()),
        )
        .expect("sign up");

    let identity = state
        .directory
        .sign_in_with_password("alice@example.com", &password("hunter2hunter2"))
        .expect("sign in");
    state
        .store
        .put(
            &identity.id,
            Profile::new_donor("Alice".to_string(), identity.email.clone()),
        )
        .await
        .expect("store profile");

    let token = state.sessions.create(identity);
    wait_for_active(&state, &token).await;
    assert_eq!(
        state.sessions.access(&token, None),
        Some(AccessState::Denied {
            reason: DenyReason::EmailUnverified,
            suggested: None
        })
    );

    // Verification flows into the live session through the registry.
    let verified = state
        .directory
        .verify_email(&verification_token)
        .expect("verify email");
    state.sessions.refresh_identity(&verified);

    wait_for_access(
        &state,
        &token,
        Area::Donor,
        AccessState::Allowed { area: Area::Donor },
    )
    .await;
}

#[tokio::test]
async fn federated_sign_in_repairs_a_missing_profile() {
    let state = AppState::new(FRONTEND.to_string());
    // No profile is ever written for this principal; the controller
    // synthesizes a donor record on first resolution.
    let identity = state
        .directory
        .sign_in_federated("new-donor@example.com", None)
        .expect("federated sign in");
    let token = state.sessions.create(identity.clone());
    wait_for_active(&state, &token).await;

    let profile = state
        .store
        .get(&identity.id)
        .await
        .expect("store reachable")
        .expect("profile repaired");
    assert_eq!(profile.status, AccountStatus::Active);
    assert_eq!(
        state.sessions.access(&token, None),
        Some(AccessState::Allowed { area: Area::Donor })
    );
}
