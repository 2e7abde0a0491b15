//! Account directory: authentication state for the session core.
//!
//! Stands in for the hosted identity provider behind a small in-process API.
//! It owns credentials, email verification and password reset tokens; it
//! knows nothing about profiles. Not a production password store: salted
//! SHA-256 is enough for a stand-in whose records never leave the process.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use rand::{rngs::OsRng, RngCore};
use secrecy::{ExposeSecret, SecretString};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::info;

use crate::session::identity::{AuthMethod, Identity, IdentityId};

mod utils;

pub(crate) use utils::hash_token;
use utils::{build_verify_url, generate_token, normalize_email, valid_email};

const MIN_PASSWORD_LEN: usize = 8;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("email already registered")]
    EmailTaken,
    #[error("invalid email address")]
    InvalidEmail,
    #[error("password must be at least {MIN_PASSWORD_LEN} characters")]
    WeakPassword,
    #[error("invalid or expired token")]
    InvalidToken,
    #[error("token generation failed")]
    TokenGeneration,
}

#[derive(Clone)]
struct PasswordHash {
    salt: [u8; 16],
    hash: Vec<u8>,
}

impl PasswordHash {
    fn new(password: &SecretString) -> Result<Self, AuthError> {
        let mut salt = [0u8; 16];
        OsRng
            .try_fill_bytes(&mut salt)
            .map_err(|_| AuthError::TokenGeneration)?;
        let hash = Self::digest(&salt, password);
        Ok(Self { salt, hash })
    }

    fn matches(&self, password: &SecretString) -> bool {
        Self::digest(&self.salt, password) == self.hash
    }

    fn digest(salt: &[u8; 16], password: &SecretString) -> Vec<u8> {
        let mut hasher = Sha256::new();
        hasher.update(salt);
        hasher.update(password.expose_secret().as_bytes());
        hasher.finalize().to_vec()
    }
}

struct AccountRecord {
    identity: Identity,
    password: Option<PasswordHash>,
    verification_token_hash: Option<Vec<u8>>,
    reset_token_hash: Option<Vec<u8>>,
}

/// In-process account directory keyed by normalized email.
#[derive(Default)]
pub struct AccountDirectory {
    accounts: Mutex<HashMap<String, AccountRecord>>,
}

impl AccountDirectory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a password account. The account starts unverified; the
    /// returned token goes into the verification email, only its hash stays
    /// behind.
    pub fn sign_up_with_password(
        &self,
        email: &str,
        password: &SecretString,
        display_name: Option<String>,
    ) -> Result<(Identity, String), AuthError> {
        let email = normalize_email(email);
        if !valid_email(&email) {
            return Err(AuthError::InvalidEmail);
        }
        if password.expose_secret().len() < MIN_PASSWORD_LEN {
            return Err(AuthError::WeakPassword);
        }

        let token = generate_token()?;
        let hash = PasswordHash::new(password)?;

        let mut accounts = self.lock();
        if accounts.contains_key(&email) {
            return Err(AuthError::EmailTaken);
        }
        let identity = Identity {
            id: IdentityId::new(),
            email: email.clone(),
            email_verified: false,
            display_name,
            method: AuthMethod::Password,
        };
        accounts.insert(
            email,
            AccountRecord {
                identity: identity.clone(),
                password: Some(hash),
                verification_token_hash: Some(hash_token(&token)),
                reset_token_hash: None,
            },
        );
        Ok((identity, token))
    }

    /// Password sign-in. Unknown emails and federated-only accounts collapse
    /// into the same error as a wrong password.
    pub fn sign_in_with_password(
        &self,
        email: &str,
        password: &SecretString,
    ) -> Result<Identity, AuthError> {
        let email = normalize_email(email);
        let accounts = self.lock();
        let record = accounts.get(&email).ok_or(AuthError::InvalidCredentials)?;
        let stored = record
            .password
            .as_ref()
            .ok_or(AuthError::InvalidCredentials)?;
        if !stored.matches(password) {
            return Err(AuthError::InvalidCredentials);
        }
        Ok(record.identity.clone())
    }

    /// Federated sign-in. The provider vouches for the email, so the account
    /// is created verified on first use.
    pub fn sign_in_federated(
        &self,
        email: &str,
        display_name: Option<String>,
    ) -> Result<Identity, AuthError> {
        let email = normalize_email(email);
        if !valid_email(&email) {
            return Err(AuthError::InvalidEmail);
        }
        let mut accounts = self.lock();
        if let Some(record) = accounts.get_mut(&email) {
            record.identity.email_verified = true;
            record.verification_token_hash = None;
            return Ok(record.identity.clone());
        }
        let identity = Identity {
            id: IdentityId::new(),
            email: email.clone(),
            email_verified: true,
            display_name,
            method: AuthMethod::Federated,
        };
        accounts.insert(
            email,
            AccountRecord {
                identity: identity.clone(),
                password: None,
                verification_token_hash: None,
                reset_token_hash: None,
            },
        );
        Ok(identity)
    }

    /// Redeem a verification token, returning the refreshed identity.
    pub fn verify_email(&self, token: &str) -> Result<Identity, AuthError> {
        let hash = hash_token(token);
        let mut accounts = self.lock();
        let record = accounts
            .values_mut()
            .find(|record| record.verification_token_hash.as_deref() == Some(hash.as_slice()))
            .ok_or(AuthError::InvalidToken)?;
        record.identity.email_verified = true;
        record.verification_token_hash = None;
        Ok(record.identity.clone())
    }

    /// Issue a password reset token. Unknown emails return `Ok(None)` so the
    /// caller can answer identically either way and not leak which addresses
    /// are registered.
    pub fn request_password_reset(&self, email: &str) -> Result<Option<String>, AuthError> {
        let email = normalize_email(email);
        let token = generate_token()?;
        let mut accounts = self.lock();
        match accounts.get_mut(&email) {
            Some(record) if record.password.is_some() => {
                record.reset_token_hash = Some(hash_token(&token));
                Ok(Some(token))
            }
            _ => Ok(None),
        }
    }

    /// Redeem a reset token and set a new password. Single use.
    pub fn reset_password(
        &self,
        token: &str,
        new_password: &SecretString,
    ) -> Result<(), AuthError> {
        if new_password.expose_secret().len() < MIN_PASSWORD_LEN {
            return Err(AuthError::WeakPassword);
        }
        let hash = hash_token(token);
        let new_hash = PasswordHash::new(new_password)?;
        let mut accounts = self.lock();
        let record = accounts
            .values_mut()
            .find(|record| record.reset_token_hash.as_deref() == Some(hash.as_slice()))
            .ok_or(AuthError::InvalidToken)?;
        record.password = Some(new_hash);
        record.reset_token_hash = None;
        Ok(())
    }

    /// Upsert the bootstrap admin account, verified from the start.
    pub fn seed_admin(
        &self,
        email: &str,
        password: &SecretString,
    ) -> Result<Identity, AuthError> {
        let email = normalize_email(email);
        if !valid_email(&email) {
            return Err(AuthError::InvalidEmail);
        }
        if password.expose_secret().len() < MIN_PASSWORD_LEN {
            return Err(AuthError::WeakPassword);
        }
        let hash = PasswordHash::new(password)?;
        let mut accounts = self.lock();
        if let Some(record) = accounts.get_mut(&email) {
            record.identity.email_verified = true;
            record.password = Some(hash);
            record.verification_token_hash = None;
            return Ok(record.identity.clone());
        }
        let identity = Identity {
            id: IdentityId::new(),
            email: email.clone(),
            email_verified: true,
            display_name: None,
            method: AuthMethod::Password,
        };
        accounts.insert(
            email,
            AccountRecord {
                identity: identity.clone(),
                password: Some(hash),
                verification_token_hash: None,
                reset_token_hash: None,
            },
        );
        Ok(identity)
    }

    /// Log the verification link. Stand-in for the outbound email service.
    pub fn announce_verification(&self, frontend_base_url: &str, email: &str, token: &str) {
        let url = build_verify_url(frontend_base_url, token);
        info!(%email, %url, "verification email queued");
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, AccountRecord>> {
        self.accounts.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
