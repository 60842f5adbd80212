//! Identity collaborator: principals, profiles, and the provider seam.
//!
//! The engine never authenticates anyone itself — authentication is an
//! external collaborator (the original product delegates to a hosted identity
//! service). What the core needs is the *shape* of the session: an opaque
//! principal id plus an authenticated flag, and the stored profile carrying
//! the quota counter and premium flag. Workflow operations take these as
//! explicit parameters instead of reading ambient session state, so policy
//! stays testable without any sign-in machinery.
//!
//! [`MemoryIdentity`] is the in-process implementation used by tests and the
//! CLI wiring. It stores sha-256 password digests, which is enough for a
//! simulation seam and keeps plaintext out of the state file.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::EngineError;
use crate::quota::ProfileStore;

/// The acting identity for a session.
///
/// `id` is opaque to the engine — it is only ever compared and stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: String,
    pub authenticated: bool,
}

impl Principal {
    /// An authenticated principal with the given opaque id.
    pub fn authenticated(id: impl Into<String>) -> Self {
        Self { id: id.into(), authenticated: true }
    }

    /// The anonymous, unauthenticated principal.
    pub fn anonymous() -> Self {
        Self { id: String::new(), authenticated: false }
    }
}

/// The stored profile behind an authenticated principal.
///
/// `conversion_count` is monotonically non-decreasing; upgrading to premium
/// does not reset it — premium simply bypasses the quota check.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub full_name: String,
    pub conversion_count: u32,
    pub is_premium: bool,
}

/// The identity collaborator surface.
///
/// The conversion core only ever *reads* these shapes; `sign_up` / `sign_in` /
/// `sign_out` exist for the presentation layer. Implementations must be
/// `Send + Sync` behind an `Arc`.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Register a new account and return its authenticated principal.
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        full_name: &str,
    ) -> Result<Principal, EngineError>;

    /// Authenticate by email and password.
    async fn sign_in(&self, email: &str, password: &str) -> Result<Principal, EngineError>;

    /// End the principal's session. A no-op for unknown principals.
    async fn sign_out(&self, principal_id: &str) -> Result<(), EngineError>;

    /// Fetch the current stored profile for a principal.
    async fn refresh_profile(&self, principal_id: &str) -> Result<UserProfile, EngineError>;
}

// ── In-process implementation ────────────────────────────────────────────

#[derive(Debug, Clone)]
struct Account {
    email: String,
    password_digest: String,
    profile: UserProfile,
}

/// In-process identity provider and profile store.
///
/// Accounts live in a `tokio::sync::Mutex<HashMap>`; every profile mutation
/// happens under the lock, which is what makes
/// [`ProfileStore::increment_conversions`] a single check-and-increment
/// against the authoritative copy.
#[derive(Default)]
pub struct MemoryIdentity {
    accounts: Mutex<HashMap<String, Account>>,
}

impl MemoryIdentity {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Seed an account directly, bypassing sign-up. Test and demo helper.
    pub async fn seed(&self, principal_id: &str, email: &str, profile: UserProfile) {
        let mut accounts = self.accounts.lock().await;
        accounts.insert(
            principal_id.to_string(),
            Account {
                email: email.to_string(),
                password_digest: digest(""),
                profile,
            },
        );
    }

    /// Flip the premium flag on a stored profile. Stands in for the external
    /// payment-verification process that activates subscriptions.
    pub async fn set_premium(&self, principal_id: &str, premium: bool) -> Result<(), EngineError> {
        let mut accounts = self.accounts.lock().await;
        let account = accounts
            .get_mut(principal_id)
            .ok_or_else(|| EngineError::UnknownPrincipal { id: principal_id.to_string() })?;
        account.profile.is_premium = premium;
        Ok(())
    }
}

fn digest(password: &str) -> String {
    hex::encode(Sha256::digest(password.as_bytes()))
}

#[async_trait]
impl IdentityProvider for MemoryIdentity {
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        full_name: &str,
    ) -> Result<Principal, EngineError> {
        let mut accounts = self.accounts.lock().await;
        if accounts.values().any(|a| a.email.eq_ignore_ascii_case(email)) {
            return Err(EngineError::EmailTaken { email: email.to_string() });
        }
        let id = Uuid::new_v4().to_string();
        accounts.insert(
            id.clone(),
            Account {
                email: email.to_string(),
                password_digest: digest(password),
                profile: UserProfile {
                    full_name: full_name.to_string(),
                    ..UserProfile::default()
                },
            },
        );
        tracing::info!(principal = %id, "registered account");
        Ok(Principal::authenticated(id))
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Principal, EngineError> {
        let accounts = self.accounts.lock().await;
        let (id, account) = accounts
            .iter()
            .find(|(_, a)| a.email.eq_ignore_ascii_case(email))
            .ok_or(EngineError::InvalidCredentials)?;
        if account.password_digest != digest(password) {
            return Err(EngineError::InvalidCredentials);
        }
        Ok(Principal::authenticated(id.clone()))
    }

    async fn sign_out(&self, _principal_id: &str) -> Result<(), EngineError> {
        // Sessions are owned by the caller; there is nothing to invalidate
        // in the account table itself.
        Ok(())
    }

    async fn refresh_profile(&self, principal_id: &str) -> Result<UserProfile, EngineError> {
        self.profile(principal_id).await
    }
}

#[async_trait]
impl ProfileStore for MemoryIdentity {
    async fn profile(&self, principal_id: &str) -> Result<UserProfile, EngineError> {
        let accounts = self.accounts.lock().await;
        accounts
            .get(principal_id)
            .map(|a| a.profile.clone())
            .ok_or_else(|| EngineError::UnknownPrincipal { id: principal_id.to_string() })
    }

    async fn increment_conversions(&self, principal_id: &str) -> Result<UserProfile, EngineError> {
        let mut accounts = self.accounts.lock().await;
        let account = accounts
            .get_mut(principal_id)
            .ok_or_else(|| EngineError::UnknownPrincipal { id: principal_id.to_string() })?;
        account.profile.conversion_count += 1;
        Ok(account.profile.clone())
    }
}
