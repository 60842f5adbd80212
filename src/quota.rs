//! The free-tier quota ledger.
//!
//! Non-premium users get [`FREE_CONVERSION_LIMIT`] conversions before the
//! product asks them to upgrade. The ledger itself is thin on purpose: it
//! reads and increments a counter on the authoritative profile store and does
//! **not** deduplicate — the eligibility policy is re-evaluated immediately
//! before each increment (see [`crate::workflow::conversion`]), which is what
//! keeps overlapping submissions from slipping past the quota.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::EngineError;
use crate::identity::UserProfile;

/// Free conversions granted before a subscription is required.
pub const FREE_CONVERSION_LIMIT: u32 = 3;

/// Authoritative storage for user profiles.
///
/// `increment_conversions` must apply atomically against the stored profile
/// and return the refreshed copy, so callers always observe the
/// post-increment count.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Fetch the current profile for a principal.
    async fn profile(&self, principal_id: &str) -> Result<UserProfile, EngineError>;

    /// Atomically increment the conversion counter and return the refreshed
    /// profile.
    async fn increment_conversions(&self, principal_id: &str) -> Result<UserProfile, EngineError>;
}

/// Reads and charges the free-tier quota against a [`ProfileStore`].
#[derive(Clone)]
pub struct QuotaLedger {
    store: Arc<dyn ProfileStore>,
}

impl QuotaLedger {
    pub fn new(store: Arc<dyn ProfileStore>) -> Self {
        Self { store }
    }

    /// Free conversions left for a profile.
    ///
    /// May be negative when the stored count has run past the limit (e.g. a
    /// premium user who kept converting, then lapsed); callers must treat
    /// any value `<= 0` as exhausted rather than flooring here.
    pub fn remaining(profile: &UserProfile) -> i64 {
        i64::from(FREE_CONVERSION_LIMIT) - i64::from(profile.conversion_count)
    }

    /// Fresh profile snapshot from the authoritative store.
    pub async fn profile(&self, principal_id: &str) -> Result<UserProfile, EngineError> {
        self.store.profile(principal_id).await
    }

    /// Count one conversion against the principal and return the refreshed
    /// profile. The ledger does not re-check eligibility — that is the
    /// caller's job, immediately before this call.
    pub async fn increment(&self, principal_id: &str) -> Result<UserProfile, EngineError> {
        let profile = self.store.increment_conversions(principal_id).await?;
        tracing::debug!(
            principal = principal_id,
            conversion_count = profile.conversion_count,
            "quota incremented"
        );
        Ok(profile)
    }
}
