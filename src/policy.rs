//! Conversion eligibility policy.
//!
//! The original product interleaved these checks with modal dialogs inside a
//! click handler. Here the policy is a single pure function returning a
//! [`Decision`], and the presentation layer decides what a denial looks like.
//! Purity matters for one more reason: the decision goes stale the moment the
//! profile snapshot does, so the workflow calls [`evaluate`] twice — once at
//! submit time for a fast answer, and again on a re-fetched profile right
//! before the quota increment is committed.

use crate::identity::{Principal, UserProfile};
use crate::quota::QuotaLedger;

/// Outcome of the eligibility check. Not an error — a value the caller
/// routes on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// The conversion may proceed.
    Allowed,
    /// The principal is not signed in.
    RequiresLogin,
    /// Signed in, not premium, and the free quota is exhausted.
    RequiresUpgrade,
}

/// Decide whether `principal` may convert, given its stored profile.
///
/// A pure function of `(authenticated, is_premium, conversion_count)`:
///
/// * unauthenticated → [`Decision::RequiresLogin`], profile ignored;
/// * authenticated premium → [`Decision::Allowed`] regardless of count;
/// * authenticated non-premium → [`Decision::Allowed`] while remaining
///   quota is positive, [`Decision::RequiresUpgrade`] once it is not.
///
/// `profile` is `None` only for principals with no stored profile. For an
/// authenticated principal that means the quota cannot be verified, which is
/// treated as exhausted — never as unlimited.
pub fn evaluate(principal: &Principal, profile: Option<&UserProfile>) -> Decision {
    if !principal.authenticated {
        return Decision::RequiresLogin;
    }
    match profile {
        Some(p) if p.is_premium => Decision::Allowed,
        Some(p) if QuotaLedger::remaining(p) > 0 => Decision::Allowed,
        _ => Decision::RequiresUpgrade,
    }
}
