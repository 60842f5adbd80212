//! Error types for the konverta engine.
//!
//! One taxonomy decision shapes this module: **policy outcomes are not
//! errors**. `RequiresLogin` and `RequiresUpgrade` are ordinary values of
//! [`crate::policy::Decision`] / [`crate::workflow::SubmitOutcome`] — the
//! presentation layer decides how to surface them (the original product shows
//! modal dialogs). [`EngineError`] is reserved for things that actually went
//! wrong:
//!
//! * **Local rejections** (`UnsupportedFormat`, `InvalidTarget`,
//!   `MissingSelection`, …) — non-fatal; the session stays usable and the
//!   caller re-prompts.
//! * **Collaborator failures** (`Persistence`) — the record append or quota
//!   increment could not be confirmed; the conversion never reports success.
//! * **Catalog failures** — malformed plan/channel configuration. The only
//!   startup-fatal section: a product without plans cannot sell one.

use std::path::PathBuf;
use thiserror::Error;

use crate::format::FormatKey;

/// All errors returned by the konverta engine.
#[derive(Debug, Error)]
pub enum EngineError {
    // ── Format errors ─────────────────────────────────────────────────────
    /// The selected file's extension maps to no registry format.
    #[error("Unsupported file format: '{filename}'\nSupported: PDF, DOCX, PPTX, XLSX.")]
    UnsupportedFormat { filename: String },

    /// Target equals the source format or is outside the registry for it.
    #[error("Cannot convert {from_format} to {target}: target must be one of the other registry formats")]
    InvalidTarget { from_format: FormatKey, target: FormatKey },

    /// A string did not name any registry format.
    #[error("Unknown format '{name}': expected pdf, docx, pptx, or xlsx")]
    UnknownFormatName { name: String },

    // ── Workflow errors ───────────────────────────────────────────────────
    /// An operation was invoked from a state that does not accept it.
    #[error("'{operation}' is not valid while the workflow is in the {state} state")]
    InvalidTransition {
        operation: &'static str,
        state: &'static str,
    },

    /// The subscription flow was confirmed before a plan or channel was bound.
    #[error("Nothing selected: choose a {missing} before confirming")]
    MissingSelection { missing: &'static str },

    /// The requested plan id is not in the catalog.
    #[error("Unknown subscription plan '{id}'")]
    UnknownPlan { id: String },

    /// The requested payment channel id is not in the catalog.
    #[error("Unknown payment channel '{id}'")]
    UnknownChannel { id: String },

    // ── Identity errors ───────────────────────────────────────────────────
    /// Registration with an email that already has an account.
    #[error("An account already exists for '{email}'")]
    EmailTaken { email: String },

    /// Sign-in with an unknown email or wrong password.
    #[error("Invalid email or password")]
    InvalidCredentials,

    /// No stored profile for the given principal id.
    #[error("No profile found for principal '{id}'")]
    UnknownPrincipal { id: String },

    // ── Persistence errors ────────────────────────────────────────────────
    /// A record append or profile update could not be confirmed.
    ///
    /// The conversion workflow treats this as blocking: it never transitions
    /// to `Succeeded` unless both the record append and the quota increment
    /// are confirmed.
    #[error("Persistence failed during {operation}: {detail}")]
    Persistence {
        operation: &'static str,
        detail: String,
    },

    // ── Catalog errors (startup-fatal) ────────────────────────────────────
    /// A catalog section is empty.
    #[error("Catalog has no {what}: at least one entry is required")]
    EmptyCatalog { what: &'static str },

    /// Two catalog entries share an id.
    #[error("Duplicate {what} id '{id}' in catalog")]
    DuplicateCatalogId { what: &'static str, id: String },

    /// A plan has a zero monthly price.
    #[error("Plan '{id}' has a zero monthly price")]
    InvalidPlanPrice { id: String },

    /// The catalog file exists but is not valid JSON for the expected shape.
    #[error("Failed to parse catalog: {0}")]
    CatalogParse(#[from] serde_json::Error),

    /// The catalog file could not be read.
    #[error("Failed to read catalog file '{path}': {source}")]
    CatalogRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
