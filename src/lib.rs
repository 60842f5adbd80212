//! # konverta
//!
//! The conversion-eligibility and workflow engine behind a freemium
//! document-conversion product: a user uploads a document, picks a target
//! format, and receives the converted file — subject to a free-tier quota of
//! three conversions, lifted by a subscription paid via manual bank
//! transfer.
//!
//! ## What this crate is (and is not)
//!
//! This crate owns the parts with real state-machine behaviour: the
//! per-session conversion workflow, the subscription workflow, the
//! eligibility policy, and the quota ledger. Everything around them is an
//! external collaborator reached through a trait seam — identity, byte-level
//! conversion, persistence — so page rendering, payment settlement, and real
//! authentication never leak in here.
//!
//! ## Flow Overview
//!
//! ```text
//! UI event
//!  │
//!  ├─ select_file    detect format from the extension table
//!  ├─ choose_target  bind one of the other registry formats
//!  ├─ submit         eligibility → external executor → re-check →
//!  │                 record append → quota increment → Succeeded
//!  └─ download       hand over the document, reset to Idle
//!
//! subscription:  select_plan → select_channel → confirm → pending order
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use konverta::{
//!     ConversionWorkflow, FixedDelayConverter, FormatKey, IdentityProvider,
//!     MemoryArchive, MemoryIdentity, Principal, SubmitOutcome,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let identity = MemoryIdentity::new();
//!     let archive = MemoryArchive::new();
//!     let principal = identity.sign_up("ani@example.com", "secret", "Ani").await?;
//!
//!     let mut workflow = ConversionWorkflow::new(
//!         Arc::new(FixedDelayConverter::new(Duration::from_secs(2))),
//!         identity,
//!         archive,
//!     );
//!     workflow.select_file("report.docx", std::fs::read("report.docx")?)?;
//!     workflow.choose_target(FormatKey::Pdf)?;
//!     match workflow.submit(&principal).await? {
//!         SubmitOutcome::Converted(receipt) => {
//!             println!("done: {}", receipt.output_filename)
//!         }
//!         other => println!("not converted: {other:?}"),
//!     }
//!     Ok(())
//! }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod archive;
pub mod catalog;
pub mod error;
pub mod exec;
pub mod format;
pub mod identity;
pub mod policy;
pub mod quota;
pub mod workflow;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use archive::{ArchiveStore, ConversionRecord, MemoryArchive, OrderStatus, SubscriptionOrder};
pub use catalog::{Catalog, PaymentChannel, SubscriptionPlan};
pub use error::EngineError;
pub use exec::{ConvertExecutor, ExecutionFailure, FixedDelayConverter};
pub use format::{conversion_targets, converted_filename, detect_format, FormatKey};
pub use identity::{IdentityProvider, MemoryIdentity, Principal, UserProfile};
pub use policy::{evaluate, Decision};
pub use quota::{ProfileStore, QuotaLedger, FREE_CONVERSION_LIMIT};
pub use workflow::{
    ConfirmOutcome, ConversionReceipt, ConversionState, ConversionWorkflow, ConvertedDocument,
    PlanOutcome, SubmitOutcome, SubscriptionState, SubscriptionWorkflow, WorkflowOptions,
};
