//! The two per-session state machines of the product.
//!
//! Each workflow drives one multi-step, user-visible process and owns no
//! global state: principals and profiles come in as explicit parameters,
//! side effects go out through the collaborator seams
//! ([`crate::exec::ConvertExecutor`], [`crate::archive::ArchiveStore`],
//! [`crate::quota::ProfileStore`]).
//!
//! ## State graphs
//!
//! ```text
//! conversion:    Idle ──select_file──▶ FileSelected ──choose_target──▶ ReadyToConvert
//!                  ▲                                                        │ submit
//!                  │ clear() from any non-Converting state             Converting
//!                  │                                                   ╱         ╲
//!                  └────────── download() ◀── Succeeded ◀── commit ──╱           ╲──▶ Failed (retryable)
//!
//! subscription:  PlanSelection ──select_plan──▶ PaymentPending ──confirm──▶ OrderSubmitted
//!                      ▲                          │ select_channel (no state change)
//!                      └────────── back() ────────┘
//! ```
//!
//! One logical session drives one instance of each at a time; no concurrent
//! conversions per session are modelled. The `&mut self` operations make
//! that explicit — a second `submit` cannot start while one is in flight.

pub mod conversion;
pub mod subscription;

pub use conversion::{
    ConversionReceipt, ConversionRequest, ConversionState, ConversionWorkflow,
    ConvertedDocument, FileDescriptor, SubmitOutcome, WorkflowOptions,
};
pub use subscription::{ConfirmOutcome, PlanOutcome, SubscriptionState, SubscriptionWorkflow};
