//! The conversion workflow: one file-to-file conversion request, from
//! selection to download.
//!
//! ## The critical section
//!
//! `submit` evaluates eligibility twice. The first check happens at gesture
//! time and exists to answer quickly — show the login or upgrade prompt
//! before any work starts. The second happens after the external conversion
//! finishes, on a re-fetched profile, immediately before anything is
//! written: the executor call takes real wall-clock time, and the profile
//! snapshot the first decision was based on can be stale by then.
//!
//! The commit order is fixed: conversion record append, then quota
//! increment. Record presence is the audit trail for the increment, so the
//! append must happen-before the increment is considered durable. If either
//! write fails the workflow lands in `Failed` and never reports success —
//! an unconfirmed increment must not hand out an uncounted free conversion.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::archive::{ArchiveStore, ConversionRecord};
use crate::error::EngineError;
use crate::exec::ConvertExecutor;
use crate::format::{self, FormatKey};
use crate::identity::{Principal, UserProfile};
use crate::policy::{self, Decision};
use crate::quota::{ProfileStore, QuotaLedger};

/// Metadata of the file the user picked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDescriptor {
    pub name: String,
    pub size_bytes: u64,
    pub detected_format: Option<FormatKey>,
}

/// The request a session is currently working on.
///
/// Created when a file is accepted; dropped when the session clears the
/// selection or completes the conversion.
#[derive(Debug, Clone)]
pub struct ConversionRequest {
    pub file: FileDescriptor,
    pub source: FormatKey,
    pub target: Option<FormatKey>,
    content: Vec<u8>,
}

/// The finished document handed to the delivery collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvertedDocument {
    pub filename: String,
    pub format: FormatKey,
    pub bytes: Vec<u8>,
}

/// Where the workflow currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversionState {
    Idle,
    FileSelected,
    ReadyToConvert,
    Converting,
    Succeeded,
    Failed { retryable: bool },
}

impl ConversionState {
    pub fn name(self) -> &'static str {
        match self {
            ConversionState::Idle => "Idle",
            ConversionState::FileSelected => "FileSelected",
            ConversionState::ReadyToConvert => "ReadyToConvert",
            ConversionState::Converting => "Converting",
            ConversionState::Succeeded => "Succeeded",
            ConversionState::Failed { .. } => "Failed",
        }
    }
}

/// What `submit` produced. Only `Converted` means the document exists;
/// the other arms are signals the presentation layer routes on.
#[derive(Debug, Clone)]
pub enum SubmitOutcome {
    /// Conversion completed, record appended, quota charged.
    Converted(ConversionReceipt),
    /// Policy: the principal must sign in first. State unchanged.
    LoginRequired,
    /// Policy: the free quota is exhausted. State unchanged.
    UpgradeRequired,
    /// The external executor failed; the workflow is in retryable `Failed`.
    ExecutionFailed { detail: String },
}

/// Summary of a completed conversion.
#[derive(Debug, Clone)]
pub struct ConversionReceipt {
    /// Original name with its extension replaced by the target's.
    pub output_filename: String,
    /// Profile after the quota commit (count already incremented, unless
    /// premium counting is disabled).
    pub profile: UserProfile,
    pub duration_ms: u64,
}

/// Tunables for the workflow.
#[derive(Debug, Clone, Copy)]
pub struct WorkflowOptions {
    /// Whether premium users' conversions still accumulate in the ledger.
    /// The original product keeps counting; disabling stops the increment
    /// for premium principals entirely.
    pub count_premium_conversions: bool,
}

impl Default for WorkflowOptions {
    fn default() -> Self {
        Self { count_premium_conversions: true }
    }
}

/// Per-session state machine driving one conversion request.
pub struct ConversionWorkflow {
    executor: Arc<dyn ConvertExecutor>,
    ledger: QuotaLedger,
    archive: Arc<dyn ArchiveStore>,
    options: WorkflowOptions,
    state: ConversionState,
    request: Option<ConversionRequest>,
    output: Option<ConvertedDocument>,
}

impl ConversionWorkflow {
    pub fn new(
        executor: Arc<dyn ConvertExecutor>,
        profiles: Arc<dyn ProfileStore>,
        archive: Arc<dyn ArchiveStore>,
    ) -> Self {
        Self {
            executor,
            ledger: QuotaLedger::new(profiles),
            archive,
            options: WorkflowOptions::default(),
            state: ConversionState::Idle,
            request: None,
            output: None,
        }
    }

    pub fn with_options(mut self, options: WorkflowOptions) -> Self {
        self.options = options;
        self
    }

    pub fn state(&self) -> ConversionState {
        self.state
    }

    pub fn request(&self) -> Option<&ConversionRequest> {
        self.request.as_ref()
    }

    /// Accept a file and detect its format.
    ///
    /// Valid from every state except `Converting`. Selecting while a
    /// previous request sits in `Succeeded`/`Failed` silently discards it —
    /// nothing was left half-charged, since the quota increment only happens
    /// on confirmed success. An unrecognised extension changes nothing and
    /// returns [`EngineError::UnsupportedFormat`].
    pub fn select_file(&mut self, name: &str, content: Vec<u8>) -> Result<FormatKey, EngineError> {
        if self.state == ConversionState::Converting {
            return Err(self.invalid("select_file"));
        }
        let Some(source) = format::detect_format(name) else {
            return Err(EngineError::UnsupportedFormat { filename: name.to_string() });
        };
        debug!(file = name, %source, "file selected");
        self.request = Some(ConversionRequest {
            file: FileDescriptor {
                name: name.to_string(),
                size_bytes: content.len() as u64,
                detected_format: Some(source),
            },
            source,
            target: None,
            content,
        });
        self.output = None;
        self.state = ConversionState::FileSelected;
        Ok(source)
    }

    /// Bind the target format. Valid in `FileSelected` and `ReadyToConvert`.
    pub fn choose_target(&mut self, target: FormatKey) -> Result<(), EngineError> {
        if !matches!(
            self.state,
            ConversionState::FileSelected | ConversionState::ReadyToConvert
        ) {
            return Err(self.invalid("choose_target"));
        }
        let Some(request) = self.request.as_mut() else {
            return Err(self.invalid("choose_target"));
        };
        if target == request.source || !format::conversion_targets(request.source).contains(&target)
        {
            return Err(EngineError::InvalidTarget { from_format: request.source, target });
        }
        request.target = Some(target);
        self.state = ConversionState::ReadyToConvert;
        Ok(())
    }

    /// Drop the current request and return to `Idle`.
    ///
    /// Valid from any state except `Converting`; calling it from `Idle` is a
    /// no-op that stays in `Idle`.
    pub fn clear(&mut self) -> Result<(), EngineError> {
        if self.state == ConversionState::Converting {
            return Err(self.invalid("clear"));
        }
        self.request = None;
        self.output = None;
        self.state = ConversionState::Idle;
        Ok(())
    }

    /// Run the conversion for `principal`.
    ///
    /// Valid from `ReadyToConvert`, and from retryable `Failed` (the request
    /// survives an executor failure, so the user resubmits without
    /// re-selecting the file). Eligibility is evaluated afresh on every
    /// attempt.
    ///
    /// # Errors
    /// `Err` only for invalid transitions and unconfirmed persistence; all
    /// policy denials and executor failures come back as [`SubmitOutcome`]
    /// values.
    pub async fn submit(&mut self, principal: &Principal) -> Result<SubmitOutcome, EngineError> {
        match self.state {
            ConversionState::ReadyToConvert | ConversionState::Failed { retryable: true } => {}
            _ => return Err(self.invalid("submit")),
        }
        let (name, size_bytes, source, target, content) = {
            let Some(request) = self.request.as_ref() else {
                return Err(self.invalid("submit"));
            };
            let Some(target) = request.target else {
                return Err(self.invalid("submit"));
            };
            (
                request.file.name.clone(),
                request.file.size_bytes,
                request.source,
                target,
                request.content.clone(),
            )
        };

        // Gesture-time check: answer before any work starts.
        match self.eligibility(principal).await? {
            Decision::Allowed => {}
            Decision::RequiresLogin => {
                info!(file = %name, "submit denied: login required");
                return Ok(SubmitOutcome::LoginRequired);
            }
            Decision::RequiresUpgrade => {
                info!(file = %name, "submit denied: quota exhausted");
                return Ok(SubmitOutcome::UpgradeRequired);
            }
        }

        info!(file = %name, %source, %target, "conversion started");
        let started = Instant::now();
        self.state = ConversionState::Converting;

        let converted = match self.executor.execute(&content, source, target).await {
            Ok(bytes) => bytes,
            Err(failure) => {
                warn!(file = %name, error = %failure, "conversion execution failed");
                self.state = ConversionState::Failed { retryable: true };
                return Ok(SubmitOutcome::ExecutionFailed { detail: failure.detail });
            }
        };

        // Commit-time re-check: the profile snapshot behind the first
        // decision can be stale after the executor's async gap. The machine
        // must leave `Converting` on every path out of this section.
        let profile = if principal.authenticated {
            match self.ledger.profile(&principal.id).await {
                Ok(profile) => Some(profile),
                Err(EngineError::UnknownPrincipal { .. }) => None,
                Err(e) => {
                    self.state = ConversionState::Failed { retryable: true };
                    return Err(e);
                }
            }
        } else {
            None
        };
        let profile = match (policy::evaluate(principal, profile.as_ref()), profile) {
            (Decision::Allowed, Some(profile)) => profile,
            (Decision::RequiresLogin, _) => {
                self.state = ConversionState::ReadyToConvert;
                return Ok(SubmitOutcome::LoginRequired);
            }
            _ => {
                info!(file = %name, "quota exhausted while converting; nothing committed");
                self.state = ConversionState::ReadyToConvert;
                return Ok(SubmitOutcome::UpgradeRequired);
            }
        };

        // Record append happens-before the increment is durable.
        let record =
            ConversionRecord::new(principal.id.as_str(), name.as_str(), source, target, size_bytes);
        if let Err(e) = self.archive.append_conversion(record).await {
            self.state = ConversionState::Failed { retryable: true };
            return Err(e);
        }

        let profile = if profile.is_premium && !self.options.count_premium_conversions {
            profile
        } else {
            match self.ledger.increment(&principal.id).await {
                Ok(updated) => updated,
                Err(e) => {
                    // The record is already appended; the store is
                    // append-only, so there is no compensating delete. The
                    // conversion still must not report success.
                    self.state = ConversionState::Failed { retryable: true };
                    return Err(e);
                }
            }
        };

        let output_filename = format::converted_filename(&name, target);
        self.output = Some(ConvertedDocument {
            filename: output_filename.clone(),
            format: target,
            bytes: converted,
        });
        self.state = ConversionState::Succeeded;

        let duration_ms = started.elapsed().as_millis() as u64;
        info!(file = %name, output = %output_filename, duration_ms, "conversion succeeded");
        Ok(SubmitOutcome::Converted(ConversionReceipt {
            output_filename,
            profile,
            duration_ms,
        }))
    }

    /// Hand over the converted document. Valid only in `Succeeded`;
    /// terminal for this request — the workflow resets to `Idle`.
    pub fn download(&mut self) -> Result<ConvertedDocument, EngineError> {
        if self.state != ConversionState::Succeeded {
            return Err(self.invalid("download"));
        }
        let Some(document) = self.output.take() else {
            return Err(self.invalid("download"));
        };
        self.request = None;
        self.state = ConversionState::Idle;
        Ok(document)
    }

    async fn eligibility(&self, principal: &Principal) -> Result<Decision, EngineError> {
        if !principal.authenticated {
            return Ok(policy::evaluate(principal, None));
        }
        match self.ledger.profile(&principal.id).await {
            Ok(profile) => Ok(policy::evaluate(principal, Some(&profile))),
            Err(EngineError::UnknownPrincipal { .. }) => Ok(policy::evaluate(principal, None)),
            Err(e) => Err(e),
        }
    }

    fn invalid(&self, operation: &'static str) -> EngineError {
        EngineError::InvalidTransition { operation, state: self.state.name() }
    }
}
