//! The conversion-execution collaborator seam.
//!
//! Actual byte-level document conversion is out of scope for this engine — a
//! real deployment hands the work to a job queue or a conversion service.
//! The workflow only cares about the contract: bytes in, bytes out or a
//! failure, asynchronously. Keeping the seam this narrow is what lets a real
//! worker integration replace [`FixedDelayConverter`] without touching the
//! workflow at all.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::format::FormatKey;

/// Why the external conversion did not produce an output document.
///
/// Deliberately not a variant of [`crate::error::EngineError`]: an executor
/// failure is an expected workflow outcome (the request lands in a retryable
/// `Failed` state), not an engine fault.
#[derive(Debug, Clone, Error)]
#[error("conversion execution failed: {detail}")]
pub struct ExecutionFailure {
    pub detail: String,
}

impl ExecutionFailure {
    pub fn new(detail: impl Into<String>) -> Self {
        Self { detail: detail.into() }
    }
}

/// Executes one document conversion. Opaque to the engine.
#[async_trait]
pub trait ConvertExecutor: Send + Sync {
    /// Convert `input` from `source` to `target`, returning the output bytes.
    async fn execute(
        &self,
        input: &[u8],
        source: FormatKey,
        target: FormatKey,
    ) -> Result<Vec<u8>, ExecutionFailure>;
}

/// Simulation executor: sleeps for a fixed delay, then echoes the input
/// bytes as the "converted" document.
///
/// Stand-in for the real asynchronous job the production system runs; the
/// delay models the elapsed time during which an eligibility decision can go
/// stale (the workflow re-checks before committing).
#[derive(Debug, Clone)]
pub struct FixedDelayConverter {
    delay: Duration,
}

impl FixedDelayConverter {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }

    /// The two-second delay the original product simulates.
    pub fn product_default() -> Self {
        Self::new(Duration::from_secs(2))
    }
}

#[async_trait]
impl ConvertExecutor for FixedDelayConverter {
    async fn execute(
        &self,
        input: &[u8],
        source: FormatKey,
        target: FormatKey,
    ) -> Result<Vec<u8>, ExecutionFailure> {
        tracing::debug!(%source, %target, bytes = input.len(), "simulated conversion started");
        tokio::time::sleep(self.delay).await;
        Ok(input.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fixed_delay_passes_bytes_through() {
        let exec = FixedDelayConverter::new(Duration::from_millis(1));
        let out = exec
            .execute(b"%PDF-1.7", FormatKey::Pdf, FormatKey::Docx)
            .await
            .unwrap();
        assert_eq!(out, b"%PDF-1.7");
    }

    #[test]
    fn execution_failure_display() {
        let e = ExecutionFailure::new("worker pool unreachable");
        assert!(e.to_string().contains("worker pool unreachable"));
    }
}
