//! End-to-end integration tests for the konverta engine.
//!
//! These drive the public workflow API against the in-process collaborators
//! exactly the way the presentation layer does: select a file, choose a
//! target, submit, and observe what was (and was not) persisted.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use konverta::{
    ArchiveStore, Catalog, ConfirmOutcome, ConversionRecord, ConversionState,
    ConversionWorkflow, ConvertExecutor, EngineError, ExecutionFailure, FixedDelayConverter,
    FormatKey, MemoryArchive, MemoryIdentity, OrderStatus, PlanOutcome, Principal, ProfileStore,
    SubmitOutcome, SubscriptionOrder, SubscriptionState, SubscriptionWorkflow, UserProfile,
    WorkflowOptions,
};

// ── Test helpers ─────────────────────────────────────────────────────────────

const PRINCIPAL: &str = "p-1";

async fn seeded_identity(conversion_count: u32, is_premium: bool) -> Arc<MemoryIdentity> {
    let identity = MemoryIdentity::new();
    identity
        .seed(
            PRINCIPAL,
            "ani@example.com",
            UserProfile {
                full_name: "Ani Wijaya".into(),
                conversion_count,
                is_premium,
            },
        )
        .await;
    identity
}

fn instant_converter() -> Arc<FixedDelayConverter> {
    Arc::new(FixedDelayConverter::new(Duration::from_millis(1)))
}

/// Fails the first `failures` calls, then behaves like the simulator.
struct FlakyConverter {
    failures: u32,
    calls: AtomicU32,
}

#[async_trait]
impl ConvertExecutor for FlakyConverter {
    async fn execute(
        &self,
        input: &[u8],
        _source: FormatKey,
        _target: FormatKey,
    ) -> Result<Vec<u8>, ExecutionFailure> {
        if self.calls.fetch_add(1, Ordering::SeqCst) < self.failures {
            return Err(ExecutionFailure::new("worker crashed"));
        }
        Ok(input.to_vec())
    }
}

/// Consumes the principal's quota while the conversion runs, simulating an
/// overlapping submission that lands first.
struct QuotaRacingConverter {
    identity: Arc<MemoryIdentity>,
}

#[async_trait]
impl ConvertExecutor for QuotaRacingConverter {
    async fn execute(
        &self,
        input: &[u8],
        _source: FormatKey,
        _target: FormatKey,
    ) -> Result<Vec<u8>, ExecutionFailure> {
        self.identity
            .increment_conversions(PRINCIPAL)
            .await
            .map_err(|e| ExecutionFailure::new(e.to_string()))?;
        Ok(input.to_vec())
    }
}

/// Archive whose conversion-record appends always fail.
#[derive(Default)]
struct BrokenArchive;

#[async_trait]
impl ArchiveStore for BrokenArchive {
    async fn append_conversion(&self, _record: ConversionRecord) -> Result<(), EngineError> {
        Err(EngineError::Persistence {
            operation: "conversion record append",
            detail: "store unavailable".into(),
        })
    }

    async fn append_order(&self, _order: SubscriptionOrder) -> Result<(), EngineError> {
        Err(EngineError::Persistence {
            operation: "subscription order append",
            detail: "store unavailable".into(),
        })
    }

    async fn conversions_for(
        &self,
        _principal_id: &str,
    ) -> Result<Vec<ConversionRecord>, EngineError> {
        Ok(Vec::new())
    }

    async fn orders_for(&self, _principal_id: &str) -> Result<Vec<SubscriptionOrder>, EngineError> {
        Ok(Vec::new())
    }
}

// ── Conversion scenarios ─────────────────────────────────────────────────────

#[tokio::test]
async fn unauthenticated_submit_signals_login_and_writes_nothing() {
    let identity = seeded_identity(0, false).await;
    let archive = MemoryArchive::new();
    let mut workflow =
        ConversionWorkflow::new(instant_converter(), identity.clone(), archive.clone());

    workflow.select_file("report.docx", b"doc".to_vec()).unwrap();
    workflow.choose_target(FormatKey::Pdf).unwrap();

    let outcome = workflow.submit(&Principal::anonymous()).await.unwrap();
    assert!(matches!(outcome, SubmitOutcome::LoginRequired));
    // The request survives: the user signs in and submits the same file.
    assert_eq!(workflow.state(), ConversionState::ReadyToConvert);

    assert!(archive.conversions_for(PRINCIPAL).await.unwrap().is_empty());
    let profile = identity.profile(PRINCIPAL).await.unwrap();
    assert_eq!(profile.conversion_count, 0);
}

#[tokio::test]
async fn successful_conversion_records_charges_and_renames() {
    let identity = seeded_identity(0, false).await;
    let archive = MemoryArchive::new();
    let mut workflow =
        ConversionWorkflow::new(instant_converter(), identity.clone(), archive.clone());
    let user = Principal::authenticated(PRINCIPAL);

    let source = workflow.select_file("slides.pptx", b"deck-bytes".to_vec()).unwrap();
    assert_eq!(source, FormatKey::Pptx);
    workflow.choose_target(FormatKey::Pdf).unwrap();

    let receipt = match workflow.submit(&user).await.unwrap() {
        SubmitOutcome::Converted(receipt) => receipt,
        other => panic!("expected a converted outcome, got {other:?}"),
    };
    assert_eq!(workflow.state(), ConversionState::Succeeded);
    assert_eq!(receipt.output_filename, "slides.pdf");
    assert_eq!(receipt.profile.conversion_count, 1);

    let records = archive.conversions_for(PRINCIPAL).await.unwrap();
    assert_eq!(records.len(), 1, "exactly one record per successful conversion");
    assert_eq!(records[0].original_filename, "slides.pptx");
    assert_eq!(records[0].original_format, FormatKey::Pptx);
    assert_eq!(records[0].target_format, FormatKey::Pdf);
    assert_eq!(records[0].file_size, 10);

    // Download hands the document over and resets the session.
    let document = workflow.download().unwrap();
    assert_eq!(document.filename, "slides.pdf");
    assert_eq!(document.format, FormatKey::Pdf);
    assert_eq!(document.bytes, b"deck-bytes");
    assert_eq!(workflow.state(), ConversionState::Idle);
    assert!(workflow.request().is_none());
}

#[tokio::test]
async fn exhausted_quota_signals_upgrade_and_writes_nothing() {
    let identity = seeded_identity(3, false).await;
    let archive = MemoryArchive::new();
    let mut workflow =
        ConversionWorkflow::new(instant_converter(), identity.clone(), archive.clone());
    let user = Principal::authenticated(PRINCIPAL);

    workflow.select_file("report.docx", b"doc".to_vec()).unwrap();
    workflow.choose_target(FormatKey::Pdf).unwrap();

    let outcome = workflow.submit(&user).await.unwrap();
    assert!(matches!(outcome, SubmitOutcome::UpgradeRequired));
    assert_eq!(workflow.state(), ConversionState::ReadyToConvert);

    assert!(archive.conversions_for(PRINCIPAL).await.unwrap().is_empty());
    assert_eq!(identity.profile(PRINCIPAL).await.unwrap().conversion_count, 3);
}

#[tokio::test]
async fn quota_exhausts_exactly_at_the_limit() {
    let identity = seeded_identity(0, false).await;
    let archive = MemoryArchive::new();
    let user = Principal::authenticated(PRINCIPAL);

    for i in 1..=3u32 {
        let mut workflow =
            ConversionWorkflow::new(instant_converter(), identity.clone(), archive.clone());
        workflow.select_file("report.docx", b"doc".to_vec()).unwrap();
        workflow.choose_target(FormatKey::Pdf).unwrap();
        let outcome = workflow.submit(&user).await.unwrap();
        assert!(matches!(outcome, SubmitOutcome::Converted(_)), "conversion {i} should pass");
    }

    let mut workflow =
        ConversionWorkflow::new(instant_converter(), identity.clone(), archive.clone());
    workflow.select_file("report.docx", b"doc".to_vec()).unwrap();
    workflow.choose_target(FormatKey::Xlsx).unwrap();
    let outcome = workflow.submit(&user).await.unwrap();
    assert!(matches!(outcome, SubmitOutcome::UpgradeRequired));

    assert_eq!(identity.profile(PRINCIPAL).await.unwrap().conversion_count, 3);
    assert_eq!(archive.conversions_for(PRINCIPAL).await.unwrap().len(), 3);
}

#[tokio::test]
async fn executor_failure_is_retryable_without_reselecting() {
    let identity = seeded_identity(0, false).await;
    let archive = MemoryArchive::new();
    let flaky = Arc::new(FlakyConverter { failures: 1, calls: AtomicU32::new(0) });
    let mut workflow = ConversionWorkflow::new(flaky, identity.clone(), archive.clone());
    let user = Principal::authenticated(PRINCIPAL);

    workflow.select_file("sheet.xlsx", b"rows".to_vec()).unwrap();
    workflow.choose_target(FormatKey::Docx).unwrap();

    let outcome = workflow.submit(&user).await.unwrap();
    assert!(matches!(outcome, SubmitOutcome::ExecutionFailed { .. }));
    assert_eq!(workflow.state(), ConversionState::Failed { retryable: true });
    // A failed attempt charges nothing.
    assert_eq!(identity.profile(PRINCIPAL).await.unwrap().conversion_count, 0);

    // Same request, no re-selection.
    let outcome = workflow.submit(&user).await.unwrap();
    assert!(matches!(outcome, SubmitOutcome::Converted(_)));
    assert_eq!(archive.conversions_for(PRINCIPAL).await.unwrap().len(), 1);
    assert_eq!(identity.profile(PRINCIPAL).await.unwrap().conversion_count, 1);
}

#[tokio::test]
async fn persistence_failure_never_reports_success() {
    let identity = seeded_identity(0, false).await;
    let mut workflow = ConversionWorkflow::new(
        instant_converter(),
        identity.clone(),
        Arc::new(BrokenArchive),
    );
    let user = Principal::authenticated(PRINCIPAL);

    workflow.select_file("report.docx", b"doc".to_vec()).unwrap();
    workflow.choose_target(FormatKey::Pdf).unwrap();

    let err = workflow.submit(&user).await.unwrap_err();
    assert!(matches!(err, EngineError::Persistence { .. }));
    assert_eq!(workflow.state(), ConversionState::Failed { retryable: true });
    // The record append failed before the increment: no quota charged.
    assert_eq!(identity.profile(PRINCIPAL).await.unwrap().conversion_count, 0);
    assert!(workflow.download().is_err());
}

#[tokio::test]
async fn commit_recheck_catches_quota_consumed_mid_conversion() {
    // One conversion left; an overlapping submission takes it while the
    // executor runs. The commit-time re-evaluation must deny the increment.
    let identity = seeded_identity(2, false).await;
    let archive = MemoryArchive::new();
    let racing = Arc::new(QuotaRacingConverter { identity: identity.clone() });
    let mut workflow = ConversionWorkflow::new(racing, identity.clone(), archive.clone());
    let user = Principal::authenticated(PRINCIPAL);

    workflow.select_file("report.docx", b"doc".to_vec()).unwrap();
    workflow.choose_target(FormatKey::Pdf).unwrap();

    let outcome = workflow.submit(&user).await.unwrap();
    assert!(matches!(outcome, SubmitOutcome::UpgradeRequired));
    assert_eq!(workflow.state(), ConversionState::ReadyToConvert);

    // Only the racing increment happened; this request wrote nothing.
    assert_eq!(identity.profile(PRINCIPAL).await.unwrap().conversion_count, 3);
    assert!(archive.conversions_for(PRINCIPAL).await.unwrap().is_empty());
}

#[tokio::test]
async fn premium_bypasses_quota_and_counting_is_configurable() {
    // Default: premium conversions still accumulate in the ledger.
    let identity = seeded_identity(5, true).await;
    let archive = MemoryArchive::new();
    let user = Principal::authenticated(PRINCIPAL);

    let mut workflow =
        ConversionWorkflow::new(instant_converter(), identity.clone(), archive.clone());
    workflow.select_file("report.docx", b"doc".to_vec()).unwrap();
    workflow.choose_target(FormatKey::Pdf).unwrap();
    let outcome = workflow.submit(&user).await.unwrap();
    assert!(matches!(outcome, SubmitOutcome::Converted(_)), "premium is always allowed");
    assert_eq!(identity.profile(PRINCIPAL).await.unwrap().conversion_count, 6);

    // With counting disabled the ledger stops moving for premium users.
    let mut workflow =
        ConversionWorkflow::new(instant_converter(), identity.clone(), archive.clone())
            .with_options(WorkflowOptions { count_premium_conversions: false });
    workflow.select_file("report.docx", b"doc".to_vec()).unwrap();
    workflow.choose_target(FormatKey::Pptx).unwrap();
    let outcome = workflow.submit(&user).await.unwrap();
    assert!(matches!(outcome, SubmitOutcome::Converted(_)));
    assert_eq!(identity.profile(PRINCIPAL).await.unwrap().conversion_count, 6);
    // The audit record is still appended either way.
    assert_eq!(archive.conversions_for(PRINCIPAL).await.unwrap().len(), 2);
}

// ── Subscription scenario ────────────────────────────────────────────────────

#[tokio::test]
async fn pro_plan_via_bca_submits_one_pending_order() {
    let archive = MemoryArchive::new();
    let mut workflow = SubscriptionWorkflow::new(Arc::new(Catalog::builtin()), archive.clone());
    let user = Principal::authenticated(PRINCIPAL);

    let outcome = workflow.select_plan(&user, "pro").unwrap();
    assert!(matches!(outcome, PlanOutcome::Selected(_)));
    assert_eq!(workflow.state(), SubscriptionState::PaymentPending);

    let channel = workflow.select_channel("bca").unwrap();
    assert_eq!(channel.account_number, "1234567890");

    let outcome = workflow.confirm(&user).await.unwrap();
    let ConfirmOutcome::Submitted(order) = outcome else {
        panic!("expected a submitted order");
    };
    assert_eq!(order.plan_name, "Pro");
    assert_eq!(order.payment_channel, "Bank BCA");
    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(workflow.state(), SubscriptionState::OrderSubmitted);

    let stored = archive.orders_for(PRINCIPAL).await.unwrap();
    assert_eq!(stored.len(), 1);
}

#[tokio::test]
async fn upgrade_after_exhaustion_unblocks_conversion() {
    // The full loop: run out of quota, subscribe, get activated externally,
    // convert again.
    let identity = seeded_identity(3, false).await;
    let archive = MemoryArchive::new();
    let user = Principal::authenticated(PRINCIPAL);

    let mut conversion =
        ConversionWorkflow::new(instant_converter(), identity.clone(), archive.clone());
    conversion.select_file("report.docx", b"doc".to_vec()).unwrap();
    conversion.choose_target(FormatKey::Pdf).unwrap();
    assert!(matches!(
        conversion.submit(&user).await.unwrap(),
        SubmitOutcome::UpgradeRequired
    ));

    let mut subscription =
        SubscriptionWorkflow::new(Arc::new(Catalog::builtin()), archive.clone());
    subscription.select_plan(&user, "pro").unwrap();
    subscription.select_channel("mandiri").unwrap();
    subscription.confirm(&user).await.unwrap();

    // The external verification collaborator activates the plan.
    identity.set_premium(PRINCIPAL, true).await.unwrap();

    let outcome = conversion.submit(&user).await.unwrap();
    assert!(matches!(outcome, SubmitOutcome::Converted(_)));
    // Quota was not reduced by upgrading; premium simply bypasses the check.
    assert_eq!(identity.profile(PRINCIPAL).await.unwrap().conversion_count, 4);
}

// ── Catalog configuration ────────────────────────────────────────────────────

#[test]
fn catalog_file_override_loads_and_validates() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("catalog.json");

    std::fs::write(
        &path,
        serde_json::to_string(&Catalog::builtin()).unwrap(),
    )
    .unwrap();
    let catalog = Catalog::from_path(&path).unwrap();
    assert_eq!(catalog, Catalog::builtin());

    std::fs::write(&path, "{\"plans\": []").unwrap();
    let err = Catalog::from_path(&path).unwrap_err();
    assert!(matches!(err, EngineError::CatalogParse(_)));

    let err = Catalog::from_path(dir.path().join("missing.json")).unwrap_err();
    assert!(matches!(err, EngineError::CatalogRead { .. }));
}
