//! The subscription workflow: plan selection through manual bank-transfer
//! confirmation.
//!
//! This machine stops at `OrderSubmitted`. Verifying that the transfer
//! actually arrived — and flipping the order to `active` or `rejected` — is
//! owned by an external verification process the engine never simulates;
//! the only status this code writes is `pending`.

use std::sync::Arc;

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use crate::archive::{ArchiveStore, OrderStatus, SubscriptionOrder};
use crate::catalog::{Catalog, PaymentChannel, SubscriptionPlan};
use crate::error::EngineError;
use crate::identity::Principal;

/// Where the subscription flow currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionState {
    PlanSelection,
    PaymentPending,
    OrderSubmitted,
}

impl SubscriptionState {
    pub fn name(self) -> &'static str {
        match self {
            SubscriptionState::PlanSelection => "PlanSelection",
            SubscriptionState::PaymentPending => "PaymentPending",
            SubscriptionState::OrderSubmitted => "OrderSubmitted",
        }
    }
}

/// What `select_plan` produced.
#[derive(Debug, Clone)]
pub enum PlanOutcome {
    /// Plan bound; the flow moved to `PaymentPending`.
    Selected(SubscriptionPlan),
    /// The principal must sign in first. State unchanged.
    LoginRequired,
}

/// What `confirm` produced.
#[derive(Debug, Clone)]
pub enum ConfirmOutcome {
    /// Order appended with `pending` status; the flow is `OrderSubmitted`.
    Submitted(SubscriptionOrder),
    /// The principal must sign in first. State unchanged.
    LoginRequired,
}

/// Per-session state machine driving one plan purchase.
pub struct SubscriptionWorkflow {
    catalog: Arc<Catalog>,
    archive: Arc<dyn ArchiveStore>,
    state: SubscriptionState,
    plan: Option<SubscriptionPlan>,
    channel: Option<PaymentChannel>,
}

impl SubscriptionWorkflow {
    pub fn new(catalog: Arc<Catalog>, archive: Arc<dyn ArchiveStore>) -> Self {
        Self {
            catalog,
            archive,
            state: SubscriptionState::PlanSelection,
            plan: None,
            channel: None,
        }
    }

    pub fn state(&self) -> SubscriptionState {
        self.state
    }

    pub fn selected_plan(&self) -> Option<&SubscriptionPlan> {
        self.plan.as_ref()
    }

    pub fn selected_channel(&self) -> Option<&PaymentChannel> {
        self.channel.as_ref()
    }

    /// Bind a plan and move to `PaymentPending`.
    ///
    /// Requires an authenticated principal; anonymous callers get
    /// [`PlanOutcome::LoginRequired`] and the flow stays in `PlanSelection`.
    pub fn select_plan(
        &mut self,
        principal: &Principal,
        plan_id: &str,
    ) -> Result<PlanOutcome, EngineError> {
        if self.state != SubscriptionState::PlanSelection {
            return Err(self.invalid("select_plan"));
        }
        if !principal.authenticated {
            info!(plan = plan_id, "plan selection denied: login required");
            return Ok(PlanOutcome::LoginRequired);
        }
        let plan = self
            .catalog
            .plan(plan_id)
            .cloned()
            .ok_or_else(|| EngineError::UnknownPlan { id: plan_id.to_string() })?;
        info!(plan = %plan.name, "plan selected");
        self.plan = Some(plan.clone());
        self.state = SubscriptionState::PaymentPending;
        Ok(PlanOutcome::Selected(plan))
    }

    /// Bind a payment channel. Valid in `PaymentPending`; does not change
    /// state, and re-selecting replaces the previous binding.
    pub fn select_channel(&mut self, channel_id: &str) -> Result<PaymentChannel, EngineError> {
        if self.state != SubscriptionState::PaymentPending {
            return Err(self.invalid("select_channel"));
        }
        let channel = self
            .catalog
            .channel(channel_id)
            .cloned()
            .ok_or_else(|| EngineError::UnknownChannel { id: channel_id.to_string() })?;
        self.channel = Some(channel.clone());
        Ok(channel)
    }

    /// Emit the `pending` order and move to `OrderSubmitted`.
    ///
    /// Requires a bound plan and channel ([`EngineError::MissingSelection`]
    /// otherwise). A persistence failure leaves the flow in
    /// `PaymentPending` with both bindings intact, so confirmation can be
    /// retried.
    pub async fn confirm(&mut self, principal: &Principal) -> Result<ConfirmOutcome, EngineError> {
        if self.state != SubscriptionState::PaymentPending {
            return Err(self.invalid("confirm"));
        }
        if !principal.authenticated {
            return Ok(ConfirmOutcome::LoginRequired);
        }
        let Some(plan) = self.plan.as_ref() else {
            return Err(EngineError::MissingSelection { missing: "subscription plan" });
        };
        let Some(channel) = self.channel.as_ref() else {
            return Err(EngineError::MissingSelection { missing: "payment channel" });
        };

        let order = SubscriptionOrder {
            id: Uuid::new_v4(),
            principal_id: principal.id.clone(),
            plan_name: plan.name.clone(),
            price_monthly: plan.price_monthly,
            payment_channel: channel.display_name.clone(),
            status: OrderStatus::Pending,
            created_at: Utc::now(),
        };
        self.archive.append_order(order.clone()).await?;

        info!(plan = %order.plan_name, channel = %order.payment_channel, "order submitted");
        self.state = SubscriptionState::OrderSubmitted;
        Ok(ConfirmOutcome::Submitted(order))
    }

    /// Return to `PlanSelection`, discarding the plan and channel bindings.
    pub fn back(&mut self) -> Result<(), EngineError> {
        if self.state != SubscriptionState::PaymentPending {
            return Err(self.invalid("back"));
        }
        self.plan = None;
        self.channel = None;
        self.state = SubscriptionState::PlanSelection;
        Ok(())
    }

    fn invalid(&self, operation: &'static str) -> EngineError {
        EngineError::InvalidTransition { operation, state: self.state.name() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::MemoryArchive;

    fn workflow() -> (SubscriptionWorkflow, Arc<MemoryArchive>) {
        let archive = MemoryArchive::new();
        let wf = SubscriptionWorkflow::new(Arc::new(Catalog::builtin()), archive.clone());
        (wf, archive)
    }

    #[test]
    fn anonymous_plan_selection_requires_login() {
        let (mut wf, _) = workflow();
        let outcome = wf.select_plan(&Principal::anonymous(), "pro").unwrap();
        assert!(matches!(outcome, PlanOutcome::LoginRequired));
        assert_eq!(wf.state(), SubscriptionState::PlanSelection);
        assert!(wf.selected_plan().is_none());
    }

    #[test]
    fn unknown_plan_id_is_rejected() {
        let (mut wf, _) = workflow();
        let err = wf.select_plan(&Principal::authenticated("p-1"), "platinum").unwrap_err();
        assert!(matches!(err, EngineError::UnknownPlan { .. }));
        assert_eq!(wf.state(), SubscriptionState::PlanSelection);
    }

    #[tokio::test]
    async fn confirm_without_channel_is_missing_selection() {
        let (mut wf, _) = workflow();
        let user = Principal::authenticated("p-1");
        wf.select_plan(&user, "basic").unwrap();
        let err = wf.confirm(&user).await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::MissingSelection { missing: "payment channel" }
        ));
        assert_eq!(wf.state(), SubscriptionState::PaymentPending);
    }

    #[test]
    fn back_discards_both_bindings() {
        let (mut wf, _) = workflow();
        let user = Principal::authenticated("p-1");
        wf.select_plan(&user, "pro").unwrap();
        wf.select_channel("mandiri").unwrap();
        wf.back().unwrap();
        assert_eq!(wf.state(), SubscriptionState::PlanSelection);
        assert!(wf.selected_plan().is_none());
        assert!(wf.selected_channel().is_none());
    }

    #[test]
    fn channel_selection_outside_payment_step_is_invalid() {
        let (mut wf, _) = workflow();
        let err = wf.select_channel("bca").unwrap_err();
        assert!(matches!(err, EngineError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn confirm_emits_one_pending_order() {
        let (mut wf, archive) = workflow();
        let user = Principal::authenticated("p-1");
        wf.select_plan(&user, "pro").unwrap();
        wf.select_channel("bca").unwrap();

        let outcome = wf.confirm(&user).await.unwrap();
        let ConfirmOutcome::Submitted(order) = outcome else {
            panic!("expected a submitted order");
        };
        assert_eq!(order.plan_name, "Pro");
        assert_eq!(order.price_monthly, 49_000);
        assert_eq!(order.payment_channel, "Bank BCA");
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(wf.state(), SubscriptionState::OrderSubmitted);

        let stored = archive.orders_for("p-1").await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0], order);
    }

    #[tokio::test]
    async fn confirm_twice_is_invalid() {
        let (mut wf, _) = workflow();
        let user = Principal::authenticated("p-1");
        wf.select_plan(&user, "basic").unwrap();
        wf.select_channel("bni").unwrap();
        wf.confirm(&user).await.unwrap();
        let err = wf.confirm(&user).await.unwrap_err();
        assert!(matches!(err, EngineError::InvalidTransition { .. }));
    }
}
