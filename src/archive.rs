//! Append-only persistence for conversion records and subscription orders.
//!
//! These rows are the audit trail of the product: exactly one
//! [`ConversionRecord`] per successful conversion, exactly one
//! [`SubscriptionOrder`] per confirmed payment. The store exposes no update
//! or delete — status changes on orders belong to the external verification
//! process, which owns its own storage access.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::EngineError;
use crate::format::FormatKey;

/// Persisted fact: a conversion that completed successfully.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionRecord {
    pub id: Uuid,
    pub principal_id: String,
    pub original_filename: String,
    pub original_format: FormatKey,
    pub target_format: FormatKey,
    pub file_size: u64,
    pub created_at: DateTime<Utc>,
}

impl ConversionRecord {
    /// Build a record for a conversion completing now.
    pub fn new(
        principal_id: impl Into<String>,
        original_filename: impl Into<String>,
        original_format: FormatKey,
        target_format: FormatKey,
        file_size: u64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            principal_id: principal_id.into(),
            original_filename: original_filename.into(),
            original_format,
            target_format,
            file_size,
            created_at: Utc::now(),
        }
    }
}

/// Verification status of a subscription order.
///
/// The engine only ever writes [`OrderStatus::Pending`]; `Active` and
/// `Rejected` are terminal states reached by the external verification
/// collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Active,
    Rejected,
}

/// Persisted fact: a plan purchase awaiting manual transfer verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionOrder {
    pub id: Uuid,
    pub principal_id: String,
    pub plan_name: String,
    /// Monthly price in whole rupiah, copied from the catalog at order time.
    pub price_monthly: u64,
    /// Display name of the chosen payment channel.
    pub payment_channel: String,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
}

/// Append-only store for records and orders, keyed by principal id.
#[async_trait]
pub trait ArchiveStore: Send + Sync {
    async fn append_conversion(&self, record: ConversionRecord) -> Result<(), EngineError>;

    async fn append_order(&self, order: SubscriptionOrder) -> Result<(), EngineError>;

    /// Conversion records for one principal, oldest first.
    async fn conversions_for(
        &self,
        principal_id: &str,
    ) -> Result<Vec<ConversionRecord>, EngineError>;

    /// Subscription orders for one principal, oldest first.
    async fn orders_for(&self, principal_id: &str) -> Result<Vec<SubscriptionOrder>, EngineError>;
}

/// In-process archive backend.
#[derive(Default)]
pub struct MemoryArchive {
    conversions: Mutex<Vec<ConversionRecord>>,
    orders: Mutex<Vec<SubscriptionOrder>>,
}

impl MemoryArchive {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

#[async_trait]
impl ArchiveStore for MemoryArchive {
    async fn append_conversion(&self, record: ConversionRecord) -> Result<(), EngineError> {
        self.conversions.lock().await.push(record);
        Ok(())
    }

    async fn append_order(&self, order: SubscriptionOrder) -> Result<(), EngineError> {
        self.orders.lock().await.push(order);
        Ok(())
    }

    async fn conversions_for(
        &self,
        principal_id: &str,
    ) -> Result<Vec<ConversionRecord>, EngineError> {
        Ok(self
            .conversions
            .lock()
            .await
            .iter()
            .filter(|r| r.principal_id == principal_id)
            .cloned()
            .collect())
    }

    async fn orders_for(&self, principal_id: &str) -> Result<Vec<SubscriptionOrder>, EngineError> {
        Ok(self
            .orders
            .lock()
            .await
            .iter()
            .filter(|o| o.principal_id == principal_id)
            .cloned()
            .collect())
    }
}
