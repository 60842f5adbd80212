//! Static subscription catalog: plans and manual-transfer payment channels.
//!
//! Catalog data is *loaded, not computed* — the product team edits a JSON
//! file, nothing derives prices at runtime. A built-in copy of the production
//! catalog ships in the binary so the engine works with zero configuration;
//! [`Catalog::from_path`] overrides it.
//!
//! Malformed catalog data is the one startup-fatal condition in this crate
//! (an empty plan list means the subscription flow cannot run at all), so
//! [`Catalog::validate`] is called on every load path and errors propagate
//! instead of being defaulted away.

use std::path::Path;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// A purchasable subscription plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionPlan {
    pub id: String,
    pub name: String,
    /// Monthly price in whole rupiah.
    pub price_monthly: u64,
    pub features: Vec<String>,
    /// Highlighted in listings.
    #[serde(default)]
    pub popular: bool,
}

/// A manual bank-transfer destination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentChannel {
    pub id: String,
    pub display_name: String,
    pub account_number: String,
    pub account_holder: String,
}

/// The full plan/channel catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Catalog {
    plans: Vec<SubscriptionPlan>,
    channels: Vec<PaymentChannel>,
}

static BUILTIN: Lazy<Catalog> = Lazy::new(|| {
    let plan = |id: &str, name: &str, price: u64, popular: bool, features: &[&str]| {
        SubscriptionPlan {
            id: id.into(),
            name: name.into(),
            price_monthly: price,
            features: features.iter().map(|f| (*f).into()).collect(),
            popular,
        }
    };
    let channel = |id: &str, display: &str, number: &str| PaymentChannel {
        id: id.into(),
        display_name: display.into(),
        account_number: number.into(),
        account_holder: "PT YPKP Indonesia".into(),
    };
    Catalog {
        plans: vec![
            plan("basic", "Basic", 29_000, false, &[
                "50 konversi per bulan",
                "Semua format file",
                "Kecepatan standar",
                "Email support",
            ]),
            plan("pro", "Pro", 49_000, true, &[
                "Konversi tanpa batas",
                "Semua format file",
                "Kecepatan prioritas",
                "Prioritas support",
                "Tanpa watermark",
            ]),
            plan("enterprise", "Enterprise", 99_000, false, &[
                "Konversi tanpa batas",
                "Semua format file",
                "Kecepatan tercepat",
                "24/7 dedicated support",
                "API access",
                "Custom integration",
            ]),
        ],
        channels: vec![
            channel("bca", "Bank BCA", "1234567890"),
            channel("mandiri", "Bank Mandiri", "0987654321"),
            channel("bni", "Bank BNI", "5678901234"),
            channel("bri", "Bank BRI", "4321098765"),
        ],
    }
});

impl Catalog {
    /// The catalog shipped with the binary: three plans, four banks.
    pub fn builtin() -> Self {
        BUILTIN.clone()
    }

    /// Parse a catalog from JSON and validate it.
    pub fn from_json_str(json: &str) -> Result<Self, EngineError> {
        let catalog: Catalog = serde_json::from_str(json)?;
        catalog.validate()?;
        Ok(catalog)
    }

    /// Load a catalog file and validate it.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, EngineError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| EngineError::CatalogRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    /// Reject catalogs the subscription flow cannot run on.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.plans.is_empty() {
            return Err(EngineError::EmptyCatalog { what: "subscription plans" });
        }
        if self.channels.is_empty() {
            return Err(EngineError::EmptyCatalog { what: "payment channels" });
        }
        for (i, plan) in self.plans.iter().enumerate() {
            if plan.price_monthly == 0 {
                return Err(EngineError::InvalidPlanPrice { id: plan.id.clone() });
            }
            if self.plans[..i].iter().any(|p| p.id == plan.id) {
                return Err(EngineError::DuplicateCatalogId {
                    what: "plan",
                    id: plan.id.clone(),
                });
            }
        }
        for (i, ch) in self.channels.iter().enumerate() {
            if self.channels[..i].iter().any(|c| c.id == ch.id) {
                return Err(EngineError::DuplicateCatalogId {
                    what: "channel",
                    id: ch.id.clone(),
                });
            }
        }
        Ok(())
    }

    pub fn plans(&self) -> &[SubscriptionPlan] {
        &self.plans
    }

    pub fn channels(&self) -> &[PaymentChannel] {
        &self.channels
    }

    pub fn plan(&self, id: &str) -> Option<&SubscriptionPlan> {
        self.plans.iter().find(|p| p.id == id)
    }

    pub fn channel(&self, id: &str) -> Option<&PaymentChannel> {
        self.channels.iter().find(|c| c.id == id)
    }
}
