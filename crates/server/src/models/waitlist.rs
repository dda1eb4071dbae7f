//! Waitlist models.

use chrono::{DateTime, Utc};
use serde::Serialize;

use attireburg_core::{Email, ProductId, StockKey, SubscriptionId, UserId, VariantId};

/// A waitlist subscription, unique per (email, product, variant).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WaitlistSubscription {
    pub id: SubscriptionId,
    pub email: Email,
    pub product_id: ProductId,
    pub variant_id: Option<VariantId>,
    pub user_id: Option<UserId>,
    pub is_active: bool,
    /// Last time a restock email went out for this subscription.
    pub notified_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WaitlistSubscription {
    #[must_use]
    pub const fn stock_key(&self) -> StockKey {
        StockKey::new(self.product_id, self.variant_id)
    }
}

/// A subscription with the names needed to display it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WaitlistEntry {
    #[serde(flatten)]
    pub subscription: WaitlistSubscription,
    pub product_name: String,
    pub variant_sku: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewSubscription {
    pub email: Email,
    pub key: StockKey,
    pub user_id: Option<UserId>,
}

/// Per-item waitlist counts for the admin dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WaitlistItemSummary {
    pub product_id: ProductId,
    pub variant_id: Option<VariantId>,
    pub product_name: String,
    pub variant_sku: Option<String>,
    pub active_count: i64,
    pub notified_count: i64,
    pub latest_signup: DateTime<Utc>,
}

/// Totals across all waitlists.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WaitlistTotals {
    pub active_subscriptions: i64,
    pub total_subscriptions: i64,
    pub waitlisted_items: i64,
}
