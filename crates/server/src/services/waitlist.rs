//! Waitlist subscriptions.

use serde::Serialize;
use tracing::instrument;

use attireburg_core::{Email, ProductId, StockKey, UserId};

use super::ServiceError;
use crate::db::Store;
use crate::models::{
    NewSubscription, Page, Pagination, WaitlistEntry, WaitlistItemSummary, WaitlistSubscription,
    WaitlistTotals,
};

/// Admin dashboard view of all waitlists.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WaitlistOverview {
    #[serde(flatten)]
    pub items: Page<WaitlistItemSummary>,
    pub totals: WaitlistTotals,
}

/// Waitlist service.
pub struct WaitlistService<'a> {
    store: &'a dyn Store,
}

fn parse_email(raw: &str) -> Result<Email, ServiceError> {
    Email::parse(raw).map_err(|e| ServiceError::Validation(format!("Invalid email: {e}")))
}

impl<'a> WaitlistService<'a> {
    #[must_use]
    pub const fn new(store: &'a dyn Store) -> Self {
        Self { store }
    }

    /// Subscribe `email` to restock emails for an item. Subscribing again
    /// reactivates the existing subscription.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Validation` for a malformed email and
    /// `ServiceError::NotFound` for an unknown product or variant.
    #[instrument(skip(self, email), fields(item = %key))]
    pub async fn subscribe(
        &self,
        email: &str,
        key: StockKey,
        user_id: Option<UserId>,
    ) -> Result<WaitlistSubscription, ServiceError> {
        let email = parse_email(email)?;
        if self.store.stock_level(key).await?.is_none() {
            return Err(ServiceError::NotFound("Product not found".to_string()));
        }

        let subscription = self
            .store
            .upsert_subscription(NewSubscription {
                email,
                key,
                user_id,
            })
            .await?;

        tracing::info!(subscription_id = %subscription.id, "Waitlist subscription active");
        Ok(subscription)
    }

    /// Returns whether an active subscription was removed.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Validation` for a malformed email.
    #[instrument(skip(self, email), fields(item = %key))]
    pub async fn unsubscribe(&self, email: &str, key: StockKey) -> Result<bool, ServiceError> {
        let email = parse_email(email)?;
        let removed = self.store.deactivate_subscription(&email, key).await?;
        if removed {
            tracing::info!("Waitlist subscription removed");
        }
        Ok(removed)
    }

    /// Whether `email` has an active subscription for the item. A malformed
    /// email is never subscribed.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Repository` if the store fails.
    pub async fn is_subscribed(&self, email: &str, key: StockKey) -> Result<bool, ServiceError> {
        let Ok(email) = Email::parse(email) else {
            return Ok(false);
        };
        Ok(self
            .store
            .find_subscription(&email, key)
            .await?
            .is_some_and(|s| s.is_active))
    }

    /// Active subscriptions of one customer, newest first.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Validation` for a malformed email.
    pub async fn list_by_email(&self, email: &str) -> Result<Vec<WaitlistEntry>, ServiceError> {
        let email = parse_email(email)?;
        Ok(self.store.subscriptions_by_email(&email).await?)
    }

    /// Active subscriptions for a product and its variants, newest first.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Repository` if the store fails.
    pub async fn list_by_product(
        &self,
        product_id: ProductId,
    ) -> Result<Vec<WaitlistEntry>, ServiceError> {
        Ok(self.store.subscriptions_by_product(product_id).await?)
    }

    /// Per-item counts, most wanted first.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Repository` if the store fails.
    pub async fn admin_overview(
        &self,
        pagination: Pagination,
    ) -> Result<WaitlistOverview, ServiceError> {
        let (items, totals) = self.store.waitlist_summary(pagination).await?;
        Ok(WaitlistOverview {
            items: Page::new(items, totals.waitlisted_items, pagination),
            totals,
        })
    }
}
