//! Restock date scheduling.
//!
//! Every change appends a schedule row for exactly one item; the newest row
//! is the item's current schedule. A newest row without a date means the
//! date was cleared, which differs from an item that never had a schedule.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use attireburg_core::{Locale, ProductId, RestockDisplay, StockKey, VariantId};

use super::ServiceError;
use crate::db::Store;
use crate::models::{NewRestockSchedule, RestockSchedule};

const FUTURE_DATE_REQUIRED: &str = "Expected date must be in the future";

/// Request to set (or clear, with no date) an item's restock date.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetRestockDate {
    pub product_id: ProductId,
    pub variant_id: Option<VariantId>,
    pub expected_date: Option<DateTime<Utc>>,
    pub notes: Option<String>,
}

impl SetRestockDate {
    #[must_use]
    pub const fn key(&self) -> StockKey {
        StockKey::new(self.product_id, self.variant_id)
    }
}

/// An entry of a bulk update that was skipped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkFailure {
    pub product_id: ProductId,
    pub variant_id: Option<VariantId>,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkUpdateResult {
    pub success: bool,
    pub message: String,
    pub updated_count: usize,
    pub failed: Vec<BulkFailure>,
}

/// A future restock with display names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpcomingRestock {
    #[serde(flatten)]
    pub schedule: RestockSchedule,
    pub product_name: String,
    pub variant_sku: Option<String>,
}

/// Restock date service.
pub struct RestockService<'a> {
    store: &'a dyn Store,
}

impl<'a> RestockService<'a> {
    #[must_use]
    pub const fn new(store: &'a dyn Store) -> Self {
        Self { store }
    }

    async fn ensure_item(&self, key: StockKey) -> Result<(), ServiceError> {
        match self.store.stock_level(key).await? {
            Some(_) => Ok(()),
            None if key.is_variant() => {
                Err(ServiceError::NotFound("Product variant not found".to_string()))
            }
            None => Err(ServiceError::NotFound("Product not found".to_string())),
        }
    }

    /// Append a schedule row for the item.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Validation` if the date is not in the future
    /// and `ServiceError::NotFound` for an unknown product or variant.
    #[instrument(skip(self, request), fields(item = %request.key()))]
    pub async fn set_restock_date(
        &self,
        request: SetRestockDate,
    ) -> Result<RestockSchedule, ServiceError> {
        if request.expected_date.is_some_and(|date| date <= Utc::now()) {
            return Err(ServiceError::Validation(FUTURE_DATE_REQUIRED.to_string()));
        }
        let key = request.key();
        self.ensure_item(key).await?;

        let schedule = self
            .store
            .append_restock_schedule(NewRestockSchedule {
                key,
                expected_date: request.expected_date,
                notes: request.notes,
            })
            .await?;

        tracing::info!(expected_date = ?schedule.expected_date, "Restock date updated");
        Ok(schedule)
    }

    /// Current expected date of an item, `None` when unknown or cleared.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Repository` if the store fails.
    pub async fn get_restock_date(
        &self,
        key: StockKey,
    ) -> Result<Option<DateTime<Utc>>, ServiceError> {
        Ok(self
            .get_restock_schedule(key)
            .await?
            .and_then(|schedule| schedule.expected_date))
    }

    /// Newest schedule row of an item.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Repository` if the store fails.
    pub async fn get_restock_schedule(
        &self,
        key: StockKey,
    ) -> Result<Option<RestockSchedule>, ServiceError> {
        Ok(self.store.latest_restock_schedule(key).await?)
    }

    /// Append a row without a date.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::NotFound` for an unknown product or variant.
    #[instrument(skip(self), fields(item = %key))]
    pub async fn clear_restock_date(&self, key: StockKey) -> Result<RestockSchedule, ServiceError> {
        self.ensure_item(key).await?;
        let schedule = self
            .store
            .append_restock_schedule(NewRestockSchedule {
                key,
                expected_date: None,
                notes: None,
            })
            .await?;
        tracing::info!("Restock date cleared");
        Ok(schedule)
    }

    /// Apply each update on its own. Invalid entries are skipped.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Repository` only for store failures.
    #[instrument(skip(self, updates), fields(count = updates.len()))]
    pub async fn bulk_update_restock_dates(
        &self,
        updates: Vec<SetRestockDate>,
    ) -> Result<BulkUpdateResult, ServiceError> {
        let total = updates.len();
        let mut updated_count = 0;
        let mut failed = Vec::new();

        for update in updates {
            let (product_id, variant_id) = (update.product_id, update.variant_id);
            match self.set_restock_date(update).await {
                Ok(_) => updated_count += 1,
                Err(ServiceError::Repository(e)) => return Err(e.into()),
                Err(e) => {
                    tracing::warn!(
                        product_id = %product_id,
                        variant_id = ?variant_id,
                        error = %e,
                        "Skipping restock date update"
                    );
                    failed.push(BulkFailure {
                        product_id,
                        variant_id,
                        error: e.to_string(),
                    });
                }
            }
        }

        Ok(BulkUpdateResult {
            success: true,
            message: format!("Updated {updated_count} of {total} restock dates"),
            updated_count,
            failed,
        })
    }

    /// Items whose current schedule lies in the future, soonest first.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Repository` if the store fails.
    pub async fn get_upcoming_restocks(&self) -> Result<Vec<UpcomingRestock>, ServiceError> {
        let schedules = self.store.upcoming_restocks(Utc::now()).await?;
        let mut upcoming = Vec::with_capacity(schedules.len());
        for schedule in schedules {
            let label = self.store.item_label(schedule.stock_key()).await?;
            let (product_name, variant_sku) = label.map_or_else(
                || (format!("#{}", schedule.product_id), None),
                |l| (l.product_name, l.variant_sku),
            );
            upcoming.push(UpcomingRestock {
                schedule,
                product_name,
                variant_sku,
            });
        }
        Ok(upcoming)
    }

    /// Every schedule row of an item, newest first.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Repository` if the store fails.
    pub async fn get_restock_history(
        &self,
        key: StockKey,
    ) -> Result<Vec<RestockSchedule>, ServiceError> {
        Ok(self.store.restock_history(key).await?)
    }

    /// The storefront restock hint for an item.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::NotFound` for an unknown product or variant.
    pub async fn restock_display(
        &self,
        key: StockKey,
        locale: Locale,
    ) -> Result<RestockDisplay, ServiceError> {
        let stock = self
            .store
            .stock_level(key)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Product not found".to_string()))?;
        let expected_date = self.get_restock_date(key).await?;
        Ok(RestockDisplay::resolve(
            stock > 0,
            expected_date,
            Utc::now(),
            locale,
        ))
    }
}
