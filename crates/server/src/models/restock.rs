//! Restock schedule models.

use chrono::{DateTime, Utc};
use serde::Serialize;

use attireburg_core::{ProductId, RestockScheduleId, StockKey, VariantId};

/// One entry of a restock schedule's history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RestockSchedule {
    pub id: RestockScheduleId,
    pub product_id: ProductId,
    pub variant_id: Option<VariantId>,
    /// `None` when the date was explicitly cleared.
    pub expected_date: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RestockSchedule {
    #[must_use]
    pub const fn stock_key(&self) -> StockKey {
        StockKey::new(self.product_id, self.variant_id)
    }
}

/// A schedule entry to append.
#[derive(Debug, Clone)]
pub struct NewRestockSchedule {
    pub key: StockKey,
    pub expected_date: Option<DateTime<Utc>>,
    pub notes: Option<String>,
}
