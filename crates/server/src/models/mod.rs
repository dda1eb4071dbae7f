//! Domain models for the back-office API.
//!
//! Models are plain data. Persistence lives in [`crate::db`], rules in
//! [`crate::services`] and `attireburg_core`.

pub mod catalog;
pub mod notification;
pub mod order;
pub mod restock;
pub mod waitlist;

use serde::{Deserialize, Serialize};

pub use catalog::{ItemLabel, Product, ProductVariant, VariantAttributes};
pub use notification::{NewNotificationLog, NotificationCounts, NotificationLog};
pub use order::{
    BackorderFilter, FulfillOutcome, FulfillRequest, NewOrder, Order, OrderItem, StatusChange,
    StatusHistoryEntry,
};
pub use restock::{NewRestockSchedule, RestockSchedule};
pub use waitlist::{
    NewSubscription, WaitlistEntry, WaitlistItemSummary, WaitlistSubscription, WaitlistTotals,
};

const DEFAULT_PER_PAGE: u32 = 20;
const MAX_PER_PAGE: u32 = 100;

/// Pagination query parameters (`?page=2&perPage=50`).
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

impl Pagination {
    /// 1-based page number.
    #[must_use]
    pub fn page(&self) -> u32 {
        self.page.unwrap_or(1).max(1)
    }

    /// Page size, clamped to `1..=100`.
    #[must_use]
    pub fn per_page(&self) -> u32 {
        self.per_page
            .unwrap_or(DEFAULT_PER_PAGE)
            .clamp(1, MAX_PER_PAGE)
    }

    #[must_use]
    pub fn offset(&self) -> i64 {
        i64::from(self.page() - 1) * i64::from(self.per_page())
    }

    #[must_use]
    pub fn limit(&self) -> i64 {
        i64::from(self.per_page())
    }
}

/// One page of a listing.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub data: Vec<T>,
    pub total: i64,
    pub page: u32,
    pub per_page: u32,
}

impl<T> Page<T> {
    #[must_use]
    pub fn new(data: Vec<T>, total: i64, pagination: Pagination) -> Self {
        Self {
            data,
            total,
            page: pagination.page(),
            per_page: pagination.per_page(),
        }
    }

    /// Number of pages needed for `total` rows.
    #[must_use]
    pub fn total_pages(&self) -> i64 {
        let per_page = i64::from(self.per_page);
        (self.total + per_page - 1) / per_page
    }
}
