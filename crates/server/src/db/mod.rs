//! Persistence for the back-office.
//!
//! # Tables
//!
//! - `products`, `product_variants` - catalog rows and stock counters
//! - `orders`, `order_items`, `order_status_history` - orders and backorders
//! - `restock_schedules` - append-only restock date history
//! - `waitlist_subscriptions` - restock email interest per item
//! - `notification_log` - sent notifications and engagement flags
//!
//! # Stores
//!
//! Services talk to the [`Store`] trait. [`PgStore`] is the `PostgreSQL`
//! implementation; [`MemoryStore`] keeps everything in process and backs the
//! test suites. Both implement every multi-row operation (reservation,
//! cancellation with restoration, fulfillment) atomically.
//!
//! # Migrations
//!
//! Migrations are stored in `crates/server/migrations/` and run via:
//! ```bash
//! cargo run -p attireburg-cli -- migrate
//! ```

pub mod catalog;
pub mod memory;
pub mod notifications;
pub mod orders;
pub mod restock;
pub mod waitlist;

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

use attireburg_core::{
    Email, EngagementEvent, NotificationId, OrderId, OrderStatus, ProductId, StockKey, StockLine,
    StockShortfall, SubscriptionId, TransitionError, UserId, VariantId,
};

use crate::models::{
    BackorderFilter, FulfillOutcome, FulfillRequest, ItemLabel, NewNotificationLog, NewOrder,
    NewRestockSchedule, NewSubscription, NotificationCounts, NotificationLog, Order, Pagination,
    Product, ProductVariant, RestockSchedule, StatusChange, StatusHistoryEntry, WaitlistEntry,
    WaitlistItemSummary, WaitlistSubscription, WaitlistTotals,
};

pub use memory::MemoryStore;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation or a precondition that no longer holds.
    #[error("constraint violation: {0}")]
    Conflict(String),

    /// A reservation could not be satisfied. Nothing was reserved.
    #[error("insufficient stock for {} item(s)", .0.len())]
    InsufficientStock(Vec<StockShortfall>),

    /// The order state machine rejected a status change.
    #[error(transparent)]
    InvalidTransition(#[from] TransitionError),
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// Products, variants and stock counters.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Check that the backing store answers.
    async fn ping(&self) -> Result<(), RepositoryError>;

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, RepositoryError>;

    async fn get_variant(&self, id: VariantId) -> Result<Option<ProductVariant>, RepositoryError>;

    /// Current counter for a key, `None` if the product or variant does not
    /// exist or the variant belongs to another product.
    async fn stock_level(&self, key: StockKey) -> Result<Option<i32>, RepositoryError>;

    /// Names for a key, `None` under the same conditions as [`Self::stock_level`].
    async fn item_label(&self, key: StockKey) -> Result<Option<ItemLabel>, RepositoryError>;

    /// Debit every line or none.
    ///
    /// Fails with [`RepositoryError::InsufficientStock`] listing every short
    /// line.
    async fn reserve_stock(&self, lines: &[StockLine]) -> Result<(), RepositoryError>;

    /// Credit each line on its own. Returns how many lines matched a row.
    async fn restore_stock(&self, lines: &[StockLine]) -> Result<usize, RepositoryError>;
}

/// Append-only restock schedules.
#[async_trait]
pub trait RestockStore: Send + Sync {
    async fn append_restock_schedule(
        &self,
        schedule: NewRestockSchedule,
    ) -> Result<RestockSchedule, RepositoryError>;

    /// Newest row for exactly this key.
    async fn latest_restock_schedule(
        &self,
        key: StockKey,
    ) -> Result<Option<RestockSchedule>, RepositoryError>;

    /// All rows for exactly this key, newest first.
    async fn restock_history(&self, key: StockKey)
    -> Result<Vec<RestockSchedule>, RepositoryError>;

    /// Current schedules whose date is after `now`, soonest first.
    async fn upcoming_restocks(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<RestockSchedule>, RepositoryError>;
}

/// Waitlist subscriptions.
#[async_trait]
pub trait WaitlistStore: Send + Sync {
    /// Insert, or reactivate the existing row for the same identity.
    async fn upsert_subscription(
        &self,
        subscription: NewSubscription,
    ) -> Result<WaitlistSubscription, RepositoryError>;

    /// Returns whether an active row was deactivated.
    async fn deactivate_subscription(
        &self,
        email: &Email,
        key: StockKey,
    ) -> Result<bool, RepositoryError>;

    async fn find_subscription(
        &self,
        email: &Email,
        key: StockKey,
    ) -> Result<Option<WaitlistSubscription>, RepositoryError>;

    async fn subscriptions_by_email(
        &self,
        email: &Email,
    ) -> Result<Vec<WaitlistEntry>, RepositoryError>;

    async fn subscriptions_by_product(
        &self,
        product_id: ProductId,
    ) -> Result<Vec<WaitlistEntry>, RepositoryError>;

    /// Active subscriptions for exactly this key, oldest first.
    async fn active_subscribers(
        &self,
        key: StockKey,
    ) -> Result<Vec<WaitlistSubscription>, RepositoryError>;

    async fn mark_notified(
        &self,
        ids: &[SubscriptionId],
        at: DateTime<Utc>,
    ) -> Result<(), RepositoryError>;

    /// Items with active subscribers, most subscribers first.
    async fn waitlist_summary(
        &self,
        pagination: Pagination,
    ) -> Result<(Vec<WaitlistItemSummary>, WaitlistTotals), RepositoryError>;
}

/// Orders, backorders and their status history.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Reserve stock and insert a regular order in one transaction.
    async fn place_order(&self, order: NewOrder) -> Result<Order, RepositoryError>;

    /// Draw the next backorder priority, debit stock (possibly below zero) and
    /// insert the backorder in one transaction.
    async fn create_backorder(&self, order: NewOrder) -> Result<Order, RepositoryError>;

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>, RepositoryError>;

    async fn backorders_for_user(&self, user_id: UserId) -> Result<Vec<Order>, RepositoryError>;

    /// Backorders matching the filter, newest first, plus the total count.
    async fn list_backorders(
        &self,
        filter: BackorderFilter,
    ) -> Result<(Vec<Order>, i64), RepositoryError>;

    /// Number of backorders per status.
    async fn backorder_status_counts(
        &self,
    ) -> Result<Vec<(OrderStatus, i64)>, RepositoryError>;

    /// Apply a validated status change, append history and restore stock
    /// when entering `CANCELLED`, all in one transaction.
    async fn transition_order(
        &self,
        id: OrderId,
        change: StatusChange,
    ) -> Result<Order, RepositoryError>;

    /// Receive stock (optional), plan FIFO allocation over all pending
    /// backorders and move the targeted ones to `PROCESSING`.
    async fn fulfill_backorders(
        &self,
        request: FulfillRequest,
    ) -> Result<FulfillOutcome, RepositoryError>;

    async fn set_expected_fulfillment(
        &self,
        id: OrderId,
        date: Option<DateTime<Utc>>,
    ) -> Result<Order, RepositoryError>;

    /// Oldest first.
    async fn status_history(
        &self,
        id: OrderId,
    ) -> Result<Vec<StatusHistoryEntry>, RepositoryError>;
}

/// Notification log.
#[async_trait]
pub trait NotificationLogStore: Send + Sync {
    async fn record_notification(
        &self,
        entry: NewNotificationLog,
    ) -> Result<NotificationLog, RepositoryError>;

    async fn notification_counts(&self) -> Result<NotificationCounts, RepositoryError>;

    /// Returns `false` if no such notification exists.
    async fn mark_engagement(
        &self,
        id: NotificationId,
        event: EngagementEvent,
    ) -> Result<bool, RepositoryError>;
}

/// Everything the services need from persistence.
pub trait Store:
    CatalogStore + RestockStore + WaitlistStore + OrderStore + NotificationLogStore
{
}

impl<T> Store for T where
    T: CatalogStore + RestockStore + WaitlistStore + OrderStore + NotificationLogStore
{
}

/// `PostgreSQL`-backed [`Store`].
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

