//! Order models shared by regular orders and backorders.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use attireburg_core::fulfillment::FulfillTarget;
use attireburg_core::{
    CurrencyCode, Email, OrderId, OrderStatus, OrderType, ProductId, StatusHistoryId, StockKey,
    StockLine, UserId, VariantId,
};

/// A line of an order. The price is frozen at checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub product_id: ProductId,
    pub variant_id: Option<VariantId>,
    pub quantity: i32,
    pub size: String,
    pub color: Option<String>,
    pub price: Decimal,
}

impl OrderItem {
    #[must_use]
    pub const fn stock_key(&self) -> StockKey {
        StockKey::new(self.product_id, self.variant_id)
    }

    #[must_use]
    pub const fn stock_line(&self) -> StockLine {
        StockLine::new(self.stock_key(), self.quantity)
    }

    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.price * Decimal::from(self.quantity)
    }
}

/// A stored order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub email: Email,
    pub order_type: OrderType,
    pub status: OrderStatus,
    pub items: Vec<OrderItem>,
    pub total_amount: Decimal,
    pub currency: CurrencyCode,
    pub shipping_address: String,
    pub shipping_city: String,
    pub shipping_postal: String,
    /// Set for backorders only. Lower is served first.
    pub backorder_priority: Option<i64>,
    pub expected_fulfillment_date: Option<DateTime<Utc>>,
    pub fulfilled_at: Option<DateTime<Utc>>,
    pub tracking_number: Option<String>,
    pub cancellation_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    #[must_use]
    pub fn order_number(&self) -> String {
        self.id.order_number()
    }

    #[must_use]
    pub fn stock_lines(&self) -> Vec<StockLine> {
        self.items.iter().map(OrderItem::stock_line).collect()
    }

    #[must_use]
    pub fn is_backorder(&self) -> bool {
        self.order_type == OrderType::Backorder
    }
}

/// Input for creating an order or backorder.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub user_id: UserId,
    pub email: Email,
    pub items: Vec<OrderItem>,
    pub total_amount: Decimal,
    pub currency: CurrencyCode,
    pub shipping_address: String,
    pub shipping_city: String,
    pub shipping_postal: String,
    pub expected_fulfillment_date: Option<DateTime<Utc>>,
}

impl NewOrder {
    #[must_use]
    pub fn stock_lines(&self) -> Vec<StockLine> {
        self.items.iter().map(OrderItem::stock_line).collect()
    }
}

/// A requested status change and the fields it carries.
#[derive(Debug, Clone, Default)]
pub struct StatusChange {
    pub to: OrderStatus,
    pub notes: Option<String>,
    /// Stored when entering `SHIPPED`.
    pub tracking_number: Option<String>,
    /// Stored when entering `CANCELLED`.
    pub cancellation_reason: Option<String>,
    /// Stored when a backorder is fulfilled.
    pub fulfilled_at: Option<DateTime<Utc>>,
}

impl StatusChange {
    #[must_use]
    pub fn to(status: OrderStatus) -> Self {
        Self {
            to: status,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_notes(mut self, notes: Option<String>) -> Self {
        self.notes = notes;
        self
    }
}

/// A row of an order's audit trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusHistoryEntry {
    pub id: StatusHistoryId,
    pub order_id: OrderId,
    /// `None` for the creation entry.
    pub from_status: Option<OrderStatus>,
    pub to_status: OrderStatus,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Filter for the admin backorder listing.
#[derive(Debug, Clone, Copy, Default)]
pub struct BackorderFilter {
    pub status: Option<OrderStatus>,
    pub offset: i64,
    pub limit: i64,
}

/// A fulfillment run.
#[derive(Debug, Clone, Copy)]
pub struct FulfillRequest {
    pub target: FulfillTarget,
    /// Stock received in the same transaction before planning.
    pub receive: Option<StockLine>,
    pub fulfilled_at: DateTime<Utc>,
}

/// Result of a fulfillment run.
#[derive(Debug, Clone, Default)]
pub struct FulfillOutcome {
    /// Backorders moved to `PROCESSING`, in priority order.
    pub fulfilled: Vec<Order>,
    /// Pending backorders in scope that still wait for stock.
    pub still_pending: usize,
}
