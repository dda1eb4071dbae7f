//! Backorder lifecycle.
//!
//! A backorder debits stock when it is created, so waiting demand shows up as
//! a negative stock counter. Received stock is handed out in ascending
//! `backorder_priority`: a pending backorder is never skipped in favour of a
//! later one that shares an item with it.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use attireburg_core::fulfillment::FulfillTarget;
use attireburg_core::{CurrencyCode, Email, Locale, OrderId, OrderStatus, StockKey, StockLine, UserId};

use super::ServiceError;
use super::email::Mailer;
use super::links::Links;
use super::notification::{DelayNotification, DeliveryReport, FanOutReport, NotificationService};
use crate::db::{RepositoryError, Store};
use crate::models::{
    BackorderFilter, FulfillRequest, NewOrder, Order, OrderItem, Page, Pagination, StatusChange,
};

/// Checkout data for an order or backorder.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    pub email: String,
    pub items: Vec<OrderItem>,
    /// Checked against the item prices when present.
    pub total_amount: Option<Decimal>,
    #[serde(default)]
    pub currency: CurrencyCode,
    pub shipping_address: String,
    pub shipping_city: String,
    pub shipping_postal: String,
    pub expected_fulfillment_date: Option<DateTime<Utc>>,
}

impl CheckoutRequest {
    /// Validate the checkout and compute its total from the item prices.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Validation` naming the first problem found.
    pub fn into_new_order(self, user_id: UserId) -> Result<NewOrder, ServiceError> {
        let email = Email::parse(&self.email)
            .map_err(|e| ServiceError::Validation(format!("Invalid email: {e}")))?;

        if self.items.is_empty() {
            return Err(ServiceError::Validation(
                "At least one item is required".to_string(),
            ));
        }
        if self.items.iter().any(|item| item.quantity <= 0) {
            return Err(ServiceError::Validation(
                "Quantity must be positive".to_string(),
            ));
        }
        if self.items.iter().any(|item| item.price.is_sign_negative()) {
            return Err(ServiceError::Validation(
                "Price must not be negative".to_string(),
            ));
        }
        required(&self.shipping_address, "Shipping address")?;
        required(&self.shipping_city, "Shipping city")?;
        required(&self.shipping_postal, "Shipping postal code")?;

        let total_amount: Decimal = self.items.iter().map(OrderItem::line_total).sum();
        if self.total_amount.is_some_and(|total| total != total_amount) {
            return Err(ServiceError::Validation(
                "Total amount does not match the items".to_string(),
            ));
        }

        Ok(NewOrder {
            user_id,
            email,
            items: self.items,
            total_amount,
            currency: self.currency,
            shipping_address: self.shipping_address.trim().to_string(),
            shipping_city: self.shipping_city.trim().to_string(),
            shipping_postal: self.shipping_postal.trim().to_string(),
            expected_fulfillment_date: self.expected_fulfillment_date,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBackorderResult {
    pub success: bool,
    pub order_id: OrderId,
    pub message: String,
}

/// Result of receiving stock for an item.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RestockFulfillment {
    pub fulfilled_order_ids: Vec<OrderId>,
    pub still_pending: usize,
    /// Present when stock was left over for waitlist subscribers.
    pub waitlist: Option<FanOutReport>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DelayOutcome {
    pub order: Order,
    pub notification: DeliveryReport,
}

/// Admin listing with per-status counts over all backorders.
#[derive(Debug, Clone, Serialize)]
pub struct BackorderListing {
    #[serde(flatten)]
    pub orders: Page<Order>,
    pub counts: BTreeMap<&'static str, i64>,
}

fn required(value: &str, field: &str) -> Result<(), ServiceError> {
    if value.trim().is_empty() {
        Err(ServiceError::Validation(format!("{field} is required")))
    } else {
        Ok(())
    }
}

fn backorder_not_found() -> ServiceError {
    ServiceError::NotFound("Backorder not found".to_string())
}

/// Backorder service.
pub struct BackorderService<'a> {
    store: &'a dyn Store,
    links: &'a Links,
    notifications: NotificationService<'a>,
}

impl<'a> BackorderService<'a> {
    #[must_use]
    pub const fn new(
        store: &'a dyn Store,
        mailer: &'a dyn Mailer,
        links: &'a Links,
        locale: Locale,
    ) -> Self {
        Self {
            store,
            links,
            notifications: NotificationService::new(store, mailer, links, locale),
        }
    }

    /// Place a backorder with the next priority.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Validation` for invalid checkout data and
    /// `ServiceError::NotFound` when an item does not exist.
    #[instrument(skip(self, request), fields(user_id = %user_id, items = request.items.len()))]
    pub async fn create_backorder(
        &self,
        user_id: UserId,
        request: CheckoutRequest,
    ) -> Result<CreateBackorderResult, ServiceError> {
        let order = self
            .store
            .create_backorder(request.into_new_order(user_id)?)
            .await
            .map_err(|e| match e {
                RepositoryError::NotFound => {
                    ServiceError::NotFound("Product not found".to_string())
                }
                other => other.into(),
            })?;

        tracing::info!(
            order_id = %order.id,
            priority = ?order.backorder_priority,
            amount = %order.total_amount,
            "Backorder created"
        );

        Ok(CreateBackorderResult {
            success: true,
            order_id: order.id,
            message: "Backorder created successfully".to_string(),
        })
    }

    /// A backorder by id. Regular orders are not returned.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Repository` if the store fails.
    pub async fn get_backorder_status(&self, id: OrderId) -> Result<Option<Order>, ServiceError> {
        Ok(self
            .store
            .get_order(id)
            .await?
            .filter(Order::is_backorder))
    }

    /// All backorders of a customer, newest first.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Repository` if the store fails.
    pub async fn get_customer_backorders(
        &self,
        user_id: UserId,
    ) -> Result<Vec<Order>, ServiceError> {
        Ok(self.store.backorders_for_user(user_id).await?)
    }

    /// Cancel a pending or processing backorder and put its stock back.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::NotFound` for an unknown backorder and
    /// `ServiceError::Conflict` when it can no longer be cancelled.
    #[instrument(skip(self, reason))]
    pub async fn cancel_backorder(
        &self,
        id: OrderId,
        reason: Option<String>,
    ) -> Result<Order, ServiceError> {
        let order = self
            .get_backorder_status(id)
            .await?
            .ok_or_else(backorder_not_found)?;
        if !matches!(order.status, OrderStatus::Pending | OrderStatus::Processing) {
            return Err(ServiceError::Conflict(format!(
                "Backorder {} cannot be cancelled in status {}",
                order.order_number(),
                order.status
            )));
        }

        let cancelled = self
            .store
            .transition_order(
                id,
                StatusChange {
                    to: OrderStatus::Cancelled,
                    notes: reason.clone(),
                    cancellation_reason: reason,
                    ..StatusChange::default()
                },
            )
            .await?;

        tracing::info!(order_id = %id, "Backorder cancelled, stock restored");
        Ok(cancelled)
    }

    /// Fulfill one backorder if FIFO allows it with current stock.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::NotFound` for an unknown backorder and
    /// `ServiceError::Conflict` when stock does not reach this backorder yet.
    #[instrument(skip(self))]
    pub async fn fulfill_backorder(
        &self,
        id: OrderId,
        fulfillment_date: DateTime<Utc>,
    ) -> Result<Order, ServiceError> {
        let outcome = self
            .store
            .fulfill_backorders(FulfillRequest {
                target: FulfillTarget::Order(id),
                receive: None,
                fulfilled_at: fulfillment_date,
            })
            .await
            .map_err(|e| match e {
                RepositoryError::NotFound => backorder_not_found(),
                other => other.into(),
            })?;

        let Some(order) = outcome.fulfilled.into_iter().next() else {
            return Err(ServiceError::Conflict(format!(
                "Backorder {} cannot be fulfilled yet: stock does not cover it and every earlier backorder for the same items",
                id.order_number()
            )));
        };

        self.notify_fulfilled(std::slice::from_ref(&order)).await;
        tracing::info!(order_id = %id, "Backorder fulfilled");
        Ok(order)
    }

    /// Receive `quantity` units of an item and fulfill waiting backorders in
    /// priority order, stopping at the first that does not fit. Stock left
    /// over afterwards is announced to the item's waitlist.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Validation` for a non-positive quantity and
    /// `ServiceError::NotFound` for an unknown item.
    #[instrument(skip(self), fields(item = %key))]
    pub async fn fulfill_restocked_item(
        &self,
        key: StockKey,
        quantity: i32,
        fulfillment_date: DateTime<Utc>,
    ) -> Result<RestockFulfillment, ServiceError> {
        if quantity <= 0 {
            return Err(ServiceError::Validation(
                "Quantity must be positive".to_string(),
            ));
        }

        let outcome = self
            .store
            .fulfill_backorders(FulfillRequest {
                target: FulfillTarget::Item(key),
                receive: Some(StockLine::new(key, quantity)),
                fulfilled_at: fulfillment_date,
            })
            .await
            .map_err(|e| match e {
                RepositoryError::NotFound => {
                    ServiceError::NotFound("Product not found".to_string())
                }
                other => other.into(),
            })?;

        self.notify_fulfilled(&outcome.fulfilled).await;

        let waitlist = if self.store.stock_level(key).await?.unwrap_or(0) > 0 {
            Some(self.notifications.notify_waitlist(key).await?)
        } else {
            None
        };

        tracing::info!(
            received = quantity,
            fulfilled = outcome.fulfilled.len(),
            still_pending = outcome.still_pending,
            "Restocked item processed"
        );

        Ok(RestockFulfillment {
            fulfilled_order_ids: outcome.fulfilled.iter().map(|order| order.id).collect(),
            still_pending: outcome.still_pending,
            waitlist,
        })
    }

    async fn notify_fulfilled(&self, orders: &[Order]) {
        for order in orders {
            if let Err(e) = self.notifications.send_fulfillment_notification(order).await {
                tracing::warn!(order_id = %order.id, error = %e, "Fulfillment email skipped");
            }
        }
    }

    /// Move the expected date of a waiting backorder and tell the customer.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Validation` for a past date,
    /// `ServiceError::NotFound` for an unknown backorder and
    /// `ServiceError::Conflict` once it has shipped or was cancelled.
    #[instrument(skip(self))]
    pub async fn delay_backorder(
        &self,
        id: OrderId,
        new_date: Option<DateTime<Utc>>,
    ) -> Result<DelayOutcome, ServiceError> {
        if new_date.is_some_and(|date| date <= Utc::now()) {
            return Err(ServiceError::Validation(
                "New date must be in the future".to_string(),
            ));
        }

        let order = self
            .get_backorder_status(id)
            .await?
            .ok_or_else(backorder_not_found)?;
        if !matches!(order.status, OrderStatus::Pending | OrderStatus::Processing) {
            return Err(ServiceError::Conflict(format!(
                "Backorder {} is {} and can no longer be delayed",
                order.order_number(),
                order.status
            )));
        }

        let original_date = order.expected_fulfillment_date.unwrap_or(order.created_at);
        let updated = self.store.set_expected_fulfillment(id, new_date).await?;

        let product_name = match order.items.first() {
            Some(item) => self
                .store
                .item_label(item.stock_key())
                .await?
                .map_or_else(|| format!("#{}", item.product_id), |l| l.product_name),
            None => order.order_number(),
        };

        let notification = self
            .notifications
            .send_delay_notification(&DelayNotification {
                email: order.email.clone(),
                product_name,
                order_number: order.order_number(),
                original_date,
                new_date,
                cancellation_url: self.links.cancellation_url(id),
                order_id: Some(id),
            })
            .await;

        Ok(DelayOutcome {
            order: updated,
            notification,
        })
    }

    /// Backorders for the admin dashboard.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Repository` if the store fails.
    pub async fn admin_listing(
        &self,
        status: Option<OrderStatus>,
        pagination: Pagination,
    ) -> Result<BackorderListing, ServiceError> {
        let (orders, total) = self
            .store
            .list_backorders(BackorderFilter {
                status,
                offset: pagination.offset(),
                limit: pagination.limit(),
            })
            .await?;

        let mut counts: BTreeMap<&'static str, i64> = OrderStatus::ALL
            .iter()
            .map(|status| (status.as_str(), 0))
            .collect();
        for (status, count) in self.store.backorder_status_counts().await? {
            counts.insert(status.as_str(), count);
        }

        Ok(BackorderListing {
            orders: Page::new(orders, total, pagination),
            counts,
        })
    }
}
