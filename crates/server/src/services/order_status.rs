//! Order state machine with side effects.
//!
//! Every accepted change appends a history row. Entering `CANCELLED` puts the
//! order's stock back; entering `SHIPPED` stores the tracking number and
//! emails the customer.

use serde::Deserialize;
use tracing::instrument;

use attireburg_core::{Locale, OrderId, OrderStatus};

use super::ServiceError;
use super::email::Mailer;
use super::links::Links;
use super::notification::NotificationService;
use crate::db::Store;
use crate::models::{Order, StatusChange, StatusHistoryEntry};

/// Admin request to move an order.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStatus {
    pub status: OrderStatus,
    pub notes: Option<String>,
    pub tracking_number: Option<String>,
}

pub struct OrderStatusService<'a> {
    store: &'a dyn Store,
    notifications: NotificationService<'a>,
}

impl<'a> OrderStatusService<'a> {
    #[must_use]
    pub const fn new(
        store: &'a dyn Store,
        mailer: &'a dyn Mailer,
        links: &'a Links,
        locale: Locale,
    ) -> Self {
        Self {
            store,
            notifications: NotificationService::new(store, mailer, links, locale),
        }
    }

    async fn load(&self, id: OrderId) -> Result<Order, ServiceError> {
        self.store
            .get_order(id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Order not found".to_string()))
    }

    /// Apply a status change.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::NotFound` for an unknown order and
    /// `ServiceError::Conflict` naming both statuses when the transition is
    /// not allowed. A pending backorder can only be cancelled here; it
    /// leaves `PENDING` otherwise through FIFO fulfillment.
    #[instrument(skip(self, request), fields(to = %request.status))]
    pub async fn update_status(
        &self,
        id: OrderId,
        request: UpdateStatus,
    ) -> Result<Order, ServiceError> {
        let order = self.load(id).await?;
        if order.is_backorder()
            && order.status == OrderStatus::Pending
            && request.status != OrderStatus::Cancelled
        {
            return Err(ServiceError::Conflict(format!(
                "Backorder {id} is pending and must be fulfilled via /api/admin/backorders/fulfill"
            )));
        }
        order
            .status
            .validate_transition(request.status, order.order_type)
            .map_err(|e| ServiceError::Conflict(e.to_string()))?;

        let change = match request.status {
            OrderStatus::Shipped => StatusChange {
                tracking_number: request.tracking_number,
                ..StatusChange::to(OrderStatus::Shipped)
            },
            OrderStatus::Cancelled => StatusChange {
                cancellation_reason: request.notes.clone(),
                ..StatusChange::to(OrderStatus::Cancelled)
            },
            other => StatusChange::to(other),
        }
        .with_notes(request.notes);

        let updated = self.store.transition_order(id, change).await?;
        tracing::info!(order_id = %id, from = %order.status, to = %updated.status, "Order status updated");

        if updated.status == OrderStatus::Shipped {
            let report = self
                .notifications
                .send_shipping_notification(&updated, updated.tracking_number.as_deref())
                .await;
            if let Err(e) = report {
                tracing::warn!(order_id = %id, error = %e, "Shipping email skipped");
            }
        }

        Ok(updated)
    }

    /// Status history of an order, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::NotFound` for an unknown order.
    pub async fn history(&self, id: OrderId) -> Result<Vec<StatusHistoryEntry>, ServiceError> {
        self.load(id).await?;
        Ok(self.store.status_history(id).await?)
    }
}
