//! Stock reservation for checkout.
//!
//! Reservation is all-or-nothing per order: if any line is short, every short
//! line is reported and no stock moves. Restoration credits each line on its
//! own.

use serde::Serialize;
use tracing::instrument;

use attireburg_core::{StockLine, UserId};

use super::ServiceError;
use super::backorder::CheckoutRequest;
use crate::db::{RepositoryError, Store};
use crate::models::Order;

/// Result of a reservation attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReservationResult {
    pub success: bool,
    pub errors: Vec<String>,
}

pub struct InventoryService<'a> {
    store: &'a dyn Store,
}

impl<'a> InventoryService<'a> {
    #[must_use]
    pub const fn new(store: &'a dyn Store) -> Self {
        Self { store }
    }

    /// Reserve every line or none.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Validation` for a non-positive quantity and
    /// `ServiceError::NotFound` for an unknown item. Shortfalls are reported
    /// in the result, not as an error.
    #[instrument(skip(self, lines), fields(lines = lines.len()))]
    pub async fn reserve_inventory(
        &self,
        lines: &[StockLine],
    ) -> Result<ReservationResult, ServiceError> {
        if lines.iter().any(|line| line.quantity <= 0) {
            return Err(ServiceError::Validation(
                "Quantity must be positive".to_string(),
            ));
        }

        match self.store.reserve_stock(lines).await {
            Ok(()) => Ok(ReservationResult {
                success: true,
                errors: Vec::new(),
            }),
            Err(RepositoryError::InsufficientStock(shortfalls)) => {
                tracing::info!(short = shortfalls.len(), "Reservation refused");
                Ok(ReservationResult {
                    success: false,
                    errors: shortfalls
                        .iter()
                        .map(|s| format!("Insufficient stock for {s}"))
                        .collect(),
                })
            }
            Err(RepositoryError::NotFound) => {
                Err(ServiceError::NotFound("Product not found".to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Credit each line back. Returns how many lines matched an item.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Repository` if the store fails.
    #[instrument(skip(self, lines), fields(lines = lines.len()))]
    pub async fn restore_inventory(&self, lines: &[StockLine]) -> Result<usize, ServiceError> {
        let restored = self.store.restore_stock(lines).await?;
        if restored < lines.len() {
            tracing::warn!(
                restored,
                requested = lines.len(),
                "Some lines did not match an item"
            );
        }
        Ok(restored)
    }

    /// Reserve stock and create a regular order in one step.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Validation` for invalid checkout data,
    /// `ServiceError::NotFound` for an unknown item and a repository
    /// `InsufficientStock` error listing every short line.
    #[instrument(skip(self, request), fields(user_id = %user_id, items = request.items.len()))]
    pub async fn place_order(
        &self,
        user_id: UserId,
        request: CheckoutRequest,
    ) -> Result<Order, ServiceError> {
        let order = self
            .store
            .place_order(request.into_new_order(user_id)?)
            .await
            .map_err(|e| match e {
                RepositoryError::NotFound => {
                    ServiceError::NotFound("Product not found".to_string())
                }
                other => other.into(),
            })?;

        tracing::info!(order_id = %order.id, amount = %order.total_amount, "Order placed");
        Ok(order)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::db::{CatalogStore, MemoryStore};
    use crate::models::OrderItem;
    use attireburg_core::{CurrencyCode, ProductId, StockKey};
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_reservation_is_all_or_nothing() {
        let store = MemoryStore::new();
        let plenty = store.add_product("Socken", "socken", dec!(9), 10).await;
        let scarce = store.add_product("Krawatte", "krawatte", dec!(49), 1).await;
        let service = InventoryService::new(&store);

        let result = service
            .reserve_inventory(&[
                StockLine::new(StockKey::product(plenty.id), 4),
                StockLine::new(StockKey::product(scarce.id), 2),
            ])
            .await
            .unwrap();

        assert!(!result.success);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(
            store.stock_level(StockKey::product(plenty.id)).await.unwrap(),
            Some(10)
        );

        let ok = service
            .reserve_inventory(&[StockLine::new(StockKey::product(plenty.id), 4)])
            .await
            .unwrap();
        assert!(ok.success);
        assert_eq!(
            store.stock_level(StockKey::product(plenty.id)).await.unwrap(),
            Some(6)
        );
    }

    #[tokio::test]
    async fn test_restore_is_per_line() {
        let store = MemoryStore::new();
        let product = store.add_product("Socken", "socken", dec!(9), 0).await;
        let variant = store.add_variant(product.id, "SO-42", "42", None, 0).await;
        let service = InventoryService::new(&store);

        let restored = service
            .restore_inventory(&[
                StockLine::new(variant.stock_key(), 3),
                StockLine::new(StockKey::product(ProductId::new(404)), 1),
            ])
            .await
            .unwrap();

        assert_eq!(restored, 1);
        assert_eq!(store.stock_level(variant.stock_key()).await.unwrap(), Some(3));
        assert_eq!(
            store.stock_level(StockKey::product(product.id)).await.unwrap(),
            Some(0)
        );
    }

    #[tokio::test]
    async fn test_place_order_refuses_oversell() {
        let store = MemoryStore::new();
        let product = store.add_product("Gürtel", "guertel", dec!(45), 1).await;
        let service = InventoryService::new(&store);
        let request = |quantity| CheckoutRequest {
            email: "kunde@example.com".to_string(),
            items: vec![OrderItem {
                product_id: product.id,
                variant_id: None,
                quantity,
                size: "90".to_string(),
                color: None,
                price: dec!(45),
            }],
            total_amount: None,
            currency: CurrencyCode::EUR,
            shipping_address: "Am Markt 2".to_string(),
            shipping_city: "Bremen".to_string(),
            shipping_postal: "28195".to_string(),
            expected_fulfillment_date: None,
        };

        let refused = service.place_order(UserId::new(1), request(2)).await;
        assert!(matches!(
            refused,
            Err(ServiceError::Repository(RepositoryError::InsufficientStock(ref s))) if s.len() == 1
        ));

        let order = service.place_order(UserId::new(1), request(1)).await.unwrap();
        assert!(!order.is_backorder());
        assert_eq!(order.total_amount, dec!(45));
        assert_eq!(
            store.stock_level(StockKey::product(product.id)).await.unwrap(),
            Some(0)
        );
    }
}
