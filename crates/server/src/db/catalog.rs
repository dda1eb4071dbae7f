//! Catalog queries and stock counter updates.
//!
//! The connection-level helpers are shared with the order queries so that
//! reservation and order insertion can run in one transaction.

use std::collections::BTreeMap;

use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::PgConnection;
use sqlx::types::Json;

use attireburg_core::{
    ProductId, StockKey, StockLine, StockShortfall, VariantId, merge_lines,
};

use super::{CatalogStore, PgStore, RepositoryError};
use crate::models::{ItemLabel, Product, ProductVariant, VariantAttributes};

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct ProductRow {
    id: i32,
    name: String,
    slug: String,
    price: Decimal,
    stock: i32,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Self {
            id: ProductId::new(row.id),
            name: row.name,
            slug: row.slug,
            price: row.price,
            stock: row.stock,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct VariantRow {
    id: i32,
    product_id: i32,
    sku: String,
    size: String,
    color: Option<String>,
    attributes: Json<BTreeMap<String, String>>,
    stock: i32,
}

impl From<VariantRow> for ProductVariant {
    fn from(row: VariantRow) -> Self {
        Self {
            id: VariantId::new(row.id),
            product_id: ProductId::new(row.product_id),
            sku: row.sku,
            size: row.size,
            color: row.color,
            attributes: VariantAttributes::new(row.attributes.0),
            stock: row.stock,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct LabelRow {
    name: String,
    slug: String,
    sku: Option<String>,
}

// =============================================================================
// Connection Helpers
// =============================================================================

/// Read and row-lock the counter for a key.
pub(super) async fn lock_stock(
    conn: &mut PgConnection,
    key: StockKey,
) -> Result<Option<i32>, RepositoryError> {
    let stock = match key.variant_id {
        Some(variant_id) => {
            sqlx::query_scalar::<_, i32>(
                "SELECT stock FROM product_variants WHERE id = $1 AND product_id = $2 FOR UPDATE",
            )
            .bind(variant_id)
            .bind(key.product_id)
            .fetch_optional(&mut *conn)
            .await?
        }
        None => {
            sqlx::query_scalar::<_, i32>("SELECT stock FROM products WHERE id = $1 FOR UPDATE")
                .bind(key.product_id)
                .fetch_optional(&mut *conn)
                .await?
        }
    };
    Ok(stock)
}

/// Add `delta` to the counter for a key. Returns `false` if no row matched.
pub(super) async fn adjust_stock(
    conn: &mut PgConnection,
    key: StockKey,
    delta: i32,
) -> Result<bool, RepositoryError> {
    let result = match key.variant_id {
        Some(variant_id) => {
            sqlx::query(
                r"
                UPDATE product_variants
                SET stock = stock + $1, updated_at = NOW()
                WHERE id = $2 AND product_id = $3
                ",
            )
            .bind(delta)
            .bind(variant_id)
            .bind(key.product_id)
            .execute(&mut *conn)
            .await?
        }
        None => {
            sqlx::query("UPDATE products SET stock = stock + $1, updated_at = NOW() WHERE id = $2")
                .bind(delta)
                .bind(key.product_id)
                .execute(&mut *conn)
                .await?
        }
    };
    Ok(result.rows_affected() > 0)
}

/// Check every line under row locks, then debit all of them.
///
/// Leaves the counters untouched when any line is short; the caller drops
/// the transaction on error.
pub(super) async fn reserve_lines(
    conn: &mut PgConnection,
    lines: &[StockLine],
) -> Result<(), RepositoryError> {
    let merged = merge_lines(lines);
    let mut shortfalls = Vec::new();

    for (key, requested) in &merged {
        let available = lock_stock(conn, *key)
            .await?
            .ok_or(RepositoryError::NotFound)?;
        if available < *requested {
            shortfalls.push(StockShortfall {
                key: *key,
                requested: *requested,
                available: available.max(0),
            });
        }
    }

    if !shortfalls.is_empty() {
        return Err(RepositoryError::InsufficientStock(shortfalls));
    }

    for (key, requested) in merged {
        adjust_stock(conn, key, -requested).await?;
    }
    Ok(())
}

/// Credit each line independently in key order, skipping keys without a row.
pub(super) async fn restore_lines(
    conn: &mut PgConnection,
    lines: &[StockLine],
) -> Result<usize, RepositoryError> {
    let mut ordered: Vec<&StockLine> = lines.iter().collect();
    ordered.sort_by_key(|line| line.key);

    let mut restored = 0;
    for line in ordered {
        if adjust_stock(conn, line.key, line.quantity).await? {
            restored += 1;
        } else {
            tracing::warn!(key = %line.key, quantity = line.quantity, "Stock row missing on restore");
        }
    }
    Ok(restored)
}

// =============================================================================
// Store
// =============================================================================

#[async_trait]
impl CatalogStore for PgStore {
    async fn ping(&self) -> Result<(), RepositoryError> {
        sqlx::query("SELECT 1").execute(self.pool()).await?;
        Ok(())
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(
            "SELECT id, name, slug, price, stock FROM products WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(self.pool())
        .await?;
        Ok(row.map(Into::into))
    }

    async fn get_variant(&self, id: VariantId) -> Result<Option<ProductVariant>, RepositoryError> {
        let row = sqlx::query_as::<_, VariantRow>(
            r"
            SELECT id, product_id, sku, size, color, attributes, stock
            FROM product_variants
            WHERE id = $1
            ",
        )
        .bind(id)
        .fetch_optional(self.pool())
        .await?;
        Ok(row.map(Into::into))
    }

    async fn stock_level(&self, key: StockKey) -> Result<Option<i32>, RepositoryError> {
        let stock = match key.variant_id {
            Some(variant_id) => {
                sqlx::query_scalar::<_, i32>(
                    "SELECT stock FROM product_variants WHERE id = $1 AND product_id = $2",
                )
                .bind(variant_id)
                .bind(key.product_id)
                .fetch_optional(self.pool())
                .await?
            }
            None => {
                sqlx::query_scalar::<_, i32>("SELECT stock FROM products WHERE id = $1")
                    .bind(key.product_id)
                    .fetch_optional(self.pool())
                    .await?
            }
        };
        Ok(stock)
    }

    async fn item_label(&self, key: StockKey) -> Result<Option<ItemLabel>, RepositoryError> {
        let row = match key.variant_id {
            Some(variant_id) => {
                sqlx::query_as::<_, LabelRow>(
                    r"
                    SELECT p.name, p.slug, v.sku
                    FROM product_variants v
                    JOIN products p ON p.id = v.product_id
                    WHERE v.id = $1 AND v.product_id = $2
                    ",
                )
                .bind(variant_id)
                .bind(key.product_id)
                .fetch_optional(self.pool())
                .await?
            }
            None => {
                sqlx::query_as::<_, LabelRow>(
                    "SELECT name, slug, NULL::text AS sku FROM products WHERE id = $1",
                )
                .bind(key.product_id)
                .fetch_optional(self.pool())
                .await?
            }
        };
        Ok(row.map(|row| ItemLabel {
            product_name: row.name,
            product_slug: row.slug,
            variant_sku: row.sku,
        }))
    }

    async fn reserve_stock(&self, lines: &[StockLine]) -> Result<(), RepositoryError> {
        let mut tx = self.pool().begin().await?;
        reserve_lines(&mut tx, lines).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn restore_stock(&self, lines: &[StockLine]) -> Result<usize, RepositoryError> {
        let mut conn = self.pool().acquire().await?;
        restore_lines(&mut conn, lines).await
    }
}
