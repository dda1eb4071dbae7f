//! Order and backorder persistence.
//!
//! Transactions that touch both tables lock order rows first, then stock
//! rows in ascending [`StockKey`] order.

use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgConnection;

use attireburg_core::fulfillment::{self, Candidate, FulfillTarget};
use attireburg_core::{
    CurrencyCode, Email, OrderId, OrderStatus, OrderType, ProductId, StatusHistoryId, StockKey,
    UserId, VariantId, merge_lines,
};

use super::catalog::{adjust_stock, lock_stock, reserve_lines, restore_lines};
use super::{OrderStore, PgStore, RepositoryError};
use crate::models::{
    BackorderFilter, FulfillOutcome, FulfillRequest, NewOrder, Order, OrderItem, StatusChange,
    StatusHistoryEntry,
};

const ORDER_COLUMNS: &str = r"
    id, user_id, email, order_type, status, total_amount, currency,
    shipping_address, shipping_city, shipping_postal, backorder_priority,
    expected_fulfillment_date, fulfilled_at, tracking_number, cancellation_reason,
    created_at, updated_at
";

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: i32,
    user_id: i32,
    email: String,
    order_type: OrderType,
    status: OrderStatus,
    total_amount: Decimal,
    currency: String,
    shipping_address: String,
    shipping_city: String,
    shipping_postal: String,
    backorder_priority: Option<i64>,
    expected_fulfillment_date: Option<DateTime<Utc>>,
    fulfilled_at: Option<DateTime<Utc>>,
    tracking_number: Option<String>,
    cancellation_reason: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl OrderRow {
    fn into_order(self, items: Vec<OrderItem>) -> Result<Order, RepositoryError> {
        let email = Email::parse(&self.email).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid email on order {}: {e}", self.id))
        })?;
        let currency = self
            .currency
            .parse::<CurrencyCode>()
            .map_err(|e| RepositoryError::DataCorruption(e.to_string()))?;

        Ok(Order {
            id: OrderId::new(self.id),
            user_id: UserId::new(self.user_id),
            email,
            order_type: self.order_type,
            status: self.status,
            items,
            total_amount: self.total_amount,
            currency,
            shipping_address: self.shipping_address,
            shipping_city: self.shipping_city,
            shipping_postal: self.shipping_postal,
            backorder_priority: self.backorder_priority,
            expected_fulfillment_date: self.expected_fulfillment_date,
            fulfilled_at: self.fulfilled_at,
            tracking_number: self.tracking_number,
            cancellation_reason: self.cancellation_reason,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ItemRow {
    order_id: i32,
    product_id: i32,
    variant_id: Option<i32>,
    quantity: i32,
    size: String,
    color: Option<String>,
    price: Decimal,
}

impl From<ItemRow> for OrderItem {
    fn from(row: ItemRow) -> Self {
        Self {
            product_id: ProductId::new(row.product_id),
            variant_id: row.variant_id.map(VariantId::new),
            quantity: row.quantity,
            size: row.size,
            color: row.color,
            price: row.price,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct HistoryRow {
    id: i32,
    order_id: i32,
    from_status: Option<OrderStatus>,
    to_status: OrderStatus,
    notes: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<HistoryRow> for StatusHistoryEntry {
    fn from(row: HistoryRow) -> Self {
        Self {
            id: StatusHistoryId::new(row.id),
            order_id: OrderId::new(row.order_id),
            from_status: row.from_status,
            to_status: row.to_status,
            notes: row.notes,
            created_at: row.created_at,
        }
    }
}

// =============================================================================
// Connection Helpers
// =============================================================================

/// Attach items to order rows, preserving row order.
async fn hydrate(
    conn: &mut PgConnection,
    rows: Vec<OrderRow>,
) -> Result<Vec<Order>, RepositoryError> {
    if rows.is_empty() {
        return Ok(Vec::new());
    }

    let ids: Vec<i32> = rows.iter().map(|row| row.id).collect();
    let item_rows = sqlx::query_as::<_, ItemRow>(
        r"
        SELECT order_id, product_id, variant_id, quantity, size, color, price
        FROM order_items
        WHERE order_id = ANY($1)
        ORDER BY id
        ",
    )
    .bind(&ids)
    .fetch_all(&mut *conn)
    .await?;

    let mut items: HashMap<i32, Vec<OrderItem>> = HashMap::new();
    for row in item_rows {
        items.entry(row.order_id).or_default().push(row.into());
    }

    rows.into_iter()
        .map(|row| {
            let order_items = items.remove(&row.id).unwrap_or_default();
            row.into_order(order_items)
        })
        .collect()
}

async fn fetch_order(
    conn: &mut PgConnection,
    id: OrderId,
    for_update: bool,
) -> Result<Option<Order>, RepositoryError> {
    let lock = if for_update { " FOR UPDATE" } else { "" };
    let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1{lock}");
    let row = sqlx::query_as::<_, OrderRow>(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

    match row {
        Some(row) => Ok(hydrate(conn, vec![row]).await?.into_iter().next()),
        None => Ok(None),
    }
}

async fn append_history(
    conn: &mut PgConnection,
    order_id: OrderId,
    from: Option<OrderStatus>,
    to: OrderStatus,
    notes: Option<&str>,
) -> Result<(), RepositoryError> {
    sqlx::query(
        r"
        INSERT INTO order_status_history (order_id, from_status, to_status, notes)
        VALUES ($1, $2, $3, $4)
        ",
    )
    .bind(order_id)
    .bind(from)
    .bind(to)
    .bind(notes)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

async fn insert_order(
    conn: &mut PgConnection,
    order: &NewOrder,
    order_type: OrderType,
    priority: Option<i64>,
) -> Result<Order, RepositoryError> {
    let sql = format!(
        r"
        INSERT INTO orders (
            user_id, email, order_type, status, total_amount, currency,
            shipping_address, shipping_city, shipping_postal,
            backorder_priority, expected_fulfillment_date
        )
        VALUES ($1, $2, $3, 'PENDING', $4, $5, $6, $7, $8, $9, $10)
        RETURNING {ORDER_COLUMNS}
        "
    );
    let row = sqlx::query_as::<_, OrderRow>(&sql)
        .bind(order.user_id)
        .bind(order.email.as_str())
        .bind(order_type)
        .bind(order.total_amount)
        .bind(order.currency.code())
        .bind(&order.shipping_address)
        .bind(&order.shipping_city)
        .bind(&order.shipping_postal)
        .bind(priority)
        .bind(order.expected_fulfillment_date)
        .fetch_one(&mut *conn)
        .await?;

    for item in &order.items {
        sqlx::query(
            r"
            INSERT INTO order_items (order_id, product_id, variant_id, quantity, size, color, price)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ",
        )
        .bind(row.id)
        .bind(item.product_id)
        .bind(item.variant_id)
        .bind(item.quantity)
        .bind(&item.size)
        .bind(&item.color)
        .bind(item.price)
        .execute(&mut *conn)
        .await?;
    }

    let note = match order_type {
        OrderType::Regular => "Order placed",
        OrderType::Backorder => "Backorder created",
    };
    append_history(conn, OrderId::new(row.id), None, OrderStatus::Pending, Some(note)).await?;

    row.into_order(order.items.clone())
}

/// Validate and apply a status change on a locked order.
async fn apply_transition(
    conn: &mut PgConnection,
    order: &Order,
    change: &StatusChange,
) -> Result<Order, RepositoryError> {
    order
        .status
        .validate_transition(change.to, order.order_type)?;

    let sql = format!(
        r"
        UPDATE orders
        SET status = $2,
            tracking_number = COALESCE($3, tracking_number),
            cancellation_reason = COALESCE($4, cancellation_reason),
            fulfilled_at = COALESCE($5, fulfilled_at),
            updated_at = NOW()
        WHERE id = $1
        RETURNING {ORDER_COLUMNS}
        "
    );
    let row = sqlx::query_as::<_, OrderRow>(&sql)
        .bind(order.id)
        .bind(change.to)
        .bind(&change.tracking_number)
        .bind(&change.cancellation_reason)
        .bind(change.fulfilled_at)
        .fetch_one(&mut *conn)
        .await?;

    append_history(
        conn,
        order.id,
        Some(order.status),
        change.to,
        change.notes.as_deref(),
    )
    .await?;

    if change.to == OrderStatus::Cancelled {
        restore_lines(conn, &order.stock_lines()).await?;
    }

    row.into_order(order.items.clone())
}

// =============================================================================
// Store
// =============================================================================

#[async_trait]
impl OrderStore for PgStore {
    async fn place_order(&self, order: NewOrder) -> Result<Order, RepositoryError> {
        let mut tx = self.pool().begin().await?;
        reserve_lines(&mut tx, &order.stock_lines()).await?;
        let created = insert_order(&mut tx, &order, OrderType::Regular, None).await?;
        tx.commit().await?;
        Ok(created)
    }

    async fn create_backorder(&self, order: NewOrder) -> Result<Order, RepositoryError> {
        let mut tx = self.pool().begin().await?;

        let priority: i64 = sqlx::query_scalar("SELECT nextval('backorder_priority_seq')")
            .fetch_one(&mut *tx)
            .await?;

        for (key, quantity) in merge_lines(&order.stock_lines()) {
            if !adjust_stock(&mut tx, key, -quantity).await? {
                return Err(RepositoryError::NotFound);
            }
        }

        let created = insert_order(&mut tx, &order, OrderType::Backorder, Some(priority)).await?;
        tx.commit().await?;
        Ok(created)
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let mut conn = self.pool().acquire().await?;
        fetch_order(&mut conn, id, false).await
    }

    async fn backorders_for_user(&self, user_id: UserId) -> Result<Vec<Order>, RepositoryError> {
        let sql = format!(
            r"
            SELECT {ORDER_COLUMNS} FROM orders
            WHERE user_id = $1 AND order_type = 'backorder'
            ORDER BY created_at DESC, id DESC
            "
        );
        let mut conn = self.pool().acquire().await?;
        let rows = sqlx::query_as::<_, OrderRow>(&sql)
            .bind(user_id)
            .fetch_all(&mut *conn)
            .await?;
        hydrate(&mut conn, rows).await
    }

    async fn list_backorders(
        &self,
        filter: BackorderFilter,
    ) -> Result<(Vec<Order>, i64), RepositoryError> {
        let sql = format!(
            r"
            SELECT {ORDER_COLUMNS} FROM orders
            WHERE order_type = 'backorder' AND ($1::order_status IS NULL OR status = $1)
            ORDER BY created_at DESC, id DESC
            LIMIT $2 OFFSET $3
            "
        );
        let mut conn = self.pool().acquire().await?;
        let rows = sqlx::query_as::<_, OrderRow>(&sql)
            .bind(filter.status)
            .bind(filter.limit)
            .bind(filter.offset)
            .fetch_all(&mut *conn)
            .await?;

        let total: i64 = sqlx::query_scalar(
            r"
            SELECT COUNT(*) FROM orders
            WHERE order_type = 'backorder' AND ($1::order_status IS NULL OR status = $1)
            ",
        )
        .bind(filter.status)
        .fetch_one(&mut *conn)
        .await?;

        Ok((hydrate(&mut conn, rows).await?, total))
    }

    async fn backorder_status_counts(&self) -> Result<Vec<(OrderStatus, i64)>, RepositoryError> {
        let counts = sqlx::query_as::<_, (OrderStatus, i64)>(
            r"
            SELECT status, COUNT(*) FROM orders
            WHERE order_type = 'backorder'
            GROUP BY status
            ",
        )
        .fetch_all(self.pool())
        .await?;
        Ok(counts)
    }

    async fn transition_order(
        &self,
        id: OrderId,
        change: StatusChange,
    ) -> Result<Order, RepositoryError> {
        let mut tx = self.pool().begin().await?;
        let order = fetch_order(&mut tx, id, true)
            .await?
            .ok_or(RepositoryError::NotFound)?;
        let updated = apply_transition(&mut tx, &order, &change).await?;
        tx.commit().await?;
        Ok(updated)
    }

    async fn fulfill_backorders(
        &self,
        request: FulfillRequest,
    ) -> Result<FulfillOutcome, RepositoryError> {
        let mut tx = self.pool().begin().await?;

        let sql = format!(
            r"
            SELECT {ORDER_COLUMNS} FROM orders
            WHERE order_type = 'backorder' AND status = 'PENDING'
            ORDER BY backorder_priority
            FOR UPDATE
            "
        );
        let rows = sqlx::query_as::<_, OrderRow>(&sql)
            .fetch_all(&mut *tx)
            .await?;
        let pending = hydrate(&mut tx, rows).await?;

        if let FulfillTarget::Order(order_id) = request.target {
            if !pending.iter().any(|order| order.id == order_id) {
                let order = fetch_order(&mut tx, order_id, false)
                    .await?
                    .ok_or(RepositoryError::NotFound)?;
                if !order.is_backorder() {
                    return Err(RepositoryError::Conflict(format!(
                        "order {order_id} is not a backorder"
                    )));
                }
                order
                    .status
                    .validate_transition(OrderStatus::Processing, order.order_type)?;
            }
        }

        let candidates: Vec<Candidate> = pending
            .iter()
            .map(|order| Candidate {
                order_id: order.id,
                priority: order.backorder_priority.unwrap_or(i64::MAX),
                lines: order.stock_lines(),
            })
            .collect();

        let keys: BTreeSet<StockKey> = candidates
            .iter()
            .flat_map(|c| c.lines.iter().map(|line| line.key))
            .chain(request.receive.map(|line| line.key))
            .collect();

        let mut stock = HashMap::new();
        for key in keys {
            if let Some(level) = lock_stock(&mut tx, key).await? {
                stock.insert(key, level);
            }
        }

        if let Some(line) = request.receive {
            let level = stock.get_mut(&line.key).ok_or(RepositoryError::NotFound)?;
            adjust_stock(&mut tx, line.key, line.quantity).await?;
            *level += line.quantity;
        }

        let plan = fulfillment::plan(&candidates, &stock);
        let selection = plan.select(&candidates, request.target);

        let mut fulfilled = Vec::with_capacity(selection.fulfill.len());
        for order_id in &selection.fulfill {
            let Some(order) = pending.iter().find(|order| order.id == *order_id) else {
                continue;
            };
            let change = StatusChange {
                to: OrderStatus::Processing,
                notes: Some("Fulfilled from restocked inventory".to_owned()),
                fulfilled_at: Some(request.fulfilled_at),
                ..StatusChange::default()
            };
            fulfilled.push(apply_transition(&mut tx, order, &change).await?);
        }

        tx.commit().await?;
        Ok(FulfillOutcome {
            fulfilled,
            still_pending: selection.still_pending,
        })
    }

    async fn set_expected_fulfillment(
        &self,
        id: OrderId,
        date: Option<DateTime<Utc>>,
    ) -> Result<Order, RepositoryError> {
        let sql = format!(
            r"
            UPDATE orders
            SET expected_fulfillment_date = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING {ORDER_COLUMNS}
            "
        );
        let mut conn = self.pool().acquire().await?;
        let row = sqlx::query_as::<_, OrderRow>(&sql)
            .bind(id)
            .bind(date)
            .fetch_optional(&mut *conn)
            .await?
            .ok_or(RepositoryError::NotFound)?;
        hydrate(&mut conn, vec![row])
            .await?
            .into_iter()
            .next()
            .ok_or(RepositoryError::NotFound)
    }

    async fn status_history(
        &self,
        id: OrderId,
    ) -> Result<Vec<StatusHistoryEntry>, RepositoryError> {
        let rows = sqlx::query_as::<_, HistoryRow>(
            r"
            SELECT id, order_id, from_status, to_status, notes, created_at
            FROM order_status_history
            WHERE order_id = $1
            ORDER BY id
            ",
        )
        .bind(id)
        .fetch_all(self.pool())
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }
}
