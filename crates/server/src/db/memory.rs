//! In-process [`Store`](super::Store) used by the test suites and local demos.
//!
//! Every operation takes the single state lock for its whole duration, which
//! gives the same all-or-nothing behaviour the `PostgreSQL` store gets from
//! transactions.

use std::collections::{BTreeMap, HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tokio::sync::Mutex;

use attireburg_core::fulfillment::{self, Candidate, FulfillTarget};
use attireburg_core::{
    Email, EngagementEvent, NotificationId, OrderId, OrderStatus, OrderType, ProductId,
    RestockScheduleId, StatusHistoryId, StockKey, StockLine, StockShortfall, SubscriptionId,
    UserId, VariantId, merge_lines,
};

use super::{
    CatalogStore, NotificationLogStore, OrderStore, RepositoryError, RestockStore, WaitlistStore,
};
use crate::models::{
    BackorderFilter, FulfillOutcome, FulfillRequest, ItemLabel, NewNotificationLog, NewOrder,
    NewRestockSchedule, NewSubscription, NotificationCounts, NotificationLog, Order, Pagination,
    Product, ProductVariant, RestockSchedule, StatusChange, StatusHistoryEntry, VariantAttributes,
    WaitlistEntry, WaitlistItemSummary, WaitlistSubscription, WaitlistTotals,
};

/// Next value per table, mirroring `SERIAL` columns.
#[derive(Debug, Default)]
struct Sequences {
    product: i32,
    variant: i32,
    schedule: i32,
    subscription: i32,
    order: i32,
    history: i32,
    notification: i32,
    priority: i64,
}

fn next(counter: &mut i32) -> i32 {
    *counter += 1;
    *counter
}

#[derive(Debug, Default)]
struct State {
    seq: Sequences,
    products: BTreeMap<ProductId, Product>,
    variants: BTreeMap<VariantId, ProductVariant>,
    schedules: Vec<RestockSchedule>,
    subscriptions: Vec<WaitlistSubscription>,
    orders: BTreeMap<OrderId, Order>,
    history: Vec<StatusHistoryEntry>,
    notifications: Vec<NotificationLog>,
}

impl State {
    fn stock(&self, key: StockKey) -> Option<i32> {
        match key.variant_id {
            Some(variant_id) => self
                .variants
                .get(&variant_id)
                .filter(|v| v.product_id == key.product_id)
                .map(|v| v.stock),
            None => self.products.get(&key.product_id).map(|p| p.stock),
        }
    }

    fn stock_mut(&mut self, key: StockKey) -> Option<&mut i32> {
        match key.variant_id {
            Some(variant_id) => self
                .variants
                .get_mut(&variant_id)
                .filter(|v| v.product_id == key.product_id)
                .map(|v| &mut v.stock),
            None => self.products.get_mut(&key.product_id).map(|p| &mut p.stock),
        }
    }

    fn adjust(&mut self, key: StockKey, delta: i32) -> bool {
        match self.stock_mut(key) {
            Some(stock) => {
                *stock += delta;
                true
            }
            None => false,
        }
    }

    fn label(&self, key: StockKey) -> Option<ItemLabel> {
        let product = self.products.get(&key.product_id)?;
        let variant_sku = match key.variant_id {
            Some(variant_id) => Some(
                self.variants
                    .get(&variant_id)
                    .filter(|v| v.product_id == key.product_id)?
                    .sku
                    .clone(),
            ),
            None => None,
        };
        Some(ItemLabel {
            product_name: product.name.clone(),
            product_slug: product.slug.clone(),
            variant_sku,
        })
    }

    fn reserve(&mut self, lines: &[StockLine]) -> Result<(), RepositoryError> {
        let merged = merge_lines(lines);
        let mut shortfalls = Vec::new();
        for (key, requested) in &merged {
            let available = self.stock(*key).ok_or(RepositoryError::NotFound)?;
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
            self.adjust(key, -requested);
        }
        Ok(())
    }

    fn restore(&mut self, lines: &[StockLine]) -> usize {
        lines
            .iter()
            .filter(|line| self.adjust(line.key, line.quantity))
            .count()
    }

    fn push_history(
        &mut self,
        order_id: OrderId,
        from: Option<OrderStatus>,
        to: OrderStatus,
        notes: Option<String>,
    ) {
        let id = StatusHistoryId::new(next(&mut self.seq.history));
        self.history.push(StatusHistoryEntry {
            id,
            order_id,
            from_status: from,
            to_status: to,
            notes,
            created_at: Utc::now(),
        });
    }

    fn insert_order(
        &mut self,
        order: NewOrder,
        order_type: OrderType,
        priority: Option<i64>,
    ) -> Order {
        let now = Utc::now();
        let id = OrderId::new(next(&mut self.seq.order));
        let created = Order {
            id,
            user_id: order.user_id,
            email: order.email,
            order_type,
            status: OrderStatus::Pending,
            items: order.items,
            total_amount: order.total_amount,
            currency: order.currency,
            shipping_address: order.shipping_address,
            shipping_city: order.shipping_city,
            shipping_postal: order.shipping_postal,
            backorder_priority: priority,
            expected_fulfillment_date: order.expected_fulfillment_date,
            fulfilled_at: None,
            tracking_number: None,
            cancellation_reason: None,
            created_at: now,
            updated_at: now,
        };
        let note = match order_type {
            OrderType::Regular => "Order placed",
            OrderType::Backorder => "Backorder created",
        };
        self.push_history(id, None, OrderStatus::Pending, Some(note.to_owned()));
        self.orders.insert(id, created.clone());
        created
    }

    fn apply_transition(
        &mut self,
        id: OrderId,
        change: StatusChange,
    ) -> Result<Order, RepositoryError> {
        let order = self.orders.get(&id).ok_or(RepositoryError::NotFound)?;
        let from = order.status;
        from.validate_transition(change.to, order.order_type)?;
        let lines = order.stock_lines();

        if change.to == OrderStatus::Cancelled {
            self.restore(&lines);
        }
        self.push_history(id, Some(from), change.to, change.notes);

        let order = self.orders.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        order.status = change.to;
        if change.tracking_number.is_some() {
            order.tracking_number = change.tracking_number;
        }
        if change.cancellation_reason.is_some() {
            order.cancellation_reason = change.cancellation_reason;
        }
        if change.fulfilled_at.is_some() {
            order.fulfilled_at = change.fulfilled_at;
        }
        order.updated_at = Utc::now();
        Ok(order.clone())
    }

    fn entry(&self, subscription: &WaitlistSubscription) -> WaitlistEntry {
        let label = self.label(subscription.stock_key());
        WaitlistEntry {
            subscription: subscription.clone(),
            product_name: label
                .as_ref()
                .map(|l| l.product_name.clone())
                .unwrap_or_default(),
            variant_sku: label.and_then(|l| l.variant_sku),
        }
    }
}

/// In-memory store with the same semantics as [`PgStore`](super::PgStore).
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a product.
    pub async fn add_product(&self, name: &str, slug: &str, price: Decimal, stock: i32) -> Product {
        let mut state = self.state.lock().await;
        let id = ProductId::new(next(&mut state.seq.product));
        let product = Product {
            id,
            name: name.to_owned(),
            slug: slug.to_owned(),
            price,
            stock,
        };
        state.products.insert(id, product.clone());
        product
    }

    /// Seed a variant of an existing product.
    pub async fn add_variant(
        &self,
        product_id: ProductId,
        sku: &str,
        size: &str,
        color: Option<&str>,
        stock: i32,
    ) -> ProductVariant {
        let mut state = self.state.lock().await;
        let id = VariantId::new(next(&mut state.seq.variant));
        let mut attributes = BTreeMap::from([(VariantAttributes::SIZE.to_owned(), size.to_owned())]);
        if let Some(color) = color {
            attributes.insert(VariantAttributes::COLOR.to_owned(), color.to_owned());
        }
        let variant = ProductVariant {
            id,
            product_id,
            sku: sku.to_owned(),
            size: size.to_owned(),
            color: color.map(str::to_owned),
            attributes: VariantAttributes::new(attributes),
            stock,
        };
        state.variants.insert(id, variant.clone());
        variant
    }

    /// Every logged notification, oldest first.
    pub async fn notifications(&self) -> Vec<NotificationLog> {
        self.state.lock().await.notifications.clone()
    }
}

// =============================================================================
// Catalog
// =============================================================================

#[async_trait]
impl CatalogStore for MemoryStore {
    async fn ping(&self) -> Result<(), RepositoryError> {
        Ok(())
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        Ok(self.state.lock().await.products.get(&id).cloned())
    }

    async fn get_variant(&self, id: VariantId) -> Result<Option<ProductVariant>, RepositoryError> {
        Ok(self.state.lock().await.variants.get(&id).cloned())
    }

    async fn stock_level(&self, key: StockKey) -> Result<Option<i32>, RepositoryError> {
        Ok(self.state.lock().await.stock(key))
    }

    async fn item_label(&self, key: StockKey) -> Result<Option<ItemLabel>, RepositoryError> {
        Ok(self.state.lock().await.label(key))
    }

    async fn reserve_stock(&self, lines: &[StockLine]) -> Result<(), RepositoryError> {
        self.state.lock().await.reserve(lines)
    }

    async fn restore_stock(&self, lines: &[StockLine]) -> Result<usize, RepositoryError> {
        Ok(self.state.lock().await.restore(lines))
    }
}

// =============================================================================
// Restock
// =============================================================================

#[async_trait]
impl RestockStore for MemoryStore {
    async fn append_restock_schedule(
        &self,
        schedule: NewRestockSchedule,
    ) -> Result<RestockSchedule, RepositoryError> {
        let mut state = self.state.lock().await;
        let now = Utc::now();
        let row = RestockSchedule {
            id: RestockScheduleId::new(next(&mut state.seq.schedule)),
            product_id: schedule.key.product_id,
            variant_id: schedule.key.variant_id,
            expected_date: schedule.expected_date,
            notes: schedule.notes,
            created_at: now,
            updated_at: now,
        };
        state.schedules.push(row.clone());
        Ok(row)
    }

    async fn latest_restock_schedule(
        &self,
        key: StockKey,
    ) -> Result<Option<RestockSchedule>, RepositoryError> {
        let state = self.state.lock().await;
        Ok(state
            .schedules
            .iter()
            .filter(|s| s.stock_key() == key)
            .max_by_key(|s| s.id)
            .cloned())
    }

    async fn restock_history(
        &self,
        key: StockKey,
    ) -> Result<Vec<RestockSchedule>, RepositoryError> {
        let state = self.state.lock().await;
        let mut rows: Vec<RestockSchedule> = state
            .schedules
            .iter()
            .filter(|s| s.stock_key() == key)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.id.cmp(&a.id));
        Ok(rows)
    }

    async fn upcoming_restocks(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<RestockSchedule>, RepositoryError> {
        let state = self.state.lock().await;
        let mut latest: HashMap<StockKey, &RestockSchedule> = HashMap::new();
        for schedule in &state.schedules {
            let entry = latest.entry(schedule.stock_key()).or_insert(schedule);
            if schedule.id > entry.id {
                *entry = schedule;
            }
        }
        let mut upcoming: Vec<RestockSchedule> = latest
            .into_values()
            .filter(|s| s.expected_date.is_some_and(|date| date > now))
            .cloned()
            .collect();
        upcoming.sort_by_key(|s| (s.expected_date, s.id));
        Ok(upcoming)
    }
}

// =============================================================================
// Waitlist
// =============================================================================

#[async_trait]
impl WaitlistStore for MemoryStore {
    async fn upsert_subscription(
        &self,
        subscription: NewSubscription,
    ) -> Result<WaitlistSubscription, RepositoryError> {
        let mut state = self.state.lock().await;
        let now = Utc::now();

        if let Some(existing) = state
            .subscriptions
            .iter_mut()
            .find(|s| s.email == subscription.email && s.stock_key() == subscription.key)
        {
            existing.is_active = true;
            if subscription.user_id.is_some() {
                existing.user_id = subscription.user_id;
            }
            existing.updated_at = now;
            return Ok(existing.clone());
        }

        let row = WaitlistSubscription {
            id: SubscriptionId::new(next(&mut state.seq.subscription)),
            email: subscription.email,
            product_id: subscription.key.product_id,
            variant_id: subscription.key.variant_id,
            user_id: subscription.user_id,
            is_active: true,
            notified_at: None,
            created_at: now,
            updated_at: now,
        };
        state.subscriptions.push(row.clone());
        Ok(row)
    }

    async fn deactivate_subscription(
        &self,
        email: &Email,
        key: StockKey,
    ) -> Result<bool, RepositoryError> {
        let mut state = self.state.lock().await;
        let Some(existing) = state
            .subscriptions
            .iter_mut()
            .find(|s| &s.email == email && s.stock_key() == key && s.is_active)
        else {
            return Ok(false);
        };
        existing.is_active = false;
        existing.updated_at = Utc::now();
        Ok(true)
    }

    async fn find_subscription(
        &self,
        email: &Email,
        key: StockKey,
    ) -> Result<Option<WaitlistSubscription>, RepositoryError> {
        let state = self.state.lock().await;
        Ok(state
            .subscriptions
            .iter()
            .find(|s| &s.email == email && s.stock_key() == key)
            .cloned())
    }

    async fn subscriptions_by_email(
        &self,
        email: &Email,
    ) -> Result<Vec<WaitlistEntry>, RepositoryError> {
        let state = self.state.lock().await;
        let mut entries: Vec<WaitlistEntry> = state
            .subscriptions
            .iter()
            .filter(|s| s.is_active && &s.email == email)
            .map(|s| state.entry(s))
            .collect();
        entries.sort_by(|a, b| {
            (b.subscription.created_at, b.subscription.id)
                .cmp(&(a.subscription.created_at, a.subscription.id))
        });
        Ok(entries)
    }

    async fn subscriptions_by_product(
        &self,
        product_id: ProductId,
    ) -> Result<Vec<WaitlistEntry>, RepositoryError> {
        let state = self.state.lock().await;
        let mut entries: Vec<WaitlistEntry> = state
            .subscriptions
            .iter()
            .filter(|s| s.is_active && s.product_id == product_id)
            .map(|s| state.entry(s))
            .collect();
        entries.sort_by(|a, b| {
            (b.subscription.created_at, b.subscription.id)
                .cmp(&(a.subscription.created_at, a.subscription.id))
        });
        Ok(entries)
    }

    async fn active_subscribers(
        &self,
        key: StockKey,
    ) -> Result<Vec<WaitlistSubscription>, RepositoryError> {
        let state = self.state.lock().await;
        let mut rows: Vec<WaitlistSubscription> = state
            .subscriptions
            .iter()
            .filter(|s| s.is_active && s.stock_key() == key)
            .cloned()
            .collect();
        rows.sort_by_key(|s| (s.created_at, s.id));
        Ok(rows)
    }

    async fn mark_notified(
        &self,
        ids: &[SubscriptionId],
        at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let mut state = self.state.lock().await;
        for subscription in &mut state.subscriptions {
            if ids.contains(&subscription.id) {
                subscription.notified_at = Some(at);
                subscription.updated_at = Utc::now();
            }
        }
        Ok(())
    }

    async fn waitlist_summary(
        &self,
        pagination: Pagination,
    ) -> Result<(Vec<WaitlistItemSummary>, WaitlistTotals), RepositoryError> {
        let state = self.state.lock().await;

        let mut groups: BTreeMap<StockKey, WaitlistItemSummary> = BTreeMap::new();
        for subscription in state.subscriptions.iter().filter(|s| s.is_active) {
            let key = subscription.stock_key();
            let summary = groups.entry(key).or_insert_with(|| {
                let label = state.label(key);
                WaitlistItemSummary {
                    product_id: key.product_id,
                    variant_id: key.variant_id,
                    product_name: label
                        .as_ref()
                        .map(|l| l.product_name.clone())
                        .unwrap_or_default(),
                    variant_sku: label.and_then(|l| l.variant_sku),
                    active_count: 0,
                    notified_count: 0,
                    latest_signup: subscription.created_at,
                }
            });
            summary.active_count += 1;
            if subscription.notified_at.is_some() {
                summary.notified_count += 1;
            }
            summary.latest_signup = summary.latest_signup.max(subscription.created_at);
        }

        // Inactive rows still count toward the latest signup of an item.
        for subscription in state.subscriptions.iter().filter(|s| !s.is_active) {
            if let Some(summary) = groups.get_mut(&subscription.stock_key()) {
                summary.latest_signup = summary.latest_signup.max(subscription.created_at);
            }
        }

        let totals = WaitlistTotals {
            active_subscriptions: groups.values().map(|g| g.active_count).sum(),
            total_subscriptions: i64::try_from(state.subscriptions.len()).unwrap_or(i64::MAX),
            waitlisted_items: i64::try_from(groups.len()).unwrap_or(i64::MAX),
        };

        let mut items: Vec<WaitlistItemSummary> = groups.into_values().collect();
        items.sort_by(|a, b| {
            b.active_count
                .cmp(&a.active_count)
                .then(b.latest_signup.cmp(&a.latest_signup))
        });
        let page = items
            .into_iter()
            .skip(usize::try_from(pagination.offset()).unwrap_or(0))
            .take(usize::try_from(pagination.limit()).unwrap_or(0))
            .collect();

        Ok((page, totals))
    }
}

// =============================================================================
// Orders
// =============================================================================

#[async_trait]
impl OrderStore for MemoryStore {
    async fn place_order(&self, order: NewOrder) -> Result<Order, RepositoryError> {
        let mut state = self.state.lock().await;
        state.reserve(&order.stock_lines())?;
        Ok(state.insert_order(order, OrderType::Regular, None))
    }

    async fn create_backorder(&self, order: NewOrder) -> Result<Order, RepositoryError> {
        let mut state = self.state.lock().await;
        let lines = order.stock_lines();
        if lines.iter().any(|line| state.stock(line.key).is_none()) {
            return Err(RepositoryError::NotFound);
        }

        state.seq.priority += 1;
        let priority = state.seq.priority;
        for line in &lines {
            state.adjust(line.key, -line.quantity);
        }
        Ok(state.insert_order(order, OrderType::Backorder, Some(priority)))
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        Ok(self.state.lock().await.orders.get(&id).cloned())
    }

    async fn backorders_for_user(&self, user_id: UserId) -> Result<Vec<Order>, RepositoryError> {
        let state = self.state.lock().await;
        let mut orders: Vec<Order> = state
            .orders
            .values()
            .filter(|o| o.is_backorder() && o.user_id == user_id)
            .cloned()
            .collect();
        orders.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        Ok(orders)
    }

    async fn list_backorders(
        &self,
        filter: BackorderFilter,
    ) -> Result<(Vec<Order>, i64), RepositoryError> {
        let state = self.state.lock().await;
        let mut orders: Vec<Order> = state
            .orders
            .values()
            .filter(|o| o.is_backorder() && filter.status.is_none_or(|s| o.status == s))
            .cloned()
            .collect();
        orders.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));

        let total = i64::try_from(orders.len()).unwrap_or(i64::MAX);
        let page = orders
            .into_iter()
            .skip(usize::try_from(filter.offset).unwrap_or(0))
            .take(usize::try_from(filter.limit).unwrap_or(0))
            .collect();
        Ok((page, total))
    }

    async fn backorder_status_counts(&self) -> Result<Vec<(OrderStatus, i64)>, RepositoryError> {
        let state = self.state.lock().await;
        Ok(OrderStatus::ALL
            .iter()
            .map(|status| {
                let count = state
                    .orders
                    .values()
                    .filter(|o| o.is_backorder() && o.status == *status)
                    .count();
                (*status, i64::try_from(count).unwrap_or(i64::MAX))
            })
            .filter(|(_, count)| *count > 0)
            .collect())
    }

    async fn transition_order(
        &self,
        id: OrderId,
        change: StatusChange,
    ) -> Result<Order, RepositoryError> {
        self.state.lock().await.apply_transition(id, change)
    }

    async fn fulfill_backorders(
        &self,
        request: FulfillRequest,
    ) -> Result<FulfillOutcome, RepositoryError> {
        let mut state = self.state.lock().await;

        if let Some(line) = request.receive {
            if state.stock(line.key).is_none() {
                return Err(RepositoryError::NotFound);
            }
        }

        let mut pending: Vec<Order> = state
            .orders
            .values()
            .filter(|o| o.is_backorder() && o.status == OrderStatus::Pending)
            .cloned()
            .collect();
        pending.sort_by_key(|o| o.backorder_priority);

        if let FulfillTarget::Order(order_id) = request.target {
            if !pending.iter().any(|o| o.id == order_id) {
                let order = state
                    .orders
                    .get(&order_id)
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

        if let Some(line) = request.receive {
            state.adjust(line.key, line.quantity);
        }

        let candidates: Vec<Candidate> = pending
            .iter()
            .map(|order| Candidate {
                order_id: order.id,
                priority: order.backorder_priority.unwrap_or(i64::MAX),
                lines: order.stock_lines(),
            })
            .collect();

        let keys: HashSet<StockKey> = candidates
            .iter()
            .flat_map(|c| c.lines.iter().map(|line| line.key))
            .collect();
        let stock: HashMap<StockKey, i32> = keys
            .into_iter()
            .filter_map(|key| state.stock(key).map(|level| (key, level)))
            .collect();

        let plan = fulfillment::plan(&candidates, &stock);
        let selection = plan.select(&candidates, request.target);

        let mut fulfilled = Vec::with_capacity(selection.fulfill.len());
        for order_id in selection.fulfill {
            let change = StatusChange {
                to: OrderStatus::Processing,
                notes: Some("Fulfilled from restocked inventory".to_owned()),
                fulfilled_at: Some(request.fulfilled_at),
                ..StatusChange::default()
            };
            fulfilled.push(state.apply_transition(order_id, change)?);
        }

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
        let mut state = self.state.lock().await;
        let order = state.orders.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        order.expected_fulfillment_date = date;
        order.updated_at = Utc::now();
        Ok(order.clone())
    }

    async fn status_history(
        &self,
        id: OrderId,
    ) -> Result<Vec<StatusHistoryEntry>, RepositoryError> {
        let state = self.state.lock().await;
        Ok(state
            .history
            .iter()
            .filter(|entry| entry.order_id == id)
            .cloned()
            .collect())
    }
}

// =============================================================================
// Notification Log
// =============================================================================

#[async_trait]
impl NotificationLogStore for MemoryStore {
    async fn record_notification(
        &self,
        entry: NewNotificationLog,
    ) -> Result<NotificationLog, RepositoryError> {
        let mut state = self.state.lock().await;
        let row = NotificationLog {
            id: NotificationId::new(next(&mut state.seq.notification)),
            kind: entry.kind,
            email: entry.email,
            product_name: entry.product_name,
            variant_sku: entry.variant_sku,
            order_id: entry.order_id,
            sent_at: Utc::now(),
            email_opened: false,
            link_clicked: false,
            purchase_completed: false,
        };
        state.notifications.push(row.clone());
        Ok(row)
    }

    async fn notification_counts(&self) -> Result<NotificationCounts, RepositoryError> {
        let state = self.state.lock().await;
        let count = |f: fn(&NotificationLog) -> bool| {
            i64::try_from(state.notifications.iter().filter(|n| f(n)).count()).unwrap_or(i64::MAX)
        };
        Ok(NotificationCounts {
            total_sent: count(|_| true),
            opened: count(|n| n.email_opened),
            clicked: count(|n| n.link_clicked),
            purchased: count(|n| n.purchase_completed),
        })
    }

    async fn mark_engagement(
        &self,
        id: NotificationId,
        event: EngagementEvent,
    ) -> Result<bool, RepositoryError> {
        let mut state = self.state.lock().await;
        let Some(entry) = state.notifications.iter_mut().find(|n| n.id == id) else {
            return Ok(false);
        };
        entry.email_opened = true;
        match event {
            EngagementEvent::Opened => {}
            EngagementEvent::Clicked => entry.link_clicked = true,
            EngagementEvent::Purchased => {
                entry.link_clicked = true;
                entry.purchase_completed = true;
            }
        }
        Ok(true)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use attireburg_core::CurrencyCode;
    use rust_decimal_macros::dec;

    use crate::models::OrderItem;

    async fn seeded() -> (MemoryStore, StockKey) {
        let store = MemoryStore::new();
        let product = store.add_product("Wool Coat", "wool-coat", dec!(189.00), 0).await;
        let variant = store
            .add_variant(product.id, "COAT-M-NAVY", "M", Some("Navy"), 3)
            .await;
        (store, variant.stock_key())
    }

    fn new_order(key: StockKey, quantity: i32) -> NewOrder {
        NewOrder {
            user_id: UserId::new(1),
            email: Email::parse("buyer@example.com").unwrap(),
            items: vec![OrderItem {
                product_id: key.product_id,
                variant_id: key.variant_id,
                quantity,
                size: "M".to_owned(),
                color: Some("Navy".to_owned()),
                price: dec!(189.00),
            }],
            total_amount: dec!(189.00) * Decimal::from(quantity),
            currency: CurrencyCode::EUR,
            shipping_address: "Hauptstr. 1".to_owned(),
            shipping_city: "Berlin".to_owned(),
            shipping_postal: "10115".to_owned(),
            expected_fulfillment_date: None,
        }
    }

    #[tokio::test]
    async fn test_reserve_is_all_or_nothing() {
        let (store, key) = seeded().await;
        let product_key = StockKey::product(key.product_id);

        let err = store
            .reserve_stock(&[StockLine::new(key, 2), StockLine::new(product_key, 1)])
            .await
            .unwrap_err();
        match err {
            RepositoryError::InsufficientStock(shortfalls) => {
                assert_eq!(shortfalls.len(), 1);
                assert_eq!(shortfalls[0].key, product_key);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(store.stock_level(key).await.unwrap(), Some(3));
    }

    #[tokio::test]
    async fn test_variant_of_other_product_is_unknown() {
        let (store, key) = seeded().await;
        let other = store.add_product("Scarf", "scarf", dec!(29.00), 5).await;
        let wrong = StockKey::new(other.id, key.variant_id);
        assert_eq!(store.stock_level(wrong).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_backorder_priorities_increase() {
        let (store, key) = seeded().await;
        let first = store.create_backorder(new_order(key, 1)).await.unwrap();
        let second = store.create_backorder(new_order(key, 1)).await.unwrap();
        assert!(first.backorder_priority < second.backorder_priority);
        assert_eq!(store.stock_level(key).await.unwrap(), Some(1));
    }

    #[tokio::test]
    async fn test_cancel_appends_history_and_restores() {
        let (store, key) = seeded().await;
        let order = store.create_backorder(new_order(key, 5)).await.unwrap();
        assert_eq!(store.stock_level(key).await.unwrap(), Some(-2));

        let change = StatusChange {
            to: OrderStatus::Cancelled,
            cancellation_reason: Some("changed my mind".to_owned()),
            ..StatusChange::default()
        };
        let cancelled = store.transition_order(order.id, change).await.unwrap();
        assert_eq!(cancelled.status, OrderStatus::Cancelled);
        assert_eq!(cancelled.cancellation_reason.as_deref(), Some("changed my mind"));
        assert_eq!(store.stock_level(key).await.unwrap(), Some(3));

        let history = store.status_history(order.id).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].from_status, Some(OrderStatus::Pending));
        assert_eq!(history[1].to_status, OrderStatus::Cancelled);
    }

    #[tokio::test]
    async fn test_fulfill_unknown_order_is_not_found() {
        let (store, _) = seeded().await;
        let err = store
            .fulfill_backorders(FulfillRequest {
                target: FulfillTarget::Order(OrderId::new(99)),
                receive: None,
                fulfilled_at: Utc::now(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound));
    }

    #[tokio::test]
    async fn test_upsert_reactivates_existing_row() {
        let (store, key) = seeded().await;
        let email = Email::parse("alice@example.com").unwrap();
        let first = store
            .upsert_subscription(NewSubscription {
                email: email.clone(),
                key,
                user_id: None,
            })
            .await
            .unwrap();
        assert!(store.deactivate_subscription(&email, key).await.unwrap());
        assert!(!store.deactivate_subscription(&email, key).await.unwrap());

        let again = store
            .upsert_subscription(NewSubscription {
                email: email.clone(),
                key,
                user_id: Some(UserId::new(7)),
            })
            .await
            .unwrap();
        assert_eq!(again.id, first.id);
        assert!(again.is_active);
        assert_eq!(again.user_id, Some(UserId::new(7)));
    }

    #[tokio::test]
    async fn test_upcoming_uses_newest_row_only() {
        let (store, key) = seeded().await;
        let now = Utc::now();
        store
            .append_restock_schedule(NewRestockSchedule {
                key,
                expected_date: Some(now + chrono::Duration::days(3)),
                notes: None,
            })
            .await
            .unwrap();
        store
            .append_restock_schedule(NewRestockSchedule {
                key,
                expected_date: None,
                notes: None,
            })
            .await
            .unwrap();

        assert!(store.upcoming_restocks(now).await.unwrap().is_empty());
        assert_eq!(store.restock_history(key).await.unwrap().len(), 2);
    }
}
