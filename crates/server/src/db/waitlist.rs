//! Waitlist subscription persistence.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use attireburg_core::{Email, ProductId, StockKey, SubscriptionId, UserId, VariantId};

use super::{PgStore, RepositoryError, WaitlistStore};
use crate::models::{
    NewSubscription, Pagination, WaitlistEntry, WaitlistItemSummary, WaitlistSubscription,
    WaitlistTotals,
};

const SUBSCRIPTION_COLUMNS: &str =
    "s.id, s.email, s.product_id, s.variant_id, s.user_id, s.is_active, s.notified_at, s.created_at, s.updated_at";

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct SubscriptionRow {
    id: i32,
    email: String,
    product_id: i32,
    variant_id: Option<i32>,
    user_id: Option<i32>,
    is_active: bool,
    notified_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<SubscriptionRow> for WaitlistSubscription {
    type Error = RepositoryError;

    fn try_from(row: SubscriptionRow) -> Result<Self, Self::Error> {
        let email = Email::parse(&row.email).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid email in database: {e}"))
        })?;

        Ok(Self {
            id: SubscriptionId::new(row.id),
            email,
            product_id: ProductId::new(row.product_id),
            variant_id: row.variant_id.map(VariantId::new),
            user_id: row.user_id.map(UserId::new),
            is_active: row.is_active,
            notified_at: row.notified_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct EntryRow {
    #[sqlx(flatten)]
    subscription: SubscriptionRow,
    product_name: String,
    variant_sku: Option<String>,
}

impl TryFrom<EntryRow> for WaitlistEntry {
    type Error = RepositoryError;

    fn try_from(row: EntryRow) -> Result<Self, Self::Error> {
        Ok(Self {
            subscription: row.subscription.try_into()?,
            product_name: row.product_name,
            variant_sku: row.variant_sku,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct SummaryRow {
    product_id: i32,
    variant_id: Option<i32>,
    product_name: String,
    variant_sku: Option<String>,
    active_count: i64,
    notified_count: i64,
    latest_signup: DateTime<Utc>,
}

impl From<SummaryRow> for WaitlistItemSummary {
    fn from(row: SummaryRow) -> Self {
        Self {
            product_id: ProductId::new(row.product_id),
            variant_id: row.variant_id.map(VariantId::new),
            product_name: row.product_name,
            variant_sku: row.variant_sku,
            active_count: row.active_count,
            notified_count: row.notified_count,
            latest_signup: row.latest_signup,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct TotalsRow {
    active_subscriptions: i64,
    total_subscriptions: i64,
    waitlisted_items: i64,
}

fn entries_query(filter: &str) -> String {
    format!(
        r"
        SELECT {SUBSCRIPTION_COLUMNS}, p.name AS product_name, v.sku AS variant_sku
        FROM waitlist_subscriptions s
        JOIN products p ON p.id = s.product_id
        LEFT JOIN product_variants v ON v.id = s.variant_id
        WHERE s.is_active AND {filter}
        ORDER BY s.created_at DESC, s.id DESC
        "
    )
}

// =============================================================================
// Store
// =============================================================================

#[async_trait]
impl WaitlistStore for PgStore {
    async fn upsert_subscription(
        &self,
        subscription: NewSubscription,
    ) -> Result<WaitlistSubscription, RepositoryError> {
        let row = sqlx::query_as::<_, SubscriptionRow>(
            r"
            INSERT INTO waitlist_subscriptions AS s (email, product_id, variant_id, user_id)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT ON CONSTRAINT waitlist_subscriptions_identity_key
            DO UPDATE SET
                is_active = TRUE,
                user_id = COALESCE(EXCLUDED.user_id, s.user_id),
                updated_at = NOW()
            RETURNING id, email, product_id, variant_id, user_id, is_active,
                      notified_at, created_at, updated_at
            ",
        )
        .bind(subscription.email.as_str())
        .bind(subscription.key.product_id)
        .bind(subscription.key.variant_id)
        .bind(subscription.user_id)
        .fetch_one(self.pool())
        .await?;

        row.try_into()
    }

    async fn deactivate_subscription(
        &self,
        email: &Email,
        key: StockKey,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE waitlist_subscriptions
            SET is_active = FALSE, updated_at = NOW()
            WHERE email = $1 AND product_id = $2 AND variant_id IS NOT DISTINCT FROM $3
              AND is_active
            ",
        )
        .bind(email.as_str())
        .bind(key.product_id)
        .bind(key.variant_id)
        .execute(self.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn find_subscription(
        &self,
        email: &Email,
        key: StockKey,
    ) -> Result<Option<WaitlistSubscription>, RepositoryError> {
        let sql = format!(
            r"
            SELECT {SUBSCRIPTION_COLUMNS}
            FROM waitlist_subscriptions s
            WHERE s.email = $1 AND s.product_id = $2 AND s.variant_id IS NOT DISTINCT FROM $3
            "
        );
        let row = sqlx::query_as::<_, SubscriptionRow>(&sql)
            .bind(email.as_str())
            .bind(key.product_id)
            .bind(key.variant_id)
            .fetch_optional(self.pool())
            .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn subscriptions_by_email(
        &self,
        email: &Email,
    ) -> Result<Vec<WaitlistEntry>, RepositoryError> {
        let sql = entries_query("s.email = $1");
        let rows = sqlx::query_as::<_, EntryRow>(&sql)
            .bind(email.as_str())
            .fetch_all(self.pool())
            .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn subscriptions_by_product(
        &self,
        product_id: ProductId,
    ) -> Result<Vec<WaitlistEntry>, RepositoryError> {
        let sql = entries_query("s.product_id = $1");
        let rows = sqlx::query_as::<_, EntryRow>(&sql)
            .bind(product_id)
            .fetch_all(self.pool())
            .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn active_subscribers(
        &self,
        key: StockKey,
    ) -> Result<Vec<WaitlistSubscription>, RepositoryError> {
        let sql = format!(
            r"
            SELECT {SUBSCRIPTION_COLUMNS}
            FROM waitlist_subscriptions s
            WHERE s.product_id = $1 AND s.variant_id IS NOT DISTINCT FROM $2 AND s.is_active
            ORDER BY s.created_at, s.id
            "
        );
        let rows = sqlx::query_as::<_, SubscriptionRow>(&sql)
            .bind(key.product_id)
            .bind(key.variant_id)
            .fetch_all(self.pool())
            .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn mark_notified(
        &self,
        ids: &[SubscriptionId],
        at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        if ids.is_empty() {
            return Ok(());
        }
        let raw: Vec<i32> = ids.iter().map(SubscriptionId::as_i32).collect();
        sqlx::query(
            "UPDATE waitlist_subscriptions SET notified_at = $2, updated_at = NOW() WHERE id = ANY($1)",
        )
        .bind(&raw)
        .bind(at)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    async fn waitlist_summary(
        &self,
        pagination: Pagination,
    ) -> Result<(Vec<WaitlistItemSummary>, WaitlistTotals), RepositoryError> {
        let rows = sqlx::query_as::<_, SummaryRow>(
            r"
            SELECT s.product_id, s.variant_id,
                   p.name AS product_name, v.sku AS variant_sku,
                   COUNT(*) FILTER (WHERE s.is_active) AS active_count,
                   COUNT(*) FILTER (WHERE s.is_active AND s.notified_at IS NOT NULL) AS notified_count,
                   MAX(s.created_at) AS latest_signup
            FROM waitlist_subscriptions s
            JOIN products p ON p.id = s.product_id
            LEFT JOIN product_variants v ON v.id = s.variant_id
            GROUP BY s.product_id, s.variant_id, p.name, v.sku
            HAVING COUNT(*) FILTER (WHERE s.is_active) > 0
            ORDER BY active_count DESC, latest_signup DESC
            LIMIT $1 OFFSET $2
            ",
        )
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(self.pool())
        .await?;

        let totals = sqlx::query_as::<_, TotalsRow>(
            r"
            SELECT COUNT(*) FILTER (WHERE is_active) AS active_subscriptions,
                   COUNT(*) AS total_subscriptions,
                   COUNT(DISTINCT (product_id, variant_id)) FILTER (WHERE is_active) AS waitlisted_items
            FROM waitlist_subscriptions
            ",
        )
        .fetch_one(self.pool())
        .await?;

        Ok((
            rows.into_iter().map(Into::into).collect(),
            WaitlistTotals {
                active_subscriptions: totals.active_subscriptions,
                total_subscriptions: totals.total_subscriptions,
                waitlisted_items: totals.waitlisted_items,
            },
        ))
    }
}
