//! Restock schedule persistence.
//!
//! Rows are never updated in place. Setting or clearing a date inserts a new
//! row; the newest row per key is the current schedule.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use attireburg_core::{ProductId, RestockScheduleId, StockKey, VariantId};

use super::{PgStore, RepositoryError, RestockStore};
use crate::models::{NewRestockSchedule, RestockSchedule};

#[derive(Debug, sqlx::FromRow)]
struct ScheduleRow {
    id: i32,
    product_id: i32,
    variant_id: Option<i32>,
    expected_date: Option<DateTime<Utc>>,
    notes: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ScheduleRow> for RestockSchedule {
    fn from(row: ScheduleRow) -> Self {
        Self {
            id: RestockScheduleId::new(row.id),
            product_id: ProductId::new(row.product_id),
            variant_id: row.variant_id.map(VariantId::new),
            expected_date: row.expected_date,
            notes: row.notes,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[async_trait]
impl RestockStore for PgStore {
    async fn append_restock_schedule(
        &self,
        schedule: NewRestockSchedule,
    ) -> Result<RestockSchedule, RepositoryError> {
        let row = sqlx::query_as::<_, ScheduleRow>(
            r"
            INSERT INTO restock_schedules (product_id, variant_id, expected_date, notes)
            VALUES ($1, $2, $3, $4)
            RETURNING id, product_id, variant_id, expected_date, notes, created_at, updated_at
            ",
        )
        .bind(schedule.key.product_id)
        .bind(schedule.key.variant_id)
        .bind(schedule.expected_date)
        .bind(schedule.notes)
        .fetch_one(self.pool())
        .await?;
        Ok(row.into())
    }

    async fn latest_restock_schedule(
        &self,
        key: StockKey,
    ) -> Result<Option<RestockSchedule>, RepositoryError> {
        let row = sqlx::query_as::<_, ScheduleRow>(
            r"
            SELECT id, product_id, variant_id, expected_date, notes, created_at, updated_at
            FROM restock_schedules
            WHERE product_id = $1 AND variant_id IS NOT DISTINCT FROM $2
            ORDER BY id DESC
            LIMIT 1
            ",
        )
        .bind(key.product_id)
        .bind(key.variant_id)
        .fetch_optional(self.pool())
        .await?;
        Ok(row.map(Into::into))
    }

    async fn restock_history(
        &self,
        key: StockKey,
    ) -> Result<Vec<RestockSchedule>, RepositoryError> {
        let rows = sqlx::query_as::<_, ScheduleRow>(
            r"
            SELECT id, product_id, variant_id, expected_date, notes, created_at, updated_at
            FROM restock_schedules
            WHERE product_id = $1 AND variant_id IS NOT DISTINCT FROM $2
            ORDER BY id DESC
            ",
        )
        .bind(key.product_id)
        .bind(key.variant_id)
        .fetch_all(self.pool())
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn upcoming_restocks(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<RestockSchedule>, RepositoryError> {
        let rows = sqlx::query_as::<_, ScheduleRow>(
            r"
            SELECT * FROM (
                SELECT DISTINCT ON (product_id, variant_id)
                    id, product_id, variant_id, expected_date, notes, created_at, updated_at
                FROM restock_schedules
                ORDER BY product_id, variant_id, id DESC
            ) current
            WHERE expected_date > $1
            ORDER BY expected_date, id
            ",
        )
        .bind(now)
        .fetch_all(self.pool())
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }
}
