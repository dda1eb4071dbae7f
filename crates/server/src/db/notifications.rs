//! Notification log persistence.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use attireburg_core::{EngagementEvent, NotificationId, NotificationKind, OrderId};

use super::{NotificationLogStore, PgStore, RepositoryError};
use crate::models::{NewNotificationLog, NotificationCounts, NotificationLog};

#[derive(Debug, sqlx::FromRow)]
struct LogRow {
    id: i32,
    kind: NotificationKind,
    email: String,
    product_name: String,
    variant_sku: Option<String>,
    order_id: Option<i32>,
    sent_at: DateTime<Utc>,
    email_opened: bool,
    link_clicked: bool,
    purchase_completed: bool,
}

impl From<LogRow> for NotificationLog {
    fn from(row: LogRow) -> Self {
        Self {
            id: NotificationId::new(row.id),
            kind: row.kind,
            email: row.email,
            product_name: row.product_name,
            variant_sku: row.variant_sku,
            order_id: row.order_id.map(OrderId::new),
            sent_at: row.sent_at,
            email_opened: row.email_opened,
            link_clicked: row.link_clicked,
            purchase_completed: row.purchase_completed,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct CountsRow {
    total_sent: i64,
    opened: i64,
    clicked: i64,
    purchased: i64,
}

#[async_trait]
impl NotificationLogStore for PgStore {
    async fn record_notification(
        &self,
        entry: NewNotificationLog,
    ) -> Result<NotificationLog, RepositoryError> {
        let row = sqlx::query_as::<_, LogRow>(
            r"
            INSERT INTO notification_log (kind, email, product_name, variant_sku, order_id)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, kind, email, product_name, variant_sku, order_id, sent_at,
                      email_opened, link_clicked, purchase_completed
            ",
        )
        .bind(entry.kind)
        .bind(entry.email)
        .bind(entry.product_name)
        .bind(entry.variant_sku)
        .bind(entry.order_id)
        .fetch_one(self.pool())
        .await?;
        Ok(row.into())
    }

    async fn notification_counts(&self) -> Result<NotificationCounts, RepositoryError> {
        let row = sqlx::query_as::<_, CountsRow>(
            r"
            SELECT COUNT(*) AS total_sent,
                   COUNT(*) FILTER (WHERE email_opened) AS opened,
                   COUNT(*) FILTER (WHERE link_clicked) AS clicked,
                   COUNT(*) FILTER (WHERE purchase_completed) AS purchased
            FROM notification_log
            ",
        )
        .fetch_one(self.pool())
        .await?;

        Ok(NotificationCounts {
            total_sent: row.total_sent,
            opened: row.opened,
            clicked: row.clicked,
            purchased: row.purchased,
        })
    }

    async fn mark_engagement(
        &self,
        id: NotificationId,
        event: EngagementEvent,
    ) -> Result<bool, RepositoryError> {
        // A click implies an open, a purchase implies both.
        let sql = match event {
            EngagementEvent::Opened => "UPDATE notification_log SET email_opened = TRUE WHERE id = $1",
            EngagementEvent::Clicked => {
                "UPDATE notification_log SET email_opened = TRUE, link_clicked = TRUE WHERE id = $1"
            }
            EngagementEvent::Purchased => {
                r"
                UPDATE notification_log
                SET email_opened = TRUE, link_clicked = TRUE, purchase_completed = TRUE
                WHERE id = $1
                "
            }
        };
        let result = sqlx::query(sql).bind(id).execute(self.pool()).await?;
        Ok(result.rows_affected() > 0)
    }
}
