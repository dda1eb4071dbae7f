//! Notification log models.

use chrono::{DateTime, Utc};
use serde::Serialize;

use attireburg_core::{NotificationId, NotificationKind, OrderId};

/// An entry of the append-only notification log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationLog {
    pub id: NotificationId,
    pub kind: NotificationKind,
    pub email: String,
    pub product_name: String,
    pub variant_sku: Option<String>,
    pub order_id: Option<OrderId>,
    pub sent_at: DateTime<Utc>,
    /// Engagement flags below are written by the tracking endpoint only.
    pub email_opened: bool,
    pub link_clicked: bool,
    pub purchase_completed: bool,
}

#[derive(Debug, Clone)]
pub struct NewNotificationLog {
    pub kind: NotificationKind,
    pub email: String,
    pub product_name: String,
    pub variant_sku: Option<String>,
    pub order_id: Option<OrderId>,
}

/// Raw engagement counts over the whole log.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NotificationCounts {
    pub total_sent: i64,
    pub opened: i64,
    pub clicked: i64,
    pub purchased: i64,
}
