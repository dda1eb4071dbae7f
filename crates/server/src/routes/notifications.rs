//! Notification handlers.

use axum::{
    Json, Router,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    routing::{get, post},
};
use serde::Deserialize;

use attireburg_core::{Email, EngagementEvent, NotificationId, ProductId, StockKey, VariantId};

use crate::error::AppError;
use crate::middleware::RequireAdmin;
use crate::services::notification::{DeliveryReport, FanOutReport, NotificationAnalytics};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/notifications/restock", post(notify_restock))
        .route("/api/notifications/test", post(send_test))
        .route("/api/notifications/status", get(analytics))
        .route("/api/notifications/{id}/events", post(record_event))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestockBody {
    pub product_id: ProductId,
    pub variant_id: Option<VariantId>,
}

/// Email every active subscriber of an item.
///
/// # Errors
///
/// Returns 404 for an unknown item.
pub async fn notify_restock(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    payload: Result<Json<RestockBody>, JsonRejection>,
) -> Result<Json<FanOutReport>, AppError> {
    let Json(body) = payload?;
    let key = StockKey::new(body.product_id, body.variant_id);
    tracing::info!(admin_id = %admin.id, item = %key, "Manual restock notification");

    let report = state.notifications().notify_waitlist(key).await?;
    Ok(Json(report))
}

#[derive(Debug, Deserialize)]
pub struct TestBody {
    pub email: String,
}

/// Send a test email to check the mail setup.
///
/// # Errors
///
/// Returns 400 for a malformed email. Delivery failures are reported in the
/// body.
pub async fn send_test(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    payload: Result<Json<TestBody>, JsonRejection>,
) -> Result<Json<DeliveryReport>, AppError> {
    let Json(body) = payload?;
    let email = Email::parse(&body.email).map_err(|e| AppError::BadRequest(e.to_string()))?;
    Ok(Json(
        state.notifications().send_test_notification(&email).await,
    ))
}

/// Delivery and engagement rates over all sent notifications.
///
/// # Errors
///
/// Returns an error if the store fails.
pub async fn analytics(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
) -> Result<Json<NotificationAnalytics>, AppError> {
    Ok(Json(state.notifications().get_analytics().await?))
}

#[derive(Debug, Deserialize)]
pub struct EventBody {
    pub event: EngagementEvent,
}

/// Record an open, click or purchase for a sent notification.
///
/// # Errors
///
/// Returns 404 for an unknown notification.
pub async fn record_event(
    State(state): State<AppState>,
    Path(id): Path<NotificationId>,
    payload: Result<Json<EventBody>, JsonRejection>,
) -> Result<StatusCode, AppError> {
    let Json(body) = payload?;
    state
        .notifications()
        .record_engagement(id, body.event)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
