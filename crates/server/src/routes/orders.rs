//! Regular order placement and admin status management.

use axum::{
    Json, Router,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    routing::{get, post, put},
};

use attireburg_core::OrderId;

use crate::error::AppError;
use crate::middleware::{RequireAdmin, RequireAuth};
use crate::models::{Order, StatusHistoryEntry};
use crate::services::backorder::CheckoutRequest;
use crate::services::order_status::UpdateStatus;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/orders", post(place_order))
        .route("/api/admin/orders/{id}/status", put(update_status))
        .route("/api/admin/orders/{id}/history", get(status_history))
}

/// Place a regular order, reserving stock for every line.
///
/// # Errors
///
/// Returns 400 for invalid checkout data, 404 for an unknown item and 409
/// listing every line that is short.
pub async fn place_order(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    payload: Result<Json<CheckoutRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Order>), AppError> {
    let Json(request) = payload?;
    let order = state.inventory().place_order(user.id, request).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

/// Move an order to a new status.
///
/// # Errors
///
/// Returns 404 for an unknown order and 409 for a transition the order type
/// does not allow.
pub async fn update_status(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<OrderId>,
    payload: Result<Json<UpdateStatus>, JsonRejection>,
) -> Result<Json<Order>, AppError> {
    let Json(request) = payload?;
    tracing::info!(admin_id = %admin.id, order_id = %id, to = %request.status, "Status change requested");
    Ok(Json(state.order_status().update_status(id, request).await?))
}

/// # Errors
///
/// Returns 404 for an unknown order.
pub async fn status_history(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<OrderId>,
) -> Result<Json<Vec<StatusHistoryEntry>>, AppError> {
    Ok(Json(state.order_status().history(id).await?))
}
