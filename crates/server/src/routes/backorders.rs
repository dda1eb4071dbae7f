//! Backorder handlers.

use axum::{
    Json, Router,
    extract::{
        Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use attireburg_core::{OrderId, ProductId, StockKey, UserId, VariantId};

use crate::error::AppError;
use crate::middleware::{RequireAdmin, RequireAuth};
use crate::models::Order;
use crate::services::AuthUser;
use crate::services::backorder::{CheckoutRequest, CreateBackorderResult, DelayOutcome};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/backorders/status", get(backorder_status))
        .route("/api/backorders/create", post(create_backorder))
        .route("/api/backorders/cancel", put(cancel_backorder))
        .route("/api/admin/backorders/fulfill", put(fulfill_backorders))
        .route("/api/admin/backorders/delay", post(delay_backorder))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusQuery {
    pub order_id: Option<OrderId>,
    pub user_id: Option<UserId>,
}

/// Status of one backorder (`orderId`) or all of a customer's (`userId`).
///
/// # Errors
///
/// Returns 400 without either parameter, 403 for someone else's backorders
/// and 404 for an unknown backorder.
pub async fn backorder_status(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    query: Result<Query<StatusQuery>, QueryRejection>,
) -> Result<Response, AppError> {
    let Query(query) = query?;
    let service = state.backorders();

    if let Some(order_id) = query.order_id {
        let order = service
            .get_backorder_status(order_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Backorder not found".to_string()))?;
        ensure_owner(&user, &order)?;
        return Ok(Json(order).into_response());
    }

    let user_id = query
        .user_id
        .ok_or_else(|| AppError::BadRequest("orderId or userId is required".to_string()))?;
    if !user.may_act_for(user_id) {
        return Err(AppError::Forbidden(
            "Cannot view another customer's backorders".to_string(),
        ));
    }
    let orders = service.get_customer_backorders(user_id).await?;
    Ok(Json(orders).into_response())
}

fn ensure_owner(user: &AuthUser, order: &Order) -> Result<(), AppError> {
    if user.may_act_for(order.user_id) {
        Ok(())
    } else {
        Err(AppError::Forbidden(
            "Backorder belongs to another customer".to_string(),
        ))
    }
}

/// Place a backorder for the signed-in customer.
///
/// # Errors
///
/// Returns 400 for invalid checkout data and 404 for an unknown item.
pub async fn create_backorder(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    payload: Result<Json<CheckoutRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<CreateBackorderResult>), AppError> {
    let Json(request) = payload?;
    let result = state.backorders().create_backorder(user.id, request).await?;
    Ok((StatusCode::CREATED, Json(result)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelRequest {
    pub order_id: OrderId,
    pub reason: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct OrderResponse {
    pub success: bool,
    pub message: String,
    pub order: Order,
}

/// Cancel a pending or processing backorder.
///
/// # Errors
///
/// Returns 403 for someone else's backorder, 404 for an unknown one and 409
/// once it is past processing.
pub async fn cancel_backorder(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    payload: Result<Json<CancelRequest>, JsonRejection>,
) -> Result<Json<OrderResponse>, AppError> {
    let Json(request) = payload?;
    let service = state.backorders();

    let order = service
        .get_backorder_status(request.order_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Backorder not found".to_string()))?;
    ensure_owner(&user, &order)?;

    let order = service
        .cancel_backorder(request.order_id, request.reason)
        .await?;
    Ok(Json(OrderResponse {
        success: true,
        message: "Backorder cancelled".to_string(),
        order,
    }))
}

/// Fulfill one backorder (`orderId`), or receive stock for an item
/// (`productId`, `variantId`, `quantity`) and fulfill what it covers.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FulfillBody {
    pub order_id: Option<OrderId>,
    pub product_id: Option<ProductId>,
    pub variant_id: Option<VariantId>,
    pub quantity: Option<i32>,
    pub fulfillment_date: Option<DateTime<Utc>>,
}

/// # Errors
///
/// Returns 400 when neither an order nor an item with quantity is given, 404
/// for unknown targets and 409 when FIFO does not reach the backorder yet.
pub async fn fulfill_backorders(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    payload: Result<Json<FulfillBody>, JsonRejection>,
) -> Result<Response, AppError> {
    let Json(body) = payload?;
    let service = state.backorders();
    let fulfilled_at = body.fulfillment_date.unwrap_or_else(Utc::now);

    if let Some(order_id) = body.order_id {
        let order = service.fulfill_backorder(order_id, fulfilled_at).await?;
        return Ok(Json(OrderResponse {
            success: true,
            message: "Backorder fulfilled".to_string(),
            order,
        })
        .into_response());
    }

    let (Some(product_id), Some(quantity)) = (body.product_id, body.quantity) else {
        return Err(AppError::BadRequest(
            "orderId, or productId and quantity, is required".to_string(),
        ));
    };

    tracing::info!(admin_id = %admin.id, product_id = %product_id, quantity, "Stock received");
    let result = service
        .fulfill_restocked_item(
            StockKey::new(product_id, body.variant_id),
            quantity,
            fulfilled_at,
        )
        .await?;
    Ok(Json(result).into_response())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DelayBody {
    pub order_id: OrderId,
    pub new_date: Option<DateTime<Utc>>,
}

/// Move a backorder's expected date and email the customer.
///
/// # Errors
///
/// Returns 400 for a past date, 404 for an unknown backorder and 409 once it
/// has shipped or was cancelled.
pub async fn delay_backorder(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    payload: Result<Json<DelayBody>, JsonRejection>,
) -> Result<Json<DelayOutcome>, AppError> {
    let Json(body) = payload?;
    let outcome = state
        .backorders()
        .delay_backorder(body.order_id, body.new_date)
        .await?;
    Ok(Json(outcome))
}
