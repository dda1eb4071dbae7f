//! Restock date handlers.
//!
//! Admins maintain expected restock dates per product or variant; the
//! storefront reads the resulting hint without authentication.

use axum::{
    Json, Router,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    response::{IntoResponse, Response},
    routing::get,
};
use serde::{Deserialize, Serialize};

use attireburg_core::{Locale, ProductId, RestockDisplay, StockKey, VariantId};

use crate::error::AppError;
use crate::middleware::RequireAdmin;
use crate::models::RestockSchedule;
use crate::services::restock::{BulkUpdateResult, SetRestockDate};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/api/admin/restock-dates",
            get(get_restock_dates)
                .post(set_restock_dates)
                .delete(clear_restock_date),
        )
        .route("/api/products/{id}/restock", get(product_restock))
}

/// Query for the admin restock endpoints.
///
/// Without `productId` the GET handler lists upcoming restocks.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestockQuery {
    pub product_id: Option<ProductId>,
    pub variant_id: Option<VariantId>,
    #[serde(default)]
    pub history: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RestockDateResponse {
    pub product_id: ProductId,
    pub variant_id: Option<VariantId>,
    pub expected_date: Option<chrono::DateTime<chrono::Utc>>,
    pub schedule: Option<RestockSchedule>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub history: Option<Vec<RestockSchedule>>,
}

/// A single update or a bulk batch under `updates`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum RestockDateRequest {
    Bulk { updates: Vec<SetRestockDate> },
    Single(SetRestockDate),
}

#[derive(Debug, Serialize)]
pub struct RestockDateUpdated {
    pub success: bool,
    pub message: String,
    pub schedule: RestockSchedule,
}

/// Current restock date of one item, or the upcoming restock list.
///
/// # Errors
///
/// Returns an error if the query is malformed or the store fails.
pub async fn get_restock_dates(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    query: Result<Query<RestockQuery>, QueryRejection>,
) -> Result<Response, AppError> {
    let Query(query) = query?;
    let service = state.restock();

    let Some(product_id) = query.product_id else {
        let upcoming = service.get_upcoming_restocks().await?;
        return Ok(Json(upcoming).into_response());
    };

    let key = StockKey::new(product_id, query.variant_id);
    let schedule = service.get_restock_schedule(key).await?;
    let history = if query.history {
        Some(service.get_restock_history(key).await?)
    } else {
        None
    };

    Ok(Json(RestockDateResponse {
        product_id,
        variant_id: query.variant_id,
        expected_date: schedule.as_ref().and_then(|s| s.expected_date),
        schedule,
        history,
    })
    .into_response())
}

/// Set one restock date, or many with `{"updates": [...]}`.
///
/// # Errors
///
/// Returns 400 for a date that is not in the future and 404 for an unknown
/// item. Bulk updates report invalid entries in the body instead.
pub async fn set_restock_dates(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    payload: Result<Json<RestockDateRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    let Json(request) = payload?;
    let service = state.restock();

    match request {
        RestockDateRequest::Bulk { updates } => {
            tracing::info!(admin_id = %admin.id, count = updates.len(), "Bulk restock update");
            let result: BulkUpdateResult = service.bulk_update_restock_dates(updates).await?;
            Ok(Json(result).into_response())
        }
        RestockDateRequest::Single(update) => {
            let schedule = service.set_restock_date(update).await?;
            Ok(Json(RestockDateUpdated {
                success: true,
                message: "Restock date updated".to_string(),
                schedule,
            })
            .into_response())
        }
    }
}

/// Clear the restock date of an item.
///
/// # Errors
///
/// Returns 400 without `productId` and 404 for an unknown item.
pub async fn clear_restock_date(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    query: Result<Query<RestockQuery>, QueryRejection>,
) -> Result<Json<RestockDateUpdated>, AppError> {
    let Query(query) = query?;
    let product_id = query
        .product_id
        .ok_or_else(|| AppError::BadRequest("productId is required".to_string()))?;

    let schedule = state
        .restock()
        .clear_restock_date(StockKey::new(product_id, query.variant_id))
        .await?;

    Ok(Json(RestockDateUpdated {
        success: true,
        message: "Restock date cleared".to_string(),
        schedule,
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayQuery {
    pub variant_id: Option<VariantId>,
    pub locale: Option<String>,
}

/// Storefront restock hint for a product or one of its variants.
///
/// # Errors
///
/// Returns 404 for an unknown product or variant.
pub async fn product_restock(
    State(state): State<AppState>,
    Path(product_id): Path<ProductId>,
    query: Result<Query<DisplayQuery>, QueryRejection>,
) -> Result<Json<RestockDisplay>, AppError> {
    let Query(query) = query?;
    let locale = query
        .locale
        .as_deref()
        .map_or(state.config().locale, Locale::from_tag);

    let display = state
        .restock()
        .restock_display(StockKey::new(product_id, query.variant_id), locale)
        .await?;
    Ok(Json(display))
}
