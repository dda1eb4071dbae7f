//! Admin dashboard listings and the production readiness report.

use axum::{
    Json, Router,
    extract::{Query, State, rejection::QueryRejection},
    routing::get,
};
use serde::Deserialize;

use attireburg_core::OrderStatus;

use crate::error::AppError;
use crate::middleware::RequireAdmin;
use crate::models::Pagination;
use crate::services::backorder::BackorderListing;
use crate::services::readiness::ReadinessReport;
use crate::services::waitlist::WaitlistOverview;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/admin/waitlists", get(waitlists))
        .route("/api/admin/backorders", get(backorders))
        .route("/api/admin/production-check", get(production_check))
}

/// Waitlist counts per item, most wanted first.
///
/// # Errors
///
/// Returns an error if the store fails.
pub async fn waitlists(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    query: Result<Query<Pagination>, QueryRejection>,
) -> Result<Json<WaitlistOverview>, AppError> {
    let Query(pagination) = query?;
    Ok(Json(state.waitlist().admin_overview(pagination).await?))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackorderQuery {
    pub status: Option<OrderStatus>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

/// Backorders in priority order with per-status counts.
///
/// # Errors
///
/// Returns 400 for an unknown status and an error if the store fails.
pub async fn backorders(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    query: Result<Query<BackorderQuery>, QueryRejection>,
) -> Result<Json<BackorderListing>, AppError> {
    let Query(query) = query?;
    let pagination = Pagination {
        page: query.page,
        per_page: query.per_page,
    };
    Ok(Json(
        state
            .backorders()
            .admin_listing(query.status, pagination)
            .await?,
    ))
}

/// # Errors
///
/// Returns an error if a check cannot run; failing checks are part of the
/// report.
pub async fn production_check(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
) -> Result<Json<ReadinessReport>, AppError> {
    tracing::info!(admin_id = %admin.id, "Production check requested");
    Ok(Json(state.readiness().production_check().await?))
}
