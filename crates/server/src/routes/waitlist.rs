//! Waitlist handlers.
//!
//! Subscribing needs no account. Removing a subscription needs proof of the
//! address: the signed token from a restock email, or a customer token for
//! the same email.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Json, Router,
    extract::{
        Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    routing::get,
};
use serde::{Deserialize, Serialize};

use attireburg_core::{Email, Locale, ProductId, StockKey, VariantId};

use crate::db::CatalogStore;
use crate::error::AppError;
use crate::middleware::{OptionalAuth, RequireAuth};
use crate::models::{WaitlistEntry, WaitlistSubscription};
use crate::services::AuthUser;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/api/waitlist/subscribe",
            get(subscription_status)
                .post(subscribe)
                .delete(unsubscribe),
        )
        .route(
            "/api/waitlist/unsubscribe",
            get(unsubscribe_link).delete(unsubscribe),
        )
        .route("/api/waitlist/subscriptions", get(subscriptions))
}

/// Identifies one subscription.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionTarget {
    pub email: String,
    pub product_id: ProductId,
    pub variant_id: Option<VariantId>,
    /// Unsubscribe link token.
    pub token: Option<String>,
}

impl SubscriptionTarget {
    const fn key(&self) -> StockKey {
        StockKey::new(self.product_id, self.variant_id)
    }
}

#[derive(Debug, Serialize)]
pub struct SubscribeResponse {
    pub success: bool,
    pub message: String,
    pub subscription: WaitlistSubscription,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub subscribed: bool,
}

#[derive(Debug, Serialize)]
pub struct UnsubscribeResponse {
    pub success: bool,
    pub removed: bool,
}

/// Join the waitlist for an item. Subscribing twice keeps one subscription.
///
/// # Errors
///
/// Returns 400 for a malformed email and 404 for an unknown item.
pub async fn subscribe(
    OptionalAuth(user): OptionalAuth,
    State(state): State<AppState>,
    payload: Result<Json<SubscriptionTarget>, JsonRejection>,
) -> Result<Json<SubscribeResponse>, AppError> {
    let Json(target) = payload?;
    let user_id = user.map(|u| u.id);

    let subscription = state
        .waitlist()
        .subscribe(&target.email, target.key(), user_id)
        .await?;

    Ok(Json(SubscribeResponse {
        success: true,
        message: "Subscribed to waitlist".to_string(),
        subscription,
    }))
}

/// Whether an email is on the waitlist for an item.
///
/// # Errors
///
/// Returns 400 for a malformed query.
pub async fn subscription_status(
    State(state): State<AppState>,
    query: Result<Query<SubscriptionTarget>, QueryRejection>,
) -> Result<Json<StatusResponse>, AppError> {
    let Query(target) = query?;
    let subscribed = state
        .waitlist()
        .is_subscribed(&target.email, target.key())
        .await?;
    Ok(Json(StatusResponse { subscribed }))
}

/// Whether the caller has shown they own `email` for this subscription.
fn may_unsubscribe(
    state: &AppState,
    user: Option<&AuthUser>,
    email: &Email,
    target: &SubscriptionTarget,
) -> bool {
    let signed = target.token.as_deref().is_some_and(|token| {
        state
            .links()
            .signer()
            .verify_unsubscribe(email, target.key(), token)
    });
    signed || user.is_some_and(|u| u.may_act_for_email(email))
}

/// Leave the waitlist (API clients).
///
/// # Errors
///
/// Returns 400 for a malformed email and 403 without a valid token or a
/// matching customer token.
pub async fn unsubscribe(
    OptionalAuth(user): OptionalAuth,
    State(state): State<AppState>,
    query: Result<Query<SubscriptionTarget>, QueryRejection>,
) -> Result<Json<UnsubscribeResponse>, AppError> {
    let Query(target) = query?;
    let email = Email::parse(&target.email).map_err(|e| AppError::BadRequest(e.to_string()))?;
    if !may_unsubscribe(&state, user.as_ref(), &email, &target) {
        return Err(AppError::Forbidden(
            "Not allowed to change this subscription".to_string(),
        ));
    }

    let removed = state
        .waitlist()
        .unsubscribe(email.as_str(), target.key())
        .await?;
    Ok(Json(UnsubscribeResponse {
        success: true,
        removed,
    }))
}

#[derive(Template, WebTemplate)]
#[template(path = "waitlist/unsubscribed.html")]
pub struct UnsubscribedTemplate {
    pub en: bool,
    pub removed: bool,
    pub product_name: String,
    pub shop_url: String,
}

/// Leave the waitlist from the link in a restock email.
///
/// # Errors
///
/// Returns 400 for a malformed email and 403 for a missing or invalid token.
pub async fn unsubscribe_link(
    State(state): State<AppState>,
    query: Result<Query<SubscriptionTarget>, QueryRejection>,
) -> Result<UnsubscribedTemplate, AppError> {
    let Query(target) = query?;
    let email = Email::parse(&target.email).map_err(|e| AppError::BadRequest(e.to_string()))?;
    if !may_unsubscribe(&state, None, &email, &target) {
        return Err(AppError::Forbidden("Invalid unsubscribe link".to_string()));
    }

    let removed = state
        .waitlist()
        .unsubscribe(email.as_str(), target.key())
        .await?;
    let product_name = state
        .store()
        .item_label(target.key())
        .await?
        .map_or_else(|| format!("#{}", target.product_id), |l| l.product_name);

    Ok(UnsubscribedTemplate {
        en: state.config().locale == Locale::En,
        removed,
        product_name,
        shop_url: state.links().base_url().to_string(),
    })
}

#[derive(Debug, Deserialize)]
pub struct SubscriptionsQuery {
    pub email: String,
}

/// Active subscriptions of a customer.
///
/// # Errors
///
/// Returns 401 without a token, 403 for another customer's email and 400 for
/// a malformed one.
pub async fn subscriptions(
    RequireAuth(user): RequireAuth,
    State(state): State<AppState>,
    query: Result<Query<SubscriptionsQuery>, QueryRejection>,
) -> Result<Json<Vec<WaitlistEntry>>, AppError> {
    let Query(query) = query?;
    let email = Email::parse(&query.email).map_err(|e| AppError::BadRequest(e.to_string()))?;
    if !user.may_act_for_email(&email) {
        return Err(AppError::Forbidden(
            "Cannot view another customer's subscriptions".to_string(),
        ));
    }

    let entries = state.waitlist().list_by_email(email.as_str()).await?;
    Ok(Json(entries))
}
