//! Authentication extractors.
//!
//! Callers authenticate with `Authorization: Bearer <jwt>`. Tokens are issued
//! by the storefront login flow and verified here with the shared HS256 key.

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};

use crate::error::{AppError, set_sentry_user};
use crate::services::tokens::{AuthUser, TokenError, bearer_token};
use crate::state::AppState;

/// Resolve the caller from the `Authorization` header.
///
/// Returns `Ok(None)` when no bearer token is sent.
fn authenticate(parts: &Parts, state: &AppState) -> Result<Option<AuthUser>, AppError> {
    let Some(header) = parts.headers.get(AUTHORIZATION) else {
        return Ok(None);
    };
    let token = header
        .to_str()
        .ok()
        .and_then(bearer_token)
        .ok_or_else(|| AppError::Unauthorized("Malformed authorization header".to_string()))?;

    let user = state.jwt().verify(token).map_err(|e| match e {
        TokenError::Expired => AppError::Unauthorized("Token expired".to_string()),
        other => {
            tracing::debug!(error = %other, "Rejected access token");
            AppError::Unauthorized("Invalid token".to_string())
        }
    })?;

    set_sentry_user(user.id.as_i32(), Some(user.email.as_str()));
    Ok(Some(user))
}

/// Extractor that requires a valid access token.
///
/// # Example
///
/// ```rust,ignore
/// async fn handler(RequireAuth(user): RequireAuth) -> impl IntoResponse {
///     format!("Hello, {}!", user.email)
/// }
/// ```
pub struct RequireAuth(pub AuthUser);

impl FromRequestParts<AppState> for RequireAuth {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        authenticate(parts, state)?
            .map(Self)
            .ok_or_else(|| AppError::Unauthorized("Authentication required".to_string()))
    }
}

/// Extractor that requires an admin access token.
///
/// Missing or invalid tokens are rejected with 401, customer tokens with 403.
pub struct RequireAdmin(pub AuthUser);

impl FromRequestParts<AppState> for RequireAdmin {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let RequireAuth(user) = RequireAuth::from_request_parts(parts, state).await?;
        if !user.is_admin() {
            return Err(AppError::Forbidden("Admin access required".to_string()));
        }
        Ok(Self(user))
    }
}

/// Extractor that optionally gets the caller.
///
/// A request without a token is anonymous; a request with a bad token is
/// still rejected.
pub struct OptionalAuth(pub Option<AuthUser>);

impl FromRequestParts<AppState> for OptionalAuth {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        authenticate(parts, state).map(Self)
    }
}
