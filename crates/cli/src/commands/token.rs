//! Access token command.
//!
//! # Environment Variables
//!
//! - `ATTIREBURG_JWT_SECRET` - Signing key shared with the server

use chrono::Duration;
use secrecy::SecretString;
use thiserror::Error;

use attireburg_core::{Email, UserId, UserRole};
use attireburg_server::config::{ConfigError, check_signing_secret};
use attireburg_server::services::{AuthUser, JwtKeys, TokenError};

#[derive(Debug, Error)]
pub enum TokenCommandError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    #[error("{0}")]
    WeakSecret(#[from] ConfigError),

    #[error("Invalid role: {0}. Valid roles: customer, admin")]
    InvalidRole(String),

    #[error("Invalid email: {0}")]
    InvalidEmail(String),

    #[error("Hours must be positive")]
    InvalidLifetime,

    #[error(transparent)]
    Token(#[from] TokenError),
}

/// Issue a signed access token.
///
/// # Errors
///
/// Returns an error for an unknown role, a missing or weak secret, a
/// malformed email or a non-positive lifetime.
pub fn issue(
    user_id: i32,
    email: &str,
    role: &str,
    hours: i64,
) -> Result<String, TokenCommandError> {
    dotenvy::dotenv().ok();

    let role = match role {
        "admin" => UserRole::Admin,
        "customer" => UserRole::Customer,
        other => return Err(TokenCommandError::InvalidRole(other.to_owned())),
    };

    if hours <= 0 {
        return Err(TokenCommandError::InvalidLifetime);
    }
    let email = Email::parse(email).map_err(|_| TokenCommandError::InvalidEmail(email.to_owned()))?;

    let secret = std::env::var("ATTIREBURG_JWT_SECRET")
        .map(SecretString::from)
        .map_err(|_| TokenCommandError::MissingEnvVar("ATTIREBURG_JWT_SECRET"))?;
    check_signing_secret(&secret, "ATTIREBURG_JWT_SECRET")?;

    let user = AuthUser {
        id: UserId::new(user_id),
        email,
        role,
    };
    let token = JwtKeys::new(&secret).issue(&user, Duration::hours(hours))?;
    tracing::info!(user_id, role = %role, hours, "Access token issued");
    Ok(token)
}
