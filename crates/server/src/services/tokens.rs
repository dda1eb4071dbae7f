//! Access tokens and signed links.
//!
//! Access tokens are HS256 JWTs issued by the storefront's login flow; this
//! service only verifies them (and issues them for the operator CLI).
//! Unsubscribe links carry an HMAC-SHA256 over the subscription identity so a
//! link cannot be edited to unsubscribe someone else.

use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;

use attireburg_core::{Email, StockKey, UserId, UserRole};

type HmacSha256 = Hmac<Sha256>;

/// Errors from token verification or issuance.
#[derive(Debug, Error)]
pub enum TokenError {
    #[error("invalid token: {0}")]
    Invalid(String),

    #[error("token expired")]
    Expired,

    #[error("token generation failed: {0}")]
    Generation(String),
}

/// Claims carried by an access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id.
    pub sub: String,
    pub email: String,
    pub role: UserRole,
    pub exp: i64,
    pub iat: i64,
}

/// The verified caller of a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub id: UserId,
    pub email: Email,
    pub role: UserRole,
}

impl AuthUser {
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }

    /// Admins may act for anyone, customers only for themselves.
    #[must_use]
    pub fn may_act_for(&self, user_id: UserId) -> bool {
        self.is_admin() || self.id == user_id
    }

    #[must_use]
    pub fn may_act_for_email(&self, email: &Email) -> bool {
        self.is_admin() || &self.email == email
    }
}

/// HS256 keys for access tokens.
#[derive(Debug, Clone)]
pub struct JwtKeys {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl JwtKeys {
    #[must_use]
    pub fn new(secret: &SecretString) -> Self {
        let bytes = secret.expose_secret().as_bytes();
        Self {
            encoding_key: EncodingKey::from_secret(bytes),
            decoding_key: DecodingKey::from_secret(bytes),
        }
    }

    /// Verify a token and resolve the caller.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::Expired` for expired tokens and
    /// `TokenError::Invalid` for anything else that fails validation.
    pub fn verify(&self, token: &str) -> Result<AuthUser, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_required_spec_claims(&["sub", "exp"]);

        let data = decode::<Claims>(token, &self.decoding_key, &validation).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Invalid(e.to_string()),
            }
        })?;

        let id = data
            .claims
            .sub
            .parse::<UserId>()
            .map_err(|_| TokenError::Invalid("subject is not a user id".to_string()))?;
        let email = Email::parse(&data.claims.email)
            .map_err(|e| TokenError::Invalid(format!("email claim: {e}")))?;

        Ok(AuthUser {
            id,
            email,
            role: data.claims.role,
        })
    }

    /// Issue a token for `user`, valid for `ttl`.
    ///
    /// # Errors
    ///
    /// Returns `TokenError::Generation` if encoding fails.
    pub fn issue(&self, user: &AuthUser, ttl: Duration) -> Result<String, TokenError> {
        let now = Utc::now();
        let claims = Claims {
            sub: user.id.to_string(),
            email: user.email.to_string(),
            role: user.role,
            exp: (now + ttl).timestamp(),
            iat: now.timestamp(),
        };
        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| TokenError::Generation(e.to_string()))
    }
}

/// Extract the token from an `Authorization: Bearer ...` header value.
#[must_use]
pub fn bearer_token(header: &str) -> Option<&str> {
    header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Signs and checks unsubscribe links.
#[derive(Clone)]
pub struct LinkSigner {
    secret: SecretString,
}

impl std::fmt::Debug for LinkSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinkSigner")
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

impl LinkSigner {
    #[must_use]
    pub const fn new(secret: SecretString) -> Self {
        Self { secret }
    }

    fn mac(&self, email: &Email, key: StockKey) -> Option<HmacSha256> {
        let mut mac = HmacSha256::new_from_slice(self.secret.expose_secret().as_bytes()).ok()?;
        let variant = key
            .variant_id
            .map_or_else(|| "-".to_string(), |v| v.to_string());
        mac.update(format!("unsubscribe:{email}:{}:{variant}", key.product_id).as_bytes());
        Some(mac)
    }

    /// Hex token for an unsubscribe link.
    #[must_use]
    pub fn unsubscribe_token(&self, email: &Email, key: StockKey) -> String {
        self.mac(email, key)
            .map(|mac| hex::encode(mac.finalize().into_bytes()))
            .unwrap_or_default()
    }

    /// Constant-time check of an unsubscribe token.
    #[must_use]
    pub fn verify_unsubscribe(&self, email: &Email, key: StockKey, token: &str) -> bool {
        let Ok(provided) = hex::decode(token) else {
            return false;
        };
        self.mac(email, key)
            .is_some_and(|mac| mac.verify_slice(&provided).is_ok())
    }
}
