//! Business logic services.
//!
//! # Services
//!
//! - `restock` - Restock date schedules and the storefront restock hint
//! - `waitlist` - Waitlist subscriptions
//! - `backorder` - Backorder lifecycle and FIFO fulfillment
//! - `notification` - Customer emails, waitlist fan-out and delivery analytics
//! - `order_status` - Order state machine with its side effects
//! - `inventory` - All-or-nothing stock reservation and checkout
//! - `readiness` - Production readiness report
//! - `email` - Email templates and transports
//! - `links` - Absolute storefront links
//! - `tokens` - Access token verification and signed links
//!
//! Services borrow the store and mailer from [`crate::state::AppState`] for
//! the duration of one request.

pub mod backorder;
pub mod email;
pub mod inventory;
pub mod links;
pub mod notification;
pub mod order_status;
pub mod readiness;
pub mod restock;
pub mod tokens;
pub mod waitlist;

use thiserror::Error;

use crate::db::RepositoryError;
use crate::error::AppError;

pub use backorder::BackorderService;
pub use email::{EmailError, LogMailer, Mailer, MemoryMailer, OutgoingEmail, SmtpMailer};
pub use inventory::InventoryService;
pub use links::Links;
pub use notification::NotificationService;
pub use order_status::OrderStatusService;
pub use readiness::ReadinessService;
pub use restock::RestockService;
pub use tokens::{AuthUser, JwtKeys, LinkSigner, TokenError};
pub use waitlist::WaitlistService;

/// Errors raised by services.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Input failed validation.
    #[error("{0}")]
    Validation(String),

    /// A referenced entity does not exist.
    #[error("{0}")]
    NotFound(String),

    /// The operation conflicts with current state.
    #[error("{0}")]
    Conflict(String),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Validation(message) => Self::BadRequest(message),
            ServiceError::NotFound(message) => Self::NotFound(message),
            ServiceError::Conflict(message) => Self::Conflict(message),
            ServiceError::Repository(e) => e.into(),
        }
    }
}
