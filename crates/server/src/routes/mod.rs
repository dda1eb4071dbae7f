//! HTTP route handlers.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                           - Liveness check
//! GET  /health/ready                     - Readiness check (database)
//!
//! # Restock dates
//! GET    /api/admin/restock-dates        - Item date (or upcoming list)    [admin]
//! POST   /api/admin/restock-dates        - Set one date, or bulk `updates` [admin]
//! DELETE /api/admin/restock-dates        - Clear an item's date            [admin]
//! GET    /api/products/{id}/restock      - Storefront restock hint
//!
//! # Backorders
//! GET  /api/backorders/status            - By orderId or userId           [own/admin]
//! POST /api/backorders/create            - Place a backorder              [customer]
//! PUT  /api/backorders/cancel            - Cancel and restore stock       [own/admin]
//! PUT  /api/admin/backorders/fulfill     - Fulfill one, or receive stock  [admin]
//! POST /api/admin/backorders/delay       - New expected date + email      [admin]
//!
//! # Waitlist
//! GET    /api/waitlist/subscribe         - Subscription status
//! POST   /api/waitlist/subscribe         - Subscribe (idempotent)
//! DELETE /api/waitlist/subscribe         - Unsubscribe                    [token/own]
//! GET    /api/waitlist/unsubscribe       - Email link, HTML confirmation  [token]
//! DELETE /api/waitlist/unsubscribe       - Unsubscribe                    [token/own]
//! GET    /api/waitlist/subscriptions     - Subscriptions of an email      [own/admin]
//!
//! # Notifications
//! POST /api/notifications/restock        - Email an item's waitlist       [admin]
//! POST /api/notifications/test           - Send a test email              [admin]
//! GET  /api/notifications/status         - Delivery analytics             [admin]
//! POST /api/notifications/{id}/events    - Record open/click/purchase
//!
//! # Orders
//! POST /api/orders                       - Place a regular order          [customer]
//! PUT  /api/admin/orders/{id}/status     - Status transition              [admin]
//! GET  /api/admin/orders/{id}/history    - Status history                 [admin]
//!
//! # Admin
//! GET  /api/admin/waitlists              - Waitlist counts per item       [admin]
//! GET  /api/admin/backorders             - Backorder listing + counts     [admin]
//! GET  /api/admin/production-check       - Readiness report               [admin]
//! ```

pub mod admin;
pub mod backorders;
pub mod notifications;
pub mod orders;
pub mod restock;
pub mod waitlist;

use axum::Router;

use crate::state::AppState;

/// Build the complete API router.
pub fn routes() -> Router<AppState> {
    Router::new()
        .merge(restock::router())
        .merge(backorders::router())
        .merge(waitlist::router())
        .merge(notifications::router())
        .merge(orders::router())
        .merge(admin::router())
}
