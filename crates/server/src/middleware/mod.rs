//! HTTP middleware and extractors.
//!
//! # Layer Order (outermost first, applied in [`crate::app`])
//!
//! 1. Sentry layers (hub per request, transaction)
//! 2. `TraceLayer` (request span with status and latency)
//!
//! Authentication is per handler through the extractors in [`auth`].

pub mod auth;

pub use auth::{OptionalAuth, RequireAdmin, RequireAuth};
