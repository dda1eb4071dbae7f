//! Attireburg Core - Shared domain types.
//!
//! This crate provides the types and pure rules used across the Attireburg
//! back-office components:
//! - `server` - HTTP API for restock dates, waitlists, backorders and orders
//! - `cli` - Command-line tools for migrations and readiness checks
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no database
//! access, no HTTP clients. Both the `PostgreSQL` store and the in-process
//! store in `server` call into the same rules here, so ordering and
//! transition semantics cannot drift between them.
//!
//! # Modules
//!
//! - [`types`] - Newtype IDs, emails, prices, stock keys and status enums
//! - [`fulfillment`] - FIFO allocation of replenished stock to backorders
//! - [`restock`] - Restock display states and localised date formatting

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod fulfillment;
pub mod restock;
pub mod types;

pub use restock::{Locale, RestockDisplay, RestockState};
pub use types::*;
