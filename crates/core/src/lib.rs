//! Loom & Co Core - Shared domain types.
//!
//! This crate provides the types shared by every Loom & Co component:
//! - `storefront` - Record store, cart/wishlist/catalog/order ledgers and
//!   their remote-backed counterparts
//! - `cli` - Command-line tools driving the ledgers and migrations
//!
//! # Architecture
//!
//! The core crate contains only types and pure operations - no I/O, no
//! database access, no clocks beyond what callers pass in. Persistence is
//! layered on top by the storefront crate.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for ids, money and statuses
//! - [`models`] - Line items, wishlist entries, products and orders

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod models;
pub mod types;

pub use models::*;
pub use types::*;
