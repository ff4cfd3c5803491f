//! Loom & Co storefront sync layer.
//!
//! Cart, wishlist, product catalog and order ledgers in two flavours:
//! local ledgers persisted through the keyed record store, and
//! remote-backed ledgers mirroring a `PostgreSQL` database for the
//! signed-in user.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod auth;
pub mod config;
pub mod error;
pub mod ledger;
pub mod remote;
pub mod state;
pub mod store;
pub mod sync;
