//! Local ledgers backed by the keyed record store.
//!
//! Each ledger rehydrates from its own key on open and persists the whole
//! collection after every mutation (write-through). The ledgers differ in
//! how they react when the medium is full:
//!
//! - [`CartLedger`] rolls back to empty and reports the cart as unsaved
//! - [`WishlistSet`] keeps working in memory for the rest of the session
//! - [`ProductCatalog`] trims what it stores, tier by tier, down to nothing
//! - [`OrderLedger`] refuses to record an order it cannot store

pub mod cart;
pub mod catalog;
pub mod orders;
pub mod seed;
pub mod wishlist;

pub use cart::{CartError, CartLedger};
pub use catalog::{CatalogError, PersistTier, ProductCatalog};
pub use orders::{OrderError, OrderLedger};
pub use wishlist::{WishlistError, WishlistSet};
