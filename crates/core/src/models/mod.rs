//! Domain models shared by the local and remote ledgers.
//!
//! These types hold the invariants (identity keys, quantity merging,
//! totals, price snapshots); persistence lives in the storefront crate.

pub mod cart;
pub mod order;
pub mod product;
pub mod wishlist;

pub use cart::{CartLines, LineItem, LineKey, NewLineItem};
pub use order::{CheckoutDetails, Order, OrderItem, OrderPatch, OrderTotals, ShippingAddress};
pub use product::{ColorOption, PLACEHOLDER_IMAGE, Product};
pub use wishlist::{Wishlist, WishlistEntry};
