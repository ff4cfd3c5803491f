//! Command implementations.

pub mod cart;
pub mod catalog;
pub mod migrate;
pub mod orders;
pub mod wishlist;

use loom_co_core::{Product, ProductId};
use loom_co_storefront::error::AppError;
use loom_co_storefront::ledger::ProductCatalog;

/// Look up a listed product or fail with `NotFound`.
fn find_product<'a>(catalog: &'a ProductCatalog, id: &str) -> Result<&'a Product, AppError> {
    catalog
        .get(&ProductId::from(id))
        .ok_or_else(|| AppError::NotFound(format!("product {id}")))
}
