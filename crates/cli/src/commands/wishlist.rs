//! Wishlist commands.

use loom_co_core::ProductId;
use loom_co_storefront::error::AppError;
use loom_co_storefront::state::Storefront;
use tracing::warn;

use super::find_product;

/// Print the saved products.
#[allow(clippy::print_stdout)]
pub fn show(storefront: &Storefront) {
    let wishlist = &storefront.wishlist;
    if wishlist.is_empty() {
        println!("Your wishlist is empty.");
    }
    for entry in wishlist.entries() {
        match entry.original_price {
            Some(original) => println!("[{}] {}  {} (was {original})", entry.product_id, entry.name, entry.price),
            None => println!("[{}] {}  {}", entry.product_id, entry.name, entry.price),
        }
    }
    if wishlist.is_session_only() {
        warn!("Wishlist storage is full; changes last only for this session");
    }
}

/// Save a listed product.
///
/// # Errors
///
/// Returns `AppError::NotFound` for an unlisted product, or the
/// wishlist's storage error.
pub fn add(storefront: &mut Storefront, product_id: &str) -> Result<(), AppError> {
    let entry = find_product(&storefront.catalog, product_id)?.wishlist_entry();
    storefront.wishlist.add(entry)?;
    show(storefront);
    Ok(())
}

/// Remove a saved product.
///
/// # Errors
///
/// Returns the wishlist's storage error.
pub fn remove(storefront: &mut Storefront, product_id: &str) -> Result<(), AppError> {
    storefront.wishlist.remove(&ProductId::from(product_id))?;
    show(storefront);
    Ok(())
}
