//! Integration tests for Loom & Co.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p loom-co-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `local_storefront` - Ledgers over the record store, end to end
//! - `remote_sync` - Remote-backed ledgers over the in-memory database
//!
//! Neither needs a running database. This crate holds the fixtures both
//! share.

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use loom_co_core::{CheckoutDetails, Product, ProductId, ShippingAddress, UserId};
use loom_co_storefront::auth::AuthUser;
use loom_co_storefront::ledger::seed::seed_products;
use loom_co_storefront::remote::{MemoryDatabase, RemoteDatabase, RemoteError};

const POLL_ATTEMPTS: u32 = 100;
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// A signed-in test customer.
#[must_use]
pub fn customer(id: &str, email: &str) -> AuthUser {
    AuthUser {
        id: UserId::from(id),
        email: email.to_string(),
    }
}

/// Checkout form of a customer shipping to London.
#[must_use]
pub fn checkout_details(email: &str) -> CheckoutDetails {
    CheckoutDetails {
        customer: "Ada Lovelace".to_string(),
        email: email.to_string(),
        phone: Some("+44 20 7946 0000".to_string()),
        shipping_address: Some(ShippingAddress {
            line1: "1 St James's Square".to_string(),
            line2: None,
            city: "London".to_string(),
            postcode: "SW1Y 4JH".to_string(),
            country: "United Kingdom".to_string(),
        }),
    }
}

/// A seed product by id.
///
/// # Panics
///
/// Panics if `id` is not a seed id.
#[must_use]
#[allow(clippy::expect_used)]
pub fn seed(id: &str) -> Product {
    let id = ProductId::from(id);
    seed_products()
        .iter()
        .find(|p| p.id == id)
        .cloned()
        .expect("unknown seed product")
}

/// In-memory database with the seed catalog already published.
///
/// # Errors
///
/// Returns the database's error if a product cannot be written.
pub async fn database_with_seed() -> Result<Arc<MemoryDatabase>, RemoteError> {
    let db = Arc::new(MemoryDatabase::new());
    for product in seed_products() {
        db.upsert_product(product).await?;
    }
    Ok(db)
}

/// Poll `check` until it holds, for about a second.
///
/// Background resyncs run on their own tasks, so their effects become
/// visible some time after the triggering write.
pub async fn eventually<F, Fut>(mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    for _ in 0..POLL_ATTEMPTS {
        if check().await {
            return true;
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
    false
}
