//! Wiring of the ledgers into a storefront.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::info;

use crate::auth::{AuthAware, AuthState, follow_auth_changes};
use crate::config::StorefrontConfig;
use crate::error::AppError;
use crate::ledger::{CartLedger, OrderLedger, ProductCatalog, WishlistSet};
use crate::remote::{PgDatabase, RemoteDatabase};
use crate::store::{FileBackend, MemoryBackend, RecordStore, StorageError};
use crate::sync::{RemoteCart, RemoteCatalog, RemoteOrders, RemoteWishlist};

/// Local ledgers sharing one record store.
#[derive(Debug)]
pub struct Storefront {
    pub cart: CartLedger,
    pub wishlist: WishlistSet,
    pub catalog: ProductCatalog,
    pub orders: OrderLedger,
    store: RecordStore,
}

impl Storefront {
    /// Open every ledger over `store`.
    #[must_use]
    pub fn open(store: RecordStore) -> Self {
        Self {
            cart: CartLedger::open(store.clone()),
            wishlist: WishlistSet::open(store.clone()),
            catalog: ProductCatalog::open(store.clone()),
            orders: OrderLedger::open(store.clone()),
            store,
        }
    }

    /// Open over the file-backed store described by `config`.
    ///
    /// # Errors
    ///
    /// Returns a `StorageError` if the data directory cannot be created.
    pub fn from_config(config: &StorefrontConfig) -> Result<Self, StorageError> {
        let backend = FileBackend::open(&config.data_dir)?.with_quota(config.storage_quota_bytes);
        info!(data_dir = %config.data_dir.display(), quota = config.storage_quota_bytes, "Opened local storefront");
        Ok(Self::open(RecordStore::new(backend)))
    }

    /// Storefront over an in-memory store with the given quota.
    #[must_use]
    pub fn in_memory(quota: Option<usize>) -> Self {
        let backend = quota.map_or_else(MemoryBackend::new, MemoryBackend::with_quota);
        Self::open(RecordStore::new(backend))
    }

    /// The shared record store.
    #[must_use]
    pub const fn store(&self) -> &RecordStore {
        &self.store
    }
}

/// Remote-backed ledgers following one auth state.
///
/// Cheaply cloneable via `Arc`.
#[derive(Clone)]
pub struct RemoteStorefront {
    inner: Arc<RemoteStorefrontInner>,
}

struct RemoteStorefrontInner {
    auth: AuthState,
    cart: Arc<RemoteCart>,
    wishlist: Arc<RemoteWishlist>,
    catalog: RemoteCatalog,
    orders: RemoteOrders,
    followers: Vec<JoinHandle<()>>,
}

impl Drop for RemoteStorefrontInner {
    fn drop(&mut self) {
        for follower in &self.followers {
            follower.abort();
        }
    }
}

impl RemoteStorefront {
    /// Build the remote ledgers over `db`, load the current user's rows and
    /// follow later sign-ins and sign-outs.
    pub async fn new(db: Arc<dyn RemoteDatabase>, auth: AuthState, cache_ttl: Duration) -> Self {
        let cart = Arc::new(RemoteCart::new(db.clone()));
        let wishlist = Arc::new(RemoteWishlist::new(db.clone()));

        // Subscribe before the first load so a sign-in or sign-out during it
        // is replayed by the followers.
        let mut changes = auth.subscribe();
        let current = changes.borrow_and_update().clone();
        cart.on_auth_change(current.clone()).await;
        wishlist.on_auth_change(current).await;
        let followers = vec![
            follow_auth_changes(cart.clone(), changes.clone()),
            follow_auth_changes(wishlist.clone(), changes),
        ];

        Self {
            inner: Arc::new(RemoteStorefrontInner {
                auth,
                cart,
                wishlist,
                catalog: RemoteCatalog::new(db.clone(), cache_ttl),
                orders: RemoteOrders::new(db),
                followers,
            }),
        }
    }

    /// Connect to the database named by `config`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if no database is configured, or
    /// `AppError::Remote` if the connection fails.
    pub async fn connect(config: &StorefrontConfig, auth: AuthState) -> Result<Self, AppError> {
        let url = config.require_database_url()?;
        let db = PgDatabase::connect(url).await?;
        Ok(Self::new(Arc::new(db), auth, config.catalog_cache_ttl).await)
    }

    #[must_use]
    pub fn auth(&self) -> &AuthState {
        &self.inner.auth
    }

    #[must_use]
    pub fn cart(&self) -> &RemoteCart {
        &self.inner.cart
    }

    #[must_use]
    pub fn wishlist(&self) -> &RemoteWishlist {
        &self.inner.wishlist
    }

    #[must_use]
    pub fn catalog(&self) -> &RemoteCatalog {
        &self.inner.catalog
    }

    #[must_use]
    pub fn orders(&self) -> &RemoteOrders {
        &self.inner.orders
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use loom_co_core::ProductId;

    #[test]
    fn test_in_memory_storefront_lists_seed() {
        let storefront = Storefront::in_memory(None);
        assert!(storefront.catalog.get(&ProductId::from("1")).is_some());
        assert!(storefront.cart.is_empty());
        assert!(storefront.orders.list().is_empty());
    }

    #[test]
    fn test_from_config_uses_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        let config = StorefrontConfig {
            data_dir: dir.path().join("data"),
            ..StorefrontConfig::default()
        };
        let mut storefront = Storefront::from_config(&config).unwrap();
        let product = storefront.catalog.get(&ProductId::from("1")).unwrap().clone();
        storefront.cart.add_item(product.line_item("M", "Black")).unwrap();

        let reopened = Storefront::from_config(&config).unwrap();
        assert_eq!(reopened.cart.total_items(), 1);
    }
}
