//! Remote-backed product catalog.
//!
//! Active remote products are cached with `moka` and listed after the seed
//! catalog. The cache is dropped whenever `products` changes, whether the
//! write came from this process or another. Every drop bumps a generation
//! counter; a listing read across a bump is returned but not kept.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use moka::future::Cache;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use loom_co_core::{Product, ProductId};

use super::SyncError;
use crate::ledger::seed::{is_seed, seed_products};
use crate::remote::{RemoteDatabase, Table};

const PRODUCTS_CACHE_KEY: &str = "products";

/// Seed catalog plus products stored in the remote `products` table.
pub struct RemoteCatalog {
    db: Arc<dyn RemoteDatabase>,
    cache: Cache<String, Arc<Vec<Product>>>,
    generation: Arc<AtomicU64>,
    invalidator: JoinHandle<()>,
}

impl RemoteCatalog {
    /// Create a catalog whose remote listing is cached for `ttl`.
    ///
    /// Must be called from within a Tokio runtime.
    #[must_use]
    pub fn new(db: Arc<dyn RemoteDatabase>, ttl: Duration) -> Self {
        let cache = Cache::builder().max_capacity(16).time_to_live(ttl).build();
        let generation = Arc::new(AtomicU64::new(0));
        let invalidator = tokio::spawn(invalidate_on_change(
            db.changes(),
            cache.clone(),
            generation.clone(),
        ));
        Self {
            db,
            cache,
            generation,
            invalidator,
        }
    }

    /// Active remote products, from the cache when fresh.
    async fn remote_products(&self) -> Result<Arc<Vec<Product>>, SyncError> {
        if let Some(products) = self.cache.get(PRODUCTS_CACHE_KEY).await {
            return Ok(products);
        }
        let generation = self.generation.load(Ordering::Acquire);
        let products = self
            .db
            .list_products()
            .await
            .map_err(|e| SyncError::read_failed("list_products", e))?;
        let products = Arc::new(products);
        self.cache
            .insert(PRODUCTS_CACHE_KEY.to_string(), products.clone())
            .await;
        // Checked after the insert: an invalidation racing it either bumped
        // the generation first or removes the entry itself.
        if self.generation.load(Ordering::Acquire) == generation {
            debug!(count = products.len(), "Cached remote products");
        } else {
            debug!("Products changed while listing, not caching");
            self.cache.invalidate(PRODUCTS_CACHE_KEY).await;
        }
        Ok(products)
    }

    /// Seed products followed by remote products. Remote rows that reuse a
    /// seed id are hidden.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::RemoteReadFailed` if the remote cannot be read.
    pub async fn list(&self) -> Result<Vec<Product>, SyncError> {
        let remote = self.remote_products().await?;
        Ok(seed_products()
            .iter()
            .chain(remote.iter().filter(|p| !is_seed(&p.id)))
            .cloned()
            .collect())
    }

    /// # Errors
    ///
    /// See [`RemoteCatalog::list`].
    pub async fn get(&self, id: &ProductId) -> Result<Option<Product>, SyncError> {
        Ok(self.list().await?.into_iter().find(|p| &p.id == id))
    }

    /// Products in `category`, compared case-insensitively.
    ///
    /// # Errors
    ///
    /// See [`RemoteCatalog::list`].
    pub async fn by_category(&self, category: &str) -> Result<Vec<Product>, SyncError> {
        let mut products = self.list().await?;
        products.retain(|p| p.category.eq_ignore_ascii_case(category));
        Ok(products)
    }

    /// Add or replace a product.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::SeedProduct` for seed ids, or
    /// `SyncError::RemoteWriteFailed` if the remote write fails.
    #[instrument(skip(self, product), fields(product_id = %product.id))]
    pub async fn add(&self, product: Product) -> Result<(), SyncError> {
        if is_seed(&product.id) {
            return Err(SyncError::SeedProduct(product.id));
        }
        self.db
            .upsert_product(&product.normalized())
            .await
            .map_err(|e| SyncError::write_failed("upsert_product", e))?;
        self.invalidate().await;
        Ok(())
    }

    /// Replace an existing product. The id in `product` is ignored.
    ///
    /// Returns whether the product exists.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::SeedProduct` for seed ids,
    /// `SyncError::RemoteReadFailed` if the lookup fails, or
    /// `SyncError::RemoteWriteFailed` if the write fails.
    #[instrument(skip(self, product))]
    pub async fn update(&self, id: &ProductId, mut product: Product) -> Result<bool, SyncError> {
        if is_seed(id) {
            return Err(SyncError::SeedProduct(id.clone()));
        }
        let existing = self
            .db
            .get_product(id)
            .await
            .map_err(|e| SyncError::read_failed("get_product", e))?;
        if existing.is_none() {
            return Ok(false);
        }
        product.id = id.clone();
        self.db
            .upsert_product(&product.normalized())
            .await
            .map_err(|e| SyncError::write_failed("upsert_product", e))?;
        self.invalidate().await;
        Ok(true)
    }

    /// Hide a product from the listing, keeping its row for past carts and
    /// reports. Returns whether the product exists.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::SeedProduct` for seed ids, or
    /// `SyncError::RemoteWriteFailed` if the write fails.
    #[instrument(skip(self))]
    pub async fn remove(&self, id: &ProductId) -> Result<bool, SyncError> {
        if is_seed(id) {
            return Err(SyncError::SeedProduct(id.clone()));
        }
        let found = self
            .db
            .deactivate_product(id)
            .await
            .map_err(|e| SyncError::write_failed("deactivate_product", e))?;
        self.invalidate().await;
        Ok(found)
    }

    /// Delete a product row outright, along with cart and wishlist rows
    /// that reference it. Returns whether anything was deleted.
    ///
    /// # Errors
    ///
    /// See [`RemoteCatalog::remove`].
    #[instrument(skip(self))]
    pub async fn purge(&self, id: &ProductId) -> Result<bool, SyncError> {
        if is_seed(id) {
            return Err(SyncError::SeedProduct(id.clone()));
        }
        let deleted = self
            .db
            .delete_product(id)
            .await
            .map_err(|e| SyncError::write_failed("delete_product", e))?;
        self.invalidate().await;
        Ok(deleted)
    }

    /// Copy the seed catalog into the remote `products` table so carts and
    /// wishlists can reference seed products.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::RemoteWriteFailed` on the first failed write.
    #[instrument(skip(self))]
    pub async fn publish_seed(&self) -> Result<usize, SyncError> {
        for product in seed_products() {
            self.db
                .upsert_product(product)
                .await
                .map_err(|e| SyncError::write_failed("upsert_product", e))?;
        }
        self.invalidate().await;
        info!(count = seed_products().len(), "Seed catalog published");
        Ok(seed_products().len())
    }

    /// Drop the cached listing.
    pub async fn invalidate(&self) {
        drop_listing(&self.cache, &self.generation).await;
    }
}

impl Drop for RemoteCatalog {
    fn drop(&mut self) {
        self.invalidator.abort();
    }
}

async fn drop_listing(cache: &Cache<String, Arc<Vec<Product>>>, generation: &AtomicU64) {
    generation.fetch_add(1, Ordering::AcqRel);
    cache.invalidate(PRODUCTS_CACHE_KEY).await;
}

async fn invalidate_on_change(
    mut changes: broadcast::Receiver<crate::remote::TableChange>,
    cache: Cache<String, Arc<Vec<Product>>>,
    generation: Arc<AtomicU64>,
) {
    loop {
        match changes.recv().await {
            Ok(change) if change.table == Table::Products => {
                drop_listing(&cache, &generation).await;
            }
            Ok(_) => {}
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "Change stream lagged, dropping product cache");
                drop_listing(&cache, &generation).await;
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use loom_co_core::Money;

    use crate::remote::{MemoryDatabase, TableChange};

    fn product(id: &str) -> Product {
        Product {
            id: ProductId::from(id),
            name: format!("Remote {id}"),
            description: String::new(),
            price: Money::from_pence(3000),
            original_price: None,
            discount: None,
            images: vec!["/a.jpg".to_string()],
            rating: 0.0,
            review_count: 0,
            colors: Vec::new(),
            sizes: Vec::new(),
            features: Vec::new(),
            is_new: None,
            category: "outerwear".to_string(),
        }
    }

    fn catalog(db: &Arc<MemoryDatabase>) -> RemoteCatalog {
        RemoteCatalog::new(db.clone(), Duration::from_secs(300))
    }

    #[tokio::test]
    async fn test_remote_products_follow_seed() {
        let db = Arc::new(MemoryDatabase::new());
        let catalog = catalog(&db);
        catalog.add(product("r-1")).await.unwrap();

        let listed = catalog.list().await.unwrap();
        assert_eq!(listed.len(), seed_products().len() + 1);
        assert_eq!(listed.last().unwrap().id.as_str(), "r-1");
    }

    #[tokio::test]
    async fn test_seed_ids_are_not_duplicated() {
        let db = Arc::new(MemoryDatabase::new());
        let catalog = catalog(&db);
        catalog.publish_seed().await.unwrap();

        let listed = catalog.list().await.unwrap();
        assert_eq!(listed.len(), seed_products().len());
    }

    #[tokio::test]
    async fn test_listing_is_cached() {
        let db = Arc::new(MemoryDatabase::new());
        // Written before the catalog subscribes, so its change never reaches the cache.
        db.upsert_product(&product("r-1")).await.unwrap();
        let catalog = catalog(&db);
        catalog.list().await.unwrap();

        db.set_fail_on_read(true).await;
        assert!(catalog.get(&ProductId::from("r-1")).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_remove_hides_and_purge_deletes() {
        let db = Arc::new(MemoryDatabase::new());
        let catalog = catalog(&db);
        catalog.add(product("r-1")).await.unwrap();

        assert!(catalog.remove(&ProductId::from("r-1")).await.unwrap());
        assert!(catalog.get(&ProductId::from("r-1")).await.unwrap().is_none());
        assert!(db.get_product(&ProductId::from("r-1")).await.unwrap().is_some());

        assert!(catalog.purge(&ProductId::from("r-1")).await.unwrap());
        assert!(db.get_product(&ProductId::from("r-1")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_seed_products_are_read_only() {
        let db = Arc::new(MemoryDatabase::new());
        let catalog = catalog(&db);
        assert!(matches!(
            catalog.add(product("1")).await,
            Err(SyncError::SeedProduct(_))
        ));
        assert!(matches!(
            catalog.remove(&ProductId::from("1")).await,
            Err(SyncError::SeedProduct(_))
        ));
    }

    #[tokio::test]
    async fn test_update_missing_is_noop() {
        let db = Arc::new(MemoryDatabase::new());
        let catalog = catalog(&db);
        assert!(!catalog
            .update(&ProductId::from("r-9"), product("r-9"))
            .await
            .unwrap());
        assert!(db.get_product(&ProductId::from("r-9")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_change_during_listing_is_not_cached() {
        let db = Arc::new(MemoryDatabase::new());
        let catalog = catalog(&db);
        db.set_read_latency(Duration::from_millis(50)).await;

        let (first, written) = tokio::join!(catalog.list(), async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            db.upsert_product(&product("late")).await
        });
        written.unwrap();
        let late = ProductId::from("late");
        assert!(!first.unwrap().iter().any(|p| p.id == late));

        let second = catalog.list().await.unwrap();
        assert!(second.iter().any(|p| p.id == late));
    }

    #[tokio::test]
    async fn test_missed_changes_drop_cached_listing() {
        let db = Arc::new(MemoryDatabase::new());
        let catalog = catalog(&db);
        catalog.list().await.unwrap();

        db.set_muted(true);
        db.upsert_product(&product("r-2")).await.unwrap();
        let r2 = ProductId::from("r-2");
        assert!(catalog.get(&r2).await.unwrap().is_none());

        db.set_muted(false);
        db.publish(TableChange::missed_changes());
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(catalog.get(&r2).await.unwrap().is_some());
    }
}
