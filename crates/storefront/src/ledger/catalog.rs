//! Local product catalog.
//!
//! The listing is the seed catalog followed by admin-added products. Only
//! admin-added products are stored, and what is stored is trimmed to fit
//! the medium:
//!
//! 1. every product compacted to its first image ([`PersistTier::Full`])
//! 2. over [`STORAGE_BUDGET_BYTES`]: the [`TRIMMED_KEEP`] most recent
//!    ([`PersistTier::Trimmed`])
//! 3. on a full medium: images replaced by the placeholder, the
//!    [`MINIMAL_KEEP`] most recent ([`PersistTier::Minimal`])
//! 4. still full: the key is deleted and the next load is seed-only
//!    ([`PersistTier::Cleared`])
//!
//! The in-memory catalog is never trimmed; only what reaches storage is.

use thiserror::Error;
use tracing::{instrument, warn};

use loom_co_core::{Product, ProductId};

use super::seed::{is_seed, seed_products};
use crate::store::{RecordStore, StorageError, encoded_len, keys};

/// Serialized size above which only the most recent products are stored.
pub const STORAGE_BUDGET_BYTES: usize = 4 * 1024 * 1024;

/// Products kept when the budget is exceeded.
pub const TRIMMED_KEEP: usize = 5;

/// Products kept when the medium is full.
pub const MINIMAL_KEEP: usize = 3;

/// Errors from catalog mutations.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("product {0} already exists")]
    DuplicateId(ProductId),

    #[error("product {0} is part of the built-in catalog and cannot be changed")]
    SeedProduct(ProductId),

    #[error("catalog storage error: {0}")]
    Storage(#[from] StorageError),
}

/// How much of the catalog the last write managed to store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistTier {
    /// All admin-added products, one image each.
    Full,
    /// Only the most recent products, one image each.
    Trimmed,
    /// Only the most recent products, placeholder images.
    Minimal,
    /// Nothing stored; the catalog reverts to the seed on next load.
    Cleared,
}

/// Seed catalog plus admin-added products persisted under [`keys::PRODUCTS`].
#[derive(Debug)]
pub struct ProductCatalog {
    products: Vec<Product>,
    store: RecordStore,
}

impl ProductCatalog {
    /// Rehydrate admin-added products from the store.
    ///
    /// Stored entries that collide with a seed id, or with an earlier
    /// stored entry, are dropped.
    #[must_use]
    pub fn open(store: RecordStore) -> Self {
        let stored: Vec<Product> = store.load(keys::PRODUCTS).unwrap_or_default();
        let mut products: Vec<Product> = Vec::with_capacity(stored.len());
        for product in stored {
            if is_seed(&product.id) || products.iter().any(|p| p.id == product.id) {
                continue;
            }
            products.push(product.normalized());
        }
        Self { products, store }
    }

    /// Seed products followed by admin-added products in insertion order.
    pub fn list(&self) -> impl Iterator<Item = &Product> {
        seed_products().iter().chain(self.products.iter())
    }

    /// Admin-added products only.
    #[must_use]
    pub fn custom_products(&self) -> &[Product] {
        &self.products
    }

    #[must_use]
    pub fn len(&self) -> usize {
        seed_products().len() + self.products.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn get(&self, id: &ProductId) -> Option<&Product> {
        self.list().find(|p| &p.id == id)
    }

    /// Products in `category`, compared case-insensitively.
    pub fn by_category<'a>(&'a self, category: &'a str) -> impl Iterator<Item = &'a Product> {
        self.list()
            .filter(move |p| p.category.eq_ignore_ascii_case(category))
    }

    /// Add a product.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::DuplicateId` if the id is already listed, or
    /// `CatalogError::Storage` for storage failures other than a full medium.
    #[instrument(skip(self, product), fields(product_id = %product.id))]
    pub fn add(&mut self, product: Product) -> Result<PersistTier, CatalogError> {
        if self.get(&product.id).is_some() {
            return Err(CatalogError::DuplicateId(product.id));
        }
        self.products.push(product.normalized());
        self.persist()
    }

    /// Replace an admin-added product, keeping its position. The id in
    /// `product` is ignored.
    ///
    /// Returns `None` when no such product exists.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::SeedProduct` for seed ids, or
    /// `CatalogError::Storage` for storage failures other than a full medium.
    #[instrument(skip(self, product))]
    pub fn update(
        &mut self,
        id: &ProductId,
        mut product: Product,
    ) -> Result<Option<PersistTier>, CatalogError> {
        if is_seed(id) {
            return Err(CatalogError::SeedProduct(id.clone()));
        }
        let Some(existing) = self.products.iter_mut().find(|p| &p.id == id) else {
            return Ok(None);
        };
        product.id = id.clone();
        *existing = product.normalized();
        self.persist().map(Some)
    }

    /// Delete an admin-added product.
    ///
    /// Returns `None` when no such product exists.
    ///
    /// # Errors
    ///
    /// See [`ProductCatalog::update`].
    #[instrument(skip(self))]
    pub fn remove(&mut self, id: &ProductId) -> Result<Option<PersistTier>, CatalogError> {
        if is_seed(id) {
            return Err(CatalogError::SeedProduct(id.clone()));
        }
        let before = self.products.len();
        self.products.retain(|p| &p.id != id);
        if self.products.len() == before {
            return Ok(None);
        }
        self.persist().map(Some)
    }

    fn persist(&self) -> Result<PersistTier, CatalogError> {
        let compacted: Vec<Product> = self.products.iter().map(Product::compacted).collect();
        let size = encoded_len(keys::PRODUCTS, &compacted)?;
        let (tier, payload) = if size > STORAGE_BUDGET_BYTES {
            warn!(size, budget = STORAGE_BUDGET_BYTES, keep = TRIMMED_KEEP, "Catalog over budget, storing most recent products only");
            (PersistTier::Trimmed, most_recent(&compacted, TRIMMED_KEEP).to_vec())
        } else {
            (PersistTier::Full, compacted)
        };

        match self.store.save(keys::PRODUCTS, &payload) {
            Ok(()) => return Ok(tier),
            Err(err) if err.is_quota() => {
                warn!(error = %err, keep = MINIMAL_KEEP, "Catalog storage full, stripping images");
            }
            Err(err) => return Err(err.into()),
        }

        let minimal: Vec<Product> = most_recent(&self.products, MINIMAL_KEEP)
            .iter()
            .map(Product::stripped)
            .collect();
        match self.store.save(keys::PRODUCTS, &minimal) {
            Ok(()) => Ok(PersistTier::Minimal),
            Err(err) if err.is_quota() => {
                warn!(error = %err, "Catalog storage still full, clearing stored products");
                self.store.remove(keys::PRODUCTS)?;
                Ok(PersistTier::Cleared)
            }
            Err(err) => Err(err.into()),
        }
    }
}

fn most_recent(products: &[Product], keep: usize) -> &[Product] {
    products
        .get(products.len().saturating_sub(keep)..)
        .unwrap_or_default()
}
