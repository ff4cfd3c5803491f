//! Local wishlist.

use thiserror::Error;
use tracing::{info, instrument, warn};

use loom_co_core::{ProductId, Wishlist, WishlistEntry};

use crate::store::{RecordStore, StorageError, keys};

/// Errors from wishlist mutations. A full medium is not one of them.
#[derive(Debug, Error)]
pub enum WishlistError {
    #[error("wishlist storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Saved products persisted under [`keys::WISHLIST`].
///
/// The set starts unhydrated. Until [`WishlistSet::hydrate`] has run,
/// nothing is written, so an early save cannot clobber a stored wishlist
/// that has not been read yet. An empty set is never written at all.
#[derive(Debug)]
pub struct WishlistSet {
    entries: Wishlist,
    store: RecordStore,
    hydrated: bool,
    session_only: bool,
}

impl WishlistSet {
    /// Empty, unhydrated wishlist over `store`.
    #[must_use]
    pub const fn new(store: RecordStore) -> Self {
        Self {
            entries: Wishlist::new(),
            store,
            hydrated: false,
            session_only: false,
        }
    }

    /// Create and hydrate in one step.
    #[must_use]
    pub fn open(store: RecordStore) -> Self {
        let mut wishlist = Self::new(store);
        if let Err(err) = wishlist.hydrate() {
            warn!(error = %err, "Failed to hydrate wishlist");
        }
        wishlist
    }

    /// Load stored entries, keeping anything added before hydration, and
    /// write the merged set if hydration changed it.
    ///
    /// # Errors
    ///
    /// See [`WishlistSet::add`].
    pub fn hydrate(&mut self) -> Result<(), WishlistError> {
        let stored: Vec<WishlistEntry> = self.store.load(keys::WISHLIST).unwrap_or_default();
        let mut merged = Wishlist::from_entries(stored);
        let mut changed = false;
        for entry in self.entries.entries() {
            changed |= merged.upsert(entry.clone());
        }
        self.entries = merged;
        self.hydrated = true;
        if changed {
            self.persist()
        } else {
            Ok(())
        }
    }

    #[must_use]
    pub fn entries(&self) -> &[WishlistEntry] {
        self.entries.entries()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn contains(&self, product_id: &ProductId) -> bool {
        self.entries.contains(product_id)
    }

    /// Whether the last write hit the quota and the wishlist lives only in
    /// memory for now.
    #[must_use]
    pub const fn is_session_only(&self) -> bool {
        self.session_only
    }

    /// Save a product, replacing the metadata of an existing entry.
    ///
    /// # Errors
    ///
    /// Returns `WishlistError::Storage` for storage failures other than a
    /// full medium; a full medium switches to session-only mode instead.
    #[instrument(skip(self, entry), fields(product_id = %entry.product_id))]
    pub fn add(&mut self, entry: WishlistEntry) -> Result<(), WishlistError> {
        if self.entries.upsert(entry) {
            self.persist()
        } else {
            Ok(())
        }
    }

    /// Remove a product. Missing products are a no-op.
    ///
    /// # Errors
    ///
    /// See [`WishlistSet::add`].
    #[instrument(skip(self))]
    pub fn remove(&mut self, product_id: &ProductId) -> Result<(), WishlistError> {
        if self.entries.remove(product_id) {
            self.persist()
        } else {
            Ok(())
        }
    }

    fn persist(&mut self) -> Result<(), WishlistError> {
        if !self.hydrated {
            return Ok(());
        }
        let result = if self.entries.is_empty() {
            // Emptied after hydration: drop the key rather than store `[]`.
            self.store.remove(keys::WISHLIST)
        } else {
            self.store.save(keys::WISHLIST, &self.entries)
        };

        match result {
            Ok(()) => {
                if self.session_only {
                    info!("Wishlist storage available again");
                    self.session_only = false;
                }
                Ok(())
            }
            Err(err) if err.is_quota() => {
                warn!(error = %err, entries = self.entries.len(), "Wishlist storage full, keeping wishlist for this session only");
                self.session_only = true;
                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use loom_co_core::Money;

    use crate::store::MemoryBackend;

    fn entry(id: &str) -> WishlistEntry {
        WishlistEntry {
            product_id: ProductId::from(id),
            name: format!("Product {id}"),
            price: Money::from_pence(4500),
            image: String::new(),
            original_price: Some(Money::from_pence(6000)),
            discount: Some(25),
        }
    }

    #[test]
    fn test_add_contains_remove() {
        let mut wishlist = WishlistSet::open(RecordStore::in_memory());
        wishlist.add(entry("1")).unwrap();
        assert!(wishlist.contains(&ProductId::from("1")));
        wishlist.remove(&ProductId::from("1")).unwrap();
        assert!(!wishlist.contains(&ProductId::from("1")));
    }

    #[test]
    fn test_add_existing_replaces() {
        let mut wishlist = WishlistSet::open(RecordStore::in_memory());
        wishlist.add(entry("1")).unwrap();
        let mut updated = entry("1");
        updated.price = Money::from_pence(3000);
        wishlist.add(updated).unwrap();
        assert_eq!(wishlist.len(), 1);
        assert_eq!(
            wishlist.entries().first().map(|e| e.price),
            Some(Money::from_pence(3000))
        );
    }

    #[test]
    fn test_quota_keeps_entry_in_memory() {
        let mut wishlist = WishlistSet::open(RecordStore::new(MemoryBackend::with_quota(0)));
        wishlist.add(entry("1")).unwrap();
        assert!(wishlist.contains(&ProductId::from("1")));
        assert!(wishlist.is_session_only());
    }

    #[test]
    fn test_unhydrated_empty_set_never_writes() {
        let store = RecordStore::in_memory();
        WishlistSet::open(store.clone()).add(entry("1")).unwrap();

        // A fresh, not-yet-hydrated set that adds then removes must not
        // overwrite the stored wishlist with an empty one.
        let mut early = WishlistSet::new(store.clone());
        early.add(entry("2")).unwrap();
        early.remove(&ProductId::from("2")).unwrap();

        let reloaded = WishlistSet::open(store);
        assert!(reloaded.contains(&ProductId::from("1")));
    }

    #[test]
    fn test_hydrate_keeps_pre_hydration_entries() {
        let store = RecordStore::in_memory();
        WishlistSet::open(store.clone()).add(entry("1")).unwrap();

        let mut early = WishlistSet::new(store.clone());
        early.add(entry("2")).unwrap();
        early.hydrate().unwrap();
        assert_eq!(early.len(), 2);
        assert_eq!(WishlistSet::open(store).len(), 2);
    }

    #[test]
    fn test_emptying_after_hydration_clears_store() {
        let store = RecordStore::in_memory();
        let mut wishlist = WishlistSet::open(store.clone());
        wishlist.add(entry("1")).unwrap();
        wishlist.remove(&ProductId::from("1")).unwrap();
        assert!(WishlistSet::open(store).is_empty());
    }
}
