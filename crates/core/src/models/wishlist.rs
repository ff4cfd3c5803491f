//! Saved-for-later product references.

use serde::{Deserialize, Serialize};

use crate::types::{Money, ProductId};

/// A saved product. Identity is `product_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WishlistEntry {
    pub product_id: ProductId,
    pub name: String,
    pub price: Money,
    pub image: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_price: Option<Money>,
    /// Discount in percent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discount: Option<u8>,
}

/// Deduplicated set of wishlist entries in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Wishlist(Vec<WishlistEntry>);

impl Wishlist {
    /// An empty wishlist.
    #[must_use]
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    /// Build from possibly untrusted entries; later duplicates replace earlier ones.
    #[must_use]
    pub fn from_entries(entries: Vec<WishlistEntry>) -> Self {
        let mut wishlist = Self::new();
        for entry in entries {
            wishlist.upsert(entry);
        }
        wishlist
    }

    /// Entries in insertion order.
    #[must_use]
    pub fn entries(&self) -> &[WishlistEntry] {
        &self.0
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn contains(&self, product_id: &ProductId) -> bool {
        self.0.iter().any(|e| &e.product_id == product_id)
    }

    #[must_use]
    pub fn get(&self, product_id: &ProductId) -> Option<&WishlistEntry> {
        self.0.iter().find(|e| &e.product_id == product_id)
    }

    /// Insert, or replace the metadata of an existing entry in place.
    ///
    /// Returns whether the wishlist changed.
    pub fn upsert(&mut self, entry: WishlistEntry) -> bool {
        match self.0.iter_mut().find(|e| e.product_id == entry.product_id) {
            Some(existing) if *existing == entry => false,
            Some(existing) => {
                *existing = entry;
                true
            }
            None => {
                self.0.push(entry);
                true
            }
        }
    }

    /// Remove by product id. Returns whether anything was removed.
    pub fn remove(&mut self, product_id: &ProductId) -> bool {
        let before = self.0.len();
        self.0.retain(|e| &e.product_id != product_id);
        self.0.len() != before
    }

    /// Remove every entry.
    pub fn clear(&mut self) {
        self.0.clear();
    }
}
