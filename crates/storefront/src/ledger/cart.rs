//! Local cart ledger.

use thiserror::Error;
use tracing::{instrument, warn};

use loom_co_core::{CartLines, LineItem, LineKey, Money, NewLineItem, ProductId};

use crate::store::{RecordStore, StorageError, keys};

/// Errors from cart mutations.
#[derive(Debug, Error)]
pub enum CartError {
    /// The medium was full; the cart was emptied rather than shown unsaved.
    #[error("cart could not be saved: {0}")]
    NotSaved(#[source] StorageError),

    /// Any other storage failure; the in-memory cart is kept.
    #[error("cart storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Cart of `(product, size, colour)` lines persisted under [`keys::CART`].
#[derive(Debug)]
pub struct CartLedger {
    lines: CartLines,
    store: RecordStore,
}

impl CartLedger {
    /// Rehydrate the cart from the store.
    ///
    /// Missing or corrupt data yields an empty cart. Stored duplicates are
    /// merged and zero-quantity lines dropped.
    #[must_use]
    pub fn open(store: RecordStore) -> Self {
        let stored: Vec<LineItem> = store.load(keys::CART).unwrap_or_default();
        Self {
            lines: CartLines::from_lines(stored),
            store,
        }
    }

    /// Lines in the order they were first added.
    #[must_use]
    pub fn items(&self) -> &[LineItem] {
        self.lines.lines()
    }

    /// The underlying line collection.
    #[must_use]
    pub const fn lines(&self) -> &CartLines {
        &self.lines
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Add one unit of `item`, merging with an existing line for the same
    /// product, size and colour.
    ///
    /// # Errors
    ///
    /// Returns `CartError::NotSaved` (cart now empty) if the store is full,
    /// or `CartError::Storage` for other write failures.
    #[instrument(skip(self, item), fields(product_id = %item.product_id, size = %item.size, color = %item.color))]
    pub fn add_item(&mut self, item: NewLineItem) -> Result<(), CartError> {
        self.lines.add(item);
        self.persist()
    }

    /// Remove the matching line. Missing lines are a no-op.
    ///
    /// # Errors
    ///
    /// See [`CartLedger::add_item`].
    #[instrument(skip(self))]
    pub fn remove_item(
        &mut self,
        product_id: &ProductId,
        size: &str,
        color: &str,
    ) -> Result<(), CartError> {
        if self.lines.remove(LineKey::new(product_id, size, color)) {
            self.persist()
        } else {
            Ok(())
        }
    }

    /// Overwrite a line's quantity; `quantity <= 0` removes it.
    ///
    /// # Errors
    ///
    /// See [`CartLedger::add_item`].
    #[instrument(skip(self))]
    pub fn set_quantity(
        &mut self,
        product_id: &ProductId,
        size: &str,
        color: &str,
        quantity: i64,
    ) -> Result<(), CartError> {
        if self
            .lines
            .set_quantity(LineKey::new(product_id, size, color), quantity)
        {
            self.persist()
        } else {
            Ok(())
        }
    }

    /// Empty the cart.
    ///
    /// # Errors
    ///
    /// See [`CartLedger::add_item`].
    #[instrument(skip(self))]
    pub fn clear(&mut self) -> Result<(), CartError> {
        self.lines.clear();
        self.persist()
    }

    /// Sum of quantities.
    #[must_use]
    pub fn total_items(&self) -> u32 {
        self.lines.total_items()
    }

    /// Sum of `price * quantity`.
    #[must_use]
    pub fn total_price(&self) -> Money {
        self.lines.total_price()
    }

    /// Write the whole cart. On a full medium, empty the cart (memory and
    /// store) so the user never sees a cart that is not saved.
    fn persist(&mut self) -> Result<(), CartError> {
        match self.store.save(keys::CART, &self.lines) {
            Ok(()) => Ok(()),
            Err(err) if err.is_quota() => {
                warn!(error = %err, lines = self.lines.lines().len(), "Cart storage full, clearing cart");
                self.lines.clear();
                if let Err(remove_err) = self.store.remove(keys::CART) {
                    warn!(error = %remove_err, "Failed to clear stored cart");
                }
                Err(CartError::NotSaved(err))
            }
            Err(err) => Err(CartError::Storage(err)),
        }
    }
}
