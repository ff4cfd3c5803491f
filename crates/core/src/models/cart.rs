//! Cart line items.
//!
//! A line is identified by `(product_id, size, color)`. The same product in
//! a different size or colour is a different line.

use serde::{Deserialize, Serialize};

use crate::types::{Money, ProductId};

/// A line in the cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    /// Product this line refers to.
    pub product_id: ProductId,
    /// Product name at the time it was added.
    pub name: String,
    /// Unit price at the time it was added.
    pub price: Money,
    /// Representative image URL.
    pub image: String,
    /// Selected size.
    pub size: String,
    /// Selected colour name.
    pub color: String,
    /// Always at least 1.
    pub quantity: u32,
}

impl LineItem {
    /// Identity key of this line.
    #[must_use]
    pub fn key(&self) -> LineKey<'_> {
        LineKey {
            product_id: &self.product_id,
            size: &self.size,
            color: &self.color,
        }
    }

    /// `price * quantity`.
    #[must_use]
    pub fn line_total(&self) -> Money {
        self.price * self.quantity
    }
}

/// Everything needed to add a line, without the quantity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewLineItem {
    pub product_id: ProductId,
    pub name: String,
    pub price: Money,
    pub image: String,
    pub size: String,
    pub color: String,
}

impl NewLineItem {
    /// Identity key of the line this would create.
    #[must_use]
    pub fn key(&self) -> LineKey<'_> {
        LineKey {
            product_id: &self.product_id,
            size: &self.size,
            color: &self.color,
        }
    }

    /// Turn into a line with the given quantity.
    #[must_use]
    pub fn with_quantity(self, quantity: u32) -> LineItem {
        LineItem {
            product_id: self.product_id,
            name: self.name,
            price: self.price,
            image: self.image,
            size: self.size,
            color: self.color,
            quantity,
        }
    }
}

/// Borrowed identity key of a cart line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LineKey<'a> {
    pub product_id: &'a ProductId,
    pub size: &'a str,
    pub color: &'a str,
}

impl<'a> LineKey<'a> {
    /// Build a key from its parts.
    #[must_use]
    pub const fn new(product_id: &'a ProductId, size: &'a str, color: &'a str) -> Self {
        Self {
            product_id,
            size,
            color,
        }
    }
}

/// Ordered collection of cart lines with at most one line per identity key
/// and no line with a zero quantity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CartLines(Vec<LineItem>);

impl CartLines {
    /// An empty cart.
    #[must_use]
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    /// Build from possibly untrusted lines (e.g. rehydrated storage).
    ///
    /// Lines with a zero quantity are dropped and lines sharing an identity
    /// key are merged by summing their quantities.
    #[must_use]
    pub fn from_lines(lines: Vec<LineItem>) -> Self {
        let mut cart = Self::new();
        for line in lines {
            if line.quantity == 0 {
                continue;
            }
            match cart.position(line.key()) {
                Some(idx) => {
                    if let Some(existing) = cart.0.get_mut(idx) {
                        existing.quantity = existing.quantity.saturating_add(line.quantity);
                    }
                }
                None => cart.0.push(line),
            }
        }
        cart
    }

    /// The lines in insertion order.
    #[must_use]
    pub fn lines(&self) -> &[LineItem] {
        &self.0
    }

    /// Consume and return the lines.
    #[must_use]
    pub fn into_lines(self) -> Vec<LineItem> {
        self.0
    }

    /// Whether the cart has no lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Find a line by identity key.
    #[must_use]
    pub fn get(&self, key: LineKey<'_>) -> Option<&LineItem> {
        self.0.iter().find(|line| line.key() == key)
    }

    fn position(&self, key: LineKey<'_>) -> Option<usize> {
        self.0.iter().position(|line| line.key() == key)
    }

    /// Quantity the line for `item` would have after one more `add`.
    #[must_use]
    pub fn quantity_after_add(&self, item: &NewLineItem) -> u32 {
        self.get(item.key())
            .map_or(1, |line| line.quantity.saturating_add(1))
    }

    /// Add one unit: bump the matching line or insert a new line at 1.
    pub fn add(&mut self, item: NewLineItem) {
        match self.position(item.key()) {
            Some(idx) => {
                if let Some(line) = self.0.get_mut(idx) {
                    line.quantity = line.quantity.saturating_add(1);
                }
            }
            None => self.0.push(item.with_quantity(1)),
        }
    }

    /// Add `quantity` units of a line, merging with an existing line.
    pub fn add_quantity(&mut self, line: LineItem) {
        if line.quantity == 0 {
            return;
        }
        match self.position(line.key()) {
            Some(idx) => {
                if let Some(existing) = self.0.get_mut(idx) {
                    existing.quantity = existing.quantity.saturating_add(line.quantity);
                }
            }
            None => self.0.push(line),
        }
    }

    /// Remove the matching line. Returns whether anything was removed.
    pub fn remove(&mut self, key: LineKey<'_>) -> bool {
        let before = self.0.len();
        self.0.retain(|line| line.key() != key);
        self.0.len() != before
    }

    /// Overwrite a line's quantity; `quantity <= 0` removes the line.
    ///
    /// Returns whether the cart changed. Unknown keys are left alone.
    pub fn set_quantity(&mut self, key: LineKey<'_>, quantity: i64) -> bool {
        let Ok(quantity) = u32::try_from(quantity) else {
            return self.remove(key);
        };
        if quantity == 0 {
            return self.remove(key);
        }
        match self.0.iter_mut().find(|line| line.key() == key) {
            Some(line) if line.quantity != quantity => {
                line.quantity = quantity;
                true
            }
            _ => false,
        }
    }

    /// Remove every line. Returns whether anything was removed.
    pub fn clear(&mut self) -> bool {
        let changed = !self.0.is_empty();
        self.0.clear();
        changed
    }

    /// Sum of quantities.
    #[must_use]
    pub fn total_items(&self) -> u32 {
        self.0
            .iter()
            .fold(0_u32, |acc, line| acc.saturating_add(line.quantity))
    }

    /// Sum of `price * quantity`.
    #[must_use]
    pub fn total_price(&self) -> Money {
        self.0.iter().map(LineItem::line_total).sum()
    }
}
