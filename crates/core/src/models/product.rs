//! Catalog products.

use serde::{Deserialize, Serialize};

use crate::models::wishlist::WishlistEntry;
use crate::models::cart::NewLineItem;
use crate::types::{Money, ProductId};

/// Image used when a product has none, and when images are stripped to
/// fit a storage budget.
pub const PLACEHOLDER_IMAGE: &str = "/placeholder.svg";

/// A colour swatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorOption {
    /// Display name (e.g. "Black").
    pub name: String,
    /// CSS colour value (e.g. "#000000").
    pub value: String,
}

/// A product in the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price: Money,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_price: Option<Money>,
    /// Discount in percent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discount: Option<u8>,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub rating: f64,
    #[serde(default)]
    pub review_count: u32,
    #[serde(default)]
    pub colors: Vec<ColorOption>,
    #[serde(default)]
    pub sizes: Vec<String>,
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_new: Option<bool>,
    pub category: String,
}

impl Product {
    /// Ensure `images` is non-empty, dropping blank URLs and falling back to
    /// [`PLACEHOLDER_IMAGE`].
    #[must_use]
    pub fn normalized(mut self) -> Self {
        self.images.retain(|url| !url.trim().is_empty());
        if self.images.is_empty() {
            self.images.push(PLACEHOLDER_IMAGE.to_string());
        }
        self
    }

    /// Copy keeping only the first (representative) image.
    #[must_use]
    pub fn compacted(&self) -> Self {
        let mut product = self.clone().normalized();
        product.images.truncate(1);
        product
    }

    /// Copy with every image replaced by the placeholder.
    #[must_use]
    pub fn stripped(&self) -> Self {
        let mut product = self.clone();
        product.images = vec![PLACEHOLDER_IMAGE.to_string()];
        product
    }

    /// The image shown in listings, carts and wishlists.
    #[must_use]
    pub fn primary_image(&self) -> &str {
        self.images.first().map_or(PLACEHOLDER_IMAGE, String::as_str)
    }

    /// Cart line for this product in the given size and colour.
    #[must_use]
    pub fn line_item(&self, size: &str, color: &str) -> NewLineItem {
        NewLineItem {
            product_id: self.id.clone(),
            name: self.name.clone(),
            price: self.price,
            image: self.primary_image().to_string(),
            size: size.to_string(),
            color: color.to_string(),
        }
    }

    /// Wishlist entry for this product.
    #[must_use]
    pub fn wishlist_entry(&self) -> WishlistEntry {
        WishlistEntry {
            product_id: self.id.clone(),
            name: self.name.clone(),
            price: self.price,
            image: self.primary_image().to_string(),
            original_price: self.original_price,
            discount: self.discount,
        }
    }
}
