//! Built-in seed catalog.
//!
//! Always present regardless of stored state, never written to storage,
//! and read-only for the lifetime of the process.

use std::collections::HashSet;
use std::sync::LazyLock;

use loom_co_core::{ColorOption, Money, Product, ProductId};

static SEED_PRODUCTS: LazyLock<Vec<Product>> = LazyLock::new(build_seed);

static SEED_IDS: LazyLock<HashSet<ProductId>> =
    LazyLock::new(|| SEED_PRODUCTS.iter().map(|p| p.id.clone()).collect());

/// The seed catalog, in display order.
#[must_use]
pub fn seed_products() -> &'static [Product] {
    &SEED_PRODUCTS
}

/// Ids of every seed product.
#[must_use]
pub fn seed_ids() -> &'static HashSet<ProductId> {
    &SEED_IDS
}

/// Whether `id` belongs to the seed catalog.
#[must_use]
pub fn is_seed(id: &ProductId) -> bool {
    SEED_IDS.contains(id)
}

fn colors(pairs: &[(&str, &str)]) -> Vec<ColorOption> {
    pairs
        .iter()
        .map(|(name, value)| ColorOption {
            name: (*name).to_string(),
            value: (*value).to_string(),
        })
        .collect()
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_string()).collect()
}

const APPAREL_SIZES: &[&str] = &["XS", "S", "M", "L", "XL"];

fn build_seed() -> Vec<Product> {
    vec![
        Product {
            id: ProductId::from("1"),
            name: "Essential Linen Tee".to_string(),
            description: "Breathable linen-cotton tee with a relaxed fit.".to_string(),
            price: Money::from_pence(2900),
            original_price: None,
            discount: None,
            images: strings(&["/images/products/linen-tee-1.jpg", "/images/products/linen-tee-2.jpg"]),
            rating: 4.6,
            review_count: 128,
            colors: colors(&[("Black", "#111111"), ("White", "#f5f5f0"), ("Sage", "#9caf88")]),
            sizes: strings(APPAREL_SIZES),
            features: strings(&["55% linen, 45% cotton", "Pre-washed", "Machine washable"]),
            is_new: None,
            category: "tops".to_string(),
        },
        Product {
            id: ProductId::from("2"),
            name: "Merino Crew Jumper".to_string(),
            description: "Fine-gauge merino wool jumper for layering.".to_string(),
            price: Money::from_pence(5500),
            original_price: Some(Money::from_pence(6900)),
            discount: Some(20),
            images: strings(&["/images/products/merino-crew-1.jpg", "/images/products/merino-crew-2.jpg"]),
            rating: 4.8,
            review_count: 86,
            colors: colors(&[("Navy", "#1f2a44"), ("Oatmeal", "#d8cbb3")]),
            sizes: strings(APPAREL_SIZES),
            features: strings(&["100% extra-fine merino", "Ribbed trims"]),
            is_new: None,
            category: "knitwear".to_string(),
        },
        Product {
            id: ProductId::from("3"),
            name: "Wide-Leg Wool Trousers".to_string(),
            description: "Tailored wide-leg trousers with a pressed crease.".to_string(),
            price: Money::from_pence(7900),
            original_price: None,
            discount: None,
            images: strings(&["/images/products/wool-trousers-1.jpg"]),
            rating: 4.4,
            review_count: 41,
            colors: colors(&[("Charcoal", "#36454f"), ("Camel", "#c19a6b")]),
            sizes: strings(&["6", "8", "10", "12", "14", "16"]),
            features: strings(&["Recycled wool blend", "Side pockets", "Fully lined"]),
            is_new: Some(true),
            category: "bottoms".to_string(),
        },
        Product {
            id: ProductId::from("4"),
            name: "Organic Cotton Shirt".to_string(),
            description: "Crisp poplin shirt cut from organic cotton.".to_string(),
            price: Money::from_pence(4500),
            original_price: None,
            discount: None,
            images: strings(&["/images/products/cotton-shirt-1.jpg", "/images/products/cotton-shirt-2.jpg"]),
            rating: 4.5,
            review_count: 63,
            colors: colors(&[("White", "#ffffff"), ("Pale Blue", "#c6dcef")]),
            sizes: strings(APPAREL_SIZES),
            features: strings(&["GOTS certified cotton", "Mother-of-pearl buttons"]),
            is_new: None,
            category: "tops".to_string(),
        },
        Product {
            id: ProductId::from("5"),
            name: "Quilted Field Jacket".to_string(),
            description: "Lightweight quilted jacket with a corduroy collar.".to_string(),
            price: Money::from_pence(12_000),
            original_price: Some(Money::from_pence(15_000)),
            discount: Some(20),
            images: strings(&["/images/products/field-jacket-1.jpg", "/images/products/field-jacket-2.jpg", "/images/products/field-jacket-3.jpg"]),
            rating: 4.7,
            review_count: 52,
            colors: colors(&[("Olive", "#556b2f"), ("Black", "#111111")]),
            sizes: strings(APPAREL_SIZES),
            features: strings(&["Water-resistant shell", "Recycled fill", "Two patch pockets"]),
            is_new: Some(true),
            category: "outerwear".to_string(),
        },
        Product {
            id: ProductId::from("6"),
            name: "Cashmere Beanie".to_string(),
            description: "Soft rib-knit beanie in pure cashmere.".to_string(),
            price: Money::from_pence(3500),
            original_price: None,
            discount: None,
            images: strings(&["/images/products/cashmere-beanie-1.jpg"]),
            rating: 4.9,
            review_count: 210,
            colors: colors(&[("Grey", "#9e9e9e"), ("Rust", "#b7410e")]),
            sizes: strings(&["One Size"]),
            features: strings(&["100% cashmere", "Hand wash"]),
            is_new: None,
            category: "accessories".to_string(),
        },
    ]
}
