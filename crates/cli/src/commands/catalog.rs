//! Catalog commands.

use clap::Args;
use loom_co_core::{ColorOption, Money, Product, ProductId};
use loom_co_storefront::error::AppError;
use loom_co_storefront::ledger::PersistTier;
use loom_co_storefront::state::Storefront;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use tracing::warn;

use super::find_product;

/// Fields of a new product.
#[derive(Debug, Args)]
pub struct NewProduct {
    /// Product id (generated when omitted)
    #[arg(long)]
    pub id: Option<String>,

    /// Display name
    #[arg(long)]
    pub name: String,

    /// Price in pounds (e.g. 29.00)
    #[arg(long)]
    pub price: Decimal,

    /// Category slug (e.g. tops)
    #[arg(long)]
    pub category: String,

    #[command(flatten)]
    pub details: ProductDetails,
}

/// Optional product fields shared by `add` and `update`.
#[derive(Debug, Args)]
pub struct ProductDetails {
    #[arg(long)]
    pub description: Option<String>,

    /// Price before discount; the discount percentage is derived from it
    #[arg(long)]
    pub original_price: Option<Decimal>,

    /// Image URL (repeatable)
    #[arg(long = "image")]
    pub images: Vec<String>,

    /// Size option (repeatable)
    #[arg(long = "size")]
    pub sizes: Vec<String>,

    /// Colour option as `Name` or `Name=#rrggbb` (repeatable)
    #[arg(long = "color")]
    pub colors: Vec<String>,

    /// Feature bullet (repeatable)
    #[arg(long = "feature")]
    pub features: Vec<String>,

    /// Mark as a new arrival
    #[arg(long)]
    pub new: bool,
}

/// Changes to an existing product.
#[derive(Debug, Args)]
pub struct ProductChanges {
    #[arg(long)]
    pub name: Option<String>,

    #[arg(long)]
    pub price: Option<Decimal>,

    #[arg(long)]
    pub category: Option<String>,

    #[command(flatten)]
    pub details: ProductDetails,
}

/// Print listed products, optionally only one category.
#[allow(clippy::print_stdout)]
pub fn list(storefront: &Storefront, category: Option<&str>) {
    let products: Vec<&Product> = match category {
        Some(category) => storefront.catalog.by_category(category).collect(),
        None => storefront.catalog.list().collect(),
    };
    if products.is_empty() {
        println!("No products found.");
    }
    for product in products {
        println!(
            "[{}] {}  {}  ({})",
            product.id, product.name, product.price, product.category
        );
    }
}

/// Print one product in full.
///
/// # Errors
///
/// Returns `AppError::NotFound` for an unlisted product.
#[allow(clippy::print_stdout)]
pub fn show(storefront: &Storefront, product_id: &str) -> Result<(), AppError> {
    let product = find_product(&storefront.catalog, product_id)?;
    println!("{} [{}]", product.name, product.id);
    match (product.original_price, product.discount) {
        (Some(original), Some(discount)) => {
            println!("Price: {} (was {original}, {discount}% off)", product.price);
        }
        (Some(original), None) => println!("Price: {} (was {original})", product.price),
        _ => println!("Price: {}", product.price),
    }
    println!("Category: {}", product.category);
    println!("Rating: {:.1} ({} reviews)", product.rating, product.review_count);
    if !product.sizes.is_empty() {
        println!("Sizes: {}", product.sizes.join(", "));
    }
    if !product.colors.is_empty() {
        let names: Vec<&str> = product.colors.iter().map(|c| c.name.as_str()).collect();
        println!("Colours: {}", names.join(", "));
    }
    if !product.description.is_empty() {
        println!("\n{}", product.description);
    }
    for feature in &product.features {
        println!("  - {feature}");
    }
    Ok(())
}

/// Add an admin product.
///
/// # Errors
///
/// Returns `AppError::BadRequest` for invalid prices or colours, or the
/// catalog's error.
#[allow(clippy::print_stdout)]
pub fn add(storefront: &mut Storefront, new: NewProduct) -> Result<(), AppError> {
    let id = new.id.map_or_else(ProductId::generate, ProductId::from);
    let price = parse_price(new.price)?;
    let mut product = Product {
        id,
        name: new.name,
        description: String::new(),
        price,
        original_price: None,
        discount: None,
        images: Vec::new(),
        rating: 0.0,
        review_count: 0,
        colors: Vec::new(),
        sizes: Vec::new(),
        features: Vec::new(),
        is_new: None,
        category: new.category,
    };
    apply_details(&mut product, new.details)?;

    let id = product.id.clone();
    let tier = storefront.catalog.add(product)?;
    report_tier(tier);
    println!("Added product {id}");
    Ok(())
}

/// Change fields of an admin product.
///
/// # Errors
///
/// Returns `AppError::NotFound` when no such product exists, or the
/// catalog's error (seed products are read-only).
#[allow(clippy::print_stdout)]
pub fn update(
    storefront: &mut Storefront,
    product_id: &str,
    changes: ProductChanges,
) -> Result<(), AppError> {
    let mut product = find_product(&storefront.catalog, product_id)?.clone();
    if let Some(name) = changes.name {
        product.name = name;
    }
    if let Some(price) = changes.price {
        product.price = parse_price(price)?;
    }
    if let Some(category) = changes.category {
        product.category = category;
    }
    apply_details(&mut product, changes.details)?;

    let id = ProductId::from(product_id);
    let tier = storefront
        .catalog
        .update(&id, product)?
        .ok_or_else(|| AppError::NotFound(format!("product {product_id}")))?;
    report_tier(tier);
    println!("Updated product {id}");
    Ok(())
}

/// Delete an admin product.
///
/// # Errors
///
/// Returns `AppError::NotFound` when no such product exists, or the
/// catalog's error (seed products are read-only).
#[allow(clippy::print_stdout)]
pub fn remove(storefront: &mut Storefront, product_id: &str) -> Result<(), AppError> {
    let id = ProductId::from(product_id);
    let tier = storefront
        .catalog
        .remove(&id)?
        .ok_or_else(|| AppError::NotFound(format!("product {product_id}")))?;
    report_tier(tier);
    println!("Removed product {id}");
    Ok(())
}

fn apply_details(product: &mut Product, details: ProductDetails) -> Result<(), AppError> {
    if let Some(description) = details.description {
        product.description = description;
    }
    if let Some(original) = details.original_price {
        let original = parse_price(original)?;
        product.original_price = Some(original);
        product.discount = discount_percent(product.price, original);
    }
    if !details.images.is_empty() {
        product.images = details.images;
    }
    if !details.sizes.is_empty() {
        product.sizes = details.sizes;
    }
    if !details.colors.is_empty() {
        product.colors = details
            .colors
            .iter()
            .map(|raw| parse_color(raw))
            .collect::<Result<_, _>>()?;
    }
    if !details.features.is_empty() {
        product.features = details.features;
    }
    if details.new {
        product.is_new = Some(true);
    }
    Ok(())
}

fn parse_price(amount: Decimal) -> Result<Money, AppError> {
    let price = Money::new(amount);
    if price.is_negative() {
        return Err(AppError::BadRequest(format!("price {amount} is negative")));
    }
    Ok(price.round_to_pence())
}

/// Whole-percent saving of `price` against `original`, if any.
fn discount_percent(price: Money, original: Money) -> Option<u8> {
    if original.amount() <= price.amount() || original.amount().is_zero() {
        return None;
    }
    let saving = (original.amount() - price.amount()) / original.amount() * Decimal::ONE_HUNDRED;
    saving.round().to_u8()
}

fn parse_color(raw: &str) -> Result<ColorOption, AppError> {
    let (name, value) = raw.split_once('=').unwrap_or((raw, raw));
    let (name, value) = (name.trim(), value.trim());
    if name.is_empty() || value.is_empty() {
        return Err(AppError::BadRequest(format!("invalid colour {raw:?}")));
    }
    Ok(ColorOption {
        name: name.to_string(),
        value: value.to_string(),
    })
}

fn report_tier(tier: PersistTier) {
    match tier {
        PersistTier::Full => {}
        PersistTier::Trimmed | PersistTier::Minimal => {
            warn!(?tier, "Only part of the catalog could be stored");
        }
        PersistTier::Cleared => {
            warn!("Catalog storage is full; added products last only for this session");
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn details() -> ProductDetails {
        ProductDetails {
            description: None,
            original_price: None,
            images: Vec::new(),
            sizes: Vec::new(),
            colors: Vec::new(),
            features: Vec::new(),
            new: false,
        }
    }

    fn scarf() -> NewProduct {
        NewProduct {
            id: Some("scarf".to_string()),
            name: "Wool Scarf".to_string(),
            price: Decimal::new(3500, 2),
            category: "accessories".to_string(),
            details: details(),
        }
    }

    #[test]
    fn test_discount_percent() {
        assert_eq!(
            discount_percent(Money::from_pence(5500), Money::from_pence(6900)),
            Some(20)
        );
        assert_eq!(
            discount_percent(Money::from_pence(5500), Money::from_pence(5500)),
            None
        );
    }

    #[test]
    fn test_parse_color() {
        let color = parse_color("Navy=#1f2a44").unwrap();
        assert_eq!(color.name, "Navy");
        assert_eq!(color.value, "#1f2a44");
        assert_eq!(parse_color("Black").unwrap().value, "Black");
        assert!(parse_color("=#fff").is_err());
    }

    #[test]
    fn test_negative_price_rejected() {
        assert!(matches!(
            parse_price(Decimal::new(-100, 2)),
            Err(AppError::BadRequest(_))
        ));
    }

    #[test]
    fn test_add_then_update_then_remove() {
        let mut storefront = Storefront::in_memory(None);
        add(&mut storefront, scarf()).unwrap();
        assert!(storefront.catalog.get(&ProductId::from("scarf")).is_some());

        let changes = ProductChanges {
            name: None,
            price: Some(Decimal::new(3000, 2)),
            category: None,
            details: details(),
        };
        update(&mut storefront, "scarf", changes).unwrap();
        assert_eq!(
            storefront.catalog.get(&ProductId::from("scarf")).unwrap().price,
            Money::from_pence(3000)
        );

        remove(&mut storefront, "scarf").unwrap();
        assert!(storefront.catalog.get(&ProductId::from("scarf")).is_none());
    }

    #[test]
    fn test_seed_product_is_read_only() {
        let mut storefront = Storefront::in_memory(None);
        assert!(remove(&mut storefront, "1").is_err());
        assert!(storefront.catalog.get(&ProductId::from("1")).is_some());
    }
}
