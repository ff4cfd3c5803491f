//! Cart commands.

use loom_co_core::{LineKey, ProductId};
use loom_co_storefront::error::AppError;
use loom_co_storefront::state::Storefront;

use super::find_product;

/// Print the cart lines and totals.
#[allow(clippy::print_stdout)]
pub fn show(storefront: &Storefront) {
    let cart = &storefront.cart;
    if cart.is_empty() {
        println!("Your cart is empty.");
        return;
    }
    for line in cart.items() {
        println!(
            "{:>3} x {} ({}, {}) [{}]  {}",
            line.quantity,
            line.name,
            line.size,
            line.color,
            line.product_id,
            line.line_total()
        );
    }
    println!("{} items, {}", cart.total_items(), cart.total_price());
}

/// Add `quantity` units of a product.
///
/// Size and colour default to the product's first option and must be one
/// of its options when it lists any.
///
/// # Errors
///
/// Returns `AppError::NotFound` for an unlisted product,
/// `AppError::BadRequest` for an unknown size or colour, or the cart's
/// storage error.
pub fn add(
    storefront: &mut Storefront,
    product_id: &str,
    size: Option<String>,
    color: Option<String>,
    quantity: u32,
) -> Result<(), AppError> {
    if quantity == 0 {
        return Err(AppError::BadRequest("quantity must be at least 1".to_string()));
    }
    let product = find_product(&storefront.catalog, product_id)?;
    let size = pick_option(size, &product.sizes, "size")?;
    let color_names: Vec<String> = product.colors.iter().map(|c| c.name.clone()).collect();
    let color = pick_option(color, &color_names, "colour")?;
    let item = product.line_item(&size, &color);

    let existing = storefront
        .cart
        .lines()
        .get(item.key())
        .map_or(0, |line| line.quantity);
    storefront.cart.add_item(item)?;
    if quantity > 1 {
        let target = i64::from(existing) + i64::from(quantity);
        storefront
            .cart
            .set_quantity(&ProductId::from(product_id), &size, &color, target)?;
    }
    show(storefront);
    Ok(())
}

/// Remove a line.
///
/// # Errors
///
/// Returns the cart's storage error.
pub fn remove(
    storefront: &mut Storefront,
    product_id: &str,
    size: &str,
    color: &str,
) -> Result<(), AppError> {
    storefront
        .cart
        .remove_item(&ProductId::from(product_id), size, color)?;
    show(storefront);
    Ok(())
}

/// Overwrite a line's quantity; zero or less removes it.
///
/// # Errors
///
/// Returns `AppError::NotFound` when the line is not in the cart, or the
/// cart's storage error.
pub fn set(
    storefront: &mut Storefront,
    product_id: &str,
    size: &str,
    color: &str,
    quantity: i64,
) -> Result<(), AppError> {
    let id = ProductId::from(product_id);
    if storefront
        .cart
        .lines()
        .get(LineKey::new(&id, size, color))
        .is_none()
    {
        return Err(AppError::NotFound(format!(
            "cart line {product_id} ({size}, {color})"
        )));
    }
    storefront.cart.set_quantity(&id, size, color, quantity)?;
    show(storefront);
    Ok(())
}

/// Empty the cart.
///
/// # Errors
///
/// Returns the cart's storage error.
pub fn clear(storefront: &mut Storefront) -> Result<(), AppError> {
    storefront.cart.clear()?;
    show(storefront);
    Ok(())
}

fn pick_option(
    requested: Option<String>,
    options: &[String],
    label: &str,
) -> Result<String, AppError> {
    match requested {
        None => Ok(options.first().cloned().unwrap_or_default()),
        Some(value) if options.is_empty() => Ok(value),
        Some(value) => options
            .iter()
            .find(|option| option.eq_ignore_ascii_case(&value))
            .cloned()
            .ok_or_else(|| {
                AppError::BadRequest(format!(
                    "unknown {label} {value}; choose one of: {}",
                    options.join(", ")
                ))
            }),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn sizes() -> Vec<String> {
        vec!["S".to_string(), "M".to_string()]
    }

    #[test]
    fn test_pick_option_defaults_to_first() {
        assert_eq!(pick_option(None, &sizes(), "size").unwrap(), "S");
        assert_eq!(pick_option(None, &[], "size").unwrap(), "");
    }

    #[test]
    fn test_pick_option_matches_case_insensitively() {
        assert_eq!(pick_option(Some("m".to_string()), &sizes(), "size").unwrap(), "M");
    }

    #[test]
    fn test_pick_option_rejects_unknown() {
        let result = pick_option(Some("XL".to_string()), &sizes(), "size");
        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }

    #[test]
    fn test_add_many_units() {
        let mut storefront = Storefront::in_memory(None);
        add(&mut storefront, "1", Some("M".to_string()), Some("Black".to_string()), 3).unwrap();
        add(&mut storefront, "1", Some("M".to_string()), Some("Black".to_string()), 2).unwrap();
        assert_eq!(storefront.cart.total_items(), 5);
        assert_eq!(storefront.cart.items().len(), 1);
    }

    #[test]
    fn test_set_unknown_line_is_not_found() {
        let mut storefront = Storefront::in_memory(None);
        let result = set(&mut storefront, "1", "M", "Black", 2);
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }
}
