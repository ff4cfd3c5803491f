//! Order commands.

use clap::Args;
use loom_co_core::{CheckoutDetails, Order, OrderId, OrderStatus, ShippingAddress};
use loom_co_storefront::error::AppError;
use loom_co_storefront::state::Storefront;

/// Checkout form.
#[derive(Debug, Args)]
pub struct CheckoutForm {
    /// Customer name
    #[arg(long)]
    pub name: String,

    #[arg(long)]
    pub email: String,

    #[arg(long)]
    pub phone: Option<String>,

    /// First address line; city and postcode are then required
    #[arg(long, requires_all = ["city", "postcode"])]
    pub line1: Option<String>,

    #[arg(long, requires = "line1")]
    pub line2: Option<String>,

    #[arg(long, requires = "line1")]
    pub city: Option<String>,

    #[arg(long, requires = "line1")]
    pub postcode: Option<String>,

    #[arg(long, default_value = "United Kingdom")]
    pub country: String,
}

impl CheckoutForm {
    fn into_details(self) -> Result<CheckoutDetails, AppError> {
        if self.name.trim().is_empty() {
            return Err(AppError::BadRequest("name is required".to_string()));
        }
        if !self.email.contains('@') {
            return Err(AppError::BadRequest(format!(
                "{} is not an email address",
                self.email
            )));
        }
        let shipping_address = match (self.line1, self.city, self.postcode) {
            (Some(line1), Some(city), Some(postcode)) => Some(ShippingAddress {
                line1,
                line2: self.line2,
                city,
                postcode,
                country: self.country,
            }),
            _ => None,
        };
        Ok(CheckoutDetails {
            customer: self.name,
            email: self.email,
            phone: self.phone,
            shipping_address,
        })
    }
}

/// Place an order for the cart and empty it.
///
/// # Errors
///
/// Returns `AppError::BadRequest` for an invalid form, or the order
/// ledger's error (empty cart, storage failure).
#[allow(clippy::print_stdout)]
pub fn checkout(storefront: &mut Storefront, form: CheckoutForm) -> Result<(), AppError> {
    let details = form.into_details()?;
    let order = storefront
        .orders
        .checkout(&mut storefront.cart, details, None)?;
    println!("Thank you! Your order number is {}.", order.id);
    print_order(&order);
    Ok(())
}

/// Print every order, most recent first.
#[allow(clippy::print_stdout)]
pub fn list(storefront: &Storefront) {
    let orders = storefront.orders.list();
    if orders.is_empty() {
        println!("No orders yet.");
    }
    for order in orders {
        println!(
            "{}  {}  {:<10}  {}  {}",
            order.id,
            order.date.format("%Y-%m-%d"),
            order.status,
            order.total,
            order.customer
        );
    }
}

/// Print one order.
///
/// # Errors
///
/// Returns `AppError::NotFound` for an unknown order.
pub fn show(storefront: &Storefront, order_id: &str) -> Result<(), AppError> {
    let order = storefront
        .orders
        .get(&OrderId::from(order_id))
        .ok_or_else(|| AppError::NotFound(format!("order {order_id}")))?;
    print_order(order);
    Ok(())
}

/// Set an order's status.
///
/// # Errors
///
/// Returns `AppError::NotFound` for an unknown order, or the order
/// ledger's storage error.
#[allow(clippy::print_stdout)]
pub fn set_status(
    storefront: &mut Storefront,
    order_id: &str,
    status: OrderStatus,
) -> Result<(), AppError> {
    let id = OrderId::from(order_id);
    if !storefront.orders.update_status(&id, status)? {
        return Err(AppError::NotFound(format!("order {order_id}")));
    }
    println!("Order {id} is now {status}.");
    Ok(())
}

/// Look up an order by number and contact email.
///
/// # Errors
///
/// Returns `AppError::NotFound` unless both match, without saying which.
pub fn track(storefront: &Storefront, order_id: &str, email: &str) -> Result<(), AppError> {
    let order = storefront
        .orders
        .track(&OrderId::from(order_id), email)
        .ok_or_else(|| AppError::NotFound("order with that number and email".to_string()))?;
    print_order(order);
    Ok(())
}

#[allow(clippy::print_stdout)]
fn print_order(order: &Order) {
    println!("Order {} ({})", order.id, order.status);
    println!("Placed {} by {} <{}>", order.date.format("%Y-%m-%d %H:%M"), order.customer, order.email);
    for item in &order.items {
        println!(
            "{:>3} x {} ({}, {})  {}",
            item.quantity,
            item.name,
            item.size,
            item.color,
            item.line_total()
        );
    }
    if let Some(subtotal) = order.subtotal {
        println!("Subtotal: {subtotal}");
    }
    if let Some(shipping) = order.shipping_cost {
        println!("Shipping: {shipping}");
    }
    if let Some(tax) = order.tax {
        println!("Tax: {tax}");
    }
    println!("Total: {}", order.total);
    if let Some(address) = &order.shipping_address {
        println!("Ship to: {}, {} {}, {}", address.line1, address.city, address.postcode, address.country);
    }
    if let Some(tracking) = &order.tracking_number {
        println!("Tracking: {tracking}");
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use loom_co_core::ProductId;

    fn form() -> CheckoutForm {
        CheckoutForm {
            name: "Ada Lovelace".to_string(),
            email: "ada@example.com".to_string(),
            phone: None,
            line1: Some("1 St James's Square".to_string()),
            line2: None,
            city: Some("London".to_string()),
            postcode: Some("SW1Y 4JH".to_string()),
            country: "United Kingdom".to_string(),
        }
    }

    #[test]
    fn test_checkout_empty_cart_fails() {
        let mut storefront = Storefront::in_memory(None);
        assert!(checkout(&mut storefront, form()).is_err());
        assert!(storefront.orders.list().is_empty());
    }

    #[test]
    fn test_checkout_then_track() {
        let mut storefront = Storefront::in_memory(None);
        let tee = storefront
            .catalog
            .get(&ProductId::from("1"))
            .unwrap()
            .line_item("M", "Black");
        storefront.cart.add_item(tee).unwrap();

        checkout(&mut storefront, form()).unwrap();
        assert!(storefront.cart.is_empty());

        let id = storefront.orders.list().first().unwrap().id.to_string();
        assert!(track(&storefront, &id, "ADA@example.com").is_ok());
        assert!(matches!(
            track(&storefront, &id, "someone@example.com"),
            Err(AppError::NotFound(_))
        ));
        set_status(&mut storefront, &id, OrderStatus::Shipped).unwrap();
        assert_eq!(
            storefront.orders.get(&OrderId::from(id.as_str())).unwrap().status,
            OrderStatus::Shipped
        );
    }

    #[test]
    fn test_invalid_email_rejected() {
        let mut bad = form();
        bad.email = "not-an-email".to_string();
        assert!(matches!(bad.into_details(), Err(AppError::BadRequest(_))));
    }
}
