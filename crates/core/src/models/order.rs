//! Orders placed at checkout.
//!
//! An order snapshots the cart at the moment of purchase. Later edits to
//! a product's price or name never reach an existing order; only status,
//! payment, tracking and contact fields change after creation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::cart::LineItem;
use crate::types::{Money, OrderId, OrderStatus, PaymentStatus, ProductId, UserId};

/// A purchased line, with its price captured at purchase time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub product_id: ProductId,
    pub name: String,
    pub price: Money,
    pub image: String,
    pub size: String,
    pub color: String,
    pub quantity: u32,
}

impl OrderItem {
    /// `price * quantity`.
    #[must_use]
    pub fn line_total(&self) -> Money {
        self.price * self.quantity
    }
}

impl From<&LineItem> for OrderItem {
    fn from(line: &LineItem) -> Self {
        Self {
            product_id: line.product_id.clone(),
            name: line.name.clone(),
            price: line.price,
            image: line.image.clone(),
            size: line.size.clone(),
            color: line.color.clone(),
            quantity: line.quantity,
        }
    }
}

/// Delivery address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingAddress {
    pub line1: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line2: Option<String>,
    pub city: String,
    pub postcode: String,
    pub country: String,
}

/// Customer details captured by the checkout form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutDetails {
    pub customer: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub shipping_address: Option<ShippingAddress>,
}

/// Money breakdown of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderTotals {
    pub subtotal: Money,
    pub shipping_cost: Money,
    pub tax: Money,
    pub total: Money,
}

impl OrderTotals {
    /// Flat 20% tax on the subtotal, free shipping.
    #[must_use]
    pub fn from_subtotal(subtotal: Money) -> Self {
        let tax = subtotal.tax();
        let shipping_cost = Money::ZERO;
        Self {
            subtotal,
            shipping_cost,
            tax,
            total: subtotal + shipping_cost + tax,
        }
    }

    /// Totals for a set of purchased items.
    #[must_use]
    pub fn from_items(items: &[OrderItem]) -> Self {
        Self::from_subtotal(items.iter().map(OrderItem::line_total).sum())
    }
}

/// An order record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: OrderId,
    pub date: DateTime<Utc>,
    pub status: OrderStatus,
    pub total: Money,
    pub items: Vec<OrderItem>,
    pub customer: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shipping_address: Option<ShippingAddress>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtotal: Option<Money>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shipping_cost: Option<Money>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tax: Option<Money>,
    /// Owner; `None` for guest checkout.
    #[serde(default)]
    pub user_id: Option<UserId>,
    #[serde(default)]
    pub payment_status: PaymentStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tracking_number: Option<String>,
}

impl Order {
    /// Place an order for `lines`.
    ///
    /// The order starts `Pending`; payment is simulated and recorded as
    /// `Paid`.
    #[must_use]
    pub fn place(
        id: OrderId,
        lines: &[LineItem],
        details: CheckoutDetails,
        user_id: Option<UserId>,
        placed_at: DateTime<Utc>,
    ) -> Self {
        let items: Vec<OrderItem> = lines.iter().map(OrderItem::from).collect();
        let totals = OrderTotals::from_items(&items);
        Self {
            id,
            date: placed_at,
            status: OrderStatus::Pending,
            total: totals.total,
            items,
            customer: details.customer,
            email: details.email,
            shipping_address: details.shipping_address,
            phone: details.phone,
            subtotal: Some(totals.subtotal),
            shipping_cost: Some(totals.shipping_cost),
            tax: Some(totals.tax),
            user_id,
            payment_status: PaymentStatus::Paid,
            tracking_number: None,
        }
    }

    /// Sum of item quantities.
    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.items
            .iter()
            .fold(0_u32, |acc, item| acc.saturating_add(item.quantity))
    }

    /// Whether `email` matches the order's contact email, ignoring case.
    #[must_use]
    pub fn belongs_to_email(&self, email: &str) -> bool {
        self.email.trim().eq_ignore_ascii_case(email.trim())
    }
}

/// Fields an administrator may change on an existing order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<OrderStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_status: Option<PaymentStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tracking_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shipping_address: Option<ShippingAddress>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

impl OrderPatch {
    /// Patch that only changes the status.
    #[must_use]
    pub fn status(status: OrderStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    /// Whether the patch sets no field.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.status.is_none()
            && self.payment_status.is_none()
            && self.tracking_number.is_none()
            && self.shipping_address.is_none()
            && self.phone.is_none()
    }

    /// Replace the fields set in this patch. Items and totals are never touched.
    pub fn apply(&self, order: &mut Order) {
        if let Some(status) = self.status {
            order.status = status;
        }
        if let Some(payment_status) = self.payment_status {
            order.payment_status = payment_status;
        }
        if let Some(tracking) = &self.tracking_number {
            order.tracking_number = Some(tracking.clone());
        }
        if let Some(address) = &self.shipping_address {
            order.shipping_address = Some(address.clone());
        }
        if let Some(phone) = &self.phone {
            order.phone = Some(phone.clone());
        }
    }
}
