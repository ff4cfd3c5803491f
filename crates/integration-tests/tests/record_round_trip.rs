//! Domain collections read back from the record store exactly as saved.
//!
//! Run with: cargo test -p loom-co-integration-tests --test `record_round_trip`

#![allow(clippy::unwrap_used)]

use loom_co_core::{LineItem, Order, OrderPatch, OrderStatus, PaymentStatus, Product, ProductId};
use loom_co_integration_tests::{checkout_details, seed};
use loom_co_storefront::ledger::seed::seed_products;
use loom_co_storefront::state::Storefront;
use loom_co_storefront::store::{FileBackend, RecordStore, keys};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fmt::Debug;

/// Each backend the ledgers run on, with the temp dir kept alive.
fn stores() -> (tempfile::TempDir, Vec<RecordStore>) {
    let dir = tempfile::tempdir().unwrap();
    let file = RecordStore::new(FileBackend::open(dir.path()).unwrap());
    (dir, vec![RecordStore::in_memory(), file])
}

fn assert_round_trip<T>(key: &str, value: &T)
where
    T: Serialize + DeserializeOwned + PartialEq + Debug,
{
    let (_dir, stores) = stores();
    for store in stores {
        store.save(key, value).unwrap();
        assert_eq!(store.load::<T>(key).as_ref(), Some(value));
    }
}

fn cart_lines() -> Vec<LineItem> {
    vec![
        seed("1").line_item("M", "Black").with_quantity(2),
        seed("3").line_item("10", "Charcoal").with_quantity(1),
        seed("6").line_item("One Size", "Grey").with_quantity(4),
    ]
}

/// Orders that went through several status changes.
fn placed_orders() -> Vec<Order> {
    let mut storefront = Storefront::in_memory(None);
    for (product, size, color) in [("1", "M", "Black"), ("2", "L", "Navy")] {
        storefront.cart.add_item(seed(product).line_item(size, color)).unwrap();
        storefront
            .orders
            .checkout(&mut storefront.cart, checkout_details("ada@example.com"), None)
            .unwrap();
    }

    let shipped = storefront.orders.list().last().unwrap().id.clone();
    storefront.orders.update_status(&shipped, OrderStatus::Processing).unwrap();
    let patch = OrderPatch {
        status: Some(OrderStatus::Shipped),
        payment_status: Some(PaymentStatus::Paid),
        tracking_number: Some("RM123456789GB".to_string()),
        ..OrderPatch::default()
    };
    storefront.orders.update_partial(&shipped, &patch).unwrap();

    let cancelled = storefront.orders.list().first().unwrap().id.clone();
    storefront.orders.update_status(&cancelled, OrderStatus::Cancelled).unwrap();
    storefront.orders.list().to_vec()
}

#[test]
fn test_cart_lines_round_trip() {
    assert_round_trip(keys::CART, &cart_lines());
}

#[test]
fn test_products_round_trip() {
    let mut products = seed_products().to_vec();
    let mut custom = seed("2");
    custom.id = ProductId::from("linen-blazer");
    custom.is_new = Some(true);
    products.push(custom);
    assert!(products.iter().all(|p: &Product| !p.sizes.is_empty() && !p.colors.is_empty()));

    assert_round_trip(keys::PRODUCTS, &products);
}

#[test]
fn test_orders_round_trip() {
    let orders = placed_orders();
    let statuses: Vec<OrderStatus> = orders.iter().map(|o| o.status).collect();
    assert_eq!(statuses, vec![OrderStatus::Cancelled, OrderStatus::Shipped]);

    assert_round_trip(keys::ORDERS, &orders);
}

#[test]
fn test_saved_orders_reopen_unchanged() {
    let (_dir, stores) = stores();
    for store in stores {
        let orders = placed_orders();
        store.save(keys::ORDERS, &orders).unwrap();
        let reopened = Storefront::open(store);
        assert_eq!(reopened.orders.list(), orders.as_slice());
    }
}
