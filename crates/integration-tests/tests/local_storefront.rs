//! End-to-end scenarios for the local ledgers over the record store.
//!
//! Run with: cargo test -p loom-co-integration-tests --test `local_storefront`

#![allow(clippy::unwrap_used)]

use loom_co_core::{Money, OrderStatus, Product, ProductId, WishlistEntry};
use loom_co_integration_tests::{checkout_details, seed};
use loom_co_storefront::config::StorefrontConfig;
use loom_co_storefront::error::AppError;
use loom_co_storefront::ledger::{CartError, PersistTier};
use loom_co_storefront::state::Storefront;
use loom_co_storefront::store::{MemoryBackend, RecordStore, keys};

fn custom_product(id: &str, pence: i64) -> Product {
    Product {
        id: ProductId::from(id),
        name: format!("Atelier Piece {id}"),
        price: Money::from_pence(pence),
        category: "tops".to_string(),
        images: vec!["/images/custom-1.jpg".to_string(), "/images/custom-2.jpg".to_string()],
        ..seed("1")
    }
}

// ============================================================================
// Shopping flow
// ============================================================================

#[test]
fn test_browse_add_checkout_and_reopen() {
    let store = RecordStore::in_memory();
    let mut storefront = Storefront::open(store.clone());

    let tee = storefront.catalog.get(&ProductId::from("1")).unwrap().clone();
    let jumper = storefront.catalog.get(&ProductId::from("2")).unwrap().clone();
    storefront.cart.add_item(tee.line_item("M", "Black")).unwrap();
    storefront.cart.add_item(tee.line_item("M", "Black")).unwrap();
    storefront.cart.add_item(jumper.line_item("L", "Navy")).unwrap();
    storefront.wishlist.add(jumper.wishlist_entry()).unwrap();

    assert_eq!(storefront.cart.total_items(), 3);
    assert_eq!(storefront.cart.total_price(), Money::from_pence(11_300));

    let order = storefront
        .orders
        .checkout(&mut storefront.cart, checkout_details("ada@example.com"), None)
        .unwrap();
    assert_eq!(order.subtotal, Some(Money::from_pence(11_300)));
    assert_eq!(order.tax, Some(Money::from_pence(2260)));
    assert_eq!(order.total, Money::from_pence(13_560));
    assert_eq!(order.status, OrderStatus::Pending);
    assert!(storefront.cart.is_empty());

    let reopened = Storefront::open(store);
    assert!(reopened.cart.is_empty());
    assert_eq!(reopened.orders.list().len(), 1);
    assert!(reopened.orders.track(&order.id, "ADA@EXAMPLE.COM").is_some());
    assert!(reopened.wishlist.contains(&ProductId::from("2")));
}

#[test]
fn test_add_twice_then_zero_quantity_empties_cart() {
    let store = RecordStore::in_memory();
    let mut storefront = Storefront::open(store.clone());
    let tee = seed("1");
    let id = ProductId::from("1");

    storefront.cart.add_item(tee.line_item("M", "Black")).unwrap();
    storefront.cart.add_item(tee.line_item("M", "Black")).unwrap();
    assert_eq!(storefront.cart.items().len(), 1);
    assert_eq!(storefront.cart.total_items(), 2);

    storefront.cart.set_quantity(&id, "M", "Black", 0).unwrap();
    assert!(storefront.cart.is_empty());
    assert_eq!(storefront.cart.total_items(), 0);

    storefront.cart.remove_item(&id, "M", "Black").unwrap();
    assert!(Storefront::open(store).cart.is_empty());
}

#[test]
fn test_orders_listed_most_recent_first() {
    let mut storefront = Storefront::in_memory(None);
    let tee = seed("1");

    storefront.cart.add_item(tee.line_item("S", "White")).unwrap();
    let first = storefront
        .orders
        .checkout(&mut storefront.cart, checkout_details("ada@example.com"), None)
        .unwrap();
    storefront.cart.add_item(tee.line_item("M", "White")).unwrap();
    let second = storefront
        .orders
        .checkout(&mut storefront.cart, checkout_details("ada@example.com"), None)
        .unwrap();

    let ids: Vec<_> = storefront.orders.list().iter().map(|o| o.id.clone()).collect();
    assert_eq!(ids, vec![second.id, first.id]);
}

#[test]
fn test_order_survives_later_product_edits() {
    let store = RecordStore::in_memory();
    let mut storefront = Storefront::open(store.clone());
    storefront.catalog.add(custom_product("linen-shirt", 4500)).unwrap();

    let shirt = storefront.catalog.get(&ProductId::from("linen-shirt")).unwrap().clone();
    storefront.cart.add_item(shirt.line_item("M", "Black")).unwrap();
    let order = storefront
        .orders
        .checkout(&mut storefront.cart, checkout_details("ada@example.com"), None)
        .unwrap();

    let mut repriced = shirt.clone();
    repriced.price = Money::from_pence(9900);
    repriced.name = "Renamed Shirt".to_string();
    storefront
        .catalog
        .update(&ProductId::from("linen-shirt"), repriced)
        .unwrap();
    storefront.catalog.remove(&ProductId::from("linen-shirt")).unwrap();

    let reopened = Storefront::open(store);
    let stored = reopened.orders.get(&order.id).unwrap();
    let item = stored.items.first().unwrap();
    assert_eq!(item.price, Money::from_pence(4500));
    assert_eq!(item.name, "Atelier Piece linen-shirt");
    assert_eq!(stored.total, order.total);
}

// ============================================================================
// Storage quota
// ============================================================================

#[test]
fn test_full_store_empties_cart_but_keeps_wishlist_for_session() {
    let store = RecordStore::new(MemoryBackend::with_quota(64));
    let mut storefront = Storefront::open(store.clone());
    let jumper = seed("2");

    let err = storefront.cart.add_item(jumper.line_item("M", "Navy")).unwrap_err();
    assert!(matches!(err, CartError::NotSaved(_)));
    assert!(storefront.cart.is_empty());
    assert!(AppError::from(err).user_message().contains("emptied"));

    storefront.wishlist.add(jumper.wishlist_entry()).unwrap();
    assert!(storefront.wishlist.contains(&jumper.id));
    assert!(storefront.wishlist.is_session_only());

    let reopened = Storefront::open(store);
    assert!(reopened.cart.is_empty());
    assert!(reopened.wishlist.is_empty());
}

#[test]
fn test_full_store_rejects_order_and_keeps_cart() {
    let mut storefront = Storefront::in_memory(Some(400));
    storefront.cart.add_item(seed("1").line_item("M", "Black")).unwrap();

    let result = storefront
        .orders
        .checkout(&mut storefront.cart, checkout_details("ada@example.com"), None);
    assert!(result.is_err());
    assert!(storefront.orders.list().is_empty());
    assert_eq!(storefront.cart.total_items(), 1);
}

#[test]
fn test_catalog_quota_degrades_without_touching_memory() {
    let mut storefront = Storefront::in_memory(Some(0));
    let tier = storefront.catalog.add(custom_product("linen-shirt", 4500)).unwrap();
    assert_eq!(tier, PersistTier::Cleared);
    assert!(storefront.catalog.get(&ProductId::from("linen-shirt")).is_some());

    let reopened = Storefront::open(storefront.store().clone());
    assert!(reopened.catalog.get(&ProductId::from("linen-shirt")).is_none());
    assert_eq!(reopened.catalog.len(), 6);
}

// ============================================================================
// Stored data
// ============================================================================

#[test]
fn test_file_store_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let config = StorefrontConfig {
        data_dir: dir.path().to_path_buf(),
        ..StorefrontConfig::default()
    };

    {
        let mut storefront = Storefront::from_config(&config).unwrap();
        storefront.catalog.add(custom_product("linen-shirt", 4500)).unwrap();
        let shirt = storefront.catalog.get(&ProductId::from("linen-shirt")).unwrap().clone();
        storefront.cart.add_item(shirt.line_item("M", "Black")).unwrap();
        storefront.cart.add_item(seed("6").line_item("One Size", "Grey")).unwrap();
    }

    let reopened = Storefront::from_config(&config).unwrap();
    let shirt = reopened.catalog.get(&ProductId::from("linen-shirt")).unwrap();
    assert_eq!(shirt.images.len(), 1);
    assert_eq!(reopened.cart.items().len(), 2);
    assert_eq!(reopened.cart.total_items(), 2);
}

#[test]
fn test_corrupt_key_only_resets_its_ledger() {
    let store = RecordStore::in_memory();
    {
        let mut storefront = Storefront::open(store.clone());
        storefront.wishlist.add(seed("3").wishlist_entry()).unwrap();
        storefront.cart.add_item(seed("3").line_item("10", "Charcoal")).unwrap();
    }
    store.write_raw(keys::CART, "{\"not\": \"a cart\"").unwrap();

    let reopened = Storefront::open(store.clone());
    assert!(reopened.cart.is_empty());
    assert!(reopened.wishlist.contains(&ProductId::from("3")));
    assert!(store.try_load::<serde_json::Value>(keys::CART).unwrap().is_none());
}

#[test]
fn test_stored_catalog_never_shadows_seed() {
    let store = RecordStore::in_memory();
    let mut impostor = seed("1");
    impostor.name = "Counterfeit Tee".to_string();
    let stored = vec![
        impostor,
        custom_product("linen-shirt", 4500),
        custom_product("linen-shirt", 5000),
    ];
    store.save(keys::PRODUCTS, &stored).unwrap();

    let storefront = Storefront::open(store);
    assert_eq!(storefront.catalog.len(), 7);
    assert_eq!(
        storefront.catalog.get(&ProductId::from("1")).unwrap().name,
        "Essential Linen Tee"
    );
    let ids: Vec<_> = storefront.catalog.list().map(|p| p.id.as_str().to_string()).collect();
    assert_eq!(ids.iter().filter(|id| *id == "linen-shirt").count(), 1);
}

#[test]
fn test_legacy_wishlist_entries_load() {
    let store = RecordStore::in_memory();
    let stored = serde_json::json!([
        {"productId": "4", "name": "Organic Cotton Shirt", "price": "39.00", "image": "/a.jpg"},
        {"productId": "4", "name": "Organic Cotton Shirt", "price": "35.00", "image": "/a.jpg"}
    ]);
    store.write_raw(keys::WISHLIST, &stored.to_string()).unwrap();

    let storefront = Storefront::open(store);
    let entries: &[WishlistEntry] = storefront.wishlist.entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries.first().unwrap().price, Money::from_pence(3500));
}
