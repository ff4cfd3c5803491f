//! Local order ledger.

use chrono::Utc;
use thiserror::Error;
use tracing::{info, instrument, warn};

use loom_co_core::{CheckoutDetails, Order, OrderId, OrderPatch, OrderStatus, UserId};

use super::cart::CartLedger;
use crate::store::{RecordStore, StorageError, keys};

/// Errors from order operations.
#[derive(Debug, Error)]
pub enum OrderError {
    #[error("cannot check out an empty cart")]
    EmptyCart,

    #[error("order {0} already exists")]
    DuplicateId(OrderId),

    /// The write failed; the ledger is unchanged.
    #[error("order storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Orders persisted under [`keys::ORDERS`], most recent first.
#[derive(Debug)]
pub struct OrderLedger {
    orders: Vec<Order>,
    store: RecordStore,
}

impl OrderLedger {
    /// Rehydrate orders from the store.
    #[must_use]
    pub fn open(store: RecordStore) -> Self {
        let orders: Vec<Order> = store.load(keys::ORDERS).unwrap_or_default();
        Self { orders, store }
    }

    /// Every order, most recent first.
    #[must_use]
    pub fn list(&self) -> &[Order] {
        &self.orders
    }

    #[must_use]
    pub fn get(&self, id: &OrderId) -> Option<&Order> {
        self.orders.iter().find(|o| &o.id == id)
    }

    /// Look up an order for a customer who knows its id and contact email.
    #[must_use]
    pub fn track(&self, id: &OrderId, email: &str) -> Option<&Order> {
        self.get(id).filter(|o| o.belongs_to_email(email))
    }

    /// Record a new order at the front of the ledger.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::DuplicateId` if the id is taken, or
    /// `OrderError::Storage` if the ledger cannot be written. Nothing is
    /// recorded in either case.
    #[instrument(skip(self, order), fields(order_id = %order.id))]
    pub fn create(&mut self, order: Order) -> Result<(), OrderError> {
        if self.get(&order.id).is_some() {
            return Err(OrderError::DuplicateId(order.id));
        }
        self.orders.insert(0, order);
        if let Err(err) = self.store.save(keys::ORDERS, &self.orders) {
            warn!(error = %err, "Failed to record order");
            self.orders.remove(0);
            return Err(err.into());
        }
        Ok(())
    }

    /// Place an order for the cart's current lines, then empty the cart.
    ///
    /// Items are snapshotted, so later catalog edits never reach the order.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::EmptyCart` for an empty cart, or the error from
    /// [`OrderLedger::create`]; the cart is left alone in both cases.
    #[instrument(skip(self, cart, details), fields(lines = cart.items().len()))]
    pub fn checkout(
        &mut self,
        cart: &mut CartLedger,
        details: CheckoutDetails,
        user_id: Option<UserId>,
    ) -> Result<Order, OrderError> {
        if cart.is_empty() {
            return Err(OrderError::EmptyCart);
        }
        let order = Order::place(OrderId::generate(), cart.items(), details, user_id, Utc::now());
        self.create(order.clone())?;
        info!(order_id = %order.id, total = %order.total, "Order placed");

        if let Err(err) = cart.clear() {
            warn!(order_id = %order.id, error = %err, "Order placed but cart could not be cleared");
        }
        Ok(order)
    }

    /// Set an order's status. Any transition is allowed.
    ///
    /// Returns whether an order with `id` exists.
    ///
    /// # Errors
    ///
    /// See [`OrderLedger::update_partial`].
    pub fn update_status(&mut self, id: &OrderId, status: OrderStatus) -> Result<bool, OrderError> {
        self.update_partial(id, &OrderPatch::status(status))
    }

    /// Replace the fields set in `patch`.
    ///
    /// Returns whether an order with `id` exists.
    ///
    /// # Errors
    ///
    /// Returns `OrderError::Storage` if the write fails; the order keeps its
    /// previous fields.
    #[instrument(skip(self, patch))]
    pub fn update_partial(&mut self, id: &OrderId, patch: &OrderPatch) -> Result<bool, OrderError> {
        let Some(idx) = self.orders.iter().position(|o| &o.id == id) else {
            return Ok(false);
        };
        if patch.is_empty() {
            return Ok(true);
        }
        let Some(order) = self.orders.get_mut(idx) else {
            return Ok(false);
        };
        let previous = order.clone();
        patch.apply(order);

        if let Err(err) = self.store.save(keys::ORDERS, &self.orders) {
            warn!(error = %err, "Failed to update order");
            if let Some(order) = self.orders.get_mut(idx) {
                *order = previous;
            }
            return Err(err.into());
        }
        Ok(true)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use loom_co_core::{Money, NewLineItem, PaymentStatus, ProductId};

    use crate::ledger::ProductCatalog;
    use crate::store::MemoryBackend;

    fn item(id: &str, pence: i64) -> NewLineItem {
        NewLineItem {
            product_id: ProductId::from(id),
            name: format!("Product {id}"),
            price: Money::from_pence(pence),
            image: "/img.jpg".to_string(),
            size: "M".to_string(),
            color: "Black".to_string(),
        }
    }

    fn details() -> CheckoutDetails {
        CheckoutDetails {
            customer: "Ada Lovelace".to_string(),
            email: "ada@example.com".to_string(),
            phone: None,
            shipping_address: None,
        }
    }

    fn placed(ledger: &mut OrderLedger, store: &RecordStore) -> Order {
        let mut cart = CartLedger::open(store.clone());
        cart.add_item(item("1", 2900)).unwrap();
        ledger.checkout(&mut cart, details(), None).unwrap()
    }

    #[test]
    fn test_checkout_snapshots_and_clears_cart() {
        let store = RecordStore::in_memory();
        let mut cart = CartLedger::open(store.clone());
        cart.add_item(item("1", 2900)).unwrap();
        cart.add_item(item("1", 2900)).unwrap();
        cart.add_item(item("2", 5500)).unwrap();

        let mut ledger = OrderLedger::open(store.clone());
        let order = ledger.checkout(&mut cart, details(), None).unwrap();

        assert!(cart.is_empty());
        assert_eq!(order.subtotal, Some(Money::from_pence(11_300)));
        assert_eq!(order.tax, Some(Money::from_pence(2260)));
        assert_eq!(order.total, Money::from_pence(13_560));
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.payment_status, PaymentStatus::Paid);
        assert!(order.id.as_str().starts_with("LC-"));
        assert_eq!(OrderLedger::open(store).list().len(), 1);
    }

    #[test]
    fn test_empty_cart_is_rejected() {
        let store = RecordStore::in_memory();
        let mut cart = CartLedger::open(store.clone());
        let mut ledger = OrderLedger::open(store);
        assert!(matches!(
            ledger.checkout(&mut cart, details(), None),
            Err(OrderError::EmptyCart)
        ));
        assert!(ledger.list().is_empty());
    }

    #[test]
    fn test_most_recent_first() {
        let store = RecordStore::in_memory();
        let mut ledger = OrderLedger::open(store.clone());
        let first = placed(&mut ledger, &store);
        let second = placed(&mut ledger, &store);
        let ids: Vec<_> = ledger.list().iter().map(|o| o.id.clone()).collect();
        assert_eq!(ids, vec![second.id, first.id]);
    }

    #[test]
    fn test_order_items_ignore_later_price_changes() {
        let store = RecordStore::in_memory();
        let mut catalog = ProductCatalog::open(store.clone());
        let mut product = catalog.get(&ProductId::from("1")).unwrap().clone();
        product.id = ProductId::from("c-1");
        catalog.add(product.clone()).unwrap();

        let mut cart = CartLedger::open(store.clone());
        cart.add_item(product.line_item("M", "Black")).unwrap();
        let mut ledger = OrderLedger::open(store.clone());
        let order = ledger.checkout(&mut cart, details(), None).unwrap();

        product.price = Money::from_pence(1);
        catalog.update(&product.id.clone(), product).unwrap();

        let stored = OrderLedger::open(store);
        let captured = stored.get(&order.id).unwrap().items.first().unwrap().price;
        assert_eq!(captured, Money::from_pence(2900));
    }

    #[test]
    fn test_update_status_any_transition() {
        let store = RecordStore::in_memory();
        let mut ledger = OrderLedger::open(store.clone());
        let order = placed(&mut ledger, &store);

        assert!(ledger.update_status(&order.id, OrderStatus::Delivered).unwrap());
        assert!(ledger.update_status(&order.id, OrderStatus::Pending).unwrap());
        assert_eq!(
            OrderLedger::open(store).get(&order.id).unwrap().status,
            OrderStatus::Pending
        );
    }

    #[test]
    fn test_update_missing_is_noop() {
        let mut ledger = OrderLedger::open(RecordStore::in_memory());
        let updated = ledger
            .update_status(&OrderId::from("LC-NOPE"), OrderStatus::Shipped)
            .unwrap();
        assert!(!updated);
    }

    #[test]
    fn test_update_partial_sets_tracking() {
        let store = RecordStore::in_memory();
        let mut ledger = OrderLedger::open(store.clone());
        let order = placed(&mut ledger, &store);

        let patch = OrderPatch {
            status: Some(OrderStatus::Shipped),
            tracking_number: Some("RM123456789GB".to_string()),
            ..OrderPatch::default()
        };
        ledger.update_partial(&order.id, &patch).unwrap();
        let updated = ledger.get(&order.id).unwrap();
        assert_eq!(updated.status, OrderStatus::Shipped);
        assert_eq!(updated.tracking_number.as_deref(), Some("RM123456789GB"));
        assert_eq!(updated.items, order.items);
    }

    #[test]
    fn test_track_requires_matching_email() {
        let store = RecordStore::in_memory();
        let mut ledger = OrderLedger::open(store.clone());
        let order = placed(&mut ledger, &store);
        assert!(ledger.track(&order.id, "ADA@example.com").is_some());
        assert!(ledger.track(&order.id, "eve@example.com").is_none());
    }

    #[test]
    fn test_failed_write_records_nothing() {
        let store = RecordStore::in_memory();
        let mut cart = CartLedger::open(store);
        cart.add_item(item("1", 2900)).unwrap();

        let mut ledger = OrderLedger::open(RecordStore::new(MemoryBackend::with_quota(0)));
        let err = ledger.checkout(&mut cart, details(), None).unwrap_err();
        assert!(matches!(err, OrderError::Storage(ref e) if e.is_quota()));
        assert!(ledger.list().is_empty());
        assert_eq!(cart.total_items(), 1);
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let mut ledger = OrderLedger::open(RecordStore::in_memory());
        let order = Order::place(OrderId::from("LC-1"), &[], details(), None, Utc::now());
        ledger.create(order.clone()).unwrap();
        assert!(matches!(
            ledger.create(order),
            Err(OrderError::DuplicateId(_))
        ));
        assert_eq!(ledger.list().len(), 1);
    }
}
