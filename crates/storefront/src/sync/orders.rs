//! Remote-backed order ledger.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, instrument, warn};

use loom_co_core::{
    CheckoutDetails, LineItem, Order, OrderId, OrderPatch, OrderStatus, UserId,
};

use super::{RemoteCart, SyncError};
use crate::remote::RemoteDatabase;

/// Orders stored in the remote `orders` and `order_items` tables.
pub struct RemoteOrders {
    db: Arc<dyn RemoteDatabase>,
}

impl RemoteOrders {
    #[must_use]
    pub fn new(db: Arc<dyn RemoteDatabase>) -> Self {
        Self { db }
    }

    /// Place an order for `lines`. `user_id` is `None` for guest checkout.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::EmptyCart` if `lines` is empty, or
    /// `SyncError::RemoteWriteFailed` if the order could not be stored.
    #[instrument(skip(self, lines, details), fields(lines = lines.len(), guest = user_id.is_none()))]
    pub async fn place_order(
        &self,
        lines: &[LineItem],
        details: CheckoutDetails,
        user_id: Option<UserId>,
    ) -> Result<Order, SyncError> {
        if lines.is_empty() {
            return Err(SyncError::EmptyCart);
        }
        let order = Order::place(OrderId::generate(), lines, details, user_id, Utc::now());
        self.db
            .insert_order(&order)
            .await
            .map_err(|e| SyncError::write_failed("insert_order", e))?;
        info!(order_id = %order.id, total = %order.total, "Order placed");
        Ok(order)
    }

    /// Place an order for the signed-in user's cart, then empty the cart.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::NotAuthenticated` if the cart is signed out, or
    /// the error from [`RemoteOrders::place_order`].
    pub async fn checkout(
        &self,
        cart: &RemoteCart,
        details: CheckoutDetails,
    ) -> Result<Order, SyncError> {
        let user_id = cart.user_id().await.ok_or(SyncError::NotAuthenticated)?;
        let lines = cart.items().await;
        let order = self.place_order(&lines, details, Some(user_id)).await?;
        if let Err(err) = cart.clear().await {
            warn!(order_id = %order.id, error = %err, "Order placed but cart could not be cleared");
        }
        Ok(order)
    }

    /// The user's orders, most recent first.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::RemoteReadFailed` if the remote cannot be read.
    pub async fn orders_for(&self, user_id: &UserId) -> Result<Vec<Order>, SyncError> {
        self.db
            .orders_for_user(user_id)
            .await
            .map_err(|e| SyncError::read_failed("orders_for_user", e))
    }

    /// Every order, most recent first.
    ///
    /// # Errors
    ///
    /// See [`RemoteOrders::orders_for`].
    pub async fn all_orders(&self) -> Result<Vec<Order>, SyncError> {
        self.db
            .all_orders()
            .await
            .map_err(|e| SyncError::read_failed("all_orders", e))
    }

    /// Set an order's status. Any transition is allowed.
    ///
    /// Returns whether the order exists.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::RemoteWriteFailed` if the write fails.
    pub async fn update_status(&self, id: &OrderId, status: OrderStatus) -> Result<bool, SyncError> {
        self.update_partial(id, &OrderPatch::status(status)).await
    }

    /// Replace the fields set in `patch`. Returns whether the order exists.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::RemoteWriteFailed` if the write fails.
    #[instrument(skip(self, patch))]
    pub async fn update_partial(&self, id: &OrderId, patch: &OrderPatch) -> Result<bool, SyncError> {
        self.db
            .update_order(id, patch)
            .await
            .map_err(|e| SyncError::write_failed("update_order", e))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use loom_co_core::{Money, PaymentStatus, Product, ProductId};

    use crate::auth::{AuthAware, AuthUser};
    use crate::remote::MemoryDatabase;

    fn product(id: &str, pence: i64) -> Product {
        Product {
            id: ProductId::from(id),
            name: format!("Product {id}"),
            description: String::new(),
            price: Money::from_pence(pence),
            original_price: None,
            discount: None,
            images: vec!["/a.jpg".to_string()],
            rating: 0.0,
            review_count: 0,
            colors: Vec::new(),
            sizes: vec!["M".to_string()],
            features: Vec::new(),
            is_new: None,
            category: "tops".to_string(),
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

    #[tokio::test]
    async fn test_guest_order_has_no_owner() {
        let db = Arc::new(MemoryDatabase::new());
        let orders = RemoteOrders::new(db.clone());
        let lines = vec![product("1", 2900).line_item("M", "Black").with_quantity(2)];

        let order = orders.place_order(&lines, details(), None).await.unwrap();
        assert_eq!(order.user_id, None);
        assert_eq!(order.total, Money::from_pence(6960));
        assert_eq!(order.payment_status, PaymentStatus::Paid);
        assert_eq!(orders.all_orders().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_empty_order_rejected() {
        let orders = RemoteOrders::new(Arc::new(MemoryDatabase::new()));
        assert!(matches!(
            orders.place_order(&[], details(), None).await,
            Err(SyncError::EmptyCart)
        ));
    }

    #[tokio::test]
    async fn test_checkout_clears_remote_cart() {
        let db = Arc::new(MemoryDatabase::new());
        db.upsert_product(&product("1", 2900)).await.unwrap();
        let user = AuthUser {
            id: UserId::from("user-ada"),
            email: "ada@example.com".to_string(),
        };
        let cart = RemoteCart::new(db.clone());
        cart.on_auth_change(Some(user.clone())).await;
        cart.add_item(product("1", 2900).line_item("M", "Black")).await.unwrap();

        let orders = RemoteOrders::new(db.clone());
        let order = orders.checkout(&cart, details()).await.unwrap();

        assert!(cart.is_empty().await);
        assert_eq!(order.user_id, Some(user.id.clone()));
        assert_eq!(orders.orders_for(&user.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_update_status_and_missing_order() {
        let db = Arc::new(MemoryDatabase::new());
        let orders = RemoteOrders::new(db);
        let lines = vec![product("1", 2900).line_item("M", "Black").with_quantity(1)];
        let order = orders.place_order(&lines, details(), None).await.unwrap();

        assert!(orders.update_status(&order.id, OrderStatus::Shipped).await.unwrap());
        assert!(!orders
            .update_status(&OrderId::from("LC-MISSING"), OrderStatus::Shipped)
            .await
            .unwrap());
        let stored = orders.all_orders().await.unwrap();
        assert_eq!(stored.first().unwrap().status, OrderStatus::Shipped);
    }

    #[tokio::test]
    async fn test_failed_insert_reports_write_failure() {
        let db = Arc::new(MemoryDatabase::new());
        db.set_fail_on_write(true).await;
        let orders = RemoteOrders::new(db);
        let lines = vec![product("1", 2900).line_item("M", "Black").with_quantity(1)];
        assert!(matches!(
            orders.place_order(&lines, details(), None).await,
            Err(SyncError::RemoteWriteFailed(_))
        ));
    }
}
