//! In-memory remote database for tests and offline runs.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{RwLock, broadcast};

use loom_co_core::{
    LineItem, LineKey, Order, OrderId, OrderPatch, Product, ProductId, UserId, WishlistEntry,
};

use super::{CHANGE_CHANNEL_CAPACITY, Profile, RemoteDatabase, RemoteError, Table, TableChange};

struct ProductRow {
    product: Product,
    is_active: bool,
}

struct CartRow {
    user_id: UserId,
    product_id: ProductId,
    size: String,
    color: String,
    quantity: u32,
}

impl CartRow {
    fn matches(&self, user_id: &UserId, key: LineKey<'_>) -> bool {
        &self.user_id == user_id
            && &self.product_id == key.product_id
            && self.size == key.size
            && self.color == key.color
    }
}

#[derive(Default)]
struct Tables {
    products: Vec<ProductRow>,
    cart_items: Vec<CartRow>,
    wishlist_items: Vec<(UserId, ProductId)>,
    /// Most recent first.
    orders: Vec<Order>,
    profiles: HashMap<UserId, Profile>,
}

impl Tables {
    fn product(&self, id: &ProductId) -> Option<&Product> {
        self.products
            .iter()
            .find(|row| &row.product.id == id)
            .map(|row| &row.product)
    }
}

/// Remote database held in memory, with switches to simulate outages.
pub struct MemoryDatabase {
    tables: RwLock<Tables>,
    changes: broadcast::Sender<TableChange>,
    fail_on_read: RwLock<bool>,
    fail_on_write: RwLock<bool>,
    read_latency: RwLock<Duration>,
    muted: AtomicBool,
}

impl Default for MemoryDatabase {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDatabase {
    #[must_use]
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            tables: RwLock::new(Tables::default()),
            changes,
            fail_on_read: RwLock::new(false),
            fail_on_write: RwLock::new(false),
            read_latency: RwLock::new(Duration::ZERO),
            muted: AtomicBool::new(false),
        }
    }

    pub async fn set_fail_on_read(&self, fail: bool) {
        *self.fail_on_read.write().await = fail;
    }

    pub async fn set_fail_on_write(&self, fail: bool) {
        *self.fail_on_write.write().await = fail;
    }

    /// Delay listing reads (products, cart lines, wishlist) by `latency`
    /// after they have read the tables, so writes made during the delay are
    /// missing from the result.
    pub async fn set_read_latency(&self, latency: Duration) {
        *self.read_latency.write().await = latency;
    }

    /// Drop change notifications while `muted`, as a disconnected listener
    /// would. Writes still apply.
    pub fn set_muted(&self, muted: bool) {
        self.muted.store(muted, Ordering::Release);
    }

    /// Publish a change as if another session had written `table`.
    pub fn notify(&self, table: Table, user_id: Option<UserId>) {
        self.publish(TableChange::new(table, user_id));
    }

    pub fn publish(&self, change: TableChange) {
        if self.muted.load(Ordering::Acquire) {
            return;
        }
        // No receivers is fine.
        let _ = self.changes.send(change);
    }

    async fn check_read(&self) -> Result<(), RemoteError> {
        if *self.fail_on_read.read().await {
            return Err(RemoteError::Unavailable("simulated read failure".to_string()));
        }
        Ok(())
    }

    async fn respond_after_latency<T>(&self, value: T) -> T {
        let latency = *self.read_latency.read().await;
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        value
    }

    async fn check_write(&self) -> Result<(), RemoteError> {
        if *self.fail_on_write.read().await {
            return Err(RemoteError::Unavailable("simulated write failure".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteDatabase for MemoryDatabase {
    async fn list_products(&self) -> Result<Vec<Product>, RemoteError> {
        self.check_read().await?;
        let products: Vec<Product> = {
            let tables = self.tables.read().await;
            tables
                .products
                .iter()
                .filter(|row| row.is_active)
                .map(|row| row.product.clone())
                .collect()
        };
        Ok(self.respond_after_latency(products).await)
    }

    async fn get_product(&self, id: &ProductId) -> Result<Option<Product>, RemoteError> {
        self.check_read().await?;
        Ok(self.tables.read().await.product(id).cloned())
    }

    async fn upsert_product(&self, product: &Product) -> Result<(), RemoteError> {
        self.check_write().await?;
        {
            let mut tables = self.tables.write().await;
            match tables.products.iter_mut().find(|row| row.product.id == product.id) {
                Some(row) => {
                    row.product = product.clone();
                    row.is_active = true;
                }
                None => tables.products.push(ProductRow {
                    product: product.clone(),
                    is_active: true,
                }),
            }
        }
        self.notify(Table::Products, None);
        Ok(())
    }

    async fn deactivate_product(&self, id: &ProductId) -> Result<bool, RemoteError> {
        self.check_write().await?;
        let found = {
            let mut tables = self.tables.write().await;
            match tables.products.iter_mut().find(|row| &row.product.id == id) {
                Some(row) => {
                    row.is_active = false;
                    true
                }
                None => false,
            }
        };
        if found {
            self.notify(Table::Products, None);
        }
        Ok(found)
    }

    async fn delete_product(&self, id: &ProductId) -> Result<bool, RemoteError> {
        self.check_write().await?;
        let deleted = {
            let mut tables = self.tables.write().await;
            let before = tables.products.len();
            tables.products.retain(|row| &row.product.id != id);
            let deleted = tables.products.len() != before;
            if deleted {
                // Same as ON DELETE CASCADE.
                tables.cart_items.retain(|row| &row.product_id != id);
                tables.wishlist_items.retain(|(_, product_id)| product_id != id);
            }
            deleted
        };
        if deleted {
            self.notify(Table::Products, None);
        }
        Ok(deleted)
    }

    async fn cart_lines(&self, user_id: &UserId) -> Result<Vec<LineItem>, RemoteError> {
        self.check_read().await?;
        let lines: Vec<LineItem> = {
            let tables = self.tables.read().await;
            tables
                .cart_items
                .iter()
                .filter(|row| &row.user_id == user_id)
                .filter_map(|row| {
                    let product = tables.product(&row.product_id)?;
                    Some(
                        product
                            .line_item(&row.size, &row.color)
                            .with_quantity(row.quantity),
                    )
                })
                .collect()
        };
        Ok(self.respond_after_latency(lines).await)
    }

    async fn upsert_cart_line(&self, user_id: &UserId, line: &LineItem) -> Result<(), RemoteError> {
        self.check_write().await?;
        {
            let mut tables = self.tables.write().await;
            if tables.product(&line.product_id).is_none() {
                return Err(RemoteError::DataCorruption(format!(
                    "cart line references unknown product {}",
                    line.product_id
                )));
            }
            match tables
                .cart_items
                .iter_mut()
                .find(|row| row.matches(user_id, line.key()))
            {
                Some(row) => row.quantity = line.quantity,
                None => tables.cart_items.push(CartRow {
                    user_id: user_id.clone(),
                    product_id: line.product_id.clone(),
                    size: line.size.clone(),
                    color: line.color.clone(),
                    quantity: line.quantity,
                }),
            }
        }
        self.notify(Table::CartItems, Some(user_id.clone()));
        Ok(())
    }

    async fn delete_cart_line(
        &self,
        user_id: &UserId,
        key: LineKey<'_>,
    ) -> Result<(), RemoteError> {
        self.check_write().await?;
        self.tables
            .write()
            .await
            .cart_items
            .retain(|row| !row.matches(user_id, key));
        self.notify(Table::CartItems, Some(user_id.clone()));
        Ok(())
    }

    async fn clear_cart(&self, user_id: &UserId) -> Result<(), RemoteError> {
        self.check_write().await?;
        self.tables
            .write()
            .await
            .cart_items
            .retain(|row| &row.user_id != user_id);
        self.notify(Table::CartItems, Some(user_id.clone()));
        Ok(())
    }

    async fn count_cart_items(&self, user_id: &UserId) -> Result<u32, RemoteError> {
        self.check_read().await?;
        let tables = self.tables.read().await;
        Ok(tables
            .cart_items
            .iter()
            .filter(|row| &row.user_id == user_id)
            .fold(0_u32, |acc, row| acc.saturating_add(row.quantity)))
    }

    async fn wishlist(&self, user_id: &UserId) -> Result<Vec<WishlistEntry>, RemoteError> {
        self.check_read().await?;
        let entries: Vec<WishlistEntry> = {
            let tables = self.tables.read().await;
            tables
                .wishlist_items
                .iter()
                .filter(|(owner, _)| owner == user_id)
                .filter_map(|(_, product_id)| {
                    tables.product(product_id).map(Product::wishlist_entry)
                })
                .collect()
        };
        Ok(self.respond_after_latency(entries).await)
    }

    async fn insert_wishlist_item(
        &self,
        user_id: &UserId,
        product_id: &ProductId,
    ) -> Result<(), RemoteError> {
        self.check_write().await?;
        {
            let mut tables = self.tables.write().await;
            if tables.product(product_id).is_none() {
                return Err(RemoteError::DataCorruption(format!(
                    "wishlist item references unknown product {product_id}"
                )));
            }
            let exists = tables
                .wishlist_items
                .iter()
                .any(|(owner, id)| owner == user_id && id == product_id);
            if !exists {
                tables
                    .wishlist_items
                    .push((user_id.clone(), product_id.clone()));
            }
        }
        self.notify(Table::WishlistItems, Some(user_id.clone()));
        Ok(())
    }

    async fn delete_wishlist_item(
        &self,
        user_id: &UserId,
        product_id: &ProductId,
    ) -> Result<(), RemoteError> {
        self.check_write().await?;
        self.tables
            .write()
            .await
            .wishlist_items
            .retain(|(owner, id)| !(owner == user_id && id == product_id));
        self.notify(Table::WishlistItems, Some(user_id.clone()));
        Ok(())
    }

    async fn insert_order(&self, order: &Order) -> Result<(), RemoteError> {
        self.check_write().await?;
        {
            let mut tables = self.tables.write().await;
            if tables.orders.iter().any(|o| o.id == order.id) {
                return Err(RemoteError::DataCorruption(format!(
                    "duplicate order id {}",
                    order.id
                )));
            }
            tables.orders.insert(0, order.clone());
        }
        self.notify(Table::Orders, order.user_id.clone());
        Ok(())
    }

    async fn orders_for_user(&self, user_id: &UserId) -> Result<Vec<Order>, RemoteError> {
        self.check_read().await?;
        let tables = self.tables.read().await;
        Ok(tables
            .orders
            .iter()
            .filter(|o| o.user_id.as_ref() == Some(user_id))
            .cloned()
            .collect())
    }

    async fn all_orders(&self) -> Result<Vec<Order>, RemoteError> {
        self.check_read().await?;
        Ok(self.tables.read().await.orders.clone())
    }

    async fn update_order(&self, id: &OrderId, patch: &OrderPatch) -> Result<bool, RemoteError> {
        self.check_write().await?;
        let owner = {
            let mut tables = self.tables.write().await;
            let Some(order) = tables.orders.iter_mut().find(|o| &o.id == id) else {
                return Ok(false);
            };
            patch.apply(order);
            order.user_id.clone()
        };
        self.notify(Table::Orders, owner);
        Ok(true)
    }

    async fn profile(&self, user_id: &UserId) -> Result<Option<Profile>, RemoteError> {
        self.check_read().await?;
        Ok(self.tables.read().await.profiles.get(user_id).cloned())
    }

    async fn upsert_profile(&self, profile: &Profile) -> Result<(), RemoteError> {
        self.check_write().await?;
        self.tables
            .write()
            .await
            .profiles
            .insert(profile.id.clone(), profile.clone());
        self.notify(Table::Profiles, Some(profile.id.clone()));
        Ok(())
    }

    fn changes(&self) -> broadcast::Receiver<TableChange> {
        self.changes.subscribe()
    }
}
