//! Remote database collaborator for the remote-backed ledgers.
//!
//! # Tables (schema `loom`)
//!
//! - `profiles` - One row per signed-in customer
//! - `products` - Catalog, soft-deleted via `is_active`
//! - `cart_items` - `(user_id, product_id, size, color)` lines with a quantity
//! - `wishlist_items` - `(user_id, product_id)` pairs
//! - `orders` / `order_items` - Placed orders with prices captured at purchase
//!
//! Every write fires a [`TableChange`] on the change stream so caches and
//! other sessions can resync.
//!
//! # Migrations
//!
//! Migrations are stored in `crates/storefront/migrations/` and run via:
//! ```bash
//! cargo run -p loom-co-cli -- migrate
//! ```

mod memory;
mod postgres;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::broadcast;

use loom_co_core::{
    LineItem, LineKey, Order, OrderId, OrderPatch, Product, ProductId, UserId, WishlistEntry,
};

pub use memory::MemoryDatabase;
pub use postgres::{PgDatabase, create_pool};

/// Capacity of the change stream.
pub const CHANGE_CHANNEL_CAPACITY: usize = 256;

/// Errors from the remote database.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// The database could not be reached.
    #[error("remote database unavailable: {0}")]
    Unavailable(String),
}

/// Tables that publish change notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    Profiles,
    Products,
    CartItems,
    WishlistItems,
    Orders,
    OrderItems,
}

/// A row changed in `table`, owned by `user_id` where the table has one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableChange {
    pub table: Table,
    #[serde(default)]
    pub user_id: Option<UserId>,
}

impl TableChange {
    #[must_use]
    pub const fn new(table: Table, user_id: Option<UserId>) -> Self {
        Self { table, user_id }
    }

    /// A change every subscriber reloads for, sent when notifications may
    /// have been missed. Cart and wishlist rows are joined with products, so
    /// a `products` change makes every ledger resync.
    #[must_use]
    pub const fn missed_changes() -> Self {
        Self::new(Table::Products, None)
    }

    /// Whether this change concerns `table` rows owned by `user_id`.
    #[must_use]
    pub fn affects(&self, table: Table, user_id: &UserId) -> bool {
        self.table == table && self.user_id.as_ref() == Some(user_id)
    }
}

/// Customer profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: UserId,
    pub email: String,
    pub full_name: Option<String>,
    pub phone: Option<String>,
}

/// Query and command interface of the remote store.
///
/// Cart and wishlist rows only hold references; reads join them with
/// `products` and skip rows whose product no longer exists.
#[async_trait]
pub trait RemoteDatabase: Send + Sync {
    /// Active products, oldest first.
    async fn list_products(&self) -> Result<Vec<Product>, RemoteError>;

    /// A product by id, active or not.
    async fn get_product(&self, id: &ProductId) -> Result<Option<Product>, RemoteError>;

    /// Insert or replace a product and mark it active.
    async fn upsert_product(&self, product: &Product) -> Result<(), RemoteError>;

    /// Soft delete. Returns whether the product exists.
    async fn deactivate_product(&self, id: &ProductId) -> Result<bool, RemoteError>;

    /// Hard delete. Returns whether anything was deleted.
    async fn delete_product(&self, id: &ProductId) -> Result<bool, RemoteError>;

    /// The user's cart lines in insertion order.
    async fn cart_lines(&self, user_id: &UserId) -> Result<Vec<LineItem>, RemoteError>;

    /// Insert a line or overwrite its quantity.
    async fn upsert_cart_line(&self, user_id: &UserId, line: &LineItem) -> Result<(), RemoteError>;

    /// Delete one line. Deleting a missing line succeeds.
    async fn delete_cart_line(
        &self,
        user_id: &UserId,
        key: LineKey<'_>,
    ) -> Result<(), RemoteError>;

    /// Delete every line of the user's cart.
    async fn clear_cart(&self, user_id: &UserId) -> Result<(), RemoteError>;

    /// Sum of quantities in the user's cart.
    async fn count_cart_items(&self, user_id: &UserId) -> Result<u32, RemoteError>;

    /// The user's wishlist in insertion order.
    async fn wishlist(&self, user_id: &UserId) -> Result<Vec<WishlistEntry>, RemoteError>;

    /// Save a product. Saving it twice succeeds.
    async fn insert_wishlist_item(
        &self,
        user_id: &UserId,
        product_id: &ProductId,
    ) -> Result<(), RemoteError>;

    /// Unsave a product. Missing items succeed.
    async fn delete_wishlist_item(
        &self,
        user_id: &UserId,
        product_id: &ProductId,
    ) -> Result<(), RemoteError>;

    /// Store an order and its items atomically.
    async fn insert_order(&self, order: &Order) -> Result<(), RemoteError>;

    /// The user's orders, most recent first.
    async fn orders_for_user(&self, user_id: &UserId) -> Result<Vec<Order>, RemoteError>;

    /// Every order, most recent first.
    async fn all_orders(&self) -> Result<Vec<Order>, RemoteError>;

    /// Apply a patch. Returns whether the order exists.
    async fn update_order(&self, id: &OrderId, patch: &OrderPatch) -> Result<bool, RemoteError>;

    async fn profile(&self, user_id: &UserId) -> Result<Option<Profile>, RemoteError>;

    async fn upsert_profile(&self, profile: &Profile) -> Result<(), RemoteError>;

    /// Subscribe to row changes.
    fn changes(&self) -> broadcast::Receiver<TableChange>;
}
