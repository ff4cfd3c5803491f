//! `PostgreSQL` implementation of [`RemoteDatabase`].
//!
//! Queries are built at runtime against the `loom` schema created by the
//! migrations. Row changes arrive through `LISTEN loom_changes`, fed by the
//! `loom.notify_change()` trigger on every table.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use sqlx::postgres::{PgListener, PgPoolOptions};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use loom_co_core::{
    ColorOption, LineItem, LineKey, Money, Order, OrderId, OrderItem, OrderPatch, OrderStatus,
    PLACEHOLDER_IMAGE, PaymentStatus, Product, ProductId, ShippingAddress, UserId, WishlistEntry,
};

use super::{CHANGE_CHANNEL_CAPACITY, Profile, RemoteDatabase, RemoteError, TableChange};

/// Notification channel the triggers publish on.
pub const CHANGE_CHANNEL: &str = "loom_changes";

/// Pause before retrying after the listener failed to reconnect.
const LISTENER_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(1)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

const PRODUCT_COLUMNS: &str = "id, name, description, price, original_price, discount, images, \
     rating, review_count, colors, sizes, features, is_new, category";

const ORDER_COLUMNS: &str = "id, user_id, customer_name, email, phone, shipping_address, \
     subtotal, shipping_cost, tax, total_amount, status, payment_status, tracking_number, created_at";

#[derive(FromRow)]
struct ProductRow {
    id: String,
    name: String,
    description: String,
    price: Decimal,
    original_price: Option<Decimal>,
    discount: Option<i16>,
    images: Vec<String>,
    rating: f64,
    review_count: i32,
    colors: Json<Vec<ColorOption>>,
    sizes: Vec<String>,
    features: Vec<String>,
    is_new: bool,
    category: String,
}

impl TryFrom<ProductRow> for Product {
    type Error = RemoteError;

    fn try_from(row: ProductRow) -> Result<Self, Self::Error> {
        let discount = row
            .discount
            .map(u8::try_from)
            .transpose()
            .map_err(|e| RemoteError::DataCorruption(format!("invalid discount for {}: {e}", row.id)))?;
        let review_count = u32::try_from(row.review_count).map_err(|e| {
            RemoteError::DataCorruption(format!("invalid review count for {}: {e}", row.id))
        })?;
        Ok(Self {
            id: ProductId::new(row.id),
            name: row.name,
            description: row.description,
            price: Money::new(row.price),
            original_price: row.original_price.map(Money::new),
            discount,
            images: row.images,
            rating: row.rating,
            review_count,
            colors: row.colors.0,
            sizes: row.sizes,
            features: row.features,
            is_new: row.is_new.then_some(true),
            category: row.category,
        }
        .normalized())
    }
}

#[derive(FromRow)]
struct CartRow {
    product_id: String,
    name: String,
    price: Decimal,
    images: Vec<String>,
    size: String,
    color: String,
    quantity: i32,
}

impl TryFrom<CartRow> for LineItem {
    type Error = RemoteError;

    fn try_from(row: CartRow) -> Result<Self, Self::Error> {
        let quantity = u32::try_from(row.quantity).map_err(|e| {
            RemoteError::DataCorruption(format!("invalid cart quantity for {}: {e}", row.product_id))
        })?;
        Ok(Self {
            product_id: ProductId::new(row.product_id),
            name: row.name,
            price: Money::new(row.price),
            image: first_image(row.images),
            size: row.size,
            color: row.color,
            quantity,
        })
    }
}

#[derive(FromRow)]
struct WishlistRow {
    id: String,
    name: String,
    price: Decimal,
    images: Vec<String>,
    original_price: Option<Decimal>,
    discount: Option<i16>,
}

impl TryFrom<WishlistRow> for WishlistEntry {
    type Error = RemoteError;

    fn try_from(row: WishlistRow) -> Result<Self, Self::Error> {
        let discount = row
            .discount
            .map(u8::try_from)
            .transpose()
            .map_err(|e| RemoteError::DataCorruption(format!("invalid discount for {}: {e}", row.id)))?;
        Ok(Self {
            product_id: ProductId::new(row.id),
            name: row.name,
            price: Money::new(row.price),
            image: first_image(row.images),
            original_price: row.original_price.map(Money::new),
            discount,
        })
    }
}

#[derive(FromRow)]
struct OrderRow {
    id: String,
    user_id: Option<String>,
    customer_name: String,
    email: String,
    phone: Option<String>,
    shipping_address: Option<Json<ShippingAddress>>,
    subtotal: Option<Decimal>,
    shipping_cost: Option<Decimal>,
    tax: Option<Decimal>,
    total_amount: Decimal,
    status: OrderStatus,
    payment_status: PaymentStatus,
    tracking_number: Option<String>,
    created_at: DateTime<Utc>,
}

impl OrderRow {
    fn into_order(self, items: Vec<OrderItem>) -> Order {
        Order {
            id: OrderId::new(self.id),
            date: self.created_at,
            status: self.status,
            total: Money::new(self.total_amount),
            items,
            customer: self.customer_name,
            email: self.email,
            shipping_address: self.shipping_address.map(|json| json.0),
            phone: self.phone,
            subtotal: self.subtotal.map(Money::new),
            shipping_cost: self.shipping_cost.map(Money::new),
            tax: self.tax.map(Money::new),
            user_id: self.user_id.map(UserId::new),
            payment_status: self.payment_status,
            tracking_number: self.tracking_number,
        }
    }
}

#[derive(FromRow)]
struct OrderItemRow {
    order_id: String,
    product_id: String,
    product_name: String,
    product_image: String,
    price: Decimal,
    size: String,
    color: String,
    quantity: i32,
}

#[derive(FromRow)]
struct ProfileRow {
    id: String,
    email: String,
    full_name: Option<String>,
    phone: Option<String>,
}

fn first_image(images: Vec<String>) -> String {
    images
        .into_iter()
        .find(|url| !url.trim().is_empty())
        .unwrap_or_else(|| PLACEHOLDER_IMAGE.to_string())
}

fn to_i32(value: u32, what: &str) -> Result<i32, RemoteError> {
    i32::try_from(value).map_err(|e| RemoteError::DataCorruption(format!("{what} out of range: {e}")))
}

/// Remote database over a `PostgreSQL` pool.
pub struct PgDatabase {
    pool: PgPool,
    changes: broadcast::Sender<TableChange>,
    listener: JoinHandle<()>,
}

impl PgDatabase {
    /// Connect and start listening for row changes.
    ///
    /// # Errors
    ///
    /// Returns `RemoteError::Database` if the pool or listener cannot connect.
    pub async fn connect(database_url: &SecretString) -> Result<Self, RemoteError> {
        let pool = create_pool(database_url).await?;
        Self::with_pool(pool).await
    }

    /// Wrap an existing pool and start listening for row changes.
    ///
    /// # Errors
    ///
    /// Returns `RemoteError::Database` if the listener cannot connect.
    pub async fn with_pool(pool: PgPool) -> Result<Self, RemoteError> {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        let mut listener = PgListener::connect_with(&pool).await?;
        listener.listen(CHANGE_CHANNEL).await?;
        info!(channel = CHANGE_CHANNEL, "Listening for row changes");

        let listener = tokio::spawn(forward_changes(listener, changes.clone()));
        Ok(Self {
            pool,
            changes,
            listener,
        })
    }

    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn load_orders(&self, rows: Vec<OrderRow>) -> Result<Vec<Order>, RemoteError> {
        let ids: Vec<String> = rows.iter().map(|row| row.id.clone()).collect();
        let item_rows: Vec<OrderItemRow> = sqlx::query_as(
            "SELECT order_id, product_id, product_name, product_image, price, size, color, quantity \
             FROM loom.order_items WHERE order_id = ANY($1) ORDER BY id",
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        let mut items: HashMap<String, Vec<OrderItem>> = HashMap::new();
        for row in item_rows {
            let quantity = u32::try_from(row.quantity).map_err(|e| {
                RemoteError::DataCorruption(format!("invalid quantity in order {}: {e}", row.order_id))
            })?;
            items.entry(row.order_id).or_default().push(OrderItem {
                product_id: ProductId::new(row.product_id),
                name: row.product_name,
                price: Money::new(row.price),
                image: row.product_image,
                size: row.size,
                color: row.color,
                quantity,
            });
        }

        Ok(rows
            .into_iter()
            .map(|row| {
                let order_items = items.remove(&row.id).unwrap_or_default();
                row.into_order(order_items)
            })
            .collect())
    }
}

impl Drop for PgDatabase {
    fn drop(&mut self) {
        self.listener.abort();
    }
}

async fn forward_changes(mut listener: PgListener, sender: broadcast::Sender<TableChange>) {
    loop {
        match listener.try_recv().await {
            Ok(Some(notification)) => {
                match serde_json::from_str::<TableChange>(notification.payload()) {
                    Ok(change) => {
                        debug!(table = ?change.table, "Row change");
                        // No subscribers is fine.
                        let _ = sender.send(change);
                    }
                    Err(err) => {
                        warn!(error = %err, payload = notification.payload(), "Ignoring malformed change notification");
                    }
                }
            }
            // The next `try_recv` reconnects and listens again.
            Ok(None) => {
                warn!("Change listener lost its connection, reloading subscribers");
                let _ = sender.send(TableChange::missed_changes());
            }
            Err(err) => {
                error!(error = %err, "Change listener failed to reconnect");
                let _ = sender.send(TableChange::missed_changes());
                tokio::time::sleep(LISTENER_RETRY_DELAY).await;
            }
        }
    }
}

#[async_trait]
impl RemoteDatabase for PgDatabase {
    #[instrument(skip(self))]
    async fn list_products(&self) -> Result<Vec<Product>, RemoteError> {
        let rows: Vec<ProductRow> = sqlx::query_as(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM loom.products WHERE is_active ORDER BY created_at, id"
        ))
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Product::try_from).collect()
    }

    #[instrument(skip(self))]
    async fn get_product(&self, id: &ProductId) -> Result<Option<Product>, RemoteError> {
        let row: Option<ProductRow> = sqlx::query_as(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM loom.products WHERE id = $1"
        ))
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await?;
        row.map(Product::try_from).transpose()
    }

    #[instrument(skip(self, product), fields(product_id = %product.id))]
    async fn upsert_product(&self, product: &Product) -> Result<(), RemoteError> {
        let review_count = to_i32(product.review_count, "review count")?;
        sqlx::query(
            r"
            INSERT INTO loom.products
                (id, name, description, price, original_price, discount, images,
                 rating, review_count, colors, sizes, features, is_new, category, is_active)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, TRUE)
            ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name,
                description = EXCLUDED.description,
                price = EXCLUDED.price,
                original_price = EXCLUDED.original_price,
                discount = EXCLUDED.discount,
                images = EXCLUDED.images,
                rating = EXCLUDED.rating,
                review_count = EXCLUDED.review_count,
                colors = EXCLUDED.colors,
                sizes = EXCLUDED.sizes,
                features = EXCLUDED.features,
                is_new = EXCLUDED.is_new,
                category = EXCLUDED.category,
                is_active = TRUE,
                updated_at = now()
            ",
        )
        .bind(product.id.as_str())
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.price.amount())
        .bind(product.original_price.map(|m| m.amount()))
        .bind(product.discount.map(i16::from))
        .bind(&product.images)
        .bind(product.rating)
        .bind(review_count)
        .bind(Json(&product.colors))
        .bind(&product.sizes)
        .bind(&product.features)
        .bind(product.is_new.unwrap_or(false))
        .bind(&product.category)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn deactivate_product(&self, id: &ProductId) -> Result<bool, RemoteError> {
        let result = sqlx::query(
            "UPDATE loom.products SET is_active = FALSE, updated_at = now() WHERE id = $1",
        )
        .bind(id.as_str())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self))]
    async fn delete_product(&self, id: &ProductId) -> Result<bool, RemoteError> {
        let result = sqlx::query("DELETE FROM loom.products WHERE id = $1")
            .bind(id.as_str())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self))]
    async fn cart_lines(&self, user_id: &UserId) -> Result<Vec<LineItem>, RemoteError> {
        let rows: Vec<CartRow> = sqlx::query_as(
            r"
            SELECT c.product_id, p.name, p.price, p.images, c.size, c.color, c.quantity
            FROM loom.cart_items c
            JOIN loom.products p ON p.id = c.product_id
            WHERE c.user_id = $1
            ORDER BY c.created_at, c.id
            ",
        )
        .bind(user_id.as_str())
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(LineItem::try_from).collect()
    }

    #[instrument(skip(self, line), fields(product_id = %line.product_id, size = %line.size, color = %line.color))]
    async fn upsert_cart_line(&self, user_id: &UserId, line: &LineItem) -> Result<(), RemoteError> {
        let quantity = to_i32(line.quantity, "cart quantity")?;
        sqlx::query(
            r"
            INSERT INTO loom.cart_items (user_id, product_id, size, color, quantity)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (user_id, product_id, size, color)
            DO UPDATE SET quantity = EXCLUDED.quantity, updated_at = now()
            ",
        )
        .bind(user_id.as_str())
        .bind(line.product_id.as_str())
        .bind(&line.size)
        .bind(&line.color)
        .bind(quantity)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    #[instrument(skip(self, key), fields(product_id = %key.product_id, size = key.size, color = key.color))]
    async fn delete_cart_line(
        &self,
        user_id: &UserId,
        key: LineKey<'_>,
    ) -> Result<(), RemoteError> {
        sqlx::query(
            "DELETE FROM loom.cart_items \
             WHERE user_id = $1 AND product_id = $2 AND size = $3 AND color = $4",
        )
        .bind(user_id.as_str())
        .bind(key.product_id.as_str())
        .bind(key.size)
        .bind(key.color)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn clear_cart(&self, user_id: &UserId) -> Result<(), RemoteError> {
        sqlx::query("DELETE FROM loom.cart_items WHERE user_id = $1")
            .bind(user_id.as_str())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn count_cart_items(&self, user_id: &UserId) -> Result<u32, RemoteError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(quantity), 0)::BIGINT FROM loom.cart_items WHERE user_id = $1",
        )
        .bind(user_id.as_str())
        .fetch_one(&self.pool)
        .await?;
        u32::try_from(count)
            .map_err(|e| RemoteError::DataCorruption(format!("invalid cart item count: {e}")))
    }

    #[instrument(skip(self))]
    async fn wishlist(&self, user_id: &UserId) -> Result<Vec<WishlistEntry>, RemoteError> {
        let rows: Vec<WishlistRow> = sqlx::query_as(
            r"
            SELECT p.id, p.name, p.price, p.images, p.original_price, p.discount
            FROM loom.wishlist_items w
            JOIN loom.products p ON p.id = w.product_id
            WHERE w.user_id = $1
            ORDER BY w.created_at, w.id
            ",
        )
        .bind(user_id.as_str())
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(WishlistEntry::try_from).collect()
    }

    #[instrument(skip(self))]
    async fn insert_wishlist_item(
        &self,
        user_id: &UserId,
        product_id: &ProductId,
    ) -> Result<(), RemoteError> {
        sqlx::query(
            "INSERT INTO loom.wishlist_items (user_id, product_id) VALUES ($1, $2) \
             ON CONFLICT (user_id, product_id) DO NOTHING",
        )
        .bind(user_id.as_str())
        .bind(product_id.as_str())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete_wishlist_item(
        &self,
        user_id: &UserId,
        product_id: &ProductId,
    ) -> Result<(), RemoteError> {
        sqlx::query("DELETE FROM loom.wishlist_items WHERE user_id = $1 AND product_id = $2")
            .bind(user_id.as_str())
            .bind(product_id.as_str())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    #[instrument(skip(self, order), fields(order_id = %order.id))]
    async fn insert_order(&self, order: &Order) -> Result<(), RemoteError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r"
            INSERT INTO loom.orders
                (id, user_id, customer_name, email, phone, shipping_address,
                 subtotal, shipping_cost, tax, total_amount, status, payment_status,
                 tracking_number, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            ",
        )
        .bind(order.id.as_str())
        .bind(order.user_id.as_ref().map(UserId::as_str))
        .bind(&order.customer)
        .bind(&order.email)
        .bind(order.phone.as_deref())
        .bind(order.shipping_address.as_ref().map(Json))
        .bind(order.subtotal.map(|m| m.amount()))
        .bind(order.shipping_cost.map(|m| m.amount()))
        .bind(order.tax.map(|m| m.amount()))
        .bind(order.total.amount())
        .bind(order.status)
        .bind(order.payment_status)
        .bind(order.tracking_number.as_deref())
        .bind(order.date)
        .execute(&mut *tx)
        .await?;

        for item in &order.items {
            let quantity = to_i32(item.quantity, "order quantity")?;
            sqlx::query(
                r"
                INSERT INTO loom.order_items
                    (order_id, product_id, product_name, product_image, price, size, color, quantity)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                ",
            )
            .bind(order.id.as_str())
            .bind(item.product_id.as_str())
            .bind(&item.name)
            .bind(&item.image)
            .bind(item.price.amount())
            .bind(&item.size)
            .bind(&item.color)
            .bind(quantity)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn orders_for_user(&self, user_id: &UserId) -> Result<Vec<Order>, RemoteError> {
        let rows: Vec<OrderRow> = sqlx::query_as(&format!(
            "SELECT {ORDER_COLUMNS} FROM loom.orders WHERE user_id = $1 ORDER BY created_at DESC, id DESC"
        ))
        .bind(user_id.as_str())
        .fetch_all(&self.pool)
        .await?;
        self.load_orders(rows).await
    }

    #[instrument(skip(self))]
    async fn all_orders(&self) -> Result<Vec<Order>, RemoteError> {
        let rows: Vec<OrderRow> = sqlx::query_as(&format!(
            "SELECT {ORDER_COLUMNS} FROM loom.orders ORDER BY created_at DESC, id DESC"
        ))
        .fetch_all(&self.pool)
        .await?;
        self.load_orders(rows).await
    }

    #[instrument(skip(self, patch))]
    async fn update_order(&self, id: &OrderId, patch: &OrderPatch) -> Result<bool, RemoteError> {
        let result = sqlx::query(
            r"
            UPDATE loom.orders SET
                status = COALESCE($2, status),
                payment_status = COALESCE($3, payment_status),
                tracking_number = COALESCE($4, tracking_number),
                shipping_address = COALESCE($5, shipping_address),
                phone = COALESCE($6, phone),
                updated_at = now()
            WHERE id = $1
            ",
        )
        .bind(id.as_str())
        .bind(patch.status)
        .bind(patch.payment_status)
        .bind(patch.tracking_number.as_deref())
        .bind(patch.shipping_address.as_ref().map(Json))
        .bind(patch.phone.as_deref())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self))]
    async fn profile(&self, user_id: &UserId) -> Result<Option<Profile>, RemoteError> {
        let row: Option<ProfileRow> = sqlx::query_as(
            "SELECT id, email, full_name, phone FROM loom.profiles WHERE id = $1",
        )
        .bind(user_id.as_str())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|r| Profile {
            id: UserId::new(r.id),
            email: r.email,
            full_name: r.full_name,
            phone: r.phone,
        }))
    }

    #[instrument(skip(self, profile), fields(user_id = %profile.id))]
    async fn upsert_profile(&self, profile: &Profile) -> Result<(), RemoteError> {
        sqlx::query(
            r"
            INSERT INTO loom.profiles (id, email, full_name, phone)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (id) DO UPDATE SET
                email = EXCLUDED.email,
                full_name = EXCLUDED.full_name,
                phone = EXCLUDED.phone,
                updated_at = now()
            ",
        )
        .bind(profile.id.as_str())
        .bind(&profile.email)
        .bind(profile.full_name.as_deref())
        .bind(profile.phone.as_deref())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    fn changes(&self) -> broadcast::Receiver<TableChange> {
        self.changes.subscribe()
    }
}
