//! Remote-backed cart.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{info, instrument, warn};

use loom_co_core::{CartLines, LineItem, LineKey, Money, NewLineItem, ProductId, UserId};

use super::{Resync, ResyncTask, SyncError, spawn_resync};
use crate::auth::{AuthAware, AuthUser};
use crate::remote::{RemoteDatabase, Table};

#[derive(Default)]
struct CartView {
    user_id: Option<UserId>,
    lines: CartLines,
}

struct CartState {
    db: Arc<dyn RemoteDatabase>,
    view: RwLock<CartView>,
}

#[async_trait]
impl Resync for CartState {
    const TABLE: Table = Table::CartItems;

    async fn resync(&self, user_id: &UserId) -> Result<(), SyncError> {
        // Read under the write lock so a slow read never overwrites a newer write.
        let mut view = self.view.write().await;
        if view.user_id.as_ref() != Some(user_id) {
            return Ok(());
        }
        let lines = self
            .db
            .cart_lines(user_id)
            .await
            .map_err(|e| SyncError::read_failed("cart_lines", e))?;
        view.lines = CartLines::from_lines(lines);
        Ok(())
    }
}

/// The signed-in user's cart, stored in `cart_items`.
pub struct RemoteCart {
    state: Arc<CartState>,
    resync: ResyncTask,
}

impl RemoteCart {
    /// Signed-out cart over `db`.
    #[must_use]
    pub fn new(db: Arc<dyn RemoteDatabase>) -> Self {
        Self {
            state: Arc::new(CartState {
                db,
                view: RwLock::new(CartView::default()),
            }),
            resync: ResyncTask::default(),
        }
    }

    /// The signed-in user, if any.
    pub async fn user_id(&self) -> Option<UserId> {
        self.state.view.read().await.user_id.clone()
    }

    pub async fn items(&self) -> Vec<LineItem> {
        self.state.view.read().await.lines.lines().to_vec()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.view.read().await.lines.is_empty()
    }

    pub async fn total_items(&self) -> u32 {
        self.state.view.read().await.lines.total_items()
    }

    pub async fn total_price(&self) -> Money {
        self.state.view.read().await.lines.total_price()
    }

    /// Reload the cart from the remote.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::NotAuthenticated` when signed out, or
    /// `SyncError::RemoteReadFailed` if the remote cannot be read.
    pub async fn refresh(&self) -> Result<(), SyncError> {
        let user_id = self.user_id().await.ok_or(SyncError::NotAuthenticated)?;
        self.state.resync(&user_id).await
    }

    /// Add one unit of `item`.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::NotAuthenticated` when signed out, or
    /// `SyncError::RemoteWriteFailed` if the remote write fails; the cart is
    /// unchanged in both cases.
    #[instrument(skip(self, item), fields(product_id = %item.product_id, size = %item.size, color = %item.color))]
    pub async fn add_item(&self, item: NewLineItem) -> Result<(), SyncError> {
        let mut view = self.state.view.write().await;
        let user_id = view.user_id.clone().ok_or(SyncError::NotAuthenticated)?;
        let line = item.clone().with_quantity(view.lines.quantity_after_add(&item));
        self.state
            .db
            .upsert_cart_line(&user_id, &line)
            .await
            .map_err(|e| SyncError::write_failed("upsert_cart_line", e))?;
        view.lines.add(item);
        Ok(())
    }

    /// Remove the matching line. Missing lines are a no-op.
    ///
    /// # Errors
    ///
    /// See [`RemoteCart::add_item`].
    #[instrument(skip(self))]
    pub async fn remove_item(
        &self,
        product_id: &ProductId,
        size: &str,
        color: &str,
    ) -> Result<(), SyncError> {
        let mut view = self.state.view.write().await;
        let user_id = view.user_id.clone().ok_or(SyncError::NotAuthenticated)?;
        let key = LineKey::new(product_id, size, color);
        if view.lines.get(key).is_none() {
            return Ok(());
        }
        self.state
            .db
            .delete_cart_line(&user_id, key)
            .await
            .map_err(|e| SyncError::write_failed("delete_cart_line", e))?;
        view.lines.remove(key);
        Ok(())
    }

    /// Overwrite a line's quantity; `quantity <= 0` removes it. Unknown
    /// lines are a no-op.
    ///
    /// # Errors
    ///
    /// See [`RemoteCart::add_item`].
    #[instrument(skip(self))]
    pub async fn set_quantity(
        &self,
        product_id: &ProductId,
        size: &str,
        color: &str,
        quantity: i64,
    ) -> Result<(), SyncError> {
        let Ok(quantity @ 1..) = u32::try_from(quantity) else {
            return self.remove_item(product_id, size, color).await;
        };
        let mut view = self.state.view.write().await;
        let user_id = view.user_id.clone().ok_or(SyncError::NotAuthenticated)?;
        let key = LineKey::new(product_id, size, color);
        let Some(existing) = view.lines.get(key) else {
            return Ok(());
        };
        let mut line = existing.clone();
        line.quantity = quantity;
        self.state
            .db
            .upsert_cart_line(&user_id, &line)
            .await
            .map_err(|e| SyncError::write_failed("upsert_cart_line", e))?;
        view.lines.set_quantity(key, i64::from(quantity));
        Ok(())
    }

    /// Empty the cart.
    ///
    /// # Errors
    ///
    /// See [`RemoteCart::add_item`].
    #[instrument(skip(self))]
    pub async fn clear(&self) -> Result<(), SyncError> {
        let mut view = self.state.view.write().await;
        let user_id = view.user_id.clone().ok_or(SyncError::NotAuthenticated)?;
        self.state
            .db
            .clear_cart(&user_id)
            .await
            .map_err(|e| SyncError::write_failed("clear_cart", e))?;
        view.lines.clear();
        Ok(())
    }

    /// Fold a guest cart into the signed-in cart, adding quantities of
    /// matching lines.
    ///
    /// Lines are merged one at a time; on failure, lines merged so far stay
    /// merged and the rest are left out.
    ///
    /// # Errors
    ///
    /// See [`RemoteCart::add_item`].
    #[instrument(skip(self, guest_lines), fields(lines = guest_lines.len()))]
    pub async fn merge_guest(&self, guest_lines: &[LineItem]) -> Result<(), SyncError> {
        let mut view = self.state.view.write().await;
        let user_id = view.user_id.clone().ok_or(SyncError::NotAuthenticated)?;
        for guest in guest_lines.iter().filter(|line| line.quantity > 0) {
            let mut merged = guest.clone();
            if let Some(existing) = view.lines.get(guest.key()) {
                merged.quantity = existing.quantity.saturating_add(guest.quantity);
            }
            self.state
                .db
                .upsert_cart_line(&user_id, &merged)
                .await
                .map_err(|e| SyncError::write_failed("upsert_cart_line", e))?;
            view.lines.add_quantity(guest.clone());
        }
        info!(user_id = %user_id, "Guest cart merged");
        Ok(())
    }
}

#[async_trait]
impl AuthAware for RemoteCart {
    async fn on_auth_change(&self, user: Option<AuthUser>) {
        self.resync.stop().await;
        {
            let mut view = self.state.view.write().await;
            view.user_id = user.as_ref().map(|u| u.id.clone());
            view.lines.clear();
        }
        let Some(user) = user else {
            return;
        };
        self.resync
            .replace(spawn_resync(self.state.clone(), &self.state.db, user.id.clone()))
            .await;
        if let Err(err) = self.state.resync(&user.id).await {
            warn!(error = %err, "Failed to load cart after sign-in");
        }
    }
}
