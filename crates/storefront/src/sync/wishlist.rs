//! Remote-backed wishlist.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{instrument, warn};

use loom_co_core::{ProductId, UserId, Wishlist, WishlistEntry};

use super::{Resync, ResyncTask, SyncError, spawn_resync};
use crate::auth::{AuthAware, AuthUser};
use crate::remote::{RemoteDatabase, Table};

#[derive(Default)]
struct WishlistView {
    user_id: Option<UserId>,
    entries: Wishlist,
}

struct WishlistState {
    db: Arc<dyn RemoteDatabase>,
    view: RwLock<WishlistView>,
}

#[async_trait]
impl Resync for WishlistState {
    const TABLE: Table = Table::WishlistItems;

    async fn resync(&self, user_id: &UserId) -> Result<(), SyncError> {
        // Read under the write lock so a slow read never overwrites a newer write.
        let mut view = self.view.write().await;
        if view.user_id.as_ref() != Some(user_id) {
            return Ok(());
        }
        let entries = self
            .db
            .wishlist(user_id)
            .await
            .map_err(|e| SyncError::read_failed("wishlist", e))?;
        view.entries = Wishlist::from_entries(entries);
        Ok(())
    }
}

/// The signed-in user's wishlist, stored in `wishlist_items`.
pub struct RemoteWishlist {
    state: Arc<WishlistState>,
    resync: ResyncTask,
}

impl RemoteWishlist {
    /// Signed-out wishlist over `db`.
    #[must_use]
    pub fn new(db: Arc<dyn RemoteDatabase>) -> Self {
        Self {
            state: Arc::new(WishlistState {
                db,
                view: RwLock::new(WishlistView::default()),
            }),
            resync: ResyncTask::default(),
        }
    }

    pub async fn user_id(&self) -> Option<UserId> {
        self.state.view.read().await.user_id.clone()
    }

    pub async fn entries(&self) -> Vec<WishlistEntry> {
        self.state.view.read().await.entries.entries().to_vec()
    }

    pub async fn len(&self) -> usize {
        self.state.view.read().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.view.read().await.entries.is_empty()
    }

    pub async fn contains(&self, product_id: &ProductId) -> bool {
        self.state.view.read().await.entries.contains(product_id)
    }

    /// Reload the wishlist from the remote.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::NotAuthenticated` when signed out, or
    /// `SyncError::RemoteReadFailed` if the remote cannot be read.
    pub async fn refresh(&self) -> Result<(), SyncError> {
        let user_id = self.user_id().await.ok_or(SyncError::NotAuthenticated)?;
        self.state.resync(&user_id).await
    }

    /// Save a product.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::NotAuthenticated` when signed out, or
    /// `SyncError::RemoteWriteFailed` if the remote write fails; the
    /// wishlist is unchanged in both cases.
    #[instrument(skip(self, entry), fields(product_id = %entry.product_id))]
    pub async fn add(&self, entry: WishlistEntry) -> Result<(), SyncError> {
        let mut view = self.state.view.write().await;
        let user_id = view.user_id.clone().ok_or(SyncError::NotAuthenticated)?;
        self.state
            .db
            .insert_wishlist_item(&user_id, &entry.product_id)
            .await
            .map_err(|e| SyncError::write_failed("insert_wishlist_item", e))?;
        view.entries.upsert(entry);
        Ok(())
    }

    /// Unsave a product. Missing products are a no-op.
    ///
    /// # Errors
    ///
    /// See [`RemoteWishlist::add`].
    #[instrument(skip(self))]
    pub async fn remove(&self, product_id: &ProductId) -> Result<(), SyncError> {
        let mut view = self.state.view.write().await;
        let user_id = view.user_id.clone().ok_or(SyncError::NotAuthenticated)?;
        if !view.entries.contains(product_id) {
            return Ok(());
        }
        self.state
            .db
            .delete_wishlist_item(&user_id, product_id)
            .await
            .map_err(|e| SyncError::write_failed("delete_wishlist_item", e))?;
        view.entries.remove(product_id);
        Ok(())
    }
}

#[async_trait]
impl AuthAware for RemoteWishlist {
    async fn on_auth_change(&self, user: Option<AuthUser>) {
        self.resync.stop().await;
        {
            let mut view = self.state.view.write().await;
            view.user_id = user.as_ref().map(|u| u.id.clone());
            view.entries.clear();
        }
        let Some(user) = user else {
            return;
        };
        self.resync
            .replace(spawn_resync(self.state.clone(), &self.state.db, user.id.clone()))
            .await;
        if let Err(err) = self.state.resync(&user.id).await {
            warn!(error = %err, "Failed to load wishlist after sign-in");
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use loom_co_core::{Money, Product};

    use crate::remote::MemoryDatabase;

    fn product(id: &str) -> Product {
        Product {
            id: ProductId::from(id),
            name: format!("Product {id}"),
            description: String::new(),
            price: Money::from_pence(4500),
            original_price: Some(Money::from_pence(6000)),
            discount: Some(25),
            images: vec!["/a.jpg".to_string()],
            rating: 0.0,
            review_count: 0,
            colors: Vec::new(),
            sizes: Vec::new(),
            features: Vec::new(),
            is_new: None,
            category: "knitwear".to_string(),
        }
    }

    fn ada() -> AuthUser {
        AuthUser {
            id: UserId::from("user-ada"),
            email: "ada@example.com".to_string(),
        }
    }

    #[tokio::test]
    async fn test_add_remove_round_trip() {
        let db = Arc::new(MemoryDatabase::new());
        db.upsert_product(&product("1")).await.unwrap();
        let wishlist = RemoteWishlist::new(db.clone());
        wishlist.on_auth_change(Some(ada())).await;

        wishlist.add(product("1").wishlist_entry()).await.unwrap();
        wishlist.add(product("1").wishlist_entry()).await.unwrap();
        assert_eq!(wishlist.len().await, 1);
        assert_eq!(db.wishlist(&ada().id).await.unwrap().len(), 1);

        wishlist.remove(&ProductId::from("1")).await.unwrap();
        assert!(wishlist.is_empty().await);
        wishlist.remove(&ProductId::from("1")).await.unwrap();
    }

    #[tokio::test]
    async fn test_signed_out_is_rejected() {
        let db = Arc::new(MemoryDatabase::new());
        let wishlist = RemoteWishlist::new(db);
        assert!(matches!(
            wishlist.add(product("1").wishlist_entry()).await,
            Err(SyncError::NotAuthenticated)
        ));
    }

    #[tokio::test]
    async fn test_failed_write_leaves_wishlist_unchanged() {
        let db = Arc::new(MemoryDatabase::new());
        db.upsert_product(&product("1")).await.unwrap();
        let wishlist = RemoteWishlist::new(db.clone());
        wishlist.on_auth_change(Some(ada())).await;

        db.set_fail_on_write(true).await;
        assert!(matches!(
            wishlist.add(product("1").wishlist_entry()).await,
            Err(SyncError::RemoteWriteFailed(_))
        ));
        assert!(!wishlist.contains(&ProductId::from("1")).await);
    }
}
