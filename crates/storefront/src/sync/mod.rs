//! Remote-backed ledgers.
//!
//! Each ledger mirrors the signed-in user's rows from a [`RemoteDatabase`].
//! Writes go to the remote first and are applied to the in-memory view only
//! once they succeed, so a failed write leaves the view unchanged. While a
//! user is signed in, a background task resyncs the view whenever the change
//! stream reports a write to that user's rows. Signing out clears the view
//! and stops the task in one step.

mod cart;
mod catalog;
mod orders;
mod wishlist;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::{Mutex, broadcast};
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use loom_co_core::{ProductId, UserId};

use crate::remote::{RemoteDatabase, RemoteError, Table};

pub use cart::RemoteCart;
pub use catalog::RemoteCatalog;
pub use orders::RemoteOrders;
pub use wishlist::RemoteWishlist;

/// Errors from remote-backed ledgers.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The operation needs a signed-in user.
    #[error("not signed in")]
    NotAuthenticated,

    /// The remote rejected or never received the write; nothing changed.
    #[error("remote write failed: {0}")]
    RemoteWriteFailed(#[source] RemoteError),

    /// The remote could not be read.
    #[error("remote read failed: {0}")]
    RemoteReadFailed(#[source] RemoteError),

    #[error("cannot check out an empty cart")]
    EmptyCart,

    #[error("product {0} is part of the built-in catalog and cannot be changed")]
    SeedProduct(ProductId),
}

impl SyncError {
    fn write_failed(operation: &'static str, err: RemoteError) -> Self {
        error!(operation, error = %err, "Remote write failed");
        Self::RemoteWriteFailed(err)
    }

    fn read_failed(operation: &'static str, err: RemoteError) -> Self {
        warn!(operation, error = %err, "Remote read failed");
        Self::RemoteReadFailed(err)
    }
}

/// Ledger state that can be reloaded for a user from the remote.
#[async_trait]
trait Resync: Send + Sync + 'static {
    /// Table holding the user's rows.
    const TABLE: Table;

    /// Reload the user's rows, if they are still the signed-in user.
    async fn resync(&self, user_id: &UserId) -> Result<(), SyncError>;
}

/// Handle of the background resync task of the signed-in user.
#[derive(Default)]
struct ResyncTask(Mutex<Option<JoinHandle<()>>>);

impl ResyncTask {
    async fn replace(&self, handle: JoinHandle<()>) {
        if let Some(previous) = self.0.lock().await.replace(handle) {
            previous.abort();
        }
    }

    async fn stop(&self) {
        if let Some(handle) = self.0.lock().await.take() {
            handle.abort();
        }
    }
}

impl Drop for ResyncTask {
    fn drop(&mut self) {
        if let Some(handle) = self.0.get_mut().take() {
            handle.abort();
        }
    }
}

/// Resync `state` for `user_id` on every change to its table or to
/// products (cart and wishlist rows are joined with products).
fn spawn_resync<T: Resync>(
    state: Arc<T>,
    db: &Arc<dyn RemoteDatabase>,
    user_id: UserId,
) -> JoinHandle<()> {
    let mut changes = db.changes();
    tokio::spawn(async move {
        loop {
            let stale = match changes.recv().await {
                Ok(change) => change.table == Table::Products || change.affects(T::TABLE, &user_id),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, table = ?T::TABLE, "Change stream lagged, resyncing");
                    true
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!(table = ?T::TABLE, "Change stream closed");
                    break;
                }
            };
            if stale && let Err(err) = state.resync(&user_id).await {
                warn!(error = %err, table = ?T::TABLE, "Background resync failed");
            }
        }
    })
}
