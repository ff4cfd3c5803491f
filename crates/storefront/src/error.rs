//! Unified error handling.
//!
//! Every ledger returns its own error type. `AppError` gathers them for the
//! outer surfaces, which show [`AppError::user_message`] as a non-blocking
//! notice and log the detail with [`AppError::report`].

use thiserror::Error;
use tracing::{error, warn};

use crate::config::ConfigError;
use crate::ledger::{CartError, CatalogError, OrderError, WishlistError};
use crate::remote::RemoteError;
use crate::store::StorageError;
use crate::sync::SyncError;

/// Application-level error type for the storefront.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Cart error: {0}")]
    Cart(#[from] CartError),

    #[error("Wishlist error: {0}")]
    Wishlist(#[from] WishlistError),

    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("Order error: {0}")]
    Order(#[from] OrderError),

    #[error("Remote error: {0}")]
    Remote(#[from] RemoteError),

    #[error("Sync error: {0}")]
    Sync(#[from] SyncError),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Bad input from the caller.
    #[error("Bad request: {0}")]
    BadRequest(String),
}

const SAVE_FAILED: &str = "We couldn't save your changes. Please try again.";
const LOAD_FAILED: &str = "We couldn't load the latest data. Please try again.";

impl AppError {
    /// Message safe to show the customer. Internal detail is never included.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Config(_) => "The storefront is not configured correctly.".to_string(),
            Self::Order(OrderError::Storage(err)) if err.is_quota() => {
                "Your order could not be saved because storage is full.".to_string()
            }
            Self::Storage(err)
            | Self::Wishlist(WishlistError::Storage(err))
            | Self::Cart(CartError::Storage(err))
            | Self::Catalog(CatalogError::Storage(err))
            | Self::Order(OrderError::Storage(err)) => storage_message(err).to_string(),
            Self::Cart(CartError::NotSaved(_)) => {
                "Your cart could not be saved because storage is full, so it has been emptied."
                    .to_string()
            }
            Self::Catalog(CatalogError::DuplicateId(id)) => {
                format!("A product with id {id} already exists.")
            }
            Self::Catalog(CatalogError::SeedProduct(_))
            | Self::Sync(SyncError::SeedProduct(_)) => {
                "Built-in products cannot be changed.".to_string()
            }
            Self::Order(OrderError::EmptyCart) | Self::Sync(SyncError::EmptyCart) => {
                "Your cart is empty.".to_string()
            }
            Self::Order(OrderError::DuplicateId(_)) => {
                "Your order could not be placed. Please try again.".to_string()
            }
            Self::Sync(SyncError::NotAuthenticated) => "Please sign in to continue.".to_string(),
            Self::Sync(SyncError::RemoteWriteFailed(_)) => SAVE_FAILED.to_string(),
            Self::Sync(SyncError::RemoteReadFailed(_)) | Self::Remote(_) => LOAD_FAILED.to_string(),
            Self::NotFound(what) => format!("{what} not found."),
            Self::BadRequest(msg) => msg.clone(),
        }
    }

    /// Whether this is a fault of the system rather than of the request.
    #[must_use]
    pub const fn is_internal(&self) -> bool {
        matches!(
            self,
            Self::Config(_)
                | Self::Remote(_)
                | Self::Sync(SyncError::RemoteWriteFailed(_) | SyncError::RemoteReadFailed(_))
                | Self::Order(OrderError::Storage(_))
                | Self::Cart(CartError::Storage(_))
        )
    }

    /// Log this error at a level matching its severity.
    pub fn report(&self) {
        if self.is_internal() {
            error!(error = %self, "Storefront error");
        } else {
            warn!(error = %self, "Storefront request failed");
        }
    }
}

const fn storage_message(err: &StorageError) -> &'static str {
    match err {
        StorageError::QuotaExceeded { .. } => "Storage is full, so your changes were not saved.",
        _ => SAVE_FAILED,
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;
