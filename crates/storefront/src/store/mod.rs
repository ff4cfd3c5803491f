//! Keyed record store.
//!
//! The only layer that touches the physical medium. Ledgers hold a
//! [`RecordStore`] handle and never know whether it is backed by memory, a
//! directory of JSON files, or anything else implementing
//! [`StorageBackend`].
//!
//! # Keys
//!
//! Each ledger owns exactly one key from [`keys`] and never touches another
//! ledger's key.

mod file;
mod memory;

use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{instrument, warn};

pub use file::FileBackend;
pub use memory::MemoryBackend;

/// Record store keys, one per ledger.
pub mod keys {
    /// Cart line items.
    pub const CART: &str = "cart";

    /// Wishlist entries.
    pub const WISHLIST: &str = "wishlist";

    /// Admin-added products (seed products are never stored).
    pub const PRODUCTS: &str = "products";

    /// Placed orders, most recent first.
    pub const ORDERS: &str = "loom-co-orders";
}

/// Errors raised by the record store.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The medium has no room for the value.
    #[error("storage quota exceeded writing {key}: needed {needed} bytes, {available} available")]
    QuotaExceeded {
        key: String,
        needed: usize,
        available: usize,
    },

    /// A stored value could not be deserialized.
    #[error("stored value under {key} is corrupt: {source}")]
    Corrupt {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    /// A value could not be serialized.
    #[error("failed to serialize value for {key}: {source}")]
    Serialize {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    /// Key contains characters the backend cannot store.
    #[error("invalid storage key: {0}")]
    InvalidKey(String),

    /// I/O error from the medium.
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The backend cannot be used (e.g. a poisoned lock).
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

impl StorageError {
    /// Whether this is a capacity failure.
    #[must_use]
    pub const fn is_quota(&self) -> bool {
        matches!(self, Self::QuotaExceeded { .. })
    }

    /// Whether this is a deserialization failure.
    #[must_use]
    pub const fn is_corrupt(&self) -> bool {
        matches!(self, Self::Corrupt { .. })
    }
}

/// Raw string storage keyed by name.
pub trait StorageBackend: Send + Sync {
    /// Read the value under `key`, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the medium cannot be read.
    fn read(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Replace the value under `key`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::QuotaExceeded` when the medium is full.
    fn write(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Delete the value under `key`. Deleting a missing key succeeds.
    ///
    /// # Errors
    ///
    /// Returns an error if the medium cannot be written.
    fn delete(&self, key: &str) -> Result<(), StorageError>;
}

/// Cloneable handle to a storage backend with JSON encoding.
#[derive(Clone)]
pub struct RecordStore {
    backend: Arc<dyn StorageBackend>,
}

impl std::fmt::Debug for RecordStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordStore").finish_non_exhaustive()
    }
}

impl RecordStore {
    /// Wrap a backend.
    #[must_use]
    pub fn new(backend: impl StorageBackend + 'static) -> Self {
        Self {
            backend: Arc::new(backend),
        }
    }

    /// Wrap a shared backend.
    #[must_use]
    pub fn from_shared(backend: Arc<dyn StorageBackend>) -> Self {
        Self { backend }
    }

    /// Unbounded in-memory store.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(MemoryBackend::new())
    }

    /// Load and deserialize the value under `key`.
    ///
    /// Never fails: an unreadable medium yields `None`, and a corrupt value
    /// is logged, deleted and reported as `None`.
    #[instrument(skip(self))]
    pub fn load<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        match self.try_load(key) {
            Ok(value) => value,
            Err(err) if err.is_corrupt() => {
                warn!(key, error = %err, "Discarding corrupt stored value");
                if let Err(remove_err) = self.backend.delete(key) {
                    warn!(key, error = %remove_err, "Failed to discard corrupt stored value");
                }
                None
            }
            Err(err) => {
                warn!(key, error = %err, "Failed to read stored value");
                None
            }
        }
    }

    /// Load and deserialize the value under `key`, reporting failures.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Corrupt` if the stored value does not parse, or
    /// the backend's error if it cannot be read.
    pub fn try_load<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StorageError> {
        let Some(raw) = self.backend.read(key)? else {
            return Ok(None);
        };
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|source| StorageError::Corrupt {
                key: key.to_string(),
                source,
            })
    }

    /// Serialize and write `value` under `key`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::QuotaExceeded` when the medium is full, so
    /// callers can apply their own degradation policy.
    #[instrument(skip(self, value))]
    pub fn save<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), StorageError> {
        let raw = encode(key, value)?;
        self.backend.write(key, &raw)
    }

    /// Delete the value under `key`. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns the backend's error if the medium cannot be written.
    pub fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.backend.delete(key)
    }

    /// Write raw text under `key`, bypassing serialization.
    ///
    /// Used to seed fixtures and simulate damaged data.
    ///
    /// # Errors
    ///
    /// Returns the backend's error.
    pub fn write_raw(&self, key: &str, raw: &str) -> Result<(), StorageError> {
        self.backend.write(key, raw)
    }
}

/// Serialized size of `value` in bytes.
///
/// # Errors
///
/// Returns `StorageError::Serialize` if the value cannot be encoded.
pub fn encoded_len<T: Serialize + ?Sized>(key: &str, value: &T) -> Result<usize, StorageError> {
    encode(key, value).map(|raw| raw.len())
}

fn encode<T: Serialize + ?Sized>(key: &str, value: &T) -> Result<String, StorageError> {
    serde_json::to_string(value).map_err(|source| StorageError::Serialize {
        key: key.to_string(),
        source,
    })
}
