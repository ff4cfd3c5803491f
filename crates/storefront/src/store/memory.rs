//! In-memory storage backend.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::{StorageBackend, StorageError};

/// In-memory backend with an optional byte quota.
///
/// Usage counts key plus value bytes across all entries, the way browser
/// local storage charges its allowance.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    entries: RwLock<HashMap<String, String>>,
    quota: Option<usize>,
}

impl MemoryBackend {
    /// Unbounded backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Backend that rejects writes once `quota` bytes are in use.
    #[must_use]
    pub fn with_quota(quota: usize) -> Self {
        Self {
            entries: RwLock::default(),
            quota: Some(quota),
        }
    }

    /// Bytes currently in use.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Unavailable` if the lock is poisoned.
    pub fn used_bytes(&self) -> Result<usize, StorageError> {
        Ok(usage(&*self.read_guard()?, None))
    }

    fn read_guard(&self) -> Result<RwLockReadGuard<'_, HashMap<String, String>>, StorageError> {
        self.entries
            .read()
            .map_err(|_| StorageError::Unavailable("memory store lock poisoned".to_string()))
    }

    fn write_guard(&self) -> Result<RwLockWriteGuard<'_, HashMap<String, String>>, StorageError> {
        self.entries
            .write()
            .map_err(|_| StorageError::Unavailable("memory store lock poisoned".to_string()))
    }
}

/// Bytes used by all entries except `skip`.
fn usage(entries: &HashMap<String, String>, skip: Option<&str>) -> usize {
    entries
        .iter()
        .filter(|(key, _)| Some(key.as_str()) != skip)
        .map(|(key, value)| key.len() + value.len())
        .sum()
}

impl StorageBackend for MemoryBackend {
    fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.read_guard()?.get(key).cloned())
    }

    fn write(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut entries = self.write_guard()?;
        if let Some(quota) = self.quota {
            let available = quota.saturating_sub(usage(&entries, Some(key)));
            let needed = key.len() + value.len();
            if needed > available {
                return Err(StorageError::QuotaExceeded {
                    key: key.to_string(),
                    needed,
                    available,
                });
            }
        }
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.write_guard()?.remove(key);
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_quota_counts_key_and_value() {
        let backend = MemoryBackend::with_quota(10);
        backend.write("ab", "12345678").unwrap();
        assert_eq!(backend.used_bytes().unwrap(), 10);

        let err = backend.write("c", "1").unwrap_err();
        assert!(matches!(
            err,
            StorageError::QuotaExceeded { needed: 2, available: 0, .. }
        ));
    }

    #[test]
    fn test_overwrite_frees_previous_value() {
        let backend = MemoryBackend::with_quota(10);
        backend.write("ab", "12345678").unwrap();
        // Replacing the same key only needs room for the new value.
        backend.write("ab", "87654321").unwrap();
        assert_eq!(backend.read("ab").unwrap().as_deref(), Some("87654321"));
    }

    #[test]
    fn test_failed_write_keeps_old_value() {
        let backend = MemoryBackend::with_quota(6);
        backend.write("k", "old").unwrap();
        assert!(backend.write("k", "much too long").is_err());
        assert_eq!(backend.read("k").unwrap().as_deref(), Some("old"));
    }

    #[test]
    fn test_zero_quota_rejects_everything_but_delete() {
        let backend = MemoryBackend::with_quota(0);
        assert!(backend.write("k", "").unwrap_err().is_quota());
        backend.delete("k").unwrap();
    }
}
