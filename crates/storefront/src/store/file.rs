//! File-backed storage: one JSON document per key in a data directory.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::debug;

use super::{StorageBackend, StorageError};

const EXTENSION: &str = "json";

/// Directory-backed storage with an optional byte quota.
///
/// Writes go to a temporary file first and are renamed into place, so a
/// failed write never leaves a half-written document behind.
#[derive(Debug, Clone)]
pub struct FileBackend {
    dir: PathBuf,
    quota: Option<usize>,
}

impl FileBackend {
    /// Open (creating if needed) a data directory.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Io` if the directory cannot be created.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        debug!(dir = %dir.display(), "File record store opened");
        Ok(Self { dir, quota: None })
    }

    /// Limit the total size of stored documents.
    #[must_use]
    pub const fn with_quota(mut self, quota: usize) -> Self {
        self.quota = Some(quota);
        self
    }

    /// The data directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        Ok(self.dir.join(format!("{key}.{EXTENSION}")))
    }

    /// Bytes used by stored documents other than `skip`.
    fn usage_excluding(&self, skip: &Path) -> Result<usize, StorageError> {
        let mut total: u64 = 0;
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path == skip || path.extension().and_then(|e| e.to_str()) != Some(EXTENSION) {
                continue;
            }
            total = total.saturating_add(fs::metadata(&path)?.len());
        }
        Ok(usize::try_from(total).unwrap_or(usize::MAX))
    }
}

/// Map OS "disk full" style errors onto the quota variant.
fn classify(err: std::io::Error, key: &str, needed: usize) -> StorageError {
    match err.kind() {
        ErrorKind::StorageFull | ErrorKind::FileTooLarge => {
            StorageError::QuotaExceeded {
                key: key.to_string(),
                needed,
                available: 0,
            }
        }
        _ => StorageError::Io(err),
    }
}

impl StorageBackend for FileBackend {
    fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
        let path = self.path_for(key)?;
        match fs::read_to_string(&path) {
            Ok(raw) => Ok(Some(raw)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            // Invalid UTF-8 is damaged data, not an I/O failure
            Err(err) if err.kind() == ErrorKind::InvalidData => Ok(Some(String::new())),
            Err(err) => Err(err.into()),
        }
    }

    fn write(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        let needed = value.len();

        if let Some(quota) = self.quota {
            let available = quota.saturating_sub(self.usage_excluding(&path)?);
            if needed > available {
                return Err(StorageError::QuotaExceeded {
                    key: key.to_string(),
                    needed,
                    available,
                });
            }
        }

        let tmp = path.with_extension(format!("{EXTENSION}.tmp"));
        if let Err(err) = fs::write(&tmp, value) {
            let _ = fs::remove_file(&tmp);
            return Err(classify(err, key, needed));
        }
        if let Err(err) = fs::rename(&tmp, &path) {
            let _ = fs::remove_file(&tmp);
            return Err(classify(err, key, needed));
        }
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}
