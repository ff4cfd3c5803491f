//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Optional
//! - `LOOM_DATA_DIR` - Directory holding the local record store (default: `.loom-data`)
//! - `LOOM_STORAGE_QUOTA_BYTES` - Byte budget of the local record store
//!   (default: 5242880, the usual browser local-storage allowance)
//! - `LOOM_DATABASE_URL` - `PostgreSQL` connection string for the remote-backed
//!   ledgers (falls back to `DATABASE_URL`)
//! - `LOOM_CATALOG_CACHE_TTL_SECS` - Remote product cache lifetime (default: 300)

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;

/// Default byte budget of the local record store.
pub const DEFAULT_STORAGE_QUOTA_BYTES: usize = 5 * 1024 * 1024;

const DEFAULT_DATA_DIR: &str = ".loom-data";
const DEFAULT_CATALOG_CACHE_TTL_SECS: u64 = 300;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Storefront configuration.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// Directory of the file-backed record store
    pub data_dir: PathBuf,
    /// Byte budget of the record store
    pub storage_quota_bytes: usize,
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: Option<SecretString>,
    /// How long remote product listings stay cached
    pub catalog_cache_ttl: Duration,
}

impl Default for StorefrontConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            storage_quota_bytes: DEFAULT_STORAGE_QUOTA_BYTES,
            database_url: None,
            catalog_cache_ttl: Duration::from_secs(DEFAULT_CATALOG_CACHE_TTL_SECS),
        }
    }
}

impl StorefrontConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidEnvVar` if a numeric variable does not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let data_dir = PathBuf::from(get_env_or_default("LOOM_DATA_DIR", DEFAULT_DATA_DIR));
        let storage_quota_bytes = parse_env(
            "LOOM_STORAGE_QUOTA_BYTES",
            DEFAULT_STORAGE_QUOTA_BYTES,
        )?;
        let catalog_cache_ttl = Duration::from_secs(parse_env(
            "LOOM_CATALOG_CACHE_TTL_SECS",
            DEFAULT_CATALOG_CACHE_TTL_SECS,
        )?);
        let database_url = get_database_url("LOOM_DATABASE_URL");

        Ok(Self {
            data_dir,
            storage_quota_bytes,
            database_url,
            catalog_cache_ttl,
        })
    }

    /// The database URL, or an error naming the variable to set.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingEnvVar` when no database is configured.
    pub fn require_database_url(&self) -> Result<&SecretString, ConfigError> {
        self.database_url
            .as_ref()
            .ok_or_else(|| ConfigError::MissingEnvVar("LOOM_DATABASE_URL".to_string()))
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get database URL with fallback to generic `DATABASE_URL`.
fn get_database_url(primary_key: &str) -> Option<SecretString> {
    std::env::var(primary_key)
        .or_else(|_| std::env::var("DATABASE_URL"))
        .ok()
        .map(SecretString::from)
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse an optional environment variable, using `default` when unset.
fn parse_env<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    std::env::var(key).map_or(Ok(default), |raw| parse_value(key, &raw))
}

fn parse_value<T>(key: &str, raw: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = StorefrontConfig::default();
        assert_eq!(config.data_dir, PathBuf::from(".loom-data"));
        assert_eq!(config.storage_quota_bytes, 5_242_880);
        assert_eq!(config.catalog_cache_ttl, Duration::from_secs(300));
        assert!(config.database_url.is_none());
    }

    #[test]
    fn test_parse_value_trims() {
        let quota: usize = parse_value("LOOM_STORAGE_QUOTA_BYTES", " 1024 ").unwrap();
        assert_eq!(quota, 1024);
    }

    #[test]
    fn test_parse_value_rejects_garbage() {
        let result = parse_value::<usize>("LOOM_STORAGE_QUOTA_BYTES", "lots");
        assert!(matches!(result, Err(ConfigError::InvalidEnvVar(key, _)) if key == "LOOM_STORAGE_QUOTA_BYTES"));
    }

    #[test]
    fn test_require_database_url() {
        let config = StorefrontConfig::default();
        assert!(matches!(
            config.require_database_url(),
            Err(ConfigError::MissingEnvVar(_))
        ));

        let config = StorefrontConfig {
            database_url: Some(SecretString::from("postgres://localhost/loom")),
            ..StorefrontConfig::default()
        };
        assert!(config.require_database_url().is_ok());
    }

    #[test]
    fn test_debug_redacts_database_url() {
        let config = StorefrontConfig {
            database_url: Some(SecretString::from("postgres://user:hunter2@db/loom")),
            ..StorefrontConfig::default()
        };
        let debug_output = format!("{config:?}");
        assert!(!debug_output.contains("hunter2"));
    }
}
