//! Database migration commands.
//!
//! # Usage
//!
//! ```bash
//! # Apply the remote schema
//! loom-cli migrate
//!
//! # Apply the schema and publish the built-in products
//! loom-cli migrate --publish-seed
//! ```
//!
//! # Environment Variables
//!
//! - `LOOM_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//!
//! # Migration Files
//!
//! Storefront migrations: `crates/storefront/migrations/`
//!
//! Remote cart and wishlist rows reference products by id, so the built-in
//! products must exist remotely before signed-in customers can save them.

use std::sync::Arc;

use loom_co_storefront::config::{ConfigError, StorefrontConfig};
use loom_co_storefront::remote::{PgDatabase, RemoteError, create_pool};
use loom_co_storefront::sync::{RemoteCatalog, SyncError};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Remote error: {0}")]
    Remote(#[from] RemoteError),

    #[error("Seed publish failed: {0}")]
    Seed(#[from] SyncError),
}

/// Apply pending storefront migrations, then optionally publish the seed
/// products.
///
/// # Errors
///
/// Returns `MigrationError` if no database is configured, the connection
/// fails, or a migration or seed write fails.
pub async fn run(config: &StorefrontConfig, publish_seed: bool) -> Result<(), MigrationError> {
    let database_url = config.require_database_url()?;

    info!("Connecting to storefront database...");
    let pool = create_pool(database_url).await?;

    info!("Running storefront migrations...");
    sqlx::migrate!("../storefront/migrations").run(&pool).await?;
    info!("Storefront migrations complete!");

    if publish_seed {
        let db = PgDatabase::with_pool(pool).await?;
        let catalog = RemoteCatalog::new(Arc::new(db), config.catalog_cache_ttl);
        let published = catalog.publish_seed().await?;
        info!(published, "Seed products published");
    }

    Ok(())
}
