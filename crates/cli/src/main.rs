//! Loom & Co CLI - Local storefront ledgers and database migrations.
//!
//! # Usage
//!
//! ```bash
//! # Browse the catalog
//! loom-cli catalog list --category tops
//!
//! # Fill the cart and check out
//! loom-cli cart add 1 --size M --color Black --quantity 2
//! loom-cli orders checkout --name "Ada Lovelace" --email ada@example.com
//!
//! # Look up an order
//! loom-cli orders track LC-1A2B3C4D --email ada@example.com
//!
//! # Apply the remote schema and publish the built-in products
//! loom-cli migrate --publish-seed
//! ```
//!
//! # Commands
//!
//! - `cart` - Show and edit the cart
//! - `wishlist` - Show and edit saved products
//! - `catalog` - Browse products and manage admin-added ones
//! - `orders` - Check out, list, update and track orders
//! - `migrate` - Run database migrations
//!
//! Local commands use the file-backed store in `LOOM_DATA_DIR`.

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};
use loom_co_core::OrderStatus;
use loom_co_storefront::config::StorefrontConfig;
use loom_co_storefront::error::AppError;
use loom_co_storefront::state::Storefront;
use thiserror::Error;

use crate::commands::catalog::{NewProduct, ProductChanges};
use crate::commands::migrate::MigrationError;
use crate::commands::orders::CheckoutForm;

mod commands;

#[derive(Parser)]
#[command(name = "loom-cli")]
#[command(author, version, about = "Loom & Co storefront tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show and edit the cart
    Cart {
        #[command(subcommand)]
        action: CartAction,
    },
    /// Show and edit saved products
    Wishlist {
        #[command(subcommand)]
        action: WishlistAction,
    },
    /// Browse and manage products
    Catalog {
        #[command(subcommand)]
        action: CatalogAction,
    },
    /// Check out and manage orders
    Orders {
        #[command(subcommand)]
        action: OrdersAction,
    },
    /// Run database migrations
    Migrate {
        /// Also publish the built-in products to the remote catalog
        #[arg(long)]
        publish_seed: bool,
    },
}

#[derive(Subcommand)]
enum CartAction {
    /// List cart lines and totals
    Show,
    /// Add a product
    Add {
        product_id: String,

        /// Size (defaults to the product's first size)
        #[arg(short, long)]
        size: Option<String>,

        /// Colour name (defaults to the product's first colour)
        #[arg(short, long)]
        color: Option<String>,

        #[arg(short, long, default_value_t = 1)]
        quantity: u32,
    },
    /// Remove a line
    Remove {
        product_id: String,
        #[arg(short, long)]
        size: String,
        #[arg(short, long)]
        color: String,
    },
    /// Set a line's quantity (zero or less removes it)
    Set {
        product_id: String,
        #[arg(short, long)]
        size: String,
        #[arg(short, long)]
        color: String,
        #[arg(allow_negative_numbers = true)]
        quantity: i64,
    },
    /// Empty the cart
    Clear,
}

#[derive(Subcommand)]
enum WishlistAction {
    /// List saved products
    Show,
    /// Save a product
    Add { product_id: String },
    /// Remove a saved product
    Remove { product_id: String },
}

#[derive(Subcommand)]
enum CatalogAction {
    /// List products
    List {
        /// Only this category
        #[arg(short, long)]
        category: Option<String>,
    },
    /// Show one product
    Show { product_id: String },
    /// Add a product
    Add(NewProduct),
    /// Change an admin-added product
    Update {
        product_id: String,
        #[command(flatten)]
        changes: ProductChanges,
    },
    /// Delete an admin-added product
    Remove { product_id: String },
}

#[derive(Subcommand)]
enum OrdersAction {
    /// Place an order for the cart
    Checkout(CheckoutForm),
    /// List orders, most recent first
    List,
    /// Show one order
    Show { order_id: String },
    /// Set an order's status
    Status {
        order_id: String,
        /// pending, processing, shipped, delivered or cancelled
        status: OrderStatus,
    },
    /// Look up an order by number and email
    Track {
        order_id: String,
        #[arg(short, long)]
        email: String,
    },
}

/// Errors surfaced by the CLI.
#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    App(#[from] AppError),

    #[error(transparent)]
    Migration(#[from] MigrationError),
}

impl CliError {
    fn user_message(&self) -> String {
        match self {
            Self::App(err) => err.user_message(),
            Self::Migration(err) => format!("Migration failed: {err}"),
        }
    }

    fn report(&self) {
        match self {
            Self::App(err) => err.report(),
            Self::Migration(err) => tracing::error!(error = %err, "Migration failed"),
        }
    }
}

#[tokio::main]
#[allow(clippy::print_stderr)]
async fn main() {
    // Defaults to info level for our crates if RUST_LOG is not set
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "loom_co_storefront=info,loom_cli=info".into());
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(err) = run(cli).await {
        err.report();
        eprintln!("{}", err.user_message());
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let config = StorefrontConfig::from_env().map_err(AppError::from)?;

    if let Commands::Migrate { publish_seed } = cli.command {
        commands::migrate::run(&config, publish_seed).await?;
        return Ok(());
    }

    let mut storefront = Storefront::from_config(&config).map_err(AppError::from)?;
    match cli.command {
        Commands::Cart { action } => match action {
            CartAction::Show => commands::cart::show(&storefront),
            CartAction::Add {
                product_id,
                size,
                color,
                quantity,
            } => commands::cart::add(&mut storefront, &product_id, size, color, quantity)?,
            CartAction::Remove {
                product_id,
                size,
                color,
            } => commands::cart::remove(&mut storefront, &product_id, &size, &color)?,
            CartAction::Set {
                product_id,
                size,
                color,
                quantity,
            } => commands::cart::set(&mut storefront, &product_id, &size, &color, quantity)?,
            CartAction::Clear => commands::cart::clear(&mut storefront)?,
        },
        Commands::Wishlist { action } => match action {
            WishlistAction::Show => commands::wishlist::show(&storefront),
            WishlistAction::Add { product_id } => {
                commands::wishlist::add(&mut storefront, &product_id)?;
            }
            WishlistAction::Remove { product_id } => {
                commands::wishlist::remove(&mut storefront, &product_id)?;
            }
        },
        Commands::Catalog { action } => match action {
            CatalogAction::List { category } => {
                commands::catalog::list(&storefront, category.as_deref());
            }
            CatalogAction::Show { product_id } => {
                commands::catalog::show(&storefront, &product_id)?;
            }
            CatalogAction::Add(new) => commands::catalog::add(&mut storefront, new)?,
            CatalogAction::Update {
                product_id,
                changes,
            } => commands::catalog::update(&mut storefront, &product_id, changes)?,
            CatalogAction::Remove { product_id } => {
                commands::catalog::remove(&mut storefront, &product_id)?;
            }
        },
        Commands::Orders { action } => match action {
            OrdersAction::Checkout(form) => commands::orders::checkout(&mut storefront, form)?,
            OrdersAction::List => commands::orders::list(&storefront),
            OrdersAction::Show { order_id } => commands::orders::show(&storefront, &order_id)?,
            OrdersAction::Status { order_id, status } => {
                commands::orders::set_status(&mut storefront, &order_id, status)?;
            }
            OrdersAction::Track { order_id, email } => {
                commands::orders::track(&storefront, &order_id, &email)?;
            }
        },
        Commands::Migrate { .. } => {}
    }
    Ok(())
}
