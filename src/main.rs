//! Catalog Sync CLI
//!
//! Commands:
//! - `catalog-sync sync` - reconcile the catalog with the inventory
//! - `catalog-sync status` - per-product status report
//! - `catalog-sync link-image` - cache a product image and publish it
//! - `catalog-sync bind` - attach identity metadata to an existing artifact

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use catalog_sync::config::{CatalogBackend, InventoryBackend, LogFormat, Settings};
use catalog_sync::domain::{Category, ProductIdentity};
use catalog_sync::images::LocalImageCache;
use catalog_sync::inventory::{CsvInventorySource, DbPool, PgInventorySource};
use catalog_sync::providers::{CatalogStore, InventorySource, ProgressReporter};
use catalog_sync::storage::{LocalCatalogStore, R2CatalogStore};
use catalog_sync::sync::{ReconciliationPlanner, SyncOrchestrator};

/// Reconcile the product catalog with the stock inventory
#[derive(Parser)]
#[command(name = "catalog-sync")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Config directory (overrides CONFIG_PATH)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a full reconciliation
    Sync,

    /// Show where every product stands
    Status,

    /// Cache a local image for a product and publish it right away
    LinkImage {
        brand: String,
        model: String,
        category: String,
        file: PathBuf,
    },

    /// Write identity metadata onto an existing artifact
    Bind {
        handle: String,
        brand: String,
        model: String,
        category: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let settings = match cli.config {
        Some(dir) => Settings::load_from(dir),
        None => Settings::load(),
    }
    .context("Failed to load configuration")?;

    init_tracing(settings.logging.format);
    info!("Starting catalog-sync v{}", env!("CARGO_PKG_VERSION"));

    let orchestrator = build_orchestrator(&settings).await?;

    match cli.command {
        Commands::Sync => {
            let log_progress = |current: usize, total: usize, message: &str| -> Result<()> {
                debug!("[{}/{}] {}", current, total, message);
                Ok(())
            };
            let progress: &dyn ProgressReporter = &log_progress;
            let report = orchestrator.run(Some(progress)).await?;
            print_json(&report)?;
        }
        Commands::Status => {
            let status = orchestrator.status().await?;
            print_json(&status)?;
        }
        Commands::LinkImage {
            brand,
            model,
            category,
            file,
        } => {
            let identity = identity(&brand, &model, &category)?;
            let result = orchestrator.link_image(&identity, &file).await?;
            print_json(&result)?;
        }
        Commands::Bind {
            handle,
            brand,
            model,
            category,
        } => {
            let identity = identity(&brand, &model, &category)?;
            let written = orchestrator.bind(&handle, &identity).await?;
            print_json(&serde_json::json!({
                "handle": handle,
                "identity": identity.canonical(),
                "written": written,
            }))?;
        }
    }

    Ok(())
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("catalog_sync=info"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.pretty().init(),
    }
}

async fn build_orchestrator(settings: &Settings) -> Result<SyncOrchestrator> {
    let inventory: Arc<dyn InventorySource> = match settings.inventory.backend {
        InventoryBackend::Csv => {
            info!("Inventory: CSV {}", settings.inventory.csv_path.display());
            Arc::new(CsvInventorySource::new(&settings.inventory.csv_path))
        }
        InventoryBackend::Postgres => {
            let pool = DbPool::new(
                &settings.inventory.database_url,
                settings.inventory.max_connections,
            )
            .context("Failed to create database pool")?;
            Arc::new(PgInventorySource::new(pool, settings.inventory.query.clone()))
        }
    };

    let catalog: Arc<dyn CatalogStore> = match settings.catalog.backend {
        CatalogBackend::Local => Arc::new(
            LocalCatalogStore::open(&settings.catalog.local_dir)
                .await
                .context("Failed to open local catalog")?,
        ),
        CatalogBackend::R2 => Arc::new(
            R2CatalogStore::new(&settings.catalog.r2).context("Failed to configure R2")?,
        ),
    };

    let images = Arc::new(
        LocalImageCache::open(&settings.images.dir)
            .await
            .context("Failed to open image cache")?,
    );

    Ok(SyncOrchestrator::new(
        inventory,
        catalog,
        images,
        ReconciliationPlanner::new(settings.sync.placeholder_model.clone()),
    ))
}

fn identity(brand: &str, model: &str, category: &str) -> Result<ProductIdentity> {
    let category = Category::parse(category)?;
    Ok(ProductIdentity::new(brand, model, category)?)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
