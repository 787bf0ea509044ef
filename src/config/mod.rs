//! Configuration for the catalog sync tool

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::PathBuf;

use crate::sync::DEFAULT_PLACEHOLDER_MODEL;

/// Main application settings
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub inventory: InventorySettings,
    pub catalog: CatalogSettings,
    pub images: ImageSettings,
    pub sync: SyncSettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InventoryBackend {
    Postgres,
    Csv,
}

/// Where stock levels come from
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct InventorySettings {
    pub backend: InventoryBackend,
    pub database_url: String,
    pub max_connections: Option<usize>,
    /// Must return `brand, model, category, size, quantity` columns
    pub query: String,
    pub csv_path: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CatalogBackend {
    R2,
    Local,
}

/// Remote catalog configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CatalogSettings {
    pub backend: CatalogBackend,
    pub local_dir: PathBuf,
    pub r2: R2Settings,
}

/// Cloudflare R2 credentials and placement
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct R2Settings {
    pub account_id: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    pub bucket_name: String,
    /// Key prefix under which artifacts live
    pub prefix: String,
}

/// Local image cache
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ImageSettings {
    pub dir: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SyncSettings {
    /// Model value marking artifacts that must never be removed
    pub placeholder_model: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Pretty,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub format: LogFormat,
}

impl Settings {
    /// Load configuration from files and environment variables
    ///
    /// Configuration priority (highest to lowest):
    /// 1. Environment variables (prefixed with CATALOG_SYNC_)
    /// 2. config/local.toml (gitignored)
    /// 3. config/default.toml
    pub fn load() -> Result<Self, ConfigError> {
        let config_dir = std::env::var("CONFIG_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config"));

        Self::load_from(config_dir)
    }

    /// Load with an explicit config directory
    pub fn load_from(config_dir: PathBuf) -> Result<Self, ConfigError> {
        let builder = Config::builder()
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            .add_source(File::from(config_dir.join("local.toml")).required(false))
            // CATALOG_SYNC_CATALOG__BACKEND, CATALOG_SYNC_R2__..., etc.
            .add_source(
                Environment::with_prefix("CATALOG_SYNC")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }
}

impl Default for InventorySettings {
    fn default() -> Self {
        InventorySettings {
            backend: InventoryBackend::Csv,
            database_url: String::new(),
            max_connections: Some(4),
            query: "SELECT brand, model, category, size, quantity FROM stock".to_string(),
            csv_path: PathBuf::from("data/stock.csv"),
        }
    }
}

impl Default for CatalogSettings {
    fn default() -> Self {
        CatalogSettings {
            backend: CatalogBackend::Local,
            local_dir: PathBuf::from("data/catalog"),
            r2: R2Settings::default(),
        }
    }
}

impl Default for R2Settings {
    fn default() -> Self {
        R2Settings {
            account_id: String::new(),
            access_key_id: String::new(),
            secret_access_key: String::new(),
            bucket_name: "catalog-artifacts".to_string(),
            prefix: "catalog".to_string(),
        }
    }
}

impl Default for ImageSettings {
    fn default() -> Self {
        ImageSettings {
            dir: PathBuf::from("data/images"),
        }
    }
}

impl Default for SyncSettings {
    fn default() -> Self {
        SyncSettings {
            placeholder_model: DEFAULT_PLACEHOLDER_MODEL.to_string(),
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        LoggingSettings {
            format: LogFormat::Pretty,
        }
    }
}
