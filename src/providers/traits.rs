//! Collaborator contracts consumed by the reconciliation engine
//!
//! The engine never talks to a database, an object store or the filesystem
//! directly. Each of those sits behind one of the traits below so that
//! backends can be swapped (R2 vs. local directory, Postgres vs. CSV) and
//! tests can run against in-memory doubles.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::domain::{Metadata, ProductIdentity, StockRecord};
use crate::images::ImagePayload;

// ============================================================================
// Error Types
// ============================================================================

/// Catalog store error types
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Artifact not found: {0}")]
    NotFound(String),

    #[error("Catalog request failed: {0}")]
    Request(String),

    #[error("Catalog not configured: {0}")]
    NotConfigured(String),

    #[error("Invalid artifact data: {0}")]
    Invalid(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for catalog store operations
pub type CatalogResult<T> = Result<T, CatalogError>;

/// Inventory source error types
#[derive(Debug, Error)]
pub enum InventoryError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("CSV header lacks column: {0}")]
    MissingColumn(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Inventory not configured: {0}")]
    NotConfigured(String),
}

/// Local image cache error types
#[derive(Debug, Error)]
pub enum ImageCacheError {
    #[error("Image not found: {0}")]
    NotFound(PathBuf),

    #[error("Unsupported image: {0}")]
    Unsupported(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Index error: {0}")]
    Index(#[from] serde_json::Error),
}

// ============================================================================
// Catalog Types
// ============================================================================

/// A remote object as returned by a catalog listing
#[derive(Debug, Clone, Serialize)]
pub struct RemoteArtifact {
    /// Opaque store handle
    pub handle: String,
    /// Current display caption
    pub caption: String,
    /// All key/value metadata on the object
    pub metadata: Metadata,
}

// ============================================================================
// Collaborator Traits
// ============================================================================

/// Authoritative stock feed
#[async_trait]
pub trait InventorySource: Send + Sync {
    /// All stock rows, including zero-quantity ones.
    ///
    /// Rows whose tokens cannot be parsed are dropped by the implementation.
    async fn list_stock(&self) -> Result<Vec<StockRecord>, InventoryError>;
}

/// Remote catalog keyed by opaque artifact handles
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Backend name for logs
    fn name(&self) -> &'static str;

    /// List every artifact with its caption and metadata
    async fn list_artifacts(&self) -> CatalogResult<Vec<RemoteArtifact>>;

    /// Create an artifact with caption, content and metadata in one unit
    async fn create_artifact(
        &self,
        identity: &ProductIdentity,
        caption: &str,
        content: &ImagePayload,
        metadata: &Metadata,
    ) -> CatalogResult<String>;

    async fn update_caption(&self, handle: &str, caption: &str) -> CatalogResult<()>;

    /// Replace content, keeping handle, caption and metadata
    async fn update_content(&self, handle: &str, content: &ImagePayload) -> CatalogResult<()>;

    /// Merge `entries` into the existing metadata
    async fn update_metadata(&self, handle: &str, entries: &Metadata) -> CatalogResult<()>;

    async fn remove(&self, handle: &str) -> CatalogResult<()>;

    async fn current_caption(&self, handle: &str) -> CatalogResult<String>;

    /// Lower-case hex SHA-256 of the stored content, if known
    async fn current_fingerprint(&self, handle: &str) -> CatalogResult<Option<String>>;

    async fn current_metadata(&self, handle: &str) -> CatalogResult<Metadata>;
}

/// Maps products to candidate local image files
#[async_trait]
pub trait ImageCache: Send + Sync {
    /// Path of the product's image, only if the file still exists
    async fn lookup(&self, identity: &ProductIdentity) -> Option<PathBuf>;

    /// Copy `source` into the cache and record it as the product's image
    async fn associate(
        &self,
        identity: &ProductIdentity,
        source: &Path,
    ) -> Result<PathBuf, ImageCacheError>;

    /// Forget the product's image and delete the cached file
    async fn dissociate(&self, identity: &ProductIdentity) -> Result<(), ImageCacheError>;
}

/// Receives `(current, total, message)` after every action attempt.
///
/// Failures are discarded by the caller.
pub trait ProgressReporter: Send + Sync {
    fn report(&self, current: usize, total: usize, message: &str) -> anyhow::Result<()>;
}

impl<F> ProgressReporter for F
where
    F: Fn(usize, usize, &str) -> anyhow::Result<()> + Send + Sync,
{
    fn report(&self, current: usize, total: usize, message: &str) -> anyhow::Result<()> {
        self(current, total, message)
    }
}
