//! Directory-backed local image cache
//!
//! ## Layout
//! ```text
//! {dir}/
//! ├── index.json          # composite key -> file name
//! └── images/
//!     └── {slug}.{ext}    # e.g. VASCO_AWAY_2025_ADULT_MALE.png
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::domain::ProductIdentity;
use crate::providers::{ImageCache, ImageCacheError};

use super::fingerprint;

const INDEX_FILE: &str = "index.json";
const IMAGES_DIR: &str = "images";
const ACCEPTED_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "webp"];
const MAX_SLUG_LEN: usize = 120;

/// Local image cache persisted as a directory plus a JSON index
pub struct LocalImageCache {
    images_dir: PathBuf,
    index_path: PathBuf,
    index: Mutex<BTreeMap<String, String>>,
}

impl LocalImageCache {
    /// Open (creating if needed) the cache rooted at `dir`
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, ImageCacheError> {
        let dir = dir.into();
        let images_dir = dir.join(IMAGES_DIR);
        let index_path = dir.join(INDEX_FILE);

        tokio::fs::create_dir_all(&images_dir).await?;

        let index = if tokio::fs::try_exists(&index_path).await? {
            let raw = tokio::fs::read_to_string(&index_path).await?;
            if raw.trim().is_empty() {
                BTreeMap::new()
            } else {
                serde_json::from_str(&raw)?
            }
        } else {
            BTreeMap::new()
        };

        info!(
            dir = %dir.display(),
            entries = index.len(),
            "Local image cache opened"
        );

        Ok(Self {
            images_dir,
            index_path,
            index: Mutex::new(index),
        })
    }

    async fn persist(&self, index: &BTreeMap<String, String>) -> Result<(), ImageCacheError> {
        let raw = serde_json::to_string_pretty(index)?;
        tokio::fs::write(&self.index_path, raw).await?;
        Ok(())
    }
}

#[async_trait]
impl ImageCache for LocalImageCache {
    async fn lookup(&self, identity: &ProductIdentity) -> Option<PathBuf> {
        let index = self.index.lock().await;
        let file_name = index.get(&identity.composite_key())?.trim();
        if file_name.is_empty() {
            return None;
        }

        let path = self.images_dir.join(file_name);
        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => Some(path),
            Ok(_) => None,
            Err(e) => {
                debug!("Mapped image for {} is unavailable: {}", identity, e);
                None
            }
        }
    }

    #[instrument(skip(self), fields(identity = %identity))]
    async fn associate(
        &self,
        identity: &ProductIdentity,
        source: &Path,
    ) -> Result<PathBuf, ImageCacheError> {
        let meta = tokio::fs::metadata(source)
            .await
            .map_err(|_| ImageCacheError::NotFound(source.to_path_buf()))?;
        if !meta.is_file() {
            return Err(ImageCacheError::NotFound(source.to_path_buf()));
        }

        let key = identity.composite_key();
        let file_name = format!("{}.{}", slug(&key), extension(source)?);
        let destination = self.images_dir.join(&file_name);

        let mut index = self.index.lock().await;

        // A previous association may have used another extension
        if let Some(previous) = index.get(&key) {
            if previous != &file_name {
                let _ = tokio::fs::remove_file(self.images_dir.join(previous)).await;
            }
        }

        tokio::fs::copy(source, &destination).await?;
        index.insert(key, file_name);
        self.persist(&index).await?;

        info!("Associated {} -> {}", identity, destination.display());
        Ok(destination)
    }

    #[instrument(skip(self), fields(identity = %identity))]
    async fn dissociate(&self, identity: &ProductIdentity) -> Result<(), ImageCacheError> {
        let mut index = self.index.lock().await;
        if let Some(file_name) = index.remove(&identity.composite_key()) {
            if let Err(e) = tokio::fs::remove_file(self.images_dir.join(&file_name)).await {
                warn!("Failed to delete cached image {}: {}", file_name, e);
            }
            self.persist(&index).await?;
        }
        Ok(())
    }
}

/// Lower-cased, validated file extension
fn extension(path: &Path) -> Result<String, ImageCacheError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();

    if ACCEPTED_EXTENSIONS.contains(&ext.as_str()) {
        Ok(ext)
    } else {
        Err(ImageCacheError::Unsupported(format!(
            "image must be .jpg/.jpeg/.png/.webp: {}",
            path.display()
        )))
    }
}

/// File-system safe name derived from a composite key.
///
/// The readable part is lossy, so a short hash of the full key keeps
/// distinct keys on distinct files.
fn slug(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    for c in key.chars() {
        let c = if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' };
        if c == '_' && out.ends_with('_') {
            continue;
        }
        out.push(c);
    }
    let readable: String = out.trim_matches('_').chars().take(MAX_SLUG_LEN).collect();
    let hash = &fingerprint(key.as_bytes())[..8];
    if readable.is_empty() {
        hash.to_string()
    } else {
        format!("{}_{}", readable, hash)
    }
}
