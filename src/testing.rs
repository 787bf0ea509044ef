//! In-memory collaborators for engine tests

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::domain::metadata::{self, Metadata};
use crate::domain::{ProductIdentity, StockRecord};
use crate::images::ImagePayload;
use crate::providers::{
    CatalogError, CatalogResult, CatalogStore, ImageCache, ImageCacheError, InventoryError,
    InventorySource, RemoteArtifact,
};

// ============================================================================
// Inventory
// ============================================================================

pub struct StaticInventory {
    records: Mutex<Vec<StockRecord>>,
    fail: bool,
}

impl StaticInventory {
    pub fn new(records: Vec<StockRecord>) -> Self {
        Self {
            records: Mutex::new(records),
            fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            records: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn replace(&self, records: Vec<StockRecord>) {
        *self.records.lock().unwrap() = records;
    }
}

#[async_trait]
impl InventorySource for StaticInventory {
    async fn list_stock(&self) -> Result<Vec<StockRecord>, InventoryError> {
        if self.fail {
            return Err(InventoryError::Database("connection refused".into()));
        }
        Ok(self.records.lock().unwrap().clone())
    }
}

// ============================================================================
// Catalog
// ============================================================================

#[derive(Debug, Clone)]
pub struct StoredArtifact {
    pub caption: String,
    pub metadata: Metadata,
    pub content: Vec<u8>,
}

/// Catalog store counting every write, with per-handle failure injection
#[derive(Default)]
pub struct MemoryCatalogStore {
    artifacts: Mutex<BTreeMap<String, StoredArtifact>>,
    next_handle: AtomicUsize,
    writes: AtomicUsize,
    failing_handles: Mutex<HashSet<String>>,
    failing_creates: Mutex<HashSet<String>>,
    failing_captions: Mutex<HashSet<String>>,
}

impl MemoryCatalogStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an artifact without counting it as a write
    pub fn seed(&self, handle: &str, caption: &str, metadata: Metadata) {
        self.artifacts.lock().unwrap().insert(
            handle.to_string(),
            StoredArtifact {
                caption: caption.to_string(),
                metadata,
                content: Vec::new(),
            },
        );
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn get(&self, handle: &str) -> Option<StoredArtifact> {
        self.artifacts.lock().unwrap().get(handle).cloned()
    }

    pub fn handles(&self) -> Vec<String> {
        self.artifacts.lock().unwrap().keys().cloned().collect()
    }

    /// Artifact whose composite key matches the identity
    pub fn find(&self, identity: &ProductIdentity) -> Option<(String, StoredArtifact)> {
        let key = identity.composite_key();
        self.artifacts
            .lock()
            .unwrap()
            .iter()
            .find(|(_, a)| a.metadata.get(metadata::KEY_COMPOSITE) == Some(&key))
            .map(|(h, a)| (h.clone(), a.clone()))
    }

    /// Every write to `handle` fails from now on
    pub fn fail_writes_to(&self, handle: &str) {
        self.failing_handles.lock().unwrap().insert(handle.to_string());
    }

    /// Creating `identity` fails from now on
    pub fn fail_create_of(&self, identity: &ProductIdentity) {
        self.failing_creates
            .lock()
            .unwrap()
            .insert(identity.composite_key());
    }

    /// The next caption write to `handle` times out; later ones succeed
    pub fn fail_next_caption_of(&self, handle: &str) {
        self.failing_captions.lock().unwrap().insert(handle.to_string());
    }

    fn write(&self, handle: &str) -> CatalogResult<()> {
        if self.failing_handles.lock().unwrap().contains(handle) {
            return Err(CatalogError::Request(format!("write to {} rejected", handle)));
        }
        if !self.artifacts.lock().unwrap().contains_key(handle) {
            return Err(CatalogError::NotFound(handle.to_string()));
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn read(&self, handle: &str) -> CatalogResult<StoredArtifact> {
        self.get(handle)
            .ok_or_else(|| CatalogError::NotFound(handle.to_string()))
    }
}

#[async_trait]
impl CatalogStore for MemoryCatalogStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn list_artifacts(&self) -> CatalogResult<Vec<RemoteArtifact>> {
        Ok(self
            .artifacts
            .lock()
            .unwrap()
            .iter()
            .map(|(handle, a)| RemoteArtifact {
                handle: handle.clone(),
                caption: a.caption.clone(),
                metadata: a.metadata.clone(),
            })
            .collect())
    }

    async fn create_artifact(
        &self,
        identity: &ProductIdentity,
        caption: &str,
        content: &ImagePayload,
        metadata: &Metadata,
    ) -> CatalogResult<String> {
        if self
            .failing_creates
            .lock()
            .unwrap()
            .contains(&identity.composite_key())
        {
            return Err(CatalogError::Request("upload rejected".into()));
        }

        let handle = format!("m{:04}", self.next_handle.fetch_add(1, Ordering::SeqCst));
        let mut metadata = metadata.clone();
        metadata.insert(metadata::KEY_FINGERPRINT.to_string(), content.fingerprint.clone());

        self.artifacts.lock().unwrap().insert(
            handle.clone(),
            StoredArtifact {
                caption: caption.to_string(),
                metadata,
                content: content.bytes.clone(),
            },
        );
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(handle)
    }

    async fn update_caption(&self, handle: &str, caption: &str) -> CatalogResult<()> {
        if self.failing_captions.lock().unwrap().remove(handle) {
            return Err(CatalogError::Request("timeout".to_string()));
        }
        self.write(handle)?;
        if let Some(a) = self.artifacts.lock().unwrap().get_mut(handle) {
            a.caption = caption.to_string();
        }
        Ok(())
    }

    async fn update_content(&self, handle: &str, content: &ImagePayload) -> CatalogResult<()> {
        self.write(handle)?;
        if let Some(a) = self.artifacts.lock().unwrap().get_mut(handle) {
            a.content = content.bytes.clone();
            a.metadata
                .insert(metadata::KEY_FINGERPRINT.to_string(), content.fingerprint.clone());
        }
        Ok(())
    }

    async fn update_metadata(&self, handle: &str, entries: &Metadata) -> CatalogResult<()> {
        self.write(handle)?;
        if let Some(a) = self.artifacts.lock().unwrap().get_mut(handle) {
            a.metadata
                .extend(entries.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        Ok(())
    }

    async fn remove(&self, handle: &str) -> CatalogResult<()> {
        self.write(handle)?;
        self.artifacts.lock().unwrap().remove(handle);
        Ok(())
    }

    async fn current_caption(&self, handle: &str) -> CatalogResult<String> {
        Ok(self.read(handle)?.caption)
    }

    async fn current_fingerprint(&self, handle: &str) -> CatalogResult<Option<String>> {
        Ok(self
            .read(handle)?
            .metadata
            .get(metadata::KEY_FINGERPRINT)
            .cloned())
    }

    async fn current_metadata(&self, handle: &str) -> CatalogResult<Metadata> {
        Ok(self.read(handle)?.metadata)
    }
}

// ============================================================================
// Images
// ============================================================================

/// Image cache mapping identities to paths that already exist on disk
#[derive(Default)]
pub struct MemoryImageCache {
    paths: Mutex<HashMap<ProductIdentity, PathBuf>>,
}

impl MemoryImageCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, identity: &ProductIdentity, path: impl Into<PathBuf>) {
        self.paths
            .lock()
            .unwrap()
            .insert(identity.clone(), path.into());
    }
}

#[async_trait]
impl ImageCache for MemoryImageCache {
    async fn lookup(&self, identity: &ProductIdentity) -> Option<PathBuf> {
        self.paths
            .lock()
            .unwrap()
            .get(identity)
            .filter(|p| p.is_file())
            .cloned()
    }

    async fn associate(
        &self,
        identity: &ProductIdentity,
        source: &Path,
    ) -> Result<PathBuf, ImageCacheError> {
        if !source.is_file() {
            return Err(ImageCacheError::NotFound(source.to_path_buf()));
        }
        self.insert(identity, source);
        Ok(source.to_path_buf())
    }

    async fn dissociate(&self, identity: &ProductIdentity) -> Result<(), ImageCacheError> {
        self.paths.lock().unwrap().remove(identity);
        Ok(())
    }
}
