//! Directory-backed catalog store
//!
//! ## Layout
//! ```text
//! {dir}/
//! ├── {uuid}.bin      # artifact content
//! └── {uuid}.json     # caption + metadata sidecar
//! ```

use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::domain::metadata::{self, Metadata};
use crate::domain::ProductIdentity;
use crate::images::ImagePayload;
use crate::providers::{CatalogError, CatalogResult, CatalogStore, RemoteArtifact};

const CONTENT_EXT: &str = "bin";
const SIDECAR_EXT: &str = "json";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Sidecar {
    caption: String,
    content_type: String,
    #[serde(default)]
    metadata: Metadata,
}

/// Catalog kept as plain files, one content file and one sidecar per artifact
pub struct LocalCatalogStore {
    dir: PathBuf,
}

impl LocalCatalogStore {
    /// Open (creating if needed) the store rooted at `dir`
    pub async fn open(dir: impl Into<PathBuf>) -> CatalogResult<Self> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await?;
        info!(dir = %dir.display(), "Local catalog store opened");
        Ok(Self { dir })
    }

    fn content_path(&self, handle: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", handle, CONTENT_EXT))
    }

    fn sidecar_path(&self, handle: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", handle, SIDECAR_EXT))
    }

    async fn read_sidecar(&self, handle: &str) -> CatalogResult<Sidecar> {
        let path = self.sidecar_path(handle);
        let raw = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(CatalogError::NotFound(handle.to_string()))
            }
            Err(e) => return Err(e.into()),
        };
        Ok(serde_json::from_str(&raw)?)
    }

    async fn write_sidecar(&self, handle: &str, sidecar: &Sidecar) -> CatalogResult<()> {
        let raw = serde_json::to_string_pretty(sidecar)?;
        tokio::fs::write(self.sidecar_path(handle), raw).await?;
        Ok(())
    }
}

#[async_trait]
impl CatalogStore for LocalCatalogStore {
    fn name(&self) -> &'static str {
        "local"
    }

    #[instrument(skip(self), fields(dir = %self.dir.display()))]
    async fn list_artifacts(&self) -> CatalogResult<Vec<RemoteArtifact>> {
        let mut handles = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(SIDECAR_EXT) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                handles.push(stem.to_string());
            }
        }
        handles.sort();

        let mut artifacts = Vec::with_capacity(handles.len());
        for handle in handles {
            let sidecar = self.read_sidecar(&handle).await?;
            artifacts.push(RemoteArtifact {
                handle,
                caption: sidecar.caption,
                metadata: sidecar.metadata,
            });
        }

        debug!("Listed {} local artifacts", artifacts.len());
        Ok(artifacts)
    }

    #[instrument(skip(self, content, metadata), fields(identity = %identity))]
    async fn create_artifact(
        &self,
        identity: &ProductIdentity,
        caption: &str,
        content: &ImagePayload,
        metadata: &Metadata,
    ) -> CatalogResult<String> {
        let handle = Uuid::new_v4().to_string();

        let mut metadata = metadata.clone();
        metadata.insert(metadata::KEY_FINGERPRINT.to_string(), content.fingerprint.clone());

        tokio::fs::write(self.content_path(&handle), &content.bytes).await?;
        self.write_sidecar(
            &handle,
            &Sidecar {
                caption: caption.to_string(),
                content_type: content.content_type.to_string(),
                metadata,
            },
        )
        .await?;

        Ok(handle)
    }

    async fn update_caption(&self, handle: &str, caption: &str) -> CatalogResult<()> {
        let mut sidecar = self.read_sidecar(handle).await?;
        sidecar.caption = caption.to_string();
        self.write_sidecar(handle, &sidecar).await
    }

    async fn update_content(&self, handle: &str, content: &ImagePayload) -> CatalogResult<()> {
        let mut sidecar = self.read_sidecar(handle).await?;
        tokio::fs::write(self.content_path(handle), &content.bytes).await?;

        sidecar.content_type = content.content_type.to_string();
        sidecar
            .metadata
            .insert(metadata::KEY_FINGERPRINT.to_string(), content.fingerprint.clone());
        self.write_sidecar(handle, &sidecar).await
    }

    async fn update_metadata(&self, handle: &str, entries: &Metadata) -> CatalogResult<()> {
        let mut sidecar = self.read_sidecar(handle).await?;
        sidecar
            .metadata
            .extend(entries.iter().map(|(k, v)| (k.clone(), v.clone())));
        self.write_sidecar(handle, &sidecar).await
    }

    async fn remove(&self, handle: &str) -> CatalogResult<()> {
        let sidecar = self.sidecar_path(handle);
        if !tokio::fs::try_exists(&sidecar).await? {
            return Err(CatalogError::NotFound(handle.to_string()));
        }

        tokio::fs::remove_file(&sidecar).await?;
        match tokio::fs::remove_file(self.content_path(handle)).await {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }

    async fn current_caption(&self, handle: &str) -> CatalogResult<String> {
        Ok(self.read_sidecar(handle).await?.caption)
    }

    async fn current_fingerprint(&self, handle: &str) -> CatalogResult<Option<String>> {
        Ok(self
            .read_sidecar(handle)
            .await?
            .metadata
            .remove(metadata::KEY_FINGERPRINT))
    }

    async fn current_metadata(&self, handle: &str) -> CatalogResult<Metadata> {
        Ok(self.read_sidecar(handle).await?.metadata)
    }
}
