//! Image payloads ready for upload

use std::path::Path;

use image::ImageFormat;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::providers::ImageCacheError;

/// Image bytes with their sniffed content type and SHA-256 fingerprint
#[derive(Debug, Clone)]
pub struct ImagePayload {
    pub bytes: Vec<u8>,
    pub content_type: &'static str,
    /// Lower-case hex SHA-256 of `bytes`
    pub fingerprint: String,
}

impl ImagePayload {
    /// Sniff the format and fingerprint raw bytes.
    ///
    /// Only PNG, JPEG and WebP are accepted.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, ImageCacheError> {
        let format = image::guess_format(&bytes)
            .map_err(|e| ImageCacheError::Unsupported(e.to_string()))?;

        let content_type = match format {
            ImageFormat::Png => "image/png",
            ImageFormat::Jpeg => "image/jpeg",
            ImageFormat::WebP => "image/webp",
            other => {
                return Err(ImageCacheError::Unsupported(format!(
                    "{:?} images are not accepted",
                    other
                )))
            }
        };

        let fingerprint = fingerprint(&bytes);

        Ok(Self {
            bytes,
            content_type,
            fingerprint,
        })
    }

    /// Read and validate a local image file
    pub async fn load(path: &Path) -> Result<Self, ImageCacheError> {
        if !tokio::fs::try_exists(path).await.unwrap_or(false) {
            return Err(ImageCacheError::NotFound(path.to_path_buf()));
        }

        let bytes = tokio::fs::read(path).await?;
        debug!("Read {} bytes from {}", bytes.len(), path.display());
        Self::from_bytes(bytes)
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Lower-case hex SHA-256 digest
pub fn fingerprint(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}
