//! Cloudflare R2 catalog store
//!
//! R2 is S3-compatible, so we use aws-sdk-s3 with custom endpoint configuration.
//!
//! ## Layout
//! ```text
//! {bucket}/
//! └── {prefix}/
//!     └── {uuid}            # one object per artifact, handle = uuid
//!         x-amz-meta-caption
//!         x-amz-meta-sku_brand / sku_model / sku_category / sku_key
//!         x-amz-meta-sku_technical_sizes
//!         x-amz-meta-content_sha256
//! ```
//!
//! Object metadata travels as HTTP headers, so values that are not plain
//! ASCII are stored form-urlencoded behind [`ENCODED_MARKER`].

use std::collections::HashMap;
use std::fmt;

use async_trait::async_trait;
use aws_sdk_s3::{
    config::{BehaviorVersion, Builder, Credentials, Region},
    error::SdkError,
    primitives::ByteStream,
    types::MetadataDirective,
    Client as S3Client,
};
use tracing::{debug, info, instrument};
use url::form_urlencoded;
use uuid::Uuid;

use crate::config::R2Settings;
use crate::domain::metadata::{self, Metadata};
use crate::domain::ProductIdentity;
use crate::images::ImagePayload;
use crate::providers::{CatalogError, CatalogResult, CatalogStore, RemoteArtifact};

/// Metadata key holding the display caption
pub const CAPTION_KEY: &str = "caption";

/// Prefix of metadata values stored form-urlencoded
pub const ENCODED_MARKER: &str = "urlenc:";

const LIST_PAGE_SIZE: i32 = 1000;
const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Current state of one object, as read by a HEAD request
struct ObjectHead {
    caption: String,
    metadata: Metadata,
    content_type: String,
}

/// Catalog store backed by an R2 bucket
#[derive(Clone)]
pub struct R2CatalogStore {
    client: S3Client,
    bucket: String,
    prefix: String,
}

impl R2CatalogStore {
    /// Create a new store from settings
    pub fn new(settings: &R2Settings) -> CatalogResult<Self> {
        if settings.account_id.is_empty()
            || settings.access_key_id.is_empty()
            || settings.secret_access_key.is_empty()
        {
            return Err(CatalogError::NotConfigured(
                "R2 account id and access keys are required".to_string(),
            ));
        }

        // R2 endpoint format: https://{account_id}.r2.cloudflarestorage.com
        let endpoint = format!("https://{}.r2.cloudflarestorage.com", settings.account_id);
        debug!("Creating R2 client with endpoint: {}", endpoint);

        let credentials = Credentials::new(
            &settings.access_key_id,
            &settings.secret_access_key,
            None,
            None,
            "r2-static-credentials",
        );

        let config = Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .endpoint_url(&endpoint)
            .region(Region::new("auto"))
            .credentials_provider(credentials)
            .force_path_style(true)
            .build();

        Ok(Self {
            client: S3Client::from_conf(config),
            bucket: settings.bucket_name.clone(),
            prefix: settings.prefix.trim_matches('/').to_string(),
        })
    }

    /// Object key for a handle
    pub fn key(&self, handle: &str) -> String {
        object_key(&self.prefix, handle)
    }

    async fn head(&self, handle: &str) -> CatalogResult<ObjectHead> {
        let key = self.key(handle);
        let output = self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await
            .map_err(|e| request_error(handle, e))?;

        let mut metadata = decode_metadata(output.metadata().cloned().unwrap_or_default());
        let caption = metadata.remove(CAPTION_KEY).unwrap_or_default();

        Ok(ObjectHead {
            caption,
            metadata,
            content_type: output
                .content_type()
                .unwrap_or(DEFAULT_CONTENT_TYPE)
                .to_string(),
        })
    }

    /// Rewrite an object's metadata in place
    async fn replace_metadata(
        &self,
        handle: &str,
        caption: &str,
        metadata: &Metadata,
        content_type: &str,
    ) -> CatalogResult<()> {
        let key = self.key(handle);
        self.client
            .copy_object()
            .bucket(&self.bucket)
            .key(&key)
            .copy_source(format!("{}/{}", self.bucket, key))
            .metadata_directive(MetadataDirective::Replace)
            .set_metadata(Some(encode_metadata(caption, metadata)))
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| request_error(handle, e))?;
        Ok(())
    }

    async fn put(
        &self,
        handle: &str,
        caption: &str,
        content: &ImagePayload,
        metadata: &Metadata,
    ) -> CatalogResult<()> {
        let mut metadata = metadata.clone();
        metadata.insert(metadata::KEY_FINGERPRINT.to_string(), content.fingerprint.clone());

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(self.key(handle))
            .body(ByteStream::from(content.bytes.clone()))
            .content_type(content.content_type)
            .set_metadata(Some(encode_metadata(caption, &metadata)))
            .send()
            .await
            .map_err(|e| request_error(handle, e))?;
        Ok(())
    }

    /// All handles under the prefix
    async fn list_handles(&self) -> CatalogResult<Vec<String>> {
        let mut handles = Vec::new();
        let mut continuation_token: Option<String> = None;
        let list_prefix = object_key(&self.prefix, "");

        loop {
            let mut request = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(&list_prefix)
                .max_keys(LIST_PAGE_SIZE);

            if let Some(token) = continuation_token.take() {
                request = request.continuation_token(token);
            }

            let result = request
                .send()
                .await
                .map_err(|e| CatalogError::Request(format!("List failed: {}", sdk_message(&e))))?;

            for object in result.contents() {
                if let Some(handle) = object.key().and_then(|k| handle_from_key(&self.prefix, k)) {
                    handles.push(handle);
                }
            }

            match result.next_continuation_token() {
                Some(token) if result.is_truncated().unwrap_or(false) => {
                    continuation_token = Some(token.to_string());
                }
                _ => break,
            }
        }

        debug!("Listed {} objects under {}", handles.len(), list_prefix);
        Ok(handles)
    }
}

#[async_trait]
impl CatalogStore for R2CatalogStore {
    fn name(&self) -> &'static str {
        "r2"
    }

    #[instrument(skip(self), fields(bucket = %self.bucket))]
    async fn list_artifacts(&self) -> CatalogResult<Vec<RemoteArtifact>> {
        let handles = self.list_handles().await?;
        let mut artifacts = Vec::with_capacity(handles.len());

        for handle in handles {
            let head = self.head(&handle).await?;
            artifacts.push(RemoteArtifact {
                handle,
                caption: head.caption,
                metadata: head.metadata,
            });
        }

        Ok(artifacts)
    }

    #[instrument(skip(self, content, metadata), fields(identity = %identity, size = content.len()))]
    async fn create_artifact(
        &self,
        identity: &ProductIdentity,
        caption: &str,
        content: &ImagePayload,
        metadata: &Metadata,
    ) -> CatalogResult<String> {
        let handle = Uuid::new_v4().to_string();
        self.put(&handle, caption, content, metadata).await?;
        info!("Uploaded to R2: {} ({} bytes)", self.key(&handle), content.len());
        Ok(handle)
    }

    #[instrument(skip(self))]
    async fn update_caption(&self, handle: &str, caption: &str) -> CatalogResult<()> {
        let head = self.head(handle).await?;
        self.replace_metadata(handle, caption, &head.metadata, &head.content_type)
            .await
    }

    #[instrument(skip(self, content), fields(size = content.len()))]
    async fn update_content(&self, handle: &str, content: &ImagePayload) -> CatalogResult<()> {
        let head = self.head(handle).await?;
        self.put(handle, &head.caption, content, &head.metadata).await
    }

    #[instrument(skip(self, entries))]
    async fn update_metadata(&self, handle: &str, entries: &Metadata) -> CatalogResult<()> {
        let mut head = self.head(handle).await?;
        head.metadata
            .extend(entries.iter().map(|(k, v)| (k.clone(), v.clone())));
        self.replace_metadata(handle, &head.caption, &head.metadata, &head.content_type)
            .await
    }

    #[instrument(skip(self))]
    async fn remove(&self, handle: &str) -> CatalogResult<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(self.key(handle))
            .send()
            .await
            .map_err(|e| request_error(handle, e))?;

        info!("Deleted from R2: {}", self.key(handle));
        Ok(())
    }

    async fn current_caption(&self, handle: &str) -> CatalogResult<String> {
        Ok(self.head(handle).await?.caption)
    }

    async fn current_fingerprint(&self, handle: &str) -> CatalogResult<Option<String>> {
        Ok(self
            .head(handle)
            .await?
            .metadata
            .remove(metadata::KEY_FINGERPRINT))
    }

    async fn current_metadata(&self, handle: &str) -> CatalogResult<Metadata> {
        Ok(self.head(handle).await?.metadata)
    }
}

// ============================================================================
// Keys and metadata encoding
// ============================================================================

fn object_key(prefix: &str, handle: &str) -> String {
    if prefix.is_empty() {
        handle.to_string()
    } else {
        format!("{}/{}", prefix, handle)
    }
}

/// Handle of a listed key; nested keys are not artifacts
fn handle_from_key(prefix: &str, key: &str) -> Option<String> {
    let rest = if prefix.is_empty() {
        key
    } else {
        key.strip_prefix(prefix)?.strip_prefix('/')?
    };

    if rest.is_empty() || rest.contains('/') {
        None
    } else {
        Some(rest.to_string())
    }
}

fn encode_value(value: &str) -> String {
    if value.is_ascii() {
        value.to_string()
    } else {
        let encoded: String = form_urlencoded::byte_serialize(value.as_bytes()).collect();
        format!("{}{}", ENCODED_MARKER, encoded)
    }
}

fn decode_value(value: &str) -> String {
    let Some(encoded) = value.strip_prefix(ENCODED_MARKER) else {
        return value.to_string();
    };

    // byte_serialize escapes '&' and '=', so the whole value parses as one key
    form_urlencoded::parse(encoded.as_bytes())
        .next()
        .map(|(decoded, _)| decoded.into_owned())
        .unwrap_or_default()
}

fn encode_metadata(caption: &str, metadata: &Metadata) -> HashMap<String, String> {
    let mut encoded: HashMap<String, String> = metadata
        .iter()
        .map(|(k, v)| (k.to_lowercase(), encode_value(v)))
        .collect();
    encoded.insert(CAPTION_KEY.to_string(), encode_value(caption));
    encoded
}

fn decode_metadata(raw: HashMap<String, String>) -> Metadata {
    raw.into_iter()
        .map(|(k, v)| (k.to_lowercase(), decode_value(&v)))
        .collect()
}

fn sdk_message<E: fmt::Debug>(err: &SdkError<E>) -> String {
    format!("{:?}", err)
}

fn request_error<E: fmt::Debug>(handle: &str, err: SdkError<E>) -> CatalogError {
    if is_not_found_error(&err) {
        CatalogError::NotFound(handle.to_string())
    } else {
        CatalogError::Request(sdk_message(&err))
    }
}

/// Helper to check if an SDK error is a "not found" error
fn is_not_found_error<E: fmt::Debug>(err: &SdkError<E>) -> bool {
    let debug_str = format!("{:?}", err);
    debug_str.contains("NoSuchKey") || debug_str.contains("NotFound") || debug_str.contains("404")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_keys() {
        assert_eq!(object_key("catalog", "abc"), "catalog/abc");
        assert_eq!(object_key("", "abc"), "abc");
        assert_eq!(object_key("catalog", ""), "catalog/");
    }

    #[test]
    fn test_handle_from_key() {
        assert_eq!(handle_from_key("catalog", "catalog/abc").as_deref(), Some("abc"));
        assert_eq!(handle_from_key("", "abc").as_deref(), Some("abc"));
        assert_eq!(handle_from_key("catalog", "catalog/old/abc"), None);
        assert_eq!(handle_from_key("catalog", "other/abc"), None);
        assert_eq!(handle_from_key("catalog", "catalog/"), None);
    }

    #[test]
    fn test_non_ascii_values_are_encoded() {
        let encoded = encode_value("Grêmio & Cia");
        assert!(encoded.starts_with(ENCODED_MARKER));
        assert!(encoded.is_ascii());
        assert_eq!(decode_value(&encoded), "Grêmio & Cia");
    }

    #[test]
    fn test_ascii_values_pass_through() {
        assert_eq!(encode_value("VAS - P, M"), "VAS - P, M");
        assert_eq!(decode_value("VAS - P, M"), "VAS - P, M");
    }

    #[test]
    fn test_caption_travels_in_metadata() {
        let mut metadata = Metadata::new();
        metadata.insert("sku_brand".to_string(), "Vasco".to_string());

        let mut decoded = decode_metadata(encode_metadata("VAS - P", &metadata));
        assert_eq!(decoded.remove(CAPTION_KEY).as_deref(), Some("VAS - P"));
        assert_eq!(decoded, metadata);
    }
}
