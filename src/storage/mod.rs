//! Catalog store backends
//!
//! R2 is S3-compatible, so the remote backend uses the AWS SDK. The local
//! backend keeps the same contract on a plain directory for offline runs.

mod local;
mod r2;

pub use local::LocalCatalogStore;
pub use r2::{R2CatalogStore, CAPTION_KEY};
