//! Collaborator contracts
//!
//! ```text
//!   InventorySource ──┐
//!                     ├──> sync engine ──> CatalogStore
//!   ImageCache ───────┘                     (R2 / local)
//! ```

pub mod traits;

pub use traits::{
    CatalogError, CatalogResult, CatalogStore, ImageCache, ImageCacheError, InventoryError,
    InventorySource, ProgressReporter, RemoteArtifact,
};
