//! Catalog reconciliation
//!
//! ```text
//!   InventorySource ──► availability ─┐
//!                                     ├─► ReconciliationPlanner ─► SyncPlan ─► SyncExecutor ─► CatalogStore
//!   CatalogStore ──► IdentityResolver ┘            ▲
//!   ImageCache ──► image candidates ───────────────┘
//! ```

mod executor;
mod orchestrator;
mod planner;
mod resolver;
mod status;

pub use executor::{
    summarize_error, ActionError, ReconciliationResult, ResultAccumulator, SyncExecutor,
    MAX_ERROR_CAUSE_LEN,
};
pub use orchestrator::{SyncError, SyncOrchestrator, SyncReport, SyncRun, SyncRunStatus};
pub use planner::{
    sizes_in_sync, ActionKind, PlannedItem, ReconciliationPlanner, SyncAction, SyncPlan,
    DEFAULT_PLACEHOLDER_MODEL,
};
pub use resolver::{CatalogArtifact, IdentityResolver, SizeSource};
pub use status::{catalog_status, ProductState, ProductStatus};
