//! Run orchestration for catalog reconciliation
//!
//! Takes both snapshots, plans, applies, and wraps the outcome in a
//! [`SyncRun`] record. Only snapshot failures abort a run; everything after
//! planning is isolated per action by the executor.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, info, instrument};
use uuid::Uuid;

use crate::domain::metadata::identity_metadata;
use crate::domain::{group_stock, Availability, AvailabilityCalculator, ProductIdentity};
use crate::providers::{
    CatalogError, CatalogStore, ImageCache, ImageCacheError, InventoryError, InventorySource,
    ProgressReporter,
};

use super::executor::{ReconciliationResult, ResultAccumulator, SyncExecutor};
use super::planner::{ReconciliationPlanner, SyncPlan};
use super::resolver::{CatalogArtifact, IdentityResolver};
use super::status::{catalog_status, ProductStatus};

/// Failures that abort an operation before any action is applied
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Inventory error: {0}")]
    Inventory(#[from] InventoryError),

    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("Image error: {0}")]
    Image(#[from] ImageCacheError),

    #[error("Product not in inventory: {0}")]
    UnknownProduct(String),
}

/// Status of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncRunStatus {
    Running,
    Completed,
    Failed,
}

impl std::fmt::Display for SyncRunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncRunStatus::Running => write!(f, "running"),
            SyncRunStatus::Completed => write!(f, "completed"),
            SyncRunStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Record of one reconciliation run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncRun {
    pub id: Uuid,
    pub status: SyncRunStatus,
    /// Removal-eligible artifacts plus inventory entries
    pub planned_items: usize,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
}

impl SyncRun {
    /// Start a new run
    pub fn start() -> Self {
        Self {
            id: Uuid::new_v4(),
            status: SyncRunStatus::Running,
            planned_items: 0,
            started_at: Utc::now(),
            completed_at: None,
            error_message: None,
        }
    }

    pub fn complete(&mut self) {
        self.status = SyncRunStatus::Completed;
        self.completed_at = Some(Utc::now());
    }

    pub fn fail(&mut self, error: &str) {
        self.status = SyncRunStatus::Failed;
        self.completed_at = Some(Utc::now());
        self.error_message = Some(error.to_string());
    }

    /// Duration in milliseconds, up to now while still running
    pub fn duration_ms(&self) -> i64 {
        let end = self.completed_at.unwrap_or_else(Utc::now);
        (end - self.started_at).num_milliseconds()
    }
}

/// A finished run and its counters
#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub run: SyncRun,
    pub result: ReconciliationResult,
}

/// Coordinates inventory, catalog and local images
pub struct SyncOrchestrator {
    inventory: Arc<dyn InventorySource>,
    catalog: Arc<dyn CatalogStore>,
    images: Arc<dyn ImageCache>,
    planner: ReconciliationPlanner,
}

impl SyncOrchestrator {
    pub fn new(
        inventory: Arc<dyn InventorySource>,
        catalog: Arc<dyn CatalogStore>,
        images: Arc<dyn ImageCache>,
        planner: ReconciliationPlanner,
    ) -> Self {
        Self {
            inventory,
            catalog,
            images,
            planner,
        }
    }

    /// Current availability of every product known to the inventory
    #[instrument(skip(self))]
    pub async fn inventory_snapshot(
        &self,
    ) -> Result<HashMap<ProductIdentity, Availability>, SyncError> {
        let records = self.inventory.list_stock().await?;
        debug!("Inventory returned {} stock rows", records.len());
        let snapshot = AvailabilityCalculator::compute(&group_stock(records));
        info!("Inventory snapshot: {} products", snapshot.len());
        Ok(snapshot)
    }

    /// Identified catalog artifacts keyed by identity
    #[instrument(skip(self), fields(store = self.catalog.name()))]
    pub async fn catalog_snapshot(
        &self,
    ) -> Result<HashMap<ProductIdentity, CatalogArtifact>, SyncError> {
        let remotes = self.catalog.list_artifacts().await?;
        let snapshot = IdentityResolver::catalog_snapshot(&remotes);
        info!(
            "Catalog snapshot: {} identified of {} artifacts",
            snapshot.len(),
            remotes.len()
        );
        Ok(snapshot)
    }

    /// Local image candidates for the given products
    pub async fn image_candidates<'a>(
        &self,
        identities: impl IntoIterator<Item = &'a ProductIdentity>,
    ) -> HashMap<ProductIdentity, PathBuf> {
        let mut candidates = HashMap::new();
        for identity in identities {
            if let Some(path) = self.images.lookup(identity).await {
                candidates.insert(identity.clone(), path);
            }
        }
        candidates
    }

    /// Take both snapshots and plan without applying anything
    pub async fn plan(&self) -> Result<SyncPlan, SyncError> {
        let inventory = self.inventory_snapshot().await?;
        let catalog = self.catalog_snapshot().await?;
        let images = self.image_candidates(inventory.keys()).await;
        Ok(self.planner.plan(&inventory, &catalog, &images))
    }

    /// Run a full reconciliation.
    ///
    /// Returns `Err` only when a snapshot could not be taken; per-action
    /// failures end up in the result's error list.
    #[instrument(skip_all)]
    pub async fn run(
        &self,
        progress: Option<&dyn ProgressReporter>,
    ) -> Result<SyncReport, SyncError> {
        let mut run = SyncRun::start();
        info!(run_id = %run.id, "Starting catalog reconciliation");

        let plan = match self.plan().await {
            Ok(plan) => plan,
            Err(e) => {
                error!(run_id = %run.id, "Reconciliation aborted: {}", e);
                run.fail(&e.to_string());
                return Err(e);
            }
        };
        run.planned_items = plan.total();

        let result = SyncExecutor::new(self.catalog.as_ref())
            .execute(&plan, progress)
            .await;
        run.complete();

        info!(
            run_id = %run.id,
            duration_ms = run.duration_ms(),
            "Completed reconciliation of {} items",
            run.planned_items
        );

        Ok(SyncReport { run, result })
    }

    /// Read-only per-product report
    pub async fn status(&self) -> Result<Vec<ProductStatus>, SyncError> {
        let inventory = self.inventory_snapshot().await?;
        let catalog = self.catalog_snapshot().await?;
        Ok(catalog_status(&inventory, &catalog))
    }

    /// Cache `source` as the product's image and publish it right away
    #[instrument(skip(self), fields(identity = %identity))]
    pub async fn link_image(
        &self,
        identity: &ProductIdentity,
        source: &Path,
    ) -> Result<ReconciliationResult, SyncError> {
        let inventory = self.inventory_snapshot().await?;
        let desired = inventory
            .get(identity)
            .ok_or_else(|| SyncError::UnknownProduct(identity.canonical()))?;

        let image = self.images.associate(identity, source).await?;
        let catalog = self.catalog_snapshot().await?;
        let item = self.planner.plan_link(desired, catalog.get(identity), image);

        let mut acc = ResultAccumulator::default();
        SyncExecutor::new(self.catalog.as_ref())
            .apply_item(&item, &mut acc, |message| debug!("{}", message))
            .await;
        Ok(acc.finish())
    }

    /// Write identity metadata onto an existing artifact.
    ///
    /// Returns whether anything was written.
    #[instrument(skip(self), fields(identity = %identity))]
    pub async fn bind(&self, handle: &str, identity: &ProductIdentity) -> Result<bool, SyncError> {
        let current = self.catalog.current_metadata(handle).await?;
        let entries = identity_metadata(identity);

        if entries.iter().all(|(k, v)| current.get(k) == Some(v)) {
            debug!("Artifact {} already bound", handle);
            return Ok(false);
        }

        self.catalog.update_metadata(handle, &entries).await?;
        info!("Bound artifact {} to {}", handle, identity);
        Ok(true)
    }
}
