//! Plan executor
//!
//! Applies a [`SyncPlan`] against the catalog store, one action at a time.
//! Every remote write is preceded by a read of the current value and skipped
//! when nothing would change, so a second run over an unchanged world makes no
//! writes at all. A failing action is recorded and the run moves on.

use std::panic::{catch_unwind, AssertUnwindSafe};

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::domain::metadata::{self, creation_metadata, size_lists_match, Metadata};
use crate::domain::{Availability, CaptionGenerator, ProductIdentity};
use crate::images::ImagePayload;
use crate::providers::{CatalogError, CatalogStore, ImageCacheError, ProgressReporter};

use super::planner::{ActionKind, PlannedItem, SyncAction, SyncPlan};

/// Longest error cause kept in the result, in characters
pub const MAX_ERROR_CAUSE_LEN: usize = 180;

/// Failure of a single action
#[derive(Debug, Error)]
pub enum ActionError {
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Image(#[from] ImageCacheError),

    #[error("Planned item is missing its {0}")]
    MissingInput(&'static str),
}

/// Aggregate outcome of one run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconciliationResult {
    pub created: usize,
    pub updated: usize,
    pub removed: usize,
    pub pending_no_local_image: usize,
    /// Canonical names of the pending products
    pub pending: Vec<String>,
    /// One line per failed action, in execution order
    pub errors: Vec<String>,
}

impl ReconciliationResult {
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Whether the run wrote anything
    pub fn changed_anything(&self) -> bool {
        self.created + self.updated + self.removed > 0
    }
}

/// Outcome of one successfully applied action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Applied {
    Created,
    Removed,
    Changed,
    Unchanged,
}

/// Accumulates counters while a plan is applied; frozen by [`finish`](Self::finish)
#[derive(Debug, Default)]
pub struct ResultAccumulator {
    result: ReconciliationResult,
}

impl ResultAccumulator {
    fn record(&mut self, applied: Applied) {
        match applied {
            Applied::Created => self.result.created += 1,
            Applied::Removed => self.result.removed += 1,
            Applied::Changed | Applied::Unchanged => {}
        }
    }

    fn record_updated(&mut self) {
        self.result.updated += 1;
    }

    fn record_pending(&mut self, identity: &ProductIdentity) {
        self.result.pending_no_local_image += 1;
        self.result.pending.push(identity.canonical());
    }

    fn record_error(&mut self, kind: ActionKind, identity: &ProductIdentity, error: &ActionError) {
        let line = format!("{} {} -> {}", kind.label(), identity, summarize_error(error));
        warn!("{}", line);
        self.result.errors.push(line);
    }

    pub fn finish(self) -> ReconciliationResult {
        self.result
    }
}

/// Single-line error cause capped at [`MAX_ERROR_CAUSE_LEN`] characters
pub fn summarize_error(error: &dyn std::error::Error) -> String {
    let message = error.to_string().replace(['\n', '\r'], " ");
    let message = message.trim();

    if message.is_empty() {
        return "unknown error".to_string();
    }

    if message.chars().count() > MAX_ERROR_CAUSE_LEN {
        let cut: String = message.chars().take(MAX_ERROR_CAUSE_LEN).collect();
        format!("{}...", cut)
    } else {
        message.to_string()
    }
}

/// Call the reporter, discarding both errors and panics
fn report(progress: Option<&dyn ProgressReporter>, current: usize, total: usize, message: &str) {
    let Some(reporter) = progress else {
        return;
    };

    let total = total.max(1);
    match catch_unwind(AssertUnwindSafe(|| reporter.report(current, total, message))) {
        Ok(Ok(())) => {}
        Ok(Err(e)) => debug!("Progress reporter failed: {}", e),
        Err(_) => debug!("Progress reporter panicked"),
    }
}

/// Applies plans against a catalog store
pub struct SyncExecutor<'a> {
    store: &'a dyn CatalogStore,
}

impl<'a> SyncExecutor<'a> {
    pub fn new(store: &'a dyn CatalogStore) -> Self {
        Self { store }
    }

    /// Apply every planned item in order and summarise the outcome
    #[instrument(skip_all, fields(store = self.store.name(), items = plan.total()))]
    pub async fn execute(
        &self,
        plan: &SyncPlan,
        progress: Option<&dyn ProgressReporter>,
    ) -> ReconciliationResult {
        let total = plan.total();
        let mut acc = ResultAccumulator::default();

        for (idx, item) in plan.items.iter().enumerate() {
            let current = idx + 1;
            self.apply_item(item, &mut acc, |message| {
                report(progress, current, total, message)
            })
            .await;
        }

        report(progress, total, total, "Done");

        let result = acc.finish();
        info!(
            "Sync finished: {} created, {} updated, {} removed, {} pending, {} errors",
            result.created,
            result.updated,
            result.removed,
            result.pending_no_local_image,
            result.errors.len()
        );
        result
    }

    /// Apply all actions of one item; the item counts as updated once if any
    /// update action actually wrote something.
    pub async fn apply_item(
        &self,
        item: &PlannedItem,
        acc: &mut ResultAccumulator,
        mut on_attempt: impl FnMut(&str),
    ) {
        if item.pending {
            acc.record_pending(&item.identity);
            on_attempt(&format!("Pending, no local image: {}", item.identity));
            return;
        }

        let mut changed = false;

        for action in &item.actions {
            match self.apply(item, action).await {
                Ok(applied) => {
                    changed |= applied == Applied::Changed;
                    acc.record(applied);
                }
                Err(e) => acc.record_error(action.kind, &item.identity, &e),
            }
            on_attempt(&format!("{} {}", action.kind, item.identity));
        }

        if changed {
            acc.record_updated();
        }
    }

    async fn apply(&self, item: &PlannedItem, action: &SyncAction) -> Result<Applied, ActionError> {
        match action.kind {
            ActionKind::Create => self.create(item).await,
            ActionKind::UpdateTechnicalSizes => self.update_technical_sizes(item).await,
            ActionKind::UpdateCaption => self.update_caption(item).await,
            ActionKind::UpdateContent => self.update_content(item).await,
            ActionKind::Remove => self.remove(item).await,
            ActionKind::None => Ok(Applied::Unchanged),
        }
    }

    async fn create(&self, item: &PlannedItem) -> Result<Applied, ActionError> {
        let desired = desired(item)?;
        let image = item.image.as_deref().ok_or(ActionError::MissingInput("image"))?;

        let payload = ImagePayload::load(image).await?;
        let caption = CaptionGenerator::generate(&item.identity, desired);
        let metadata = creation_metadata(desired);

        let handle = self
            .store
            .create_artifact(&item.identity, &caption, &payload, &metadata)
            .await?;

        info!("Created {} as {} ({})", item.identity, handle, caption);
        Ok(Applied::Created)
    }

    async fn update_technical_sizes(&self, item: &PlannedItem) -> Result<Applied, ActionError> {
        let handle = handle(item)?;
        let candidate = desired(item)?.technical_sizes();

        let current = self.store.current_metadata(handle).await?;
        let existing = current.get(metadata::KEY_TECHNICAL_SIZES).map(String::as_str);
        if size_lists_match(existing, &candidate) {
            debug!("Technical sizes of {} already current", item.identity);
            return Ok(Applied::Unchanged);
        }

        let mut entries = Metadata::new();
        entries.insert(metadata::KEY_TECHNICAL_SIZES.to_string(), candidate);
        self.store.update_metadata(handle, &entries).await?;

        info!("Updated technical sizes of {}", item.identity);
        Ok(Applied::Changed)
    }

    async fn update_caption(&self, item: &PlannedItem) -> Result<Applied, ActionError> {
        let handle = handle(item)?;
        let caption = CaptionGenerator::generate(&item.identity, desired(item)?);

        if self.store.current_caption(handle).await? == caption {
            debug!("Caption of {} already current", item.identity);
            return Ok(Applied::Unchanged);
        }

        self.store.update_caption(handle, &caption).await?;
        info!("Updated caption of {} to {}", item.identity, caption);
        Ok(Applied::Changed)
    }

    async fn update_content(&self, item: &PlannedItem) -> Result<Applied, ActionError> {
        let handle = handle(item)?;
        let image = item.image.as_deref().ok_or(ActionError::MissingInput("image"))?;

        let payload = ImagePayload::load(image).await?;
        let current = self.store.current_fingerprint(handle).await?;
        if current.as_deref() == Some(payload.fingerprint.as_str()) {
            debug!("Content of {} already current", item.identity);
            return Ok(Applied::Unchanged);
        }

        self.store.update_content(handle, &payload).await?;
        info!("Replaced content of {} ({} bytes)", item.identity, payload.len());
        Ok(Applied::Changed)
    }

    async fn remove(&self, item: &PlannedItem) -> Result<Applied, ActionError> {
        let handle = handle(item)?;
        self.store.remove(handle).await?;
        info!("Removed {} ({})", item.identity, handle);
        Ok(Applied::Removed)
    }
}

fn handle(item: &PlannedItem) -> Result<&str, ActionError> {
    item.handle.as_deref().ok_or(ActionError::MissingInput("artifact handle"))
}

fn desired(item: &PlannedItem) -> Result<&Availability, ActionError> {
    item.desired.as_ref().ok_or(ActionError::MissingInput("availability"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summarize_truncates_long_causes() {
        let long = CatalogError::Request("x".repeat(400));
        let summary = summarize_error(&long);
        assert_eq!(summary.chars().count(), MAX_ERROR_CAUSE_LEN + 3);
        assert!(summary.ends_with("..."));
    }

    #[test]
    fn test_summarize_single_line() {
        let err = CatalogError::Request("first\nsecond\r\nthird".into());
        let summary = summarize_error(&err);
        assert!(!summary.contains('\n'));
        assert!(!summary.contains('\r'));
        assert!(summary.starts_with("Catalog request failed: first second"));
    }

    #[test]
    fn test_summarize_short_cause_unchanged() {
        let err = CatalogError::NotFound("abc".into());
        assert_eq!(summarize_error(&err), "Artifact not found: abc");
    }

    #[test]
    fn test_panicking_reporter_is_contained() {
        let closure = |_: usize, _: usize, _: &str| -> anyhow::Result<()> { panic!("boom") };
        let reporter: &dyn ProgressReporter = &closure;
        report(Some(reporter), 1, 2, "step");
    }

    #[test]
    fn test_failing_reporter_is_contained() {
        let closure =
            |_: usize, _: usize, _: &str| -> anyhow::Result<()> { anyhow::bail!("ui closed") };
        let reporter: &dyn ProgressReporter = &closure;
        report(Some(reporter), 1, 2, "step");
    }
}
