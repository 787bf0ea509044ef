//! Reconciliation planner
//!
//! Diffs the inventory snapshot against the catalog snapshot and produces an
//! ordered plan. Removals come first so identity collisions are freed before
//! anything is created; creations and updates follow in canonical identity
//! order so runs are reproducible.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

use crate::domain::{Availability, CaptionGenerator, ProductIdentity};

use super::resolver::{CatalogArtifact, SizeSource};

/// Default reserved model value exempting an artifact from removal
pub const DEFAULT_PLACEHOLDER_MODEL: &str = "CATALOGO";

/// Kind of change planned for a product
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Create,
    UpdateCaption,
    UpdateContent,
    UpdateTechnicalSizes,
    Remove,
    None,
}

impl ActionKind {
    /// Label used in error lines and progress messages
    pub fn label(&self) -> &'static str {
        match self {
            ActionKind::Create => "CREATE",
            ActionKind::UpdateCaption => "CAPTION",
            ActionKind::UpdateContent => "CONTENT",
            ActionKind::UpdateTechnicalSizes => "METADATA",
            ActionKind::Remove => "REMOVE",
            ActionKind::None => "NONE",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One planned change with a human-readable reason
#[derive(Debug, Clone, Serialize)]
pub struct SyncAction {
    pub kind: ActionKind,
    pub identity: ProductIdentity,
    pub reason: String,
}

impl SyncAction {
    fn new(kind: ActionKind, identity: &ProductIdentity, reason: impl Into<String>) -> Self {
        Self {
            kind,
            identity: identity.clone(),
            reason: reason.into(),
        }
    }
}

/// Everything planned for one product, applied as one logical item
#[derive(Debug, Clone)]
pub struct PlannedItem {
    pub identity: ProductIdentity,
    /// Existing artifact, if cataloged
    pub handle: Option<String>,
    /// Inventory availability; absent for removals
    pub desired: Option<Availability>,
    /// Local image candidate
    pub image: Option<PathBuf>,
    /// New product with no local image yet
    pub pending: bool,
    pub actions: Vec<SyncAction>,
}

/// Ordered plan for one run
#[derive(Debug, Clone, Default)]
pub struct SyncPlan {
    pub items: Vec<PlannedItem>,
}

impl SyncPlan {
    /// Removal-eligible artifacts plus inventory entries
    pub fn total(&self) -> usize {
        self.items.len()
    }

    pub fn actions(&self) -> impl Iterator<Item = &SyncAction> {
        self.items.iter().flat_map(|item| item.actions.iter())
    }

    pub fn pending(&self) -> impl Iterator<Item = &ProductIdentity> {
        self.items
            .iter()
            .filter(|item| item.pending)
            .map(|item| &item.identity)
    }

    pub fn count(&self, kind: ActionKind) -> usize {
        self.actions().filter(|a| a.kind == kind).count()
    }
}

/// Whether the catalog's observed sizes match the inventory.
///
/// A child artifact without technical metadata counts as matching until the
/// metadata is backfilled.
pub fn sizes_in_sync(desired: &Availability, artifact: &CatalogArtifact) -> bool {
    artifact.size_source == SizeSource::Missing || desired.same_sizes(&artifact.observed)
}

/// Whether the artifact's caption must be rewritten.
///
/// Drifted sizes always require it. Once technical sizes are stored they no
/// longer reflect the caption, so the caption text itself is compared too;
/// a caption write that failed after the metadata landed is retried this way.
pub fn caption_outdated(desired: &Availability, artifact: &CatalogArtifact) -> bool {
    if !sizes_in_sync(desired, artifact) {
        return true;
    }
    artifact.size_source == SizeSource::Technical
        && artifact.caption != CaptionGenerator::generate(desired.identity(), desired)
}

fn sort_key(identity: &ProductIdentity) -> (String, String) {
    (identity.canonical(), identity.composite_key())
}

pub struct ReconciliationPlanner {
    placeholder_model: String,
}

impl Default for ReconciliationPlanner {
    fn default() -> Self {
        Self::new(DEFAULT_PLACEHOLDER_MODEL)
    }
}

impl ReconciliationPlanner {
    pub fn new(placeholder_model: impl Into<String>) -> Self {
        Self {
            placeholder_model: placeholder_model.into(),
        }
    }

    pub fn is_placeholder(&self, identity: &ProductIdentity) -> bool {
        identity.is_placeholder(&self.placeholder_model)
    }

    /// Build the plan.
    ///
    /// `images` holds the local image candidate of every inventory product
    /// that has one.
    pub fn plan(
        &self,
        inventory: &HashMap<ProductIdentity, Availability>,
        catalog: &HashMap<ProductIdentity, CatalogArtifact>,
        images: &HashMap<ProductIdentity, PathBuf>,
    ) -> SyncPlan {
        let mut plan = SyncPlan::default();

        // 1) Removals
        let mut stale: Vec<&CatalogArtifact> = catalog
            .values()
            .filter(|a| !inventory.contains_key(&a.identity))
            .filter(|a| !self.is_placeholder(&a.identity))
            .collect();
        stale.sort_by_key(|a| sort_key(&a.identity));

        for artifact in stale {
            plan.items.push(PlannedItem {
                identity: artifact.identity.clone(),
                handle: Some(artifact.handle.clone()),
                desired: None,
                image: None,
                pending: false,
                actions: vec![SyncAction::new(
                    ActionKind::Remove,
                    &artifact.identity,
                    "no longer in inventory",
                )],
            });
        }

        // 2) Creations and updates
        let mut entries: Vec<(&ProductIdentity, &Availability)> = inventory.iter().collect();
        entries.sort_by_key(|(identity, _)| sort_key(identity));

        for (identity, desired) in entries {
            let image = images.get(identity).cloned();
            let item = match catalog.get(identity) {
                None => Self::plan_new(identity, desired, image),
                Some(artifact) => Self::plan_existing(identity, desired, artifact, image),
            };
            plan.items.push(item);
        }

        plan
    }

    /// Plan publishing a freshly linked image for one product.
    ///
    /// Unlike a full run, the caption is always (guardedly) refreshed.
    pub fn plan_link(
        &self,
        desired: &Availability,
        artifact: Option<&CatalogArtifact>,
        image: PathBuf,
    ) -> PlannedItem {
        let identity = desired.identity();
        let Some(artifact) = artifact else {
            return Self::plan_new(identity, desired, Some(image));
        };

        let actions = vec![
            SyncAction::new(ActionKind::UpdateContent, identity, "image linked"),
            SyncAction::new(ActionKind::UpdateTechnicalSizes, identity, "image linked"),
            SyncAction::new(ActionKind::UpdateCaption, identity, "image linked"),
        ];

        PlannedItem {
            identity: identity.clone(),
            handle: Some(artifact.handle.clone()),
            desired: Some(desired.clone()),
            image: Some(image),
            pending: false,
            actions,
        }
    }

    fn plan_new(
        identity: &ProductIdentity,
        desired: &Availability,
        image: Option<PathBuf>,
    ) -> PlannedItem {
        let (pending, actions) = match image {
            Some(_) => (
                false,
                vec![SyncAction::new(
                    ActionKind::Create,
                    identity,
                    "in inventory, absent from catalog",
                )],
            ),
            None => (
                true,
                vec![SyncAction::new(
                    ActionKind::None,
                    identity,
                    "awaiting a local image",
                )],
            ),
        };

        PlannedItem {
            identity: identity.clone(),
            handle: None,
            desired: Some(desired.clone()),
            image,
            pending,
            actions,
        }
    }

    fn plan_existing(
        identity: &ProductIdentity,
        desired: &Availability,
        artifact: &CatalogArtifact,
        image: Option<PathBuf>,
    ) -> PlannedItem {
        let mut actions = Vec::with_capacity(3);

        // Caption before metadata: the caption check reads the metadata
        if caption_outdated(desired, artifact) {
            let reason = if sizes_in_sync(desired, artifact) {
                "caption text out of date".to_string()
            } else {
                format!(
                    "sizes differ: catalog [{}], inventory [{}]",
                    artifact.observed.technical_sizes(),
                    desired.technical_sizes()
                )
            };
            actions.push(SyncAction::new(ActionKind::UpdateCaption, identity, reason));
        }

        let metadata_reason = if artifact.size_source == SizeSource::Technical {
            "refresh technical sizes"
        } else {
            "backfill technical sizes"
        };
        actions.push(SyncAction::new(
            ActionKind::UpdateTechnicalSizes,
            identity,
            metadata_reason,
        ));

        if image.is_some() {
            actions.push(SyncAction::new(
                ActionKind::UpdateContent,
                identity,
                "local image available",
            ));
        }

        PlannedItem {
            identity: identity.clone(),
            handle: Some(artifact.handle.clone()),
            desired: Some(desired.clone()),
            image,
            pending: false,
            actions,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Category, SizeLabel};

    fn id(brand: &str, model: &str, category: Category) -> ProductIdentity {
        ProductIdentity::new(brand, model, category).unwrap()
    }

    fn artifact(identity: &ProductIdentity, sizes: Vec<SizeLabel>, source: SizeSource) -> CatalogArtifact {
        CatalogArtifact {
            handle: format!("h-{}", identity.composite_key()),
            identity: identity.clone(),
            observed: Availability::new(identity.clone(), sizes.clone()),
            size_source: source,
            caption: CaptionGenerator::generate(identity, &Availability::new(identity.clone(), sizes.clone())),
            fingerprint: None,
        }
    }

    fn kinds(item: &PlannedItem) -> Vec<ActionKind> {
        item.actions.iter().map(|a| a.kind).collect()
    }

    #[test]
    fn test_removal_precedes_creation() {
        let gone = id("Botafogo", "Home", Category::AdultMale);
        let new = id("Vasco", "Away", Category::AdultMale);

        let inventory = HashMap::from([(new.clone(), Availability::new(new.clone(), vec![SizeLabel::P]))]);
        let catalog = HashMap::from([(gone.clone(), artifact(&gone, vec![], SizeSource::Caption))]);
        let images = HashMap::from([(new.clone(), PathBuf::from("vasco.png"))]);

        let plan = ReconciliationPlanner::default().plan(&inventory, &catalog, &images);
        assert_eq!(plan.total(), 2);
        assert_eq!(kinds(&plan.items[0]), vec![ActionKind::Remove]);
        assert_eq!(kinds(&plan.items[1]), vec![ActionKind::Create]);
    }

    #[test]
    fn test_placeholder_never_removed() {
        let placeholder = id("Vasco", "Catalogo", Category::AdultMale);
        let catalog = HashMap::from([(
            placeholder.clone(),
            artifact(&placeholder, vec![], SizeSource::Caption),
        )]);

        let plan = ReconciliationPlanner::default().plan(&HashMap::new(), &catalog, &HashMap::new());
        assert_eq!(plan.count(ActionKind::Remove), 0);
        assert_eq!(plan.total(), 0);
    }

    #[test]
    fn test_missing_image_is_pending() {
        let new = id("Vasco", "Away", Category::AdultMale);
        let inventory = HashMap::from([(new.clone(), Availability::new(new.clone(), vec![SizeLabel::P]))]);

        let plan = ReconciliationPlanner::default().plan(&inventory, &HashMap::new(), &HashMap::new());
        assert_eq!(plan.count(ActionKind::Create), 0);
        assert_eq!(plan.pending().collect::<Vec<_>>(), vec![&new]);
        assert_eq!(plan.total(), 1);
    }

    #[test]
    fn test_size_drift_updates_caption() {
        let vasco = id("Vasco", "Away", Category::AdultMale);
        let inventory = HashMap::from([(
            vasco.clone(),
            Availability::new(vasco.clone(), vec![SizeLabel::P, SizeLabel::M]),
        )]);
        let catalog = HashMap::from([(
            vasco.clone(),
            artifact(&vasco, vec![SizeLabel::P], SizeSource::Caption),
        )]);

        let plan = ReconciliationPlanner::default().plan(&inventory, &catalog, &HashMap::new());
        assert_eq!(
            kinds(&plan.items[0]),
            vec![ActionKind::UpdateCaption, ActionKind::UpdateTechnicalSizes]
        );
    }

    #[test]
    fn test_stale_caption_with_current_technical_sizes() {
        let vasco = id("Vasco", "Away", Category::AdultMale);
        let desired = Availability::new(vasco.clone(), vec![SizeLabel::P, SizeLabel::M]);
        let mut stale = artifact(&vasco, vec![SizeLabel::P, SizeLabel::M], SizeSource::Technical);
        stale.caption = "VAS - P".to_string();

        assert!(sizes_in_sync(&desired, &stale));
        assert!(caption_outdated(&desired, &stale));

        let inventory = HashMap::from([(vasco.clone(), desired)]);
        let catalog = HashMap::from([(vasco.clone(), stale)]);
        let plan = ReconciliationPlanner::default().plan(&inventory, &catalog, &HashMap::new());
        assert_eq!(
            kinds(&plan.items[0]),
            vec![ActionKind::UpdateCaption, ActionKind::UpdateTechnicalSizes]
        );
    }

    #[test]
    fn test_matching_sizes_only_backfill_and_content() {
        let vasco = id("Vasco", "Away", Category::AdultMale);
        let inventory = HashMap::from([(
            vasco.clone(),
            Availability::new(vasco.clone(), vec![SizeLabel::P]),
        )]);
        let catalog = HashMap::from([(
            vasco.clone(),
            artifact(&vasco, vec![SizeLabel::P], SizeSource::Technical),
        )]);
        let images = HashMap::from([(vasco.clone(), PathBuf::from("vasco.png"))]);

        let plan = ReconciliationPlanner::default().plan(&inventory, &catalog, &images);
        assert_eq!(
            kinds(&plan.items[0]),
            vec![ActionKind::UpdateTechnicalSizes, ActionKind::UpdateContent]
        );
    }

    #[test]
    fn test_child_without_technical_metadata_is_not_drift() {
        let fla = id("Flamengo", "Home", Category::Child);
        let inventory = HashMap::from([(
            fla.clone(),
            Availability::new(fla.clone(), vec![SizeLabel::Y24, SizeLabel::Y26]),
        )]);
        let catalog = HashMap::from([(fla.clone(), artifact(&fla, vec![], SizeSource::Missing))]);

        let plan = ReconciliationPlanner::default().plan(&inventory, &catalog, &HashMap::new());
        assert_eq!(plan.count(ActionKind::UpdateCaption), 0);
        assert_eq!(plan.count(ActionKind::UpdateTechnicalSizes), 1);
    }

    #[test]
    fn test_link_plans() {
        let vasco = id("Vasco", "Away", Category::AdultMale);
        let desired = Availability::new(vasco.clone(), vec![SizeLabel::M]);
        let planner = ReconciliationPlanner::default();

        let fresh = planner.plan_link(&desired, None, PathBuf::from("v.png"));
        assert_eq!(kinds(&fresh), vec![ActionKind::Create]);

        let existing = artifact(&vasco, vec![SizeLabel::M], SizeSource::Technical);
        let update = planner.plan_link(&desired, Some(&existing), PathBuf::from("v.png"));
        assert_eq!(
            kinds(&update),
            vec![
                ActionKind::UpdateContent,
                ActionKind::UpdateTechnicalSizes,
                ActionKind::UpdateCaption
            ]
        );
        assert_eq!(update.handle.as_deref(), Some(existing.handle.as_str()));
    }

    #[test]
    fn test_inventory_order_is_canonical() {
        let a = id("Atletico", "Home", Category::AdultMale);
        let b = id("botafogo", "Home", Category::AdultMale);
        let c = id("Corinthians", "Home", Category::Child);

        let inventory: HashMap<_, _> = [c.clone(), a.clone(), b.clone()]
            .into_iter()
            .map(|i| (i.clone(), Availability::empty(i)))
            .collect();

        let plan = ReconciliationPlanner::default().plan(&inventory, &HashMap::new(), &HashMap::new());
        let order: Vec<_> = plan.items.iter().map(|i| i.identity.clone()).collect();
        assert_eq!(order, vec![a, b, c]);
    }
}
