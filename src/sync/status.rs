//! Read-only catalog status report

use std::collections::{BTreeSet, HashMap};
use std::fmt;

use serde::Serialize;

use crate::domain::{Availability, Category, CaptionGenerator, ProductIdentity};

use super::planner::caption_outdated;
use super::resolver::CatalogArtifact;

const NO_SIZES: &str = "-";

/// Where a product stands between inventory and catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductState {
    /// Cataloged with the advertised sizes matching stock
    Ok,
    /// Cataloged but advertising different sizes
    Outdated,
    /// In inventory only
    NotCataloged,
    /// In the catalog only
    Orphan,
}

impl fmt::Display for ProductState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProductState::Ok => write!(f, "ok"),
            ProductState::Outdated => write!(f, "outdated"),
            ProductState::NotCataloged => write!(f, "not_cataloged"),
            ProductState::Orphan => write!(f, "orphan"),
        }
    }
}

/// One line of the status report
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductStatus {
    pub identity: String,
    pub brand: String,
    pub model: String,
    pub category: Category,
    pub state: ProductState,
    /// Caption size summary from inventory, `-` when there is none
    pub sizes: String,
}

/// Classify every product known to either side, in canonical order
pub fn catalog_status(
    inventory: &HashMap<ProductIdentity, Availability>,
    catalog: &HashMap<ProductIdentity, CatalogArtifact>,
) -> Vec<ProductStatus> {
    let identities: BTreeSet<(String, String)> = inventory
        .keys()
        .chain(catalog.keys())
        .map(|id| (id.canonical(), id.composite_key()))
        .collect();

    let mut by_key: HashMap<String, &ProductIdentity> = HashMap::new();
    for id in inventory.keys().chain(catalog.keys()) {
        by_key.entry(id.composite_key()).or_insert(id);
    }

    identities
        .into_iter()
        .filter_map(|(_, key)| by_key.get(&key).copied())
        .map(|identity| {
            let desired = inventory.get(identity);
            let state = match (desired, catalog.get(identity)) {
                (Some(desired), Some(artifact)) if !caption_outdated(desired, artifact) => {
                    ProductState::Ok
                }
                (Some(_), Some(_)) => ProductState::Outdated,
                (Some(_), None) => ProductState::NotCataloged,
                (None, _) => ProductState::Orphan,
            };

            let sizes = desired
                .map(|d| CaptionGenerator::size_summary(identity, d))
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| NO_SIZES.to_string());

            ProductStatus {
                identity: identity.canonical(),
                brand: identity.brand().to_string(),
                model: identity.model().to_string(),
                category: identity.category(),
                state,
                sizes,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SizeLabel;
    use crate::sync::resolver::SizeSource;

    fn id(brand: &str, model: &str, category: Category) -> ProductIdentity {
        ProductIdentity::new(brand, model, category).unwrap()
    }

    fn artifact(identity: &ProductIdentity, sizes: Vec<SizeLabel>) -> CatalogArtifact {
        CatalogArtifact {
            handle: identity.composite_key(),
            identity: identity.clone(),
            observed: Availability::new(identity.clone(), sizes.clone()),
            size_source: SizeSource::Technical,
            caption: CaptionGenerator::generate(identity, &Availability::new(identity.clone(), sizes)),
            fingerprint: None,
        }
    }

    #[test]
    fn test_states_and_order() {
        let ok = id("Atletico", "Home", Category::AdultMale);
        let outdated = id("Botafogo", "Home", Category::AdultMale);
        let missing = id("Corinthians", "Home", Category::Child);
        let orphan = id("Vasco", "Catalogo", Category::AdultFemale);

        let inventory = HashMap::from([
            (ok.clone(), Availability::new(ok.clone(), vec![SizeLabel::P])),
            (outdated.clone(), Availability::new(outdated.clone(), vec![SizeLabel::M])),
            (missing.clone(), Availability::new(missing.clone(), vec![SizeLabel::Y16])),
        ]);
        let catalog = HashMap::from([
            (ok.clone(), artifact(&ok, vec![SizeLabel::P])),
            (outdated.clone(), artifact(&outdated, vec![SizeLabel::G])),
            (orphan.clone(), artifact(&orphan, vec![])),
        ]);

        let report = catalog_status(&inventory, &catalog);
        let states: Vec<_> = report.iter().map(|s| s.state).collect();
        assert_eq!(
            states,
            vec![
                ProductState::Ok,
                ProductState::Outdated,
                ProductState::NotCataloged,
                ProductState::Orphan
            ]
        );
        assert_eq!(report[1].sizes, "M");
        assert_eq!(report[2].sizes, "3, 4");
        assert_eq!(report[3].sizes, "-");
    }

    #[test]
    fn test_stale_caption_is_outdated() {
        let vasco = id("Vasco", "Away", Category::AdultMale);
        let sizes = vec![SizeLabel::P, SizeLabel::M];
        let inventory = HashMap::from([(vasco.clone(), Availability::new(vasco.clone(), sizes.clone()))]);
        let mut stale = artifact(&vasco, sizes);
        stale.caption = "VAS - P".to_string();
        let catalog = HashMap::from([(vasco.clone(), stale)]);

        let report = catalog_status(&inventory, &catalog);
        assert_eq!(report[0].state, ProductState::Outdated);
    }

    #[test]
    fn test_out_of_stock_has_dash() {
        let vasco = id("Vasco", "Away", Category::AdultMale);
        let inventory = HashMap::from([(vasco.clone(), Availability::empty(vasco.clone()))]);

        let report = catalog_status(&inventory, &HashMap::new());
        assert_eq!(report.len(), 1);
        assert_eq!(report[0].state, ProductState::NotCataloged);
        assert_eq!(report[0].sizes, "-");
    }
}
