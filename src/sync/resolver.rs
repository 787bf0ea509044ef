//! Identity and size recovery from catalog metadata
//!
//! Artifacts in the catalog were written by several generations of tooling.
//! Identity is recovered by an ordered chain of extraction attempts
//! (structured keys, then legacy flat keys, then the composite key), each one
//! only filling fields the previous attempts left empty.

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use serde::Serialize;
use tracing::{debug, warn};

use crate::domain::metadata::{self, non_blank};
use crate::domain::{Availability, Category, Metadata, ProductIdentity, SizeDomain, SizeLabel};
use crate::providers::RemoteArtifact;

/// Where an artifact's observed sizes came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SizeSource {
    /// Structured technical-sizes metadata
    Technical,
    /// Parsed from an adult caption
    Caption,
    /// Child artifact without technical metadata; sizes are unknown
    Missing,
}

/// A catalog object whose identity could be resolved
#[derive(Debug, Clone)]
pub struct CatalogArtifact {
    pub handle: String,
    pub identity: ProductIdentity,
    pub observed: Availability,
    pub size_source: SizeSource,
    pub caption: String,
    pub fingerprint: Option<String>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
struct PartialIdentity {
    brand: Option<String>,
    model: Option<String>,
    category: Option<String>,
}

impl PartialIdentity {
    fn fill_from(&mut self, other: PartialIdentity) {
        if self.brand.is_none() {
            self.brand = other.brand;
        }
        if self.model.is_none() {
            self.model = other.model;
        }
        if self.category.is_none() {
            self.category = other.category;
        }
    }

    fn is_complete(&self) -> bool {
        self.brand.is_some() && self.model.is_some() && self.category.is_some()
    }
}

type Extraction = fn(&Metadata) -> PartialIdentity;

/// Extraction attempts in priority order
const EXTRACTIONS: [Extraction; 3] = [structured_fields, legacy_fields, composite_key];

fn fields(metadata: &Metadata, brand: &str, model: &str, category: &str) -> PartialIdentity {
    PartialIdentity {
        brand: non_blank(metadata, brand).map(String::from),
        model: non_blank(metadata, model).map(String::from),
        category: non_blank(metadata, category).map(String::from),
    }
}

fn structured_fields(metadata: &Metadata) -> PartialIdentity {
    fields(
        metadata,
        metadata::KEY_BRAND,
        metadata::KEY_MODEL,
        metadata::KEY_CATEGORY,
    )
}

fn legacy_fields(metadata: &Metadata) -> PartialIdentity {
    fields(
        metadata,
        metadata::LEGACY_KEY_BRAND,
        metadata::LEGACY_KEY_MODEL,
        metadata::LEGACY_KEY_CATEGORY,
    )
}

fn composite_key(metadata: &Metadata) -> PartialIdentity {
    let Some(key) = non_blank(metadata, metadata::KEY_COMPOSITE) else {
        return PartialIdentity::default();
    };

    let parts: Vec<&str> = key.split('|').map(str::trim).collect();
    if parts.len() != 3 {
        return PartialIdentity::default();
    }

    let token = |s: &str| Some(s.to_uppercase()).filter(|s| !s.is_empty());
    PartialIdentity {
        brand: token(parts[0]),
        model: token(parts[1]),
        category: token(parts[2]),
    }
}

pub struct IdentityResolver;

impl IdentityResolver {
    /// Recover a product identity from artifact metadata.
    ///
    /// Returns `None` when any field stays missing or the category token is
    /// not a known category.
    pub fn resolve(metadata: &Metadata) -> Option<ProductIdentity> {
        let mut partial = PartialIdentity::default();
        for extract in EXTRACTIONS {
            partial.fill_from(extract(metadata));
            if partial.is_complete() {
                break;
            }
        }

        let PartialIdentity {
            brand: Some(brand),
            model: Some(model),
            category: Some(category),
        } = partial
        else {
            return None;
        };

        let category = Category::parse(&category).ok()?;
        ProductIdentity::new(brand, model, category).ok()
    }

    /// Recover the sizes an artifact currently advertises.
    ///
    /// Technical metadata wins. Without it, child artifacts report
    /// [`SizeSource::Missing`] (their caption holds ages, not sizes) and adult
    /// artifacts fall back to parsing the caption.
    pub fn resolve_availability(
        identity: &ProductIdentity,
        metadata: &Metadata,
        caption: &str,
    ) -> (Availability, SizeSource) {
        if let Some(raw) = non_blank(metadata, metadata::KEY_TECHNICAL_SIZES) {
            let sizes = raw.split(',').filter_map(SizeLabel::parse);
            return (Availability::new(identity.clone(), sizes), SizeSource::Technical);
        }

        if identity.category().is_child() {
            return (Availability::empty(identity.clone()), SizeSource::Missing);
        }

        (
            Availability::new(identity.clone(), sizes_from_caption(caption)),
            SizeSource::Caption,
        )
    }

    /// Resolve one listed object; unidentified objects yield `None`
    pub fn artifact(remote: &RemoteArtifact) -> Option<CatalogArtifact> {
        let identity = Self::resolve(&remote.metadata)?;
        let (observed, size_source) =
            Self::resolve_availability(&identity, &remote.metadata, &remote.caption);

        Some(CatalogArtifact {
            handle: remote.handle.clone(),
            identity,
            observed,
            size_source,
            caption: remote.caption.clone(),
            fingerprint: non_blank(&remote.metadata, metadata::KEY_FINGERPRINT).map(String::from),
        })
    }

    /// Build the catalog snapshot keyed by identity.
    ///
    /// Unidentified objects are left out entirely so they can never be removed
    /// or overwritten. When two objects resolve to the same identity the first
    /// one listed is kept and the other is left alone.
    pub fn catalog_snapshot(
        remotes: &[RemoteArtifact],
    ) -> HashMap<ProductIdentity, CatalogArtifact> {
        let mut snapshot = HashMap::new();

        for remote in remotes {
            let Some(artifact) = Self::artifact(remote) else {
                debug!("Skipping unidentified artifact {}", remote.handle);
                continue;
            };

            match snapshot.entry(artifact.identity.clone()) {
                Entry::Vacant(slot) => {
                    slot.insert(artifact);
                }
                Entry::Occupied(existing) => {
                    warn!(
                        "Artifact {} duplicates {} for {}; ignoring it",
                        artifact.handle,
                        existing.get().handle,
                        artifact.identity
                    );
                }
            }
        }

        snapshot
    }
}

/// Sizes after the first `-` of an adult caption (`VAS - P, M, GG`)
fn sizes_from_caption(caption: &str) -> Vec<SizeLabel> {
    let Some((_, rest)) = caption.split_once('-') else {
        return Vec::new();
    };

    rest.split(',')
        .filter_map(SizeLabel::parse)
        .filter(|s| SizeDomain::Adult.contains(*s))
        .collect()
}
