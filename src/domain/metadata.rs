//! Metadata key contract shared by the resolver, the executor and the stores

use std::collections::HashMap;

use super::availability::Availability;
use super::identity::ProductIdentity;

/// Key/value metadata attached to a catalog artifact
pub type Metadata = HashMap<String, String>;

pub const KEY_BRAND: &str = "sku_brand";
pub const KEY_MODEL: &str = "sku_model";
pub const KEY_CATEGORY: &str = "sku_category";
pub const KEY_COMPOSITE: &str = "sku_key";
pub const KEY_TECHNICAL_SIZES: &str = "sku_technical_sizes";

/// Flat, unprefixed keys written by older tooling
pub const LEGACY_KEY_BRAND: &str = "brand";
pub const LEGACY_KEY_MODEL: &str = "model";
pub const LEGACY_KEY_CATEGORY: &str = "category";

/// Maintained by the stores, never written by the engine
pub const KEY_FINGERPRINT: &str = "content_sha256";

/// Structured identity keys plus the composite key
pub fn identity_metadata(identity: &ProductIdentity) -> Metadata {
    let mut metadata = Metadata::new();
    metadata.insert(KEY_BRAND.to_string(), identity.brand().to_string());
    metadata.insert(KEY_MODEL.to_string(), identity.model().to_string());
    metadata.insert(KEY_CATEGORY.to_string(), identity.category().as_str().to_string());
    metadata.insert(KEY_COMPOSITE.to_string(), identity.composite_key());
    metadata
}

/// Everything a freshly created artifact carries
pub fn creation_metadata(availability: &Availability) -> Metadata {
    let mut metadata = identity_metadata(availability.identity());
    metadata.insert(KEY_TECHNICAL_SIZES.to_string(), availability.technical_sizes());
    metadata
}

/// Trim, upper-case and sort a comma-separated size list; empty tokens dropped
pub fn normalize_size_list(raw: &str) -> Vec<String> {
    let mut tokens: Vec<String> = raw
        .split(',')
        .map(|t| t.trim().to_uppercase())
        .filter(|t| !t.is_empty())
        .collect();
    tokens.sort();
    tokens
}

pub fn size_lists_match(current: Option<&str>, candidate: &str) -> bool {
    normalize_size_list(current.unwrap_or_default()) == normalize_size_list(candidate)
}

/// Read a key, treating blank values as absent
pub fn non_blank<'a>(metadata: &'a Metadata, key: &str) -> Option<&'a str> {
    metadata
        .get(key)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::size::{Category, SizeLabel};

    #[test]
    fn test_creation_metadata_contents() {
        let identity = ProductIdentity::new("Vasco", "Away", Category::AdultMale).unwrap();
        let availability = Availability::new(identity, vec![SizeLabel::Gg, SizeLabel::P]);
        let metadata = creation_metadata(&availability);

        assert_eq!(metadata[KEY_BRAND], "Vasco");
        assert_eq!(metadata[KEY_CATEGORY], "ADULT_MALE");
        assert_eq!(metadata[KEY_COMPOSITE], "VASCO|AWAY|ADULT_MALE");
        assert_eq!(metadata[KEY_TECHNICAL_SIZES], "P,GG");
    }

    #[test]
    fn test_size_list_normalization() {
        assert!(size_lists_match(Some(" gg, p ,M"), "M,P,GG"));
        assert!(size_lists_match(None, ""));
        assert!(size_lists_match(Some(" , "), ""));
        assert!(!size_lists_match(Some("P,M"), "P"));
    }

    #[test]
    fn test_non_blank() {
        let mut metadata = Metadata::new();
        metadata.insert("a".into(), "  ".into());
        metadata.insert("b".into(), " x ".into());
        assert_eq!(non_blank(&metadata, "a"), None);
        assert_eq!(non_blank(&metadata, "b"), Some("x"));
        assert_eq!(non_blank(&metadata, "c"), None);
    }
}
