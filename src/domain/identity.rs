//! Product identity (SKU)

use std::fmt;
use std::hash::{Hash, Hasher};

use serde::Serialize;
use thiserror::Error;

use super::size::Category;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum IdentityError {
    #[error("Brand must not be blank")]
    BlankBrand,

    #[error("Model must not be blank")]
    BlankModel,
}

/// Immutable (brand, model, category) key naming one catalog product.
///
/// Brand and model are stored trimmed. Equality and hashing ignore case, so
/// "Vasco"/"VASCO" name the same product.
#[derive(Debug, Clone, Serialize)]
pub struct ProductIdentity {
    brand: String,
    model: String,
    category: Category,
}

impl ProductIdentity {
    /// Build an identity; blank brand or model is rejected
    pub fn new(
        brand: impl AsRef<str>,
        model: impl AsRef<str>,
        category: Category,
    ) -> Result<Self, IdentityError> {
        let brand = brand.as_ref().trim();
        let model = model.as_ref().trim();

        if brand.is_empty() {
            return Err(IdentityError::BlankBrand);
        }
        if model.is_empty() {
            return Err(IdentityError::BlankModel);
        }

        Ok(Self {
            brand: brand.to_string(),
            model: model.to_string(),
            category,
        })
    }

    pub fn brand(&self) -> &str {
        &self.brand
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn category(&self) -> Category {
        self.category
    }

    /// `BRAND|MODEL|CATEGORY`, the form stored in the composite metadata key
    pub fn composite_key(&self) -> String {
        format!(
            "{}|{}|{}",
            self.brand.to_uppercase(),
            self.model.to_uppercase(),
            self.category.as_str()
        )
    }

    /// Canonical display form, e.g. `VASCO AWAY 2025 (ADULT_MALE)`
    pub fn canonical(&self) -> String {
        self.to_string()
    }

    /// Whether the model equals the reserved placeholder sentinel
    pub fn is_placeholder(&self, sentinel: &str) -> bool {
        self.model.to_uppercase() == sentinel.trim().to_uppercase()
    }

    fn normalized(&self) -> (String, String, Category) {
        (self.brand.to_uppercase(), self.model.to_uppercase(), self.category)
    }
}

impl PartialEq for ProductIdentity {
    fn eq(&self, other: &Self) -> bool {
        self.normalized() == other.normalized()
    }
}

impl Eq for ProductIdentity {}

impl Hash for ProductIdentity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.normalized().hash(state);
    }
}

impl fmt::Display for ProductIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} ({})",
            self.brand.to_uppercase(),
            self.model.to_uppercase(),
            self.category
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_identity_equality_ignores_case_and_padding() {
        let a = ProductIdentity::new("Vasco", "Away 2025", Category::AdultMale).unwrap();
        let b = ProductIdentity::new("  VASCO ", "away 2025", Category::AdultMale).unwrap();
        assert_eq!(a, b);

        let mut set = HashSet::new();
        set.insert(a);
        assert!(set.contains(&b));
    }

    #[test]
    fn test_identity_category_is_part_of_key() {
        let adult = ProductIdentity::new("Vasco", "Home", Category::AdultMale).unwrap();
        let child = ProductIdentity::new("Vasco", "Home", Category::Child).unwrap();
        assert_ne!(adult, child);
    }

    #[test]
    fn test_identity_string_forms() {
        let id = ProductIdentity::new("Flamengo", "Home 2024", Category::Child).unwrap();
        assert_eq!(id.canonical(), "FLAMENGO HOME 2024 (CHILD)");
        assert_eq!(id.composite_key(), "FLAMENGO|HOME 2024|CHILD");
    }

    #[test]
    fn test_blank_fields_rejected() {
        assert_eq!(
            ProductIdentity::new(" ", "Home", Category::Child),
            Err(IdentityError::BlankBrand)
        );
        assert_eq!(
            ProductIdentity::new("Vasco", "", Category::Child),
            Err(IdentityError::BlankModel)
        );
    }

    #[test]
    fn test_placeholder_detection() {
        let id = ProductIdentity::new("Vasco", "catalogo", Category::AdultMale).unwrap();
        assert!(id.is_placeholder("CATALOGO"));
        assert!(!id.is_placeholder("OTHER"));
    }
}
