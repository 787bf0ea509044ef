//! Canonical caption rendering
//!
//! Adult products list their sizes (`VAS - P, M, GG`); child products list the
//! ages their sizes cover (`FLA INFANTIL - 8, 9, 10, 11`). Output depends only
//! on the input, which is what lets the executor skip identical rewrites.

use std::collections::BTreeSet;

use super::availability::Availability;
use super::identity::ProductIdentity;
use super::size::token_rank;

const PREFIX_LEN: usize = 3;
const CHILD_MARKER: &str = "INFANTIL";

pub struct CaptionGenerator;

impl CaptionGenerator {
    pub fn generate(identity: &ProductIdentity, availability: &Availability) -> String {
        let prefix = brand_prefix(identity.brand());
        let sizes = Self::size_summary(identity, availability);

        if identity.category().is_child() {
            format!("{} {} - {}", prefix, CHILD_MARKER, sizes)
        } else {
            format!("{} - {}", prefix, sizes)
        }
    }

    /// The part after the dash: sizes for adults, ages for children
    pub fn size_summary(identity: &ProductIdentity, availability: &Availability) -> String {
        if identity.category().is_child() {
            child_sizes(availability)
        } else {
            adult_sizes(availability)
        }
    }
}

/// First three letters of the ASCII-folded, upper-cased brand
pub fn brand_prefix(brand: &str) -> String {
    fold_ascii(brand.trim())
        .to_uppercase()
        .chars()
        .take(PREFIX_LEN)
        .collect()
}

fn adult_sizes(availability: &Availability) -> String {
    let mut tokens: Vec<&str> = availability.sizes().iter().map(|s| s.token()).collect();
    tokens.sort_by_key(|t| token_rank(t));
    tokens.join(", ")
}

fn child_sizes(availability: &Availability) -> String {
    let ages: BTreeSet<u8> = availability
        .sizes()
        .iter()
        .filter_map(|s| s.age_range())
        .flatten()
        .collect();

    if ages.is_empty() {
        return adult_sizes(availability);
    }

    ages.iter()
        .map(|a| a.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Strip diacritics from Latin letters; other non-ASCII characters are dropped.
pub fn fold_ascii(text: &str) -> String {
    text.chars()
        .filter_map(|c| {
            if c.is_ascii() {
                return Some(c);
            }
            let folded = match c {
                'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' => 'a',
                'À' | 'Á' | 'Â' | 'Ã' | 'Ä' | 'Å' => 'A',
                'ç' => 'c',
                'Ç' => 'C',
                'è' | 'é' | 'ê' | 'ë' => 'e',
                'È' | 'É' | 'Ê' | 'Ë' => 'E',
                'ì' | 'í' | 'î' | 'ï' => 'i',
                'Ì' | 'Í' | 'Î' | 'Ï' => 'I',
                'ñ' => 'n',
                'Ñ' => 'N',
                'ò' | 'ó' | 'ô' | 'õ' | 'ö' => 'o',
                'Ò' | 'Ó' | 'Ô' | 'Õ' | 'Ö' => 'O',
                'ù' | 'ú' | 'û' | 'ü' => 'u',
                'Ù' | 'Ú' | 'Û' | 'Ü' => 'U',
                'ý' | 'ÿ' => 'y',
                'Ý' => 'Y',
                _ => return None,
            };
            Some(folded)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::size::{Category, SizeLabel};

    fn caption(brand: &str, category: Category, sizes: Vec<SizeLabel>) -> String {
        let identity = ProductIdentity::new(brand, "Home 2025", category).unwrap();
        let availability = Availability::new(identity.clone(), sizes);
        CaptionGenerator::generate(&identity, &availability)
    }

    #[test]
    fn test_child_caption_uses_ages() {
        assert_eq!(
            caption("Flamengo", Category::Child, vec![SizeLabel::Y24, SizeLabel::Y26]),
            "FLA INFANTIL - 8, 9, 10, 11"
        );
    }

    #[test]
    fn test_child_caption_merges_overlapping_ages() {
        assert_eq!(
            caption("Flamengo", Category::Child, vec![SizeLabel::Y18, SizeLabel::Y16]),
            "FLA INFANTIL - 3, 4, 5"
        );
    }

    #[test]
    fn test_adult_caption_fixed_order() {
        assert_eq!(
            caption(
                "Vasco",
                Category::AdultMale,
                vec![SizeLabel::Gg, SizeLabel::P, SizeLabel::M]
            ),
            "VAS - P, M, GG"
        );
    }

    #[test]
    fn test_prefix_folds_diacritics() {
        assert_eq!(brand_prefix("Grêmio"), "GRE");
        assert_eq!(brand_prefix("São Paulo"), "SAO");
        assert_eq!(brand_prefix("Ávila"), "AVI");
    }

    #[test]
    fn test_short_brand_uses_whole_name() {
        assert_eq!(
            caption("Ba", Category::AdultFemale, vec![SizeLabel::G]),
            "BA - G"
        );
    }

    #[test]
    fn test_empty_availability() {
        assert_eq!(caption("Vasco", Category::AdultMale, vec![]), "VAS - ");
        assert_eq!(caption("Flamengo", Category::Child, vec![]), "FLA INFANTIL - ");
    }

    #[test]
    fn test_caption_is_deterministic() {
        let a = caption("Vasco", Category::AdultMale, vec![SizeLabel::G, SizeLabel::Gg4]);
        let b = caption("Vasco", Category::AdultMale, vec![SizeLabel::Gg4, SizeLabel::G]);
        assert_eq!(a, b);
    }
}
