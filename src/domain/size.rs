//! Size labels, product categories and the rules tying them together
//!
//! Every category accepts exactly one size domain: adult apparel uses the
//! letter grades (P through 4GG), child apparel uses the numeric grades
//! (16 through 28). A label outside its category's domain carries no meaning
//! and is dropped wherever availability is computed.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised when a category or size token cannot be recognised
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("Unknown category: {0}")]
    UnknownCategory(String),

    #[error("Unknown size label: {0}")]
    UnknownSize(String),
}

// ============================================================================
// Size Labels
// ============================================================================

/// Closed set of size labels.
///
/// Declaration order is the display order: adult grades first in their fixed
/// order, then child grades ascending. The derived `Ord` relies on this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SizeLabel {
    P,
    M,
    G,
    Gg,
    Gg2,
    Gg3,
    Gg4,
    Y16,
    Y18,
    Y20,
    Y22,
    Y24,
    Y26,
    Y28,
}

/// Canonical token for every label, used in both directions.
const SIZE_TOKENS: [(SizeLabel, &str); 14] = [
    (SizeLabel::P, "P"),
    (SizeLabel::M, "M"),
    (SizeLabel::G, "G"),
    (SizeLabel::Gg, "GG"),
    (SizeLabel::Gg2, "2GG"),
    (SizeLabel::Gg3, "3GG"),
    (SizeLabel::Gg4, "4GG"),
    (SizeLabel::Y16, "16"),
    (SizeLabel::Y18, "18"),
    (SizeLabel::Y20, "20"),
    (SizeLabel::Y22, "22"),
    (SizeLabel::Y24, "24"),
    (SizeLabel::Y26, "26"),
    (SizeLabel::Y28, "28"),
];

/// Child grade to the two ages it fits.
const CHILD_AGE_RANGES: [(SizeLabel, [u8; 2]); 7] = [
    (SizeLabel::Y16, [3, 4]),
    (SizeLabel::Y18, [4, 5]),
    (SizeLabel::Y20, [5, 6]),
    (SizeLabel::Y22, [6, 7]),
    (SizeLabel::Y24, [8, 9]),
    (SizeLabel::Y26, [10, 11]),
    (SizeLabel::Y28, [12, 13]),
];

/// Adult grades in display order
pub const ADULT_SIZES: [SizeLabel; 7] = [
    SizeLabel::P,
    SizeLabel::M,
    SizeLabel::G,
    SizeLabel::Gg,
    SizeLabel::Gg2,
    SizeLabel::Gg3,
    SizeLabel::Gg4,
];

/// Child grades in display order
pub const CHILD_SIZES: [SizeLabel; 7] = [
    SizeLabel::Y16,
    SizeLabel::Y18,
    SizeLabel::Y20,
    SizeLabel::Y22,
    SizeLabel::Y24,
    SizeLabel::Y26,
    SizeLabel::Y28,
];

impl SizeLabel {
    /// Display token ("P", "2GG", "16", ...)
    pub fn token(self) -> &'static str {
        SIZE_TOKENS
            .iter()
            .find(|(label, _)| *label == self)
            .map(|(_, token)| *token)
            .unwrap_or_default()
    }

    /// Look up a label from its token (trimmed, case-insensitive)
    pub fn parse(raw: &str) -> Option<Self> {
        let token = raw.trim().to_uppercase();
        SIZE_TOKENS
            .iter()
            .find(|(_, t)| *t == token)
            .map(|(label, _)| *label)
    }

    /// The domain this label belongs to
    pub fn domain(self) -> SizeDomain {
        if ADULT_SIZES.contains(&self) {
            SizeDomain::Adult
        } else {
            SizeDomain::Child
        }
    }

    /// Ages covered by a child grade; `None` for adult grades
    pub fn age_range(self) -> Option<[u8; 2]> {
        CHILD_AGE_RANGES
            .iter()
            .find(|(label, _)| *label == self)
            .map(|(_, ages)| *ages)
    }
}

impl fmt::Display for SizeLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

impl FromStr for SizeLabel {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SizeLabel::parse(s).ok_or_else(|| ParseError::UnknownSize(s.trim().to_string()))
    }
}

/// Sort key for raw size tokens that may or may not be known labels.
///
/// Adult grades come first in their fixed order, then numeric tokens by
/// value, then anything else alphabetically.
pub fn token_rank(raw: &str) -> (u8, u64, String) {
    let token = raw.trim().to_uppercase();
    if let Some(idx) = ADULT_SIZES.iter().position(|s| s.token() == token) {
        return (0, idx as u64, String::new());
    }
    match token.parse::<u64>() {
        Ok(n) => (1, n, String::new()),
        Err(_) => (2, 0, token),
    }
}

// ============================================================================
// Size Domains
// ============================================================================

/// Disjoint partitions of the size labels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SizeDomain {
    Adult,
    Child,
}

impl SizeDomain {
    /// Labels of this domain in display order
    pub fn labels(self) -> &'static [SizeLabel] {
        match self {
            SizeDomain::Adult => &ADULT_SIZES,
            SizeDomain::Child => &CHILD_SIZES,
        }
    }

    pub fn contains(self, size: SizeLabel) -> bool {
        size.domain() == self
    }
}

// ============================================================================
// Categories
// ============================================================================

/// Product category; decides the valid size domain and the caption rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Category {
    AdultMale,
    AdultFemale,
    Child,
}

impl Category {
    /// Token written to catalog metadata and identity strings
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::AdultMale => "ADULT_MALE",
            Category::AdultFemale => "ADULT_FEMALE",
            Category::Child => "CHILD",
        }
    }

    /// Parse a category token, accepting the inventory feed's aliases
    pub fn parse(raw: &str) -> Result<Self, ParseError> {
        let token = raw.trim().to_uppercase().replace(['-', ' '], "_");

        match token.as_str() {
            "ADULT_MALE" | "MALE" | "MASCULINO" | "MASCULINA" | "M" => Ok(Category::AdultMale),
            "ADULT_FEMALE" | "FEMALE" | "FEMININO" | "FEMININA" | "F" => Ok(Category::AdultFemale),
            "CHILD" | "KIDS" | "INFANTIL" | "I" => Ok(Category::Child),
            _ => Err(ParseError::UnknownCategory(raw.trim().to_string())),
        }
    }

    pub fn is_child(&self) -> bool {
        matches!(self, Category::Child)
    }

    /// The size domain valid for this category
    pub fn size_domain(&self) -> SizeDomain {
        match self {
            Category::Child => SizeDomain::Child,
            Category::AdultMale | Category::AdultFemale => SizeDomain::Adult,
        }
    }

    /// Whether `size` is meaningful for this category
    pub fn accepts(&self, size: SizeLabel) -> bool {
        self.size_domain().contains(size)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::parse(s)
    }
}
