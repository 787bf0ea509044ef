//! Domain types: sizes, identities, availability, captions and the metadata contract

pub mod availability;
pub mod caption;
pub mod identity;
pub mod metadata;
pub mod size;

pub use availability::{group_stock, Availability, AvailabilityCalculator, StockLevels, StockRecord};
pub use caption::CaptionGenerator;
pub use identity::{IdentityError, ProductIdentity};
pub use metadata::Metadata;
pub use size::{Category, ParseError, SizeDomain, SizeLabel};
