//! Inventory backends
//!
//! Both backends read flat `brand, model, category, size, quantity` rows and
//! turn them into [`StockRecord`]s. Rows with a blank identity field or an
//! unknown category or size token are dropped; zero quantities are kept.

mod csv;
mod postgres;

pub use self::csv::CsvInventorySource;
pub use self::postgres::{DbPool, PgInventorySource};

use tracing::debug;

use crate::domain::{Category, ProductIdentity, SizeLabel, StockRecord};

/// Parse one raw inventory row
pub fn parse_row(
    brand: &str,
    model: &str,
    category: &str,
    size: &str,
    quantity: i64,
) -> Option<StockRecord> {
    let category = match Category::parse(category) {
        Ok(category) => category,
        Err(e) => {
            debug!("Dropping stock row {} {}: {}", brand, model, e);
            return None;
        }
    };

    let Some(size) = SizeLabel::parse(size) else {
        debug!("Dropping stock row {} {}: unknown size {:?}", brand, model, size);
        return None;
    };

    let identity = match ProductIdentity::new(brand, model, category) {
        Ok(identity) => identity,
        Err(e) => {
            debug!("Dropping stock row: {}", e);
            return None;
        }
    };

    Some(StockRecord {
        identity,
        size,
        quantity,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aliases_are_accepted() {
        let record = parse_row("Vasco", "Away", "masculino", "gg", 2).unwrap();
        assert_eq!(record.identity.category(), Category::AdultMale);
        assert_eq!(record.size, SizeLabel::Gg);
        assert_eq!(record.quantity, 2);

        let record = parse_row("Flamengo", "Home", "I", "16", 0).unwrap();
        assert_eq!(record.identity.category(), Category::Child);
        assert_eq!(record.quantity, 0);
    }

    #[test]
    fn test_unparseable_rows_are_dropped() {
        assert!(parse_row("Vasco", "Away", "UNISEX", "P", 1).is_none());
        assert!(parse_row("Vasco", "Away", "ADULT_MALE", "XXL", 1).is_none());
        assert!(parse_row(" ", "Away", "ADULT_MALE", "P", 1).is_none());
    }
}
