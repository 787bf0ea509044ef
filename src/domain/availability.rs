//! Stock records and per-product availability

use std::collections::{BTreeSet, HashMap};

use serde::Serialize;

use super::identity::ProductIdentity;
use super::size::SizeLabel;

/// One row of the inventory feed after token parsing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockRecord {
    pub identity: ProductIdentity,
    pub size: SizeLabel,
    pub quantity: i64,
}

/// Summed quantity per size, per product
pub type StockLevels = HashMap<ProductIdentity, HashMap<SizeLabel, i64>>;

/// Group raw rows by product and size, summing duplicate rows.
///
/// Products whose rows are all zero are kept: "known but out of stock" must
/// stay distinguishable from "not in inventory".
pub fn group_stock(records: impl IntoIterator<Item = StockRecord>) -> StockLevels {
    let mut levels = StockLevels::new();
    for record in records {
        *levels
            .entry(record.identity)
            .or_default()
            .entry(record.size)
            .or_insert(0) += record.quantity;
    }
    levels
}

/// In-stock sizes of one product at a point in time.
///
/// The size set only ever holds labels valid for the product's category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Availability {
    identity: ProductIdentity,
    sizes: BTreeSet<SizeLabel>,
}

impl Availability {
    /// Build availability, silently dropping sizes outside the category's domain
    pub fn new(identity: ProductIdentity, sizes: impl IntoIterator<Item = SizeLabel>) -> Self {
        let category = identity.category();
        let sizes = sizes.into_iter().filter(|s| category.accepts(*s)).collect();
        Self { identity, sizes }
    }

    pub fn empty(identity: ProductIdentity) -> Self {
        Self {
            identity,
            sizes: BTreeSet::new(),
        }
    }

    pub fn identity(&self) -> &ProductIdentity {
        &self.identity
    }

    /// In-stock sizes in display order
    pub fn sizes(&self) -> &BTreeSet<SizeLabel> {
        &self.sizes
    }

    pub fn is_in_stock(&self) -> bool {
        !self.sizes.is_empty()
    }

    /// Comma-separated tokens as stored in the technical-sizes metadata
    pub fn technical_sizes(&self) -> String {
        self.sizes
            .iter()
            .map(|s| s.token())
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Same size set, regardless of which identity spelling carries it
    pub fn same_sizes(&self, other: &Availability) -> bool {
        self.sizes == other.sizes
    }
}

/// Reduces summed stock levels into availability records
pub struct AvailabilityCalculator;

impl AvailabilityCalculator {
    /// A size is in stock iff its summed quantity is positive and it belongs
    /// to the category's domain.
    pub fn compute(levels: &StockLevels) -> HashMap<ProductIdentity, Availability> {
        levels
            .iter()
            .map(|(identity, per_size)| {
                let in_stock = per_size
                    .iter()
                    .filter(|(_, qty)| **qty > 0)
                    .map(|(size, _)| *size);
                (identity.clone(), Availability::new(identity.clone(), in_stock))
            })
            .collect()
    }
}
