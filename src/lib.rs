//! Catalog Sync
//!
//! Keeps a remote product catalog consistent with the stock inventory:
//! one artifact per in-stock product, captioned with the sizes (or ages) on
//! hand, removed once the product leaves the inventory.

pub mod config;
pub mod domain;
pub mod images;
pub mod inventory;
pub mod providers;
pub mod storage;
pub mod sync;

#[cfg(test)]
pub(crate) mod testing;
