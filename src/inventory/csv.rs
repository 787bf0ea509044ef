//! CSV stock export
//!
//! Expected header: `brand,model,category,size,quantity`. Extra columns are
//! ignored.

use std::path::PathBuf;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info, instrument};

use crate::domain::StockRecord;
use crate::providers::{InventoryError, InventorySource};

use super::parse_row;

const COLUMNS: [&str; 5] = ["brand", "model", "category", "size", "quantity"];

#[derive(Debug, Deserialize)]
struct CsvRow {
    brand: String,
    model: String,
    category: String,
    size: String,
    quantity: String,
}

/// Inventory read from a CSV file on every snapshot
pub struct CsvInventorySource {
    path: PathBuf,
}

impl CsvInventorySource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Parse CSV text into stock records, dropping unusable rows
    pub fn parse(text: &str) -> Result<Vec<StockRecord>, InventoryError> {
        let text = text.trim_start_matches('\u{FEFF}');

        let mut reader = ::csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(::csv::Trim::All)
            .from_reader(text.as_bytes());

        let headers = reader.headers()?;
        for column in COLUMNS {
            if !headers.iter().any(|h| h == column) {
                return Err(InventoryError::MissingColumn(column.to_string()));
            }
        }

        let mut records = Vec::new();
        for (line, row) in reader.deserialize::<CsvRow>().enumerate() {
            let row = match row {
                Ok(row) => row,
                Err(e) if e.is_io_error() => return Err(e.into()),
                Err(e) => {
                    debug!("Dropping CSV row {}: {}", line + 2, e);
                    continue;
                }
            };
            let Some(quantity) = parse_quantity(&row.quantity) else {
                debug!("Dropping CSV row {}: bad quantity {:?}", line + 2, row.quantity);
                continue;
            };

            if let Some(record) =
                parse_row(&row.brand, &row.model, &row.category, &row.size, quantity)
            {
                records.push(record);
            }
        }

        Ok(records)
    }
}

/// Whole numbers, including integral decimals such as `3.0` from spreadsheet exports
fn parse_quantity(raw: &str) -> Option<i64> {
    if let Ok(q) = raw.parse::<i64>() {
        return Some(q);
    }
    let q = raw.parse::<f64>().ok()?;
    (q.is_finite() && q.fract() == 0.0 && q.abs() < i64::MAX as f64).then_some(q as i64)
}

#[async_trait]
impl InventorySource for CsvInventorySource {
    #[instrument(skip(self), fields(path = %self.path.display()))]
    async fn list_stock(&self) -> Result<Vec<StockRecord>, InventoryError> {
        let text = tokio::fs::read_to_string(&self.path).await?;
        let records = Self::parse(&text)?;
        info!("Loaded {} stock rows from CSV", records.len());
        Ok(records)
    }
}
