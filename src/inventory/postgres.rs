//! PostgreSQL stock source

use async_trait::async_trait;
use deadpool_postgres::{Config, ManagerConfig, Pool, PoolConfig, RecyclingMethod, Runtime};
use tokio_postgres::{NoTls, Row};
use tracing::{info, instrument};

use crate::domain::StockRecord;
use crate::providers::{InventoryError, InventorySource};

use super::parse_row;

/// Database connection pool wrapper
#[derive(Clone)]
pub struct DbPool {
    pool: Pool,
}

impl DbPool {
    /// Create a new database pool from a connection string
    pub fn new(database_url: &str, max_connections: Option<usize>) -> Result<Self, InventoryError> {
        let url = url::Url::parse(database_url)
            .map_err(|e| InventoryError::NotConfigured(format!("Invalid database URL: {}", e)))?;

        let host = url
            .host_str()
            .ok_or_else(|| InventoryError::NotConfigured("Missing host in database URL".to_string()))?;
        let port = url.port().unwrap_or(5432);
        let dbname = url.path().trim_start_matches('/');

        let mut cfg = Config::new();
        cfg.host = Some(host.to_string());
        cfg.port = Some(port);
        cfg.user = Some(url.username().to_string());
        cfg.password = Some(url.password().unwrap_or("").to_string());
        cfg.dbname = Some(dbname.to_string());
        cfg.manager = Some(ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        });
        if let Some(max_size) = max_connections {
            cfg.pool = Some(PoolConfig::new(max_size));
        }

        let pool = cfg
            .create_pool(Some(Runtime::Tokio1), NoTls)
            .map_err(|e| InventoryError::Database(e.to_string()))?;

        info!(host = %host, port = %port, dbname = %dbname, "Database pool created");
        Ok(DbPool { pool })
    }

    /// Get a connection from the pool
    pub async fn get(&self) -> Result<deadpool_postgres::Object, InventoryError> {
        self.pool
            .get()
            .await
            .map_err(|e| InventoryError::Database(e.to_string()))
    }
}

/// Inventory read with a configurable query.
///
/// The query must return `brand`, `model`, `category`, `size` (text) and
/// `quantity` (any integer type) columns.
pub struct PgInventorySource {
    pool: DbPool,
    query: String,
}

impl PgInventorySource {
    pub fn new(pool: DbPool, query: impl Into<String>) -> Self {
        Self {
            pool,
            query: query.into(),
        }
    }
}

#[async_trait]
impl InventorySource for PgInventorySource {
    #[instrument(skip(self))]
    async fn list_stock(&self) -> Result<Vec<StockRecord>, InventoryError> {
        let client = self.pool.get().await?;
        let rows = client
            .query(self.query.as_str(), &[])
            .await
            .map_err(|e| InventoryError::Database(e.to_string()))?;

        let records = stock_records(&rows)?;
        info!("Loaded {} of {} stock rows from database", records.len(), rows.len());
        Ok(records)
    }
}

/// Column access for one result row
trait StockColumns {
    fn text(&self, column: &str) -> Result<Option<String>, InventoryError>;
    fn quantity(&self) -> Result<Option<i64>, InventoryError>;
}

impl StockColumns for Row {
    fn text(&self, column: &str) -> Result<Option<String>, InventoryError> {
        self.try_get(column).map_err(column_error)
    }

    /// Quantity as i64, whatever integer width the query returns
    fn quantity(&self) -> Result<Option<i64>, InventoryError> {
        if let Ok(q) = self.try_get::<_, Option<i64>>("quantity") {
            return Ok(q);
        }
        if let Ok(q) = self.try_get::<_, Option<i32>>("quantity") {
            return Ok(q.map(i64::from));
        }
        let q: Option<i16> = self.try_get("quantity").map_err(column_error)?;
        Ok(q.map(i64::from))
    }
}

fn column_error(e: tokio_postgres::Error) -> InventoryError {
    InventoryError::Database(format!("Unreadable stock column: {}", e))
}

/// Map result rows to stock records.
///
/// A column that is missing or of the wrong type fails the whole read. Rows
/// whose values do not parse are dropped.
fn stock_records<R: StockColumns>(rows: &[R]) -> Result<Vec<StockRecord>, InventoryError> {
    let mut records = Vec::with_capacity(rows.len());
    for row in rows {
        let brand = row.text("brand")?;
        let model = row.text("model")?;
        let category = row.text("category")?;
        let size = row.text("size")?;
        let quantity = row.quantity()?;

        if let Some(record) = parse_row(
            brand.as_deref().unwrap_or_default(),
            model.as_deref().unwrap_or_default(),
            category.as_deref().unwrap_or_default(),
            size.as_deref().unwrap_or_default(),
            quantity.unwrap_or(0),
        ) {
            records.push(record);
        }
    }
    Ok(records)
}
