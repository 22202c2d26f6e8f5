use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Name of the tabular entry written into every exported archive.
pub const DATA_FILE_NAME: &str = "data.csv";

/// Suffix accepted for the tabular entry when no `data.csv` is present.
pub const DATA_FILE_EXTENSION: &str = ".csv";

/// Header row of the exchanged table, in column order.
pub const CSV_HEADER: [&str; 5] = ["id", "name", "category", "price", "create_date"];

/// One priced catalog item.
///
/// Records are created by the ingest parser and never mutated once committed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct PriceRecord {
    pub id: i64,
    pub name: String,
    pub category: String,
    pub price: f64,
    #[serde(rename = "create_date")]
    #[sqlx(rename = "create_date")]
    pub created_at: NaiveDate,
}

/// Aggregate over the whole `prices` table as seen right after a batch commit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    /// Rows inserted by this batch only.
    pub total_items: u64,
    /// Distinct categories across every committed row.
    pub total_categories: u64,
    /// Sum of `price` across every committed row.
    pub total_price: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
}
