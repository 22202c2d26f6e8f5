use std::collections::HashSet;

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder, Transaction};
use tokio::sync::RwLock;

use crate::{
    error::{AppError, AppResult},
    models::{BatchSummary, PriceRecord},
};

/// PostgreSQL accepts at most 65535 bind parameters per statement.
const INSERT_CHUNK_ROWS: usize = 10_000;

const PRICES_SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS prices (
    id BIGINT PRIMARY KEY,
    name TEXT NOT NULL,
    category TEXT NOT NULL,
    price DOUBLE PRECISION NOT NULL,
    create_date DATE NOT NULL
)
"#;

/// Owner of the persisted price collection.
///
/// Handlers receive the store through [`crate::state::AppState`]; there is no
/// process-wide handle.
#[async_trait]
pub trait PriceStore: Send + Sync {
    /// Ensures the `prices` table exists.
    async fn init(&self) -> AppResult<()>;

    /// Inserts the whole batch and summarizes the table in one atomic unit.
    ///
    /// Any failure (a duplicate `id` included) leaves no row of the batch behind.
    /// The summary includes the rows just written plus every row committed before.
    /// An empty batch still returns the current table summary.
    async fn bulk_insert_and_summarize(&self, records: &[PriceRecord]) -> AppResult<BatchSummary>;

    /// Every persisted record in storage order.
    async fn read_all(&self) -> AppResult<Vec<PriceRecord>>;
}

#[derive(Clone)]
pub struct PgPriceStore {
    pool: PgPool,
}

impl PgPriceStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn insert_chunk(
        tx: &mut Transaction<'_, Postgres>,
        chunk: &[PriceRecord],
    ) -> AppResult<u64> {
        let mut builder = QueryBuilder::<Postgres>::new(
            "INSERT INTO prices (id, name, category, price, create_date) ",
        );
        builder.push_values(chunk, |mut row, record| {
            row.push_bind(record.id)
                .push_bind(record.name.as_str())
                .push_bind(record.category.as_str())
                .push_bind(record.price)
                .push_bind(record.created_at);
        });

        let result = builder.build().execute(&mut **tx).await?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl PriceStore for PgPriceStore {
    async fn init(&self) -> AppResult<()> {
        sqlx::query(PRICES_SCHEMA_SQL).execute(&self.pool).await?;
        Ok(())
    }

    async fn bulk_insert_and_summarize(&self, records: &[PriceRecord]) -> AppResult<BatchSummary> {
        // Dropping `tx` without commit rolls the batch back.
        let mut tx = self.pool.begin().await?;

        let mut inserted = 0u64;
        for chunk in records.chunks(INSERT_CHUNK_ROWS) {
            inserted += Self::insert_chunk(&mut tx, chunk).await?;
        }

        let (total_categories, total_price): (i64, f64) = sqlx::query_as(
            r#"
            SELECT
                COUNT(DISTINCT category)::BIGINT,
                COALESCE(SUM(price), 0)::DOUBLE PRECISION
            FROM prices
            "#,
        )
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(BatchSummary {
            total_items: inserted,
            total_categories: u64::try_from(total_categories).unwrap_or(0),
            total_price,
        })
    }

    async fn read_all(&self) -> AppResult<Vec<PriceRecord>> {
        let records = sqlx::query_as::<_, PriceRecord>(
            r#"
            SELECT
                id,
                name,
                category,
                price::DOUBLE PRECISION AS price,
                create_date::DATE AS create_date
            FROM prices
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }
}

/// Process-local store with the same atomicity contract as [`PgPriceStore`].
#[derive(Debug, Default)]
pub struct InMemoryPriceStore {
    records: RwLock<Vec<PriceRecord>>,
}

impl InMemoryPriceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: Vec<PriceRecord>) -> AppResult<Self> {
        ensure_unique_ids(&[], &records)?;
        Ok(Self {
            records: RwLock::new(records),
        })
    }
}

#[async_trait]
impl PriceStore for InMemoryPriceStore {
    async fn init(&self) -> AppResult<()> {
        Ok(())
    }

    async fn bulk_insert_and_summarize(&self, records: &[PriceRecord]) -> AppResult<BatchSummary> {
        let mut stored = self.records.write().await;

        ensure_unique_ids(&stored, records)?;
        stored.extend_from_slice(records);

        let categories = stored
            .iter()
            .map(|record| record.category.as_str())
            .collect::<HashSet<_>>();
        let total_price = stored.iter().map(|record| record.price).sum();

        Ok(BatchSummary {
            total_items: records.len() as u64,
            total_categories: categories.len() as u64,
            total_price,
        })
    }

    async fn read_all(&self) -> AppResult<Vec<PriceRecord>> {
        Ok(self.records.read().await.clone())
    }
}

fn ensure_unique_ids(existing: &[PriceRecord], incoming: &[PriceRecord]) -> AppResult<()> {
    let mut seen = existing
        .iter()
        .map(|record| record.id)
        .collect::<HashSet<_>>();

    for record in incoming {
        if !seen.insert(record.id) {
            return Err(AppError::storage(format!(
                "duplicate key value violates unique constraint: id={}",
                record.id
            )));
        }
    }

    Ok(())
}
