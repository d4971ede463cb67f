use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};

use super::{JobStore, StoreError};
use crate::models::{Backtest, BacktestJob, FeedItem, JobUpdate};

/// Postgres-backed document store. Each record is a JSONB document with the
/// queryable attributes (status, owner, creation time) mirrored into indexed
/// columns, which is the same shape the trait assumes of any backing store.
///
/// Any precision-preserving encoding is this adapter's concern; JSONB keeps
/// f64 values as-is, so no float coercion layer is needed here.
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await?;
        let store = Self { pool };
        store.ensure_schema().await?;
        Ok(store)
    }

    async fn ensure_schema(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS backtest_jobs (
                job_id     TEXT PRIMARY KEY,
                user_id    TEXT NOT NULL,
                status     TEXT NOT NULL,
                created_at TIMESTAMPTZ NOT NULL,
                doc        JSONB NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS backtest_jobs_status_idx
             ON backtest_jobs (status, created_at)",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS backtest_jobs_user_idx
             ON backtest_jobs (user_id, created_at DESC)",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS backtests (
                id         TEXT PRIMARY KEY,
                user_id    TEXT NOT NULL,
                created_at TIMESTAMPTZ NOT NULL,
                doc        JSONB NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS feed_items (
                item_id    TEXT PRIMARY KEY,
                user_id    TEXT NOT NULL,
                created_at TIMESTAMPTZ NOT NULL,
                doc        JSONB NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    fn decode_job(row: &sqlx::postgres::PgRow) -> Result<BacktestJob, StoreError> {
        let doc: serde_json::Value = row.try_get("doc")?;
        Ok(serde_json::from_value(doc)?)
    }
}

#[async_trait]
impl JobStore for PostgresStore {
    async fn create_job(&self, job: &BacktestJob) -> Result<(), StoreError> {
        let doc = serde_json::to_value(job)?;
        sqlx::query(
            "INSERT INTO backtest_jobs (job_id, user_id, status, created_at, doc)
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(&job.job_id)
        .bind(&job.user_id)
        .bind(job.status.to_string())
        .bind(job.created_at)
        .bind(doc)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_job(&self, job_id: &str) -> Result<Option<BacktestJob>, StoreError> {
        let row = sqlx::query("SELECT doc FROM backtest_jobs WHERE job_id = $1")
            .bind(job_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(Self::decode_job).transpose()
    }

    async fn update_job(&self, job_id: &str, update: &JobUpdate) -> Result<(), StoreError> {
        // JSONB `||` merges top-level keys: only the attributes present in
        // the patch are written, which is what keeps a cancel-write and a
        // progress-write from clobbering each other.
        let patch = serde_json::to_value(update)?;
        if patch.as_object().map(|o| o.is_empty()).unwrap_or(true) {
            return Ok(());
        }
        sqlx::query(
            "UPDATE backtest_jobs
             SET doc = doc || $2::jsonb,
                 status = COALESCE($3, status)
             WHERE job_id = $1",
        )
        .bind(job_id)
        .bind(patch)
        .bind(update.status.map(|s| s.to_string()))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn pending_jobs(&self, limit: usize) -> Result<Vec<BacktestJob>, StoreError> {
        let rows = sqlx::query(
            "SELECT doc FROM backtest_jobs
             WHERE status = 'pending'
             ORDER BY created_at ASC, job_id ASC
             LIMIT $1",
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(Self::decode_job).collect()
    }

    async fn jobs_for_user(
        &self,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<BacktestJob>, StoreError> {
        let rows = sqlx::query(
            "SELECT doc FROM backtest_jobs
             WHERE user_id = $1
             ORDER BY created_at DESC
             LIMIT $2",
        )
        .bind(user_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(Self::decode_job).collect()
    }

    async fn create_backtest(&self, backtest: &Backtest) -> Result<(), StoreError> {
        let doc = serde_json::to_value(backtest)?;
        sqlx::query(
            "INSERT INTO backtests (id, user_id, created_at, doc)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT (id) DO UPDATE SET doc = EXCLUDED.doc",
        )
        .bind(&backtest.id)
        .bind(&backtest.user_id)
        .bind(backtest.created_at)
        .bind(doc)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_backtest(&self, id: &str) -> Result<Option<Backtest>, StoreError> {
        let row = sqlx::query("SELECT doc FROM backtests WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => {
                let doc: serde_json::Value = row.try_get("doc")?;
                Ok(Some(serde_json::from_value(doc)?))
            }
            None => Ok(None),
        }
    }

    async fn add_feed_item(&self, item: &FeedItem) -> Result<(), StoreError> {
        let doc = serde_json::to_value(item)?;
        sqlx::query(
            "INSERT INTO feed_items (item_id, user_id, created_at, doc)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT (item_id) DO UPDATE SET doc = EXCLUDED.doc",
        )
        .bind(&item.item_id)
        .bind(&item.user_id)
        .bind(item.created_at)
        .bind(doc)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
