//! Job store seam.
//!
//! The worker and façade talk to a key-value/document store through the
//! [`JobStore`] trait: job records queryable by status and by owner, with
//! attribute-level partial updates. `MemoryStore` backs tests and local
//! development; `PostgresStore` is the networked implementation.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{Backtest, BacktestJob, FeedItem, JobUpdate};

pub use memory::MemoryStore;
pub use postgres::PostgresStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("corrupt record: {0}")]
    Corrupt(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(value: sqlx::Error) -> Self {
        StoreError::Unavailable(value.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(value: serde_json::Error) -> Self {
        StoreError::Corrupt(value.to_string())
    }
}

#[async_trait]
pub trait JobStore: Send + Sync {
    async fn create_job(&self, job: &BacktestJob) -> Result<(), StoreError>;

    async fn get_job(&self, job_id: &str) -> Result<Option<BacktestJob>, StoreError>;

    /// Writes only the fields set on `update`; all other attributes of the
    /// record are left untouched.
    async fn update_job(&self, job_id: &str, update: &JobUpdate) -> Result<(), StoreError>;

    /// Pending jobs, oldest first (FIFO claim order).
    async fn pending_jobs(&self, limit: usize) -> Result<Vec<BacktestJob>, StoreError>;

    /// A user's jobs, newest first.
    async fn jobs_for_user(&self, user_id: &str, limit: usize)
        -> Result<Vec<BacktestJob>, StoreError>;

    async fn create_backtest(&self, backtest: &Backtest) -> Result<(), StoreError>;

    async fn get_backtest(&self, id: &str) -> Result<Option<Backtest>, StoreError>;

    async fn add_feed_item(&self, item: &FeedItem) -> Result<(), StoreError>;
}
