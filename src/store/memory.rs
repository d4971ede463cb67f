use async_trait::async_trait;
use dashmap::DashMap;

use super::{JobStore, StoreError};
use crate::models::{Backtest, BacktestJob, FeedItem, JobStatus, JobUpdate};

/// In-process store used by tests and local development. Shares the trait's
/// ordering contract with the Postgres implementation.
#[derive(Default)]
pub struct MemoryStore {
    jobs: DashMap<String, BacktestJob>,
    backtests: DashMap<String, Backtest>,
    feed: DashMap<String, FeedItem>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn job_count(&self) -> usize {
        self.jobs.len()
    }

    pub fn feed_len(&self) -> usize {
        self.feed.len()
    }
}

#[async_trait]
impl JobStore for MemoryStore {
    async fn create_job(&self, job: &BacktestJob) -> Result<(), StoreError> {
        self.jobs.insert(job.job_id.clone(), job.clone());
        Ok(())
    }

    async fn get_job(&self, job_id: &str) -> Result<Option<BacktestJob>, StoreError> {
        Ok(self.jobs.get(job_id).map(|entry| entry.value().clone()))
    }

    async fn update_job(&self, job_id: &str, update: &JobUpdate) -> Result<(), StoreError> {
        if let Some(mut entry) = self.jobs.get_mut(job_id) {
            update.apply(entry.value_mut());
        }
        Ok(())
    }

    async fn pending_jobs(&self, limit: usize) -> Result<Vec<BacktestJob>, StoreError> {
        let mut pending: Vec<BacktestJob> = self
            .jobs
            .iter()
            .filter(|entry| entry.value().status == JobStatus::Pending)
            .map(|entry| entry.value().clone())
            .collect();
        pending.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.job_id.cmp(&b.job_id))
        });
        pending.truncate(limit);
        Ok(pending)
    }

    async fn jobs_for_user(
        &self,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<BacktestJob>, StoreError> {
        let mut jobs: Vec<BacktestJob> = self
            .jobs
            .iter()
            .filter(|entry| entry.value().user_id == user_id)
            .map(|entry| entry.value().clone())
            .collect();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        jobs.truncate(limit);
        Ok(jobs)
    }

    async fn create_backtest(&self, backtest: &Backtest) -> Result<(), StoreError> {
        self.backtests.insert(backtest.id.clone(), backtest.clone());
        Ok(())
    }

    async fn get_backtest(&self, id: &str) -> Result<Option<Backtest>, StoreError> {
        Ok(self.backtests.get(id).map(|entry| entry.value().clone()))
    }

    async fn add_feed_item(&self, item: &FeedItem) -> Result<(), StoreError> {
        self.feed.insert(item.item_id.clone(), item.clone());
        Ok(())
    }
}
