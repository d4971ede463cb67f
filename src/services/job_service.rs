use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use crate::errors::AppError;
use crate::jobs::ActiveJobs;
use crate::models::{BacktestJob, BacktestJobRequest, JobStatus, JobUpdate};
use crate::store::JobStore;

/// Submission/query façade over the job store. Writes pending records and
/// exposes status/cancel to callers; execution is entirely the worker's
/// business, discovered on its own poll cadence.
pub struct JobService {
    store: Arc<dyn JobStore>,
    active: ActiveJobs,
}

impl JobService {
    pub fn new(store: Arc<dyn JobStore>, active: ActiveJobs) -> Self {
        Self { store, active }
    }

    /// Validates the request and writes a pending job record. Nothing runs
    /// synchronously; the returned id is for status polling.
    pub async fn submit(&self, request: BacktestJobRequest) -> Result<String, AppError> {
        request.validate()?;

        let job = BacktestJob::from_request(request);
        self.store.create_job(&job).await?;

        info!("Created backtest job {}", job.job_id);
        Ok(job.job_id)
    }

    pub async fn get_status(&self, job_id: &str) -> Result<BacktestJob, AppError> {
        self.store
            .get_job(job_id)
            .await?
            .ok_or(AppError::NotFound)
    }

    pub async fn list_for_user(
        &self,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<BacktestJob>, AppError> {
        Ok(self.store.jobs_for_user(user_id, limit).await?)
    }

    /// Requests cancellation of a pending or running job. Returns false with
    /// no mutation if the job is unknown or already terminal. The worker
    /// observes the flag at its next checkpoint, so cancellation latency is
    /// a checkpoint away, not zero.
    pub async fn cancel(&self, job_id: &str) -> Result<bool, AppError> {
        let Some(job) = self.store.get_job(job_id).await? else {
            return Ok(false);
        };

        if !job.status.is_cancellable() {
            warn!("Cannot cancel job {} with status {}", job_id, job.status);
            return Ok(false);
        }

        self.store
            .update_job(
                job_id,
                &JobUpdate {
                    status: Some(JobStatus::Cancelled),
                    completed_at: Some(Utc::now()),
                    ..Default::default()
                },
            )
            .await?;

        self.active.release(job_id);
        info!("Cancelled backtest job {}", job_id);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{JobPriority, StrategyDefinition, Timeframe};
    use crate::store::MemoryStore;

    fn request() -> BacktestJobRequest {
        BacktestJobRequest {
            user_id: "u1".to_string(),
            strategy_name: "Test Strategy".to_string(),
            strategy_description: String::new(),
            timeframe: Timeframe::OneHour,
            assets: vec!["BTC/USD".to_string()],
            period: "6 months".to_string(),
            initial_capital: 10_000.0,
            strategy_definition: StrategyDefinition::default(),
            priority: JobPriority::Normal,
            estimated_duration: None,
        }
    }

    fn service(store: Arc<MemoryStore>) -> JobService {
        JobService::new(store, ActiveJobs::new())
    }

    #[tokio::test]
    async fn test_submit_creates_pending_record() {
        let store = Arc::new(MemoryStore::new());
        let service = service(store.clone());

        let job_id = service.submit(request()).await.unwrap();
        let job = service.get_status(&job_id).await.unwrap();
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.progress, 0.0);
    }

    #[tokio::test]
    async fn test_invalid_submission_creates_nothing() {
        let store = Arc::new(MemoryStore::new());
        let service = service(store.clone());

        let mut bad = request();
        bad.assets.clear();
        assert!(matches!(service.submit(bad).await, Err(AppError::Validation(_))));
        assert_eq!(store.job_count(), 0);
    }

    #[tokio::test]
    async fn test_get_status_unknown_id_is_not_found() {
        let store = Arc::new(MemoryStore::new());
        let service = service(store);
        assert!(matches!(
            service.get_status("nope").await,
            Err(AppError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_cancel_is_idempotent() {
        let store = Arc::new(MemoryStore::new());
        let service = service(store.clone());

        let job_id = service.submit(request()).await.unwrap();
        assert!(service.cancel(&job_id).await.unwrap());
        assert!(!service.cancel(&job_id).await.unwrap(), "second cancel is a no-op");

        let job = service.get_status(&job_id).await.unwrap();
        assert_eq!(job.status, JobStatus::Cancelled);
        assert!(job.completed_at.is_some());
    }

    #[tokio::test]
    async fn test_cancel_unknown_or_terminal_returns_false() {
        let store = Arc::new(MemoryStore::new());
        let service = service(store.clone());
        assert!(!service.cancel("missing").await.unwrap());

        let job_id = service.submit(request()).await.unwrap();
        store
            .update_job(
                &job_id,
                &JobUpdate { status: Some(JobStatus::Completed), ..Default::default() },
            )
            .await
            .unwrap();
        assert!(!service.cancel(&job_id).await.unwrap());
        let job = service.get_status(&job_id).await.unwrap();
        assert_eq!(job.status, JobStatus::Completed, "terminal status unchanged");
    }

    #[tokio::test]
    async fn test_cancel_evicts_active_claim() {
        let store = Arc::new(MemoryStore::new());
        let active = ActiveJobs::new();
        let service = JobService::new(store.clone(), active.clone());

        let job_id = service.submit(request()).await.unwrap();
        active.claim(&job_id);
        assert!(service.cancel(&job_id).await.unwrap());
        assert!(!active.contains(&job_id));
    }
}
