//! End-to-end job lifecycle tests over the in-memory store: a real worker
//! poll loop driving submitted jobs through their state machine.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use stratfeed_backend::config::{SlowdownConfig, WorkerConfig};
use stratfeed_backend::jobs::BacktestWorker;
use stratfeed_backend::models::{
    Backtest, BacktestJob, BacktestJobRequest, FeedItem, JobPriority, JobStatus, JobUpdate,
    StrategyDefinition, Timeframe,
};
use stratfeed_backend::services::JobService;
use stratfeed_backend::store::{JobStore, MemoryStore, StoreError};

fn fast_config(max_concurrent_jobs: usize) -> WorkerConfig {
    WorkerConfig {
        poll_interval: Duration::from_millis(20),
        max_concurrent_jobs,
        slowdown: SlowdownConfig::default(),
    }
}

fn request(user: &str) -> BacktestJobRequest {
    BacktestJobRequest {
        user_id: user.to_string(),
        strategy_name: "RSI Momentum Trader".to_string(),
        strategy_description: "RSI-based momentum trading strategy".to_string(),
        timeframe: Timeframe::OneHour,
        assets: vec!["BTC/USD".to_string()],
        period: "6 months".to_string(),
        initial_capital: 10_000.0,
        strategy_definition: StrategyDefinition::default(),
        priority: JobPriority::Normal,
        estimated_duration: None,
    }
}

async fn wait_for_status(
    store: &Arc<dyn JobStore>,
    job_id: &str,
    status: JobStatus,
) -> BacktestJob {
    for _ in 0..250 {
        if let Some(job) = store.get_job(job_id).await.unwrap() {
            if job.status == status {
                return job;
            }
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("job {} never reached status {}", job_id, status);
}

#[tokio::test]
async fn submitted_job_runs_to_completion_with_fetchable_artifact() {
    let store: Arc<dyn JobStore> = Arc::new(MemoryStore::new());
    let worker = BacktestWorker::new(store.clone(), fast_config(3));
    let service = JobService::new(store.clone(), worker.active_jobs());

    let job_id = service.submit(request("user_1")).await.unwrap();

    // Nothing runs synchronously at submission.
    let job = service.get_status(&job_id).await.unwrap();
    assert_eq!(job.status, JobStatus::Pending);
    assert_eq!(job.progress, 0.0);

    let runner = worker.clone();
    tokio::spawn(async move { runner.run().await });

    // Sample progress while the job runs; values must never decrease.
    let mut observed = vec![0.0f64];
    let mut attempts = 0;
    let completed = loop {
        attempts += 1;
        assert!(attempts < 1000, "job never completed; observed {:?}", observed);
        let job = service.get_status(&job_id).await.unwrap();
        assert!(
            job.progress >= *observed.last().unwrap(),
            "progress went backwards: {:?} then {}",
            observed,
            job.progress
        );
        observed.push(job.progress);
        if job.status == JobStatus::Completed {
            break job;
        }
        assert_ne!(job.status, JobStatus::Failed, "{:?}", job.error_message);
        tokio::time::sleep(Duration::from_millis(5)).await;
    };

    assert_eq!(completed.progress, 100.0);
    assert!(completed.started_at.is_some());
    assert!(completed.completed_at.is_some());
    assert!(completed.actual_duration.is_some());
    assert!(completed.error_message.is_none());

    let backtest_id = completed.result_backtest_id.expect("completed implies result id");
    let backtest = store.get_backtest(&backtest_id).await.unwrap().unwrap();
    assert_eq!(backtest.initial_capital, 10_000.0);
    assert_eq!(backtest.assets, vec!["BTC/USD".to_string()]);

    worker.stop();
}

#[tokio::test]
async fn job_cancelled_while_pending_never_runs() {
    let store: Arc<dyn JobStore> = Arc::new(MemoryStore::new());
    let worker = BacktestWorker::new(store.clone(), fast_config(3));
    let service = JobService::new(store.clone(), worker.active_jobs());

    let job_id = service.submit(request("user_1")).await.unwrap();
    assert!(service.cancel(&job_id).await.unwrap());

    let runner = worker.clone();
    tokio::spawn(async move { runner.run().await });

    // Give the worker several poll cycles to (incorrectly) pick it up.
    tokio::time::sleep(Duration::from_millis(150)).await;

    let job = service.get_status(&job_id).await.unwrap();
    assert_eq!(job.status, JobStatus::Cancelled);
    assert!(job.started_at.is_none(), "cancelled job must never start running");
    assert!(job.result_backtest_id.is_none());

    worker.stop();
}

#[tokio::test]
async fn jobs_are_claimed_fifo_by_creation_time() {
    let store: Arc<dyn JobStore> = Arc::new(MemoryStore::new());
    // Capacity 1 forces strictly sequential claims.
    let worker = BacktestWorker::new(store.clone(), fast_config(1));
    let service = JobService::new(store.clone(), worker.active_jobs());

    let mut ids = Vec::new();
    for user in ["u1", "u2", "u3"] {
        ids.push(service.submit(request(user)).await.unwrap());
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    let runner = worker.clone();
    tokio::spawn(async move { runner.run().await });

    let mut started = Vec::new();
    for id in &ids {
        let job = wait_for_status(&store, id, JobStatus::Completed).await;
        started.push(job.started_at.unwrap());
    }
    worker.stop();

    assert!(started[0] <= started[1], "first submitted claimed first");
    assert!(started[1] <= started[2], "second submitted claimed second");
}

#[tokio::test]
async fn concurrency_stays_within_the_limit() {
    let store: Arc<dyn JobStore> = Arc::new(MemoryStore::new());
    let worker = BacktestWorker::new(store.clone(), fast_config(2));
    let service = JobService::new(store.clone(), worker.active_jobs());
    let active = worker.active_jobs();

    let mut ids = Vec::new();
    for _ in 0..6 {
        ids.push(service.submit(request("user_1")).await.unwrap());
    }

    let runner = worker.clone();
    tokio::spawn(async move { runner.run().await });

    let mut max_seen = 0;
    for id in &ids {
        for attempt in 0.. {
            assert!(attempt < 2000, "job {} never completed", id);
            max_seen = max_seen.max(active.len());
            let job = store.get_job(id).await.unwrap().unwrap();
            if job.status == JobStatus::Completed {
                break;
            }
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    }
    worker.stop();

    assert!(max_seen <= 2, "active set exceeded the limit: {}", max_seen);
}

/// Store wrapper that rejects artifact writes, to force the failure path.
struct RejectingArtifactStore {
    inner: MemoryStore,
}

#[async_trait]
impl JobStore for RejectingArtifactStore {
    async fn create_job(&self, job: &BacktestJob) -> Result<(), StoreError> {
        self.inner.create_job(job).await
    }

    async fn get_job(&self, job_id: &str) -> Result<Option<BacktestJob>, StoreError> {
        self.inner.get_job(job_id).await
    }

    async fn update_job(&self, job_id: &str, update: &JobUpdate) -> Result<(), StoreError> {
        self.inner.update_job(job_id, update).await
    }

    async fn pending_jobs(&self, limit: usize) -> Result<Vec<BacktestJob>, StoreError> {
        self.inner.pending_jobs(limit).await
    }

    async fn jobs_for_user(
        &self,
        user_id: &str,
        limit: usize,
    ) -> Result<Vec<BacktestJob>, StoreError> {
        self.inner.jobs_for_user(user_id, limit).await
    }

    async fn create_backtest(&self, _backtest: &Backtest) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("artifact table rejected the write".to_string()))
    }

    async fn get_backtest(&self, id: &str) -> Result<Option<Backtest>, StoreError> {
        self.inner.get_backtest(id).await
    }

    async fn add_feed_item(&self, item: &FeedItem) -> Result<(), StoreError> {
        self.inner.add_feed_item(item).await
    }
}

#[tokio::test]
async fn artifact_write_failure_marks_the_job_failed() {
    let store: Arc<dyn JobStore> = Arc::new(RejectingArtifactStore { inner: MemoryStore::new() });
    let worker = BacktestWorker::new(store.clone(), fast_config(3));
    let service = JobService::new(store.clone(), worker.active_jobs());

    let job_id = service.submit(request("user_1")).await.unwrap();
    let runner = worker.clone();
    tokio::spawn(async move { runner.run().await });

    let job = wait_for_status(&store, &job_id, JobStatus::Failed).await;
    worker.stop();

    let message = job.error_message.expect("failed implies error message");
    assert!(message.contains("artifact table rejected the write"), "{}", message);
    assert!(job.result_backtest_id.is_none(), "failed job has no result reference");
    assert!(job.completed_at.is_some());

    // One job's failure must not halt the scheduler.
    assert!(worker.active_jobs().is_empty());
}
