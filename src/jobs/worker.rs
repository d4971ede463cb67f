use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rand::Rng;
use tokio::sync::Notify;
use tracing::{error, info, warn};

use super::ActiveJobs;
use crate::config::WorkerConfig;
use crate::errors::AppError;
use crate::models::{BacktestJob, FeedItem, JobStatus, JobUpdate};
use crate::services::backtest_generator::{BacktestGenerator, GenerationRequest};
use crate::store::JobStore;

/// How a per-job task ended when it did not fail.
enum JobOutcome {
    Completed,
    Cancelled,
}

/// Polls the store for pending jobs and executes them concurrently up to a
/// limit. One instance per process, owned by the composition root; `stop()`
/// halts the poll loop but lets in-flight jobs run to their own conclusion
/// (at-most-once, not exactly-once).
#[derive(Clone)]
pub struct BacktestWorker {
    store: Arc<dyn JobStore>,
    generator: BacktestGenerator,
    config: WorkerConfig,
    active: ActiveJobs,
    running: Arc<AtomicBool>,
    shutdown: Arc<Notify>,
}

impl BacktestWorker {
    pub fn new(store: Arc<dyn JobStore>, config: WorkerConfig) -> Self {
        Self {
            store,
            generator: BacktestGenerator::new(),
            config,
            active: ActiveJobs::new(),
            running: Arc::new(AtomicBool::new(false)),
            shutdown: Arc::new(Notify::new()),
        }
    }

    /// Handle to the active-set, shared with the submission façade so cancel
    /// requests can evict a claimed job id.
    pub fn active_jobs(&self) -> ActiveJobs {
        self.active.clone()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Runs the poll loop until `stop()` is called. A second call while the
    /// loop is live is a no-op.
    pub async fn run(&self) {
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("Backtest worker is already running");
            return;
        }

        if self.config.slowdown.enabled {
            warn!(
                "Job processing slowdown is ENABLED: jobs will be delayed by {}-{}s per step",
                self.config.slowdown.min_seconds, self.config.slowdown.max_seconds
            );
        }
        info!(
            "Starting backtest worker (poll interval {:?}, max {} concurrent jobs)",
            self.config.poll_interval, self.config.max_concurrent_jobs
        );

        while self.running.load(Ordering::SeqCst) {
            self.process_tick().await;

            tokio::select! {
                _ = tokio::time::sleep(self.config.poll_interval) => {}
                _ = self.shutdown.notified() => {}
            }
        }

        info!("Backtest worker stopped");
    }

    /// Signals the poll loop to exit and interrupts any slowdown sleeps.
    /// In-flight job tasks are not aborted.
    pub fn stop(&self) {
        info!("Stopping backtest worker...");
        self.running.store(false, Ordering::SeqCst);
        self.shutdown.notify_waiters();
    }

    /// One poll iteration: claim up to the free capacity of the oldest
    /// pending jobs and launch each as an independent task. A store failure
    /// here is logged and retried on the next tick.
    async fn process_tick(&self) {
        let available = self
            .config
            .max_concurrent_jobs
            .saturating_sub(self.active.len());
        if available == 0 {
            return;
        }

        let pending = match self.store.pending_jobs(available).await {
            Ok(pending) => pending,
            Err(e) => {
                warn!("Job store unavailable, skipping poll tick: {}", e);
                return;
            }
        };

        for job in pending {
            // claim() refusing means the id is already in flight; a stale
            // read from the store must not launch the job twice.
            if !self.active.claim(&job.job_id) {
                continue;
            }

            let worker = self.clone();
            tokio::spawn(async move {
                worker.process_job(job).await;
            });
        }
    }

    /// Drives one job to a terminal state. Whatever happens, the active-set
    /// slot is released at the end so the concurrency limit stays accurate.
    pub(crate) async fn process_job(&self, job: BacktestJob) {
        let job_id = job.job_id.clone();
        info!("Starting to process backtest job {}", job_id);

        match self.run_job(&job).await {
            Ok(JobOutcome::Completed) => {
                info!("Successfully completed backtest job {}", job_id);
            }
            Ok(JobOutcome::Cancelled) => {
                info!("Job {} was cancelled, abandoning execution", job_id);
            }
            Err(e) => {
                error!("Error processing backtest job {}: {}", job_id, e);
                error!("Job snapshot: {:?}", job);

                // A concurrent cancel owns the terminal state; only mark
                // failed if the record is not already cancelled.
                if !self.is_cancelled(&job_id).await {
                    self.update_job(
                        &job_id,
                        JobUpdate {
                            status: Some(JobStatus::Failed),
                            error_message: Some(e.to_string()),
                            completed_at: Some(Utc::now()),
                            ..Default::default()
                        },
                    )
                    .await;
                }
            }
        }

        self.active.release(&job_id);
    }

    async fn run_job(&self, job: &BacktestJob) -> Result<JobOutcome, AppError> {
        let job_id = &job.job_id;

        if self.is_cancelled(job_id).await {
            return Ok(JobOutcome::Cancelled);
        }

        self.update_job(
            job_id,
            JobUpdate {
                status: Some(JobStatus::Running),
                started_at: Some(Utc::now()),
                progress: Some(10.0),
                ..Default::default()
            },
        )
        .await;

        self.slowdown(job_id, "initialization").await;
        if self.is_cancelled(job_id).await {
            return Ok(JobOutcome::Cancelled);
        }

        let request = GenerationRequest::from(job);
        self.update_job(job_id, JobUpdate { progress: Some(30.0), ..Default::default() })
            .await;

        self.slowdown(job_id, "data_processing").await;
        if self.is_cancelled(job_id).await {
            return Ok(JobOutcome::Cancelled);
        }

        info!("Generating backtest for job {}", job_id);
        let backtest = self.generator.generate(&request)?;

        // Cancelled mid-generation: discard the artifact, persist nothing.
        if self.is_cancelled(job_id).await {
            return Ok(JobOutcome::Cancelled);
        }

        self.update_job(job_id, JobUpdate { progress: Some(70.0), ..Default::default() })
            .await;

        self.slowdown(job_id, "storage").await;
        if self.is_cancelled(job_id).await {
            return Ok(JobOutcome::Cancelled);
        }

        self.store.create_backtest(&backtest).await?;

        self.update_job(job_id, JobUpdate { progress: Some(90.0), ..Default::default() })
            .await;

        let feed_item = FeedItem::from_backtest(&backtest);
        if let Err(e) = self.store.add_feed_item(&feed_item).await {
            error!("Failed to add backtest {} to feed: {}", backtest.id, e);
        } else {
            info!("Added backtest {} to feed", backtest.id);
        }

        self.slowdown(job_id, "finalization").await;
        if self.is_cancelled(job_id).await {
            return Ok(JobOutcome::Cancelled);
        }

        let completed_at = Utc::now();
        let actual_duration = (completed_at - job.created_at).num_seconds();
        self.update_job(
            job_id,
            JobUpdate {
                status: Some(JobStatus::Completed),
                completed_at: Some(completed_at),
                actual_duration: Some(actual_duration),
                progress: Some(100.0),
                result_backtest_id: Some(backtest.id.clone()),
                ..Default::default()
            },
        )
        .await;

        Ok(JobOutcome::Completed)
    }

    /// Progress/status writes are best-effort: a transient store failure is
    /// logged and execution continues.
    async fn update_job(&self, job_id: &str, update: JobUpdate) {
        if let Err(e) = self.store.update_job(job_id, &update).await {
            error!("Failed to update job {}: {}", job_id, e);
        }
    }

    /// Cancellation checkpoint: re-reads the record's current status. A
    /// store failure reads as "not cancelled" so a flaky store cannot
    /// abandon a healthy job.
    async fn is_cancelled(&self, job_id: &str) -> bool {
        match self.store.get_job(job_id).await {
            Ok(Some(job)) => job.status == JobStatus::Cancelled,
            Ok(None) => false,
            Err(e) => {
                error!("Error checking cancellation for job {}: {}", job_id, e);
                false
            }
        }
    }

    /// Artificial delay at a checkpoint boundary, for load/soak testing.
    /// Interruptible by shutdown and never treated as a failure.
    async fn slowdown(&self, job_id: &str, step: &str) {
        if !self.config.slowdown.enabled {
            return;
        }
        let secs = rand::rng()
            .random_range(self.config.slowdown.min_seconds..=self.config.slowdown.max_seconds);
        warn!("[{}] Applying artificial slowdown at {}: {}s", job_id, step, secs);

        tokio::select! {
            _ = tokio::time::sleep(Duration::from_secs(secs)) => {}
            _ = self.shutdown.notified() => {
                info!("[{}] Slowdown at {} interrupted by shutdown", job_id, step);
            }
        }
    }
}
