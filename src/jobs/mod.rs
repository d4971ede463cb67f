//! Asynchronous backtest job processing.
//!
//! The worker polls the job store for pending records, claims up to a
//! concurrency limit into the shared [`ActiveJobs`] set, and drives each job
//! through its state machine on an independent task. Cancellation is
//! cooperative: the per-job task re-reads its record at checkpoints and
//! backs out if a cancel request has landed.

pub mod worker;

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;

pub use worker::BacktestWorker;

/// Ids of jobs currently claimed by the worker. Shared with the submission
/// façade so a cancel request can evict a claimed id, and bounded by the
/// worker's admission control to `max_concurrent_jobs` entries.
#[derive(Clone, Default)]
pub struct ActiveJobs(Arc<Mutex<HashSet<String>>>);

impl ActiveJobs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims a slot for `job_id`. Returns false if the id is already
    /// claimed, which guards against double-claim from store read skew.
    pub fn claim(&self, job_id: &str) -> bool {
        self.0.lock().insert(job_id.to_string())
    }

    pub fn release(&self, job_id: &str) {
        self.0.lock().remove(job_id);
    }

    pub fn contains(&self, job_id: &str) -> bool {
        self.0.lock().contains(job_id)
    }

    pub fn len(&self) -> usize {
        self.0.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_claim_is_exclusive() {
        let active = ActiveJobs::new();
        assert!(active.claim("job_1"));
        assert!(!active.claim("job_1"));
        assert_eq!(active.len(), 1);

        active.release("job_1");
        assert!(active.is_empty());
        assert!(active.claim("job_1"));
    }
}
