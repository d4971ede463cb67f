use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::strategy::{StrategyDefinition, Timeframe};
use crate::errors::AppError;

/// Lifecycle state of a backtest job.
///
/// Transitions are one-directional:
/// `pending -> running -> {completed | failed}`, with `cancelled` reachable
/// from `pending` or `running` via an out-of-band cancel request. Terminal
/// states are never left.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum JobStatus {
    #[serde(rename = "pending")]
    Pending,
    #[serde(rename = "running")]
    Running,
    #[serde(rename = "completed")]
    Completed,
    #[serde(rename = "failed")]
    Failed,
    #[serde(rename = "cancelled")]
    Cancelled,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled)
    }

    /// Only pending and running jobs accept a cancel request.
    pub fn is_cancellable(&self) -> bool {
        matches!(self, JobStatus::Pending | JobStatus::Running)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Pending => write!(f, "pending"),
            JobStatus::Running => write!(f, "running"),
            JobStatus::Completed => write!(f, "completed"),
            JobStatus::Failed => write!(f, "failed"),
            JobStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl TryFrom<String> for JobStatus {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "pending" => Ok(JobStatus::Pending),
            "running" => Ok(JobStatus::Running),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            "cancelled" => Ok(JobStatus::Cancelled),
            _ => Err(format!("Unknown job status: {}", value)),
        }
    }
}

/// Advisory priority. Accepted and persisted, but the worker claims jobs
/// strictly FIFO by creation time.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum JobPriority {
    #[serde(rename = "low")]
    Low,
    #[serde(rename = "normal")]
    #[default]
    Normal,
    #[serde(rename = "high")]
    High,
    #[serde(rename = "urgent")]
    Urgent,
}

/// Submission payload for a new backtest job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestJobRequest {
    pub user_id: String,
    pub strategy_name: String,
    #[serde(default)]
    pub strategy_description: String,
    pub timeframe: Timeframe,
    pub assets: Vec<String>,
    #[serde(default = "default_period")]
    pub period: String,
    pub initial_capital: f64,
    #[serde(default)]
    pub strategy_definition: StrategyDefinition,
    #[serde(default)]
    pub priority: JobPriority,
    #[serde(default)]
    pub estimated_duration: Option<i64>,
}

fn default_period() -> String {
    "6 months".to_string()
}

impl BacktestJobRequest {
    /// Rejects submissions missing the fields the generator needs. Errors
    /// name the offending field so callers can fix the request.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.user_id.trim().is_empty() {
            return Err(AppError::Validation("user_id must not be empty".into()));
        }
        if self.strategy_name.trim().is_empty() {
            return Err(AppError::Validation("strategy_name must not be empty".into()));
        }
        if self.assets.is_empty() {
            return Err(AppError::Validation("assets must be a non-empty list".into()));
        }
        if self.initial_capital <= 0.0 {
            return Err(AppError::Validation("initial_capital must be positive".into()));
        }
        Ok(())
    }
}

/// Persisted job record. Created by the façade in `pending`; mutated only by
/// the worker afterwards, except for the out-of-band cancel transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestJob {
    pub job_id: String,
    pub user_id: String,
    pub status: JobStatus,
    pub priority: JobPriority,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub strategy_name: String,
    pub strategy_description: String,
    pub timeframe: Timeframe,
    pub assets: Vec<String>,
    pub period: String,
    pub initial_capital: f64,
    pub strategy_definition: StrategyDefinition,
    pub estimated_duration: Option<i64>,
    pub actual_duration: Option<i64>,
    pub error_message: Option<String>,
    pub progress: f64,
    pub result_backtest_id: Option<String>,
}

impl BacktestJob {
    /// Builds a fresh pending record. The id is timestamp-prefixed so ids
    /// sort roughly by submission time; the random infix guarantees
    /// uniqueness for same-second submissions.
    pub fn from_request(request: BacktestJobRequest) -> Self {
        let suffix = Uuid::new_v4().simple().to_string();
        let job_id = format!(
            "job_{}_{}_{}",
            Utc::now().format("%Y%m%d_%H%M%S"),
            &suffix[..8],
            request.user_id
        );

        Self {
            job_id,
            user_id: request.user_id,
            status: JobStatus::Pending,
            priority: request.priority,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            strategy_name: request.strategy_name,
            strategy_description: request.strategy_description,
            timeframe: request.timeframe,
            assets: request.assets,
            period: request.period,
            initial_capital: request.initial_capital,
            strategy_definition: request.strategy_definition,
            estimated_duration: request.estimated_duration,
            actual_duration: None,
            error_message: None,
            progress: 0.0,
            result_backtest_id: None,
        }
    }
}

/// Attribute-level partial update for a job record. Only `Some` fields are
/// written, so a cancel-write and a progress-write racing against the same
/// record cannot clobber each other's unrelated attributes.
#[derive(Debug, Clone, Default, Serialize)]
pub struct JobUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<JobStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual_duration: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_backtest_id: Option<String>,
}

impl JobUpdate {
    pub fn apply(&self, job: &mut BacktestJob) {
        if let Some(status) = self.status {
            job.status = status;
        }
        if let Some(progress) = self.progress {
            job.progress = progress;
        }
        if let Some(started_at) = self.started_at {
            job.started_at = Some(started_at);
        }
        if let Some(completed_at) = self.completed_at {
            job.completed_at = Some(completed_at);
        }
        if let Some(actual_duration) = self.actual_duration {
            job.actual_duration = Some(actual_duration);
        }
        if let Some(ref error_message) = self.error_message {
            job.error_message = Some(error_message.clone());
        }
        if let Some(ref result_backtest_id) = self.result_backtest_id {
            job.result_backtest_id = Some(result_backtest_id.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::StrategyKind;

    fn request() -> BacktestJobRequest {
        BacktestJobRequest {
            user_id: "user_1".to_string(),
            strategy_name: "RSI Momentum Trader".to_string(),
            strategy_description: "RSI-based momentum strategy".to_string(),
            timeframe: Timeframe::OneHour,
            assets: vec!["BTC/USD".to_string()],
            period: "6 months".to_string(),
            initial_capital: 10_000.0,
            strategy_definition: StrategyDefinition::default(),
            priority: JobPriority::Normal,
            estimated_duration: None,
        }
    }

    #[test]
    fn test_status_predicates() {
        assert!(JobStatus::Pending.is_cancellable());
        assert!(JobStatus::Running.is_cancellable());
        assert!(!JobStatus::Completed.is_cancellable());
        assert!(!JobStatus::Cancelled.is_cancellable());
        assert!(JobStatus::Failed.is_terminal());
        assert!(!JobStatus::Running.is_terminal());
    }

    #[test]
    fn test_validation_rejects_missing_fields() {
        let mut r = request();
        r.assets.clear();
        assert!(r.validate().is_err());

        let mut r = request();
        r.initial_capital = 0.0;
        assert!(r.validate().is_err());

        let mut r = request();
        r.strategy_name = " ".to_string();
        assert!(r.validate().is_err());

        assert!(request().validate().is_ok());
    }

    #[test]
    fn test_new_job_is_pending_with_zero_progress() {
        let job = BacktestJob::from_request(request());
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.progress, 0.0);
        assert!(job.started_at.is_none());
        assert!(job.error_message.is_none());
        assert!(job.result_backtest_id.is_none());
        assert!(job.job_id.starts_with("job_"));
        assert_eq!(job.strategy_definition.kind, StrategyKind::Momentum);
    }

    #[test]
    fn test_job_ids_are_unique() {
        let a = BacktestJob::from_request(request());
        let b = BacktestJob::from_request(request());
        assert_ne!(a.job_id, b.job_id);
    }

    #[test]
    fn test_update_only_touches_set_fields() {
        let mut job = BacktestJob::from_request(request());
        job.status = JobStatus::Running;
        job.progress = 30.0;
        job.error_message = Some("boom".to_string());

        let update = JobUpdate {
            progress: Some(70.0),
            ..Default::default()
        };
        update.apply(&mut job);

        assert_eq!(job.progress, 70.0);
        assert_eq!(job.status, JobStatus::Running);
        assert_eq!(job.error_message.as_deref(), Some("boom"));
    }

    #[test]
    fn test_update_serializes_only_set_fields() {
        let update = JobUpdate {
            status: Some(JobStatus::Cancelled),
            completed_at: Some(Utc::now()),
            ..Default::default()
        };
        let value = serde_json::to_value(&update).unwrap();
        let patch = value.as_object().unwrap();
        assert_eq!(patch.len(), 2);
        assert_eq!(patch["status"], "cancelled");
    }
}
