use std::time::Duration;

/// Artificial per-job delay injected at checkpoint boundaries, for load and
/// soak testing only.
#[derive(Debug, Clone)]
pub struct SlowdownConfig {
    pub enabled: bool,
    pub min_seconds: u64,
    pub max_seconds: u64,
}

impl Default for SlowdownConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            min_seconds: 30,
            max_seconds: 120,
        }
    }
}

impl SlowdownConfig {
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            enabled: env_parse("JOB_SLOWDOWN_ENABLED", default.enabled),
            min_seconds: env_parse("JOB_SLOWDOWN_MIN_SECS", default.min_seconds),
            max_seconds: env_parse("JOB_SLOWDOWN_MAX_SECS", default.max_seconds),
        }
    }
}

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub poll_interval: Duration,
    pub max_concurrent_jobs: usize,
    pub slowdown: SlowdownConfig,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            max_concurrent_jobs: 3,
            slowdown: SlowdownConfig::default(),
        }
    }
}

impl WorkerConfig {
    pub fn from_env() -> Self {
        Self {
            poll_interval: Duration::from_secs(env_parse("WORKER_POLL_INTERVAL_SECS", 5u64)),
            max_concurrent_jobs: env_parse("WORKER_MAX_CONCURRENT_JOBS", 3usize),
            slowdown: SlowdownConfig::from_env(),
        }
    }
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = WorkerConfig::default();
        assert_eq!(config.poll_interval, Duration::from_secs(5));
        assert_eq!(config.max_concurrent_jobs, 3);
        assert!(!config.slowdown.enabled);
    }
}
