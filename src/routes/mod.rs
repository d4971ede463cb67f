pub(crate) mod backtests;
pub(crate) mod health;
pub(crate) mod jobs;
