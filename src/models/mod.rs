mod backtest;
mod job;
mod strategy;

pub use backtest::{
    Backtest, BacktestStatus, ChartData, ChartDataset, FeedItem, PerformanceMetrics, Trade,
    TradeDirection, TradeOutcome,
};
pub use job::{BacktestJob, BacktestJobRequest, JobPriority, JobStatus, JobUpdate};
pub use strategy::{StrategyDefinition, StrategyKind, StrategyTemplate, Timeframe};
