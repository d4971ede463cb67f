pub mod backtest_generator;
pub mod job_service;

pub use backtest_generator::BacktestGenerator;
pub use job_service::JobService;
