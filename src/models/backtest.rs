use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::strategy::{StrategyTemplate, Timeframe};

/// Numeric summary of a backtest run.
///
/// Ranges: `win_rate` in [0, 1], `profit_factor` > 0, `total_trades` >= 0,
/// `max_drawdown` <= 0 (a negative percentage). The ratio fields are
/// unconstrained; sortino and calmar may be absent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub win_rate: f64,
    pub profit_factor: f64,
    pub total_trades: u32,
    pub avg_return: f64,
    pub max_drawdown: f64,
    pub sharpe_ratio: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sortino_ratio: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub calmar_ratio: Option<f64>,
}

/// Equity-curve series shaped for chart.js consumption, hence
/// the camelCase dataset fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChartData {
    pub labels: Vec<String>,
    pub datasets: Vec<ChartDataset>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChartDataset {
    pub label: String,
    pub data: Vec<f64>,
    #[serde(rename = "borderColor")]
    pub border_color: String,
    #[serde(rename = "backgroundColor")]
    pub background_color: String,
    pub fill: bool,
    pub tension: f64,
}

impl ChartDataset {
    pub fn equity_curve(data: Vec<f64>) -> Self {
        Self {
            label: "Portfolio Value".to_string(),
            data,
            border_color: "rgba(75, 192, 192, 1)".to_string(),
            background_color: "rgba(75, 192, 192, 0.2)".to_string(),
            fill: true,
            tension: 0.4,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TradeDirection {
    #[serde(rename = "buy")]
    Buy,
    #[serde(rename = "sell")]
    Sell,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TradeOutcome {
    #[serde(rename = "win")]
    Win,
    #[serde(rename = "loss")]
    Loss,
}

/// One row of synthesized trade history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trade {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub direction: TradeDirection,
    pub amount: f64,
    pub return_pct: f64,
    pub profit_loss: f64,
    pub capital_after: f64,
    pub outcome: TradeOutcome,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum BacktestStatus {
    #[serde(rename = "active")]
    Active,
    #[serde(rename = "completed")]
    #[default]
    Completed,
}

/// Completed backtest artifact. Created once, atomically, when a job
/// finishes; afterwards only the social counters change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Backtest {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub description: String,
    pub timeframe: Timeframe,
    pub assets: Vec<String>,
    pub period: String,
    pub initial_capital: f64,
    pub final_capital: f64,
    pub status: BacktestStatus,
    pub performance: PerformanceMetrics,
    pub chart_data: ChartData,
    pub strategy_template: StrategyTemplate,
    pub trade_history: Vec<Trade>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub likes: u32,
    pub comments: u32,
    pub shares: u32,
}

/// Feed-visible projection of a completed backtest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedItem {
    pub item_id: String,
    pub item_type: String,
    pub user_id: String,
    pub backtest_id: String,
    pub name: String,
    pub description: String,
    pub timeframe: Timeframe,
    pub assets: Vec<String>,
    pub period: String,
    pub initial_capital: f64,
    pub final_capital: f64,
    pub performance: PerformanceMetrics,
    pub chart_data: ChartData,
    pub created_at: DateTime<Utc>,
    pub likes: u32,
    pub comments: u32,
    pub shares: u32,
}

impl FeedItem {
    pub fn from_backtest(backtest: &Backtest) -> Self {
        Self {
            item_id: backtest.id.clone(),
            item_type: "backtest".to_string(),
            user_id: backtest.user_id.clone(),
            backtest_id: backtest.id.clone(),
            name: backtest.name.clone(),
            description: backtest.description.clone(),
            timeframe: backtest.timeframe,
            assets: backtest.assets.clone(),
            period: backtest.period.clone(),
            initial_capital: backtest.initial_capital,
            final_capital: backtest.final_capital,
            performance: backtest.performance.clone(),
            chart_data: backtest.chart_data.clone(),
            created_at: backtest.created_at,
            likes: 0,
            comments: 0,
            shares: 0,
        }
    }
}
