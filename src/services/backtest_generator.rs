use chrono::{Duration, Utc};
use rand::seq::IndexedRandom;
use rand::Rng;
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::{
    Backtest, BacktestJob, BacktestStatus, ChartData, ChartDataset, PerformanceMetrics,
    StrategyKind, Timeframe, Trade, TradeDirection, TradeOutcome,
};

const DEFAULT_CHART_POINTS: usize = 100;

/// Parameters the generator needs, assembled from a job record.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub user_id: String,
    pub strategy_name: String,
    pub strategy_description: String,
    pub timeframe: Timeframe,
    pub assets: Vec<String>,
    pub period: String,
    pub initial_capital: f64,
    pub kind: StrategyKind,
}

impl From<&BacktestJob> for GenerationRequest {
    fn from(job: &BacktestJob) -> Self {
        Self {
            user_id: job.user_id.clone(),
            strategy_name: job.strategy_name.clone(),
            strategy_description: job.strategy_description.clone(),
            timeframe: job.timeframe,
            assets: job.assets.clone(),
            period: job.period.clone(),
            initial_capital: job.initial_capital,
            kind: job.strategy_definition.kind,
        }
    }
}

/// Market regime for one contiguous stretch of the synthetic series.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MarketPhase {
    StrongUptrend,
    StrongDowntrend,
    BreakoutUp,
    BreakoutDown,
    Consolidation,
    VolatileChop,
    SteadyDrift,
}

/// Characteristic metric ranges for a strategy archetype. Drawdowns are
/// negative percentages by construction; profit factors stay above 1.
struct MetricRanges {
    win_rate: (f64, f64),
    profit_factor: (f64, f64),
    avg_return: (f64, f64),
    max_drawdown: (f64, f64),
    sharpe_ratio: (f64, f64),
}

fn ranges_for(kind: StrategyKind) -> MetricRanges {
    match kind {
        StrategyKind::Momentum => MetricRanges {
            win_rate: (0.55, 0.75),
            profit_factor: (1.3, 2.5),
            avg_return: (2.0, 8.0),
            max_drawdown: (-15.0, -8.0),
            sharpe_ratio: (1.2, 2.0),
        },
        StrategyKind::TrendFollowing => MetricRanges {
            win_rate: (0.45, 0.65),
            profit_factor: (1.5, 3.0),
            avg_return: (3.0, 12.0),
            max_drawdown: (-20.0, -10.0),
            sharpe_ratio: (1.0, 1.8),
        },
        StrategyKind::MeanReversion => MetricRanges {
            win_rate: (0.60, 0.80),
            profit_factor: (1.2, 2.0),
            avg_return: (1.5, 6.0),
            max_drawdown: (-12.0, -6.0),
            sharpe_ratio: (1.5, 2.5),
        },
        StrategyKind::Breakout => MetricRanges {
            win_rate: (0.40, 0.60),
            profit_factor: (1.8, 3.5),
            avg_return: (4.0, 15.0),
            max_drawdown: (-25.0, -15.0),
            sharpe_ratio: (0.8, 1.6),
        },
    }
}

fn phase_choices(kind: StrategyKind) -> &'static [MarketPhase] {
    use MarketPhase::*;
    match kind {
        StrategyKind::Momentum => &[StrongUptrend, BreakoutUp, VolatileChop, Consolidation],
        StrategyKind::TrendFollowing => {
            &[StrongUptrend, StrongDowntrend, SteadyDrift, Consolidation]
        }
        StrategyKind::MeanReversion => &[VolatileChop, Consolidation, SteadyDrift],
        StrategyKind::Breakout => &[Consolidation, BreakoutUp, BreakoutDown, VolatileChop],
    }
}

/// Standard normal sample via Box-Muller, scaled to `std_dev`. The pack
/// carries no distribution crate, so this stays local.
fn gauss(rng: &mut impl Rng, std_dev: f64) -> f64 {
    let u1: f64 = rng.random_range(f64::EPSILON..1.0);
    let u2: f64 = rng.random_range(0.0..1.0);
    (-2.0 * u1.ln()).sqrt() * (std::f64::consts::TAU * u2).cos() * std_dev
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

/// Synthesizes backtest artifacts: deterministic in shape, stochastic in
/// value. Reproducibility across runs is explicitly not a goal.
#[derive(Debug, Clone, Default)]
pub struct BacktestGenerator;

impl BacktestGenerator {
    pub fn new() -> Self {
        Self
    }

    /// Generates a complete artifact from the request parameters. Fails only
    /// on the same missing-parameter conditions submission validates.
    pub fn generate(&self, request: &GenerationRequest) -> Result<Backtest, AppError> {
        Self::validate(request)?;

        let mut rng = rand::rng();
        let performance = self.performance_metrics(request.kind, &mut rng);

        let total_return = performance.avg_return * performance.total_trades as f64 / 100.0;
        let final_capital = request.initial_capital * (1.0 + total_return / 100.0);

        // Chart volatility varies by archetype, trend by realized return.
        let volatility = match request.kind {
            StrategyKind::Breakout => rng.random_range(0.20..0.35),
            StrategyKind::Momentum => rng.random_range(0.15..0.28),
            StrategyKind::MeanReversion => rng.random_range(0.10..0.20),
            StrategyKind::TrendFollowing => rng.random_range(0.12..0.25),
        };
        let trend = if total_return > 15.0 {
            rng.random_range(0.002..0.006)
        } else if total_return > 5.0 {
            rng.random_range(0.001..0.003)
        } else if total_return > -5.0 {
            rng.random_range(-0.001..0.002)
        } else {
            rng.random_range(-0.006..-0.001)
        };

        let chart_data = self.chart_data(
            request.initial_capital,
            volatility,
            trend,
            DEFAULT_CHART_POINTS,
            request.kind,
            &mut rng,
        );
        let trade_history =
            self.trade_history(performance.total_trades, request.initial_capital, &mut rng);

        let suffix = Uuid::new_v4().simple().to_string();
        let id = format!(
            "backtest_{}_{}",
            Utc::now().format("%Y%m%d_%H%M%S"),
            &suffix[..8]
        );

        let now = Utc::now();
        let backtest = Backtest {
            id,
            user_id: request.user_id.clone(),
            name: request.strategy_name.clone(),
            description: request.strategy_description.clone(),
            timeframe: request.timeframe,
            assets: request.assets.clone(),
            period: request.period.clone(),
            initial_capital: request.initial_capital,
            final_capital: round2(final_capital),
            status: BacktestStatus::Completed,
            performance,
            chart_data,
            strategy_template: request.kind.template(),
            trade_history,
            created_at: now,
            updated_at: now,
            likes: rng.random_range(0..=50),
            comments: rng.random_range(0..=20),
            shares: rng.random_range(0..=10),
        };

        info!("Generated backtest {} for user {}", backtest.id, backtest.user_id);
        Ok(backtest)
    }

    fn validate(request: &GenerationRequest) -> Result<(), AppError> {
        if request.strategy_name.trim().is_empty() {
            return Err(AppError::Validation("strategy_name must not be empty".into()));
        }
        if request.assets.is_empty() {
            return Err(AppError::Validation("assets must be a non-empty list".into()));
        }
        if request.initial_capital <= 0.0 {
            return Err(AppError::Validation("initial_capital must be positive".into()));
        }
        Ok(())
    }

    fn performance_metrics(&self, kind: StrategyKind, rng: &mut impl Rng) -> PerformanceMetrics {
        let ranges = ranges_for(kind);
        PerformanceMetrics {
            win_rate: round3(rng.random_range(ranges.win_rate.0..ranges.win_rate.1)),
            profit_factor: round2(rng.random_range(ranges.profit_factor.0..ranges.profit_factor.1)),
            total_trades: rng.random_range(20..=200),
            avg_return: round2(rng.random_range(ranges.avg_return.0..ranges.avg_return.1)),
            max_drawdown: round2(rng.random_range(ranges.max_drawdown.0..ranges.max_drawdown.1)),
            sharpe_ratio: round2(rng.random_range(ranges.sharpe_ratio.0..ranges.sharpe_ratio.1)),
            sortino_ratio: Some(round2(rng.random_range(1.0..2.5))),
            calmar_ratio: Some(round2(rng.random_range(0.5..2.0))),
        }
    }

    /// Phase-based random walk: the series is partitioned into regimes, each
    /// with its own movement formula, plus carried momentum, gaussian noise
    /// and occasional round-number support/resistance bounces. The goal is a
    /// chart that looks like a real trading chart, not numeric precision.
    fn chart_data(
        &self,
        base_value: f64,
        volatility: f64,
        trend: f64,
        length: usize,
        kind: StrategyKind,
        rng: &mut impl Rng,
    ) -> ChartData {
        let mut phases = Vec::new();
        let mut remaining = length;
        while remaining > 0 {
            let phase_length = rng.random_range(8..=25).min(remaining);
            let phase = *phase_choices(kind)
                .choose(rng)
                .unwrap_or(&MarketPhase::SteadyDrift);
            phases.push((phase, phase_length));
            remaining -= phase_length;
        }

        let mut data = Vec::with_capacity(length);
        let mut current_price = base_value;
        let mut momentum = 0.0;
        let mut trend_strength: f64 = 0.0;

        for (phase, phase_length) in phases {
            for i in 0..phase_length {
                let base_move = match phase {
                    MarketPhase::StrongUptrend => {
                        trend_strength = (trend_strength + 0.1).min(1.0);
                        rng.random_range(0.3..1.8) * volatility * current_price / 100.0
                    }
                    MarketPhase::StrongDowntrend => {
                        trend_strength = (trend_strength + 0.1).min(1.0);
                        -rng.random_range(0.3..1.8) * volatility * current_price / 100.0
                    }
                    MarketPhase::BreakoutUp => {
                        trend_strength = 1.0;
                        let acceleration =
                            (i as f64 / phase_length as f64) * rng.random_range(0.3..1.2);
                        rng.random_range(0.8..3.0) * volatility * current_price / 100.0
                            * (1.0 + acceleration)
                    }
                    MarketPhase::BreakoutDown => {
                        trend_strength = 1.0;
                        let acceleration =
                            (i as f64 / phase_length as f64) * rng.random_range(0.3..1.2);
                        -rng.random_range(0.8..3.0) * volatility * current_price / 100.0
                            * (1.0 + acceleration)
                    }
                    MarketPhase::Consolidation => {
                        trend_strength *= 0.9;
                        let max_deviation = volatility * current_price * 0.015;
                        rng.random_range(-max_deviation..max_deviation)
                    }
                    MarketPhase::VolatileChop => {
                        trend_strength *= 0.8;
                        let mut m = gauss(rng, volatility * current_price * 0.025);
                        if rng.random_bool(0.12) {
                            m += rng.random_range(-1.0..1.0) * volatility * current_price * 0.04;
                        }
                        m
                    }
                    MarketPhase::SteadyDrift => {
                        trend_strength = (trend_strength + 0.05).min(0.6);
                        trend * current_price * rng.random_range(0.4..1.2)
                    }
                };

                let momentum_effect = momentum * trend_strength * 0.6;
                let noise = gauss(rng, volatility * current_price * 0.008);
                let price_change = base_move + momentum_effect + noise;
                let mut new_price = current_price + price_change;

                // Occasional partial bounce off a nearby round-number level.
                if rng.random_bool(0.08) {
                    let step = current_price * 0.05;
                    let round_level = (new_price / step).round() * step;
                    if (new_price - round_level).abs() < current_price * 0.015 {
                        let bounce = rng.random_range(0.4..0.7);
                        new_price = round_level + (new_price - round_level) * bounce;
                    }
                }

                momentum = momentum * 0.88 + price_change * 0.12;
                current_price = new_price.max(0.01);
                data.push(round2(current_price));
            }
        }

        let labels = (0..length)
            .map(|i| {
                (Utc::now() - Duration::days((length - i) as i64))
                    .format("%Y-%m-%d")
                    .to_string()
            })
            .collect();

        ChartData {
            labels,
            datasets: vec![ChartDataset::equity_curve(data)],
        }
    }

    /// Trade history backdated from now, oldest first, updating a running
    /// capital figure.
    fn trade_history(
        &self,
        total_trades: u32,
        initial_capital: f64,
        rng: &mut impl Rng,
    ) -> Vec<Trade> {
        let mut trades = Vec::with_capacity(total_trades as usize);
        let mut capital = initial_capital;

        for i in 0..total_trades {
            let is_win = rng.random_bool(0.6);
            let return_pct = if is_win {
                rng.random_range(0.5..3.0)
            } else {
                rng.random_range(-2.0..-0.5)
            };

            let amount = capital * rng.random_range(0.02..0.1);
            let profit_loss = amount * return_pct / 100.0;
            capital += profit_loss;

            trades.push(Trade {
                id: format!("trade_{}", i + 1),
                timestamp: Utc::now() - Duration::days((total_trades - i) as i64),
                direction: if is_win { TradeDirection::Buy } else { TradeDirection::Sell },
                amount: round2(amount),
                return_pct: round2(return_pct),
                profit_loss: round2(profit_loss),
                capital_after: round2(capital),
                outcome: if is_win { TradeOutcome::Win } else { TradeOutcome::Loss },
            });
        }

        trades
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> GenerationRequest {
        GenerationRequest {
            user_id: "test_user_001".to_string(),
            strategy_name: "RSI Momentum Trader".to_string(),
            strategy_description: "RSI-based momentum trading strategy".to_string(),
            timeframe: Timeframe::OneHour,
            assets: vec!["BTC/USD".to_string()],
            period: "6 months".to_string(),
            initial_capital: 15_000.0,
            kind: StrategyKind::Momentum,
        }
    }

    #[test]
    fn test_generate_produces_complete_artifact() {
        let generator = BacktestGenerator::new();
        let backtest = generator.generate(&request()).unwrap();

        assert!(backtest.id.starts_with("backtest_"));
        assert_eq!(backtest.initial_capital, 15_000.0);
        assert_eq!(backtest.status, BacktestStatus::Completed);
        assert_eq!(backtest.chart_data.labels.len(), DEFAULT_CHART_POINTS);
        assert_eq!(backtest.chart_data.datasets.len(), 1);
        assert_eq!(
            backtest.chart_data.datasets[0].data.len(),
            DEFAULT_CHART_POINTS
        );
        assert_eq!(
            backtest.trade_history.len(),
            backtest.performance.total_trades as usize
        );
        assert_eq!(backtest.strategy_template.indicators.len(), 3);
    }

    #[test]
    fn test_metric_bounds_hold_over_many_runs() {
        let generator = BacktestGenerator::new();
        let mut rng = rand::rng();
        for kind in [
            StrategyKind::Momentum,
            StrategyKind::TrendFollowing,
            StrategyKind::MeanReversion,
            StrategyKind::Breakout,
        ] {
            for _ in 0..1000 {
                let m = generator.performance_metrics(kind, &mut rng);
                assert!((0.0..=1.0).contains(&m.win_rate), "win_rate {}", m.win_rate);
                assert!(m.profit_factor > 0.0);
                assert!(m.max_drawdown <= 0.0, "max_drawdown {}", m.max_drawdown);
                assert!(m.total_trades >= 20 && m.total_trades <= 200);
            }
        }
    }

    #[test]
    fn test_chart_prices_stay_positive() {
        let generator = BacktestGenerator::new();
        let mut rng = rand::rng();
        let chart = generator.chart_data(10.0, 0.35, -0.006, 250, StrategyKind::Breakout, &mut rng);
        assert_eq!(chart.datasets[0].data.len(), 250);
        assert!(chart.datasets[0].data.iter().all(|p| *p > 0.0));
    }

    #[test]
    fn test_trade_history_capital_is_consistent() {
        let generator = BacktestGenerator::new();
        let mut rng = rand::rng();
        let trades = generator.trade_history(50, 10_000.0, &mut rng);
        assert_eq!(trades.len(), 50);
        for window in trades.windows(2) {
            assert!(window[0].timestamp < window[1].timestamp);
        }
        for trade in &trades {
            match trade.outcome {
                TradeOutcome::Win => assert!(trade.profit_loss > 0.0),
                TradeOutcome::Loss => assert!(trade.profit_loss < 0.0),
            }
        }
    }

    #[test]
    fn test_generate_rejects_missing_parameters() {
        let generator = BacktestGenerator::new();

        let mut r = request();
        r.assets.clear();
        assert!(matches!(generator.generate(&r), Err(AppError::Validation(_))));

        let mut r = request();
        r.initial_capital = -5.0;
        assert!(matches!(generator.generate(&r), Err(AppError::Validation(_))));

        let mut r = request();
        r.strategy_name = String::new();
        assert!(matches!(generator.generate(&r), Err(AppError::Validation(_))));
    }

    #[test]
    fn test_final_capital_follows_total_return() {
        let generator = BacktestGenerator::new();
        for _ in 0..100 {
            let b = generator.generate(&request()).unwrap();
            let total_return =
                b.performance.avg_return * b.performance.total_trades as f64 / 100.0;
            let expected = b.initial_capital * (1.0 + total_return / 100.0);
            assert!((b.final_capital - expected).abs() < 0.01);
        }
    }
}
