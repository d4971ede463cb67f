use serde::{Deserialize, Serialize};

/// Candle timeframe a strategy operates on
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Timeframe {
    #[serde(rename = "1m")]
    OneMinute,
    #[serde(rename = "5m")]
    FiveMinutes,
    #[serde(rename = "15m")]
    FifteenMinutes,
    #[serde(rename = "1h")]
    OneHour,
    #[serde(rename = "4h")]
    FourHours,
    #[serde(rename = "1d")]
    OneDay,
}

impl std::fmt::Display for Timeframe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Timeframe::OneMinute => "1m",
            Timeframe::FiveMinutes => "5m",
            Timeframe::FifteenMinutes => "15m",
            Timeframe::OneHour => "1h",
            Timeframe::FourHours => "4h",
            Timeframe::OneDay => "1d",
        };
        write!(f, "{}", s)
    }
}

impl TryFrom<String> for Timeframe {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "1m" => Ok(Timeframe::OneMinute),
            "5m" => Ok(Timeframe::FiveMinutes),
            "15m" => Ok(Timeframe::FifteenMinutes),
            "1h" => Ok(Timeframe::OneHour),
            "4h" => Ok(Timeframe::FourHours),
            "1d" => Ok(Timeframe::OneDay),
            _ => Err(format!("Unknown timeframe: {}", value)),
        }
    }
}

/// Strategy archetype. Drives the metric ranges and chart regimes the
/// generator samples from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub enum StrategyKind {
    #[serde(rename = "momentum")]
    #[default]
    Momentum,

    #[serde(rename = "trend_following")]
    TrendFollowing,

    #[serde(rename = "mean_reversion")]
    MeanReversion,

    #[serde(rename = "breakout")]
    Breakout,
}

impl std::fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StrategyKind::Momentum => write!(f, "momentum"),
            StrategyKind::TrendFollowing => write!(f, "trend_following"),
            StrategyKind::MeanReversion => write!(f, "mean_reversion"),
            StrategyKind::Breakout => write!(f, "breakout"),
        }
    }
}

impl TryFrom<String> for StrategyKind {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "momentum" => Ok(StrategyKind::Momentum),
            "trend_following" => Ok(StrategyKind::TrendFollowing),
            "mean_reversion" => Ok(StrategyKind::MeanReversion),
            "breakout" => Ok(StrategyKind::Breakout),
            _ => Err(format!("Unknown strategy kind: {}", value)),
        }
    }
}

/// Canned indicator/condition set for an archetype, attached to generated
/// artifacts so the frontend can render a strategy card.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyTemplate {
    pub indicators: Vec<String>,
    pub entry_conditions: Vec<String>,
    pub exit_conditions: Vec<String>,
}

impl StrategyKind {
    pub fn template(&self) -> StrategyTemplate {
        let (indicators, entry, exit): (&[&str], &[&str], &[&str]) = match self {
            StrategyKind::Momentum => (
                &["RSI", "MACD", "Volume"],
                &["RSI oversold", "MACD crossover", "Volume spike"],
                &["RSI overbought", "MACD reversal", "Target reached"],
            ),
            StrategyKind::TrendFollowing => (
                &["Moving Average", "Bollinger Bands", "ADX"],
                &["Price above MA", "BB breakout", "ADX > 25"],
                &["Price below MA", "BB reversal", "ADX < 20"],
            ),
            StrategyKind::MeanReversion => (
                &["Bollinger Bands", "RSI", "Stochastic"],
                &["Price at BB lower", "RSI oversold", "Stoch oversold"],
                &["Price at BB upper", "RSI overbought", "Stoch overbought"],
            ),
            StrategyKind::Breakout => (
                &["Support/Resistance", "Volume", "ATR"],
                &["Price breaks resistance", "High volume", "ATR expansion"],
                &["Price breaks support", "Volume decline", "Target reached"],
            ),
        };
        StrategyTemplate {
            indicators: indicators.iter().map(|s| s.to_string()).collect(),
            entry_conditions: entry.iter().map(|s| s.to_string()).collect(),
            exit_conditions: exit.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Structured strategy document submitted with a job. The `params` blob
/// carries indicator settings and risk-management knobs the worker does not
/// interpret.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyDefinition {
    #[serde(default)]
    pub kind: StrategyKind,

    #[serde(default)]
    pub indicators: Vec<String>,

    #[serde(default)]
    pub entry_conditions: Vec<String>,

    #[serde(default)]
    pub exit_conditions: Vec<String>,

    #[serde(default)]
    pub params: serde_json::Value,
}

impl Default for StrategyDefinition {
    fn default() -> Self {
        Self {
            kind: StrategyKind::default(),
            indicators: Vec::new(),
            entry_conditions: Vec::new(),
            exit_conditions: Vec::new(),
            params: serde_json::Value::Null,
        }
    }
}
