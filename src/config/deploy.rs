use super::traits::ConfigSection;
use crate::error::TradeGridError;
use serde::{Deserialize, Serialize};

/// Compiled-in deployment thresholds (`deploy` section). Persisted
/// overrides are merged over these at decision time.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DeployConfig {
    /// Minimum total return, percent.
    #[serde(default = "default_min_return")]
    pub min_return: f64,
    /// Minimum Sharpe ratio.
    #[serde(default = "default_min_sharpe")]
    pub min_sharpe: f64,
    /// Maximum drawdown, percent.
    #[serde(default = "default_max_drawdown")]
    pub max_drawdown: f64,
    /// Minimum win rate, percent.
    #[serde(default = "default_min_win_rate")]
    pub min_win_rate: f64,
    /// Lookback window for the admission backtest, in hourly bars.
    #[serde(default = "default_backtest_hours")]
    pub backtest_hours: usize,
    /// Minimum seconds between repeated invocations of the same
    /// auto-fix action.
    #[serde(default = "default_cooldown_secs")]
    pub action_cooldown_secs: u64,
}

fn default_min_return() -> f64 {
    5.0
}
fn default_min_sharpe() -> f64 {
    0.5
}
fn default_max_drawdown() -> f64 {
    25.0
}
fn default_min_win_rate() -> f64 {
    40.0
}
fn default_backtest_hours() -> usize {
    168
}
fn default_cooldown_secs() -> u64 {
    900
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            min_return: default_min_return(),
            min_sharpe: default_min_sharpe(),
            max_drawdown: default_max_drawdown(),
            min_win_rate: default_min_win_rate(),
            backtest_hours: default_backtest_hours(),
            action_cooldown_secs: default_cooldown_secs(),
        }
    }
}

impl ConfigSection for DeployConfig {
    fn section_name() -> &'static str {
        "deploy"
    }

    fn validate(&self) -> Result<(), TradeGridError> {
        if self.max_drawdown <= 0.0 || self.max_drawdown > 100.0 {
            return Err(TradeGridError::Configuration(
                "max_drawdown must be in (0, 100]".to_string(),
            ));
        }
        if self.min_win_rate < 0.0 || self.min_win_rate > 100.0 {
            return Err(TradeGridError::Configuration(
                "min_win_rate must be in [0, 100]".to_string(),
            ));
        }
        if self.backtest_hours == 0 {
            return Err(TradeGridError::Configuration(
                "backtest_hours must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}
