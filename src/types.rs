use serde::{Deserialize, Serialize};

/// Number of behavior descriptor dimensions (sharpe, max drawdown, win rate).
pub const BEHAVIOR_DIM: usize = 3;

/// Objective/behavior pair substituted when a candidate cannot be evaluated.
pub const PENALTY_OBJECTIVE: f64 = -100.0;
pub const PENALTY_BEHAVIOR: [f64; BEHAVIOR_DIM] = [0.0, 100.0, 0.0];

/// Result of evaluating one candidate solution.
///
/// Always well-formed: the objective and every behavior component are
/// finite, with evaluation failures mapped to the fixed penalty values.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct EvaluationOutcome {
    pub objective: f64,
    pub behavior: [f64; BEHAVIOR_DIM],
}

impl EvaluationOutcome {
    pub fn penalty() -> Self {
        Self {
            objective: PENALTY_OBJECTIVE,
            behavior: PENALTY_BEHAVIOR,
        }
    }

    pub fn is_penalty(&self) -> bool {
        self.objective == PENALTY_OBJECTIVE
    }
}

/// Metrics produced by a single backtest run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BacktestMetrics {
    /// Total return over the tested window, percent.
    pub total_return: f64,
    /// Per-bar Sharpe ratio (risk-free rate 0).
    pub sharpe_ratio: f64,
    /// Maximum peak-to-trough drawdown, percent (positive number).
    pub max_drawdown: f64,
    /// Winning trades / closed trades, percent.
    pub win_rate: f64,
    pub num_trades: usize,
}

impl BacktestMetrics {
    /// Fixed low-but-finite metrics used when input data is unusable.
    pub fn penalty() -> Self {
        Self {
            total_return: PENALTY_OBJECTIVE,
            sharpe_ratio: 0.0,
            max_drawdown: 100.0,
            win_rate: 0.0,
            num_trades: 0,
        }
    }

    pub fn behavior(&self) -> [f64; BEHAVIOR_DIM] {
        [self.sharpe_ratio, self.max_drawdown, self.win_rate]
    }
}

/// Trade record kept by the backtest portfolio.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trade {
    pub entry_bar: usize,
    pub exit_bar: usize,
    pub entry_price: f64,
    pub exit_price: f64,
    pub size: f64,
    pub profit: f64,
    pub exit_reason: ExitReason,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExitReason {
    StopLoss,
    TakeProfit,
    Signal,
    EndOfData,
}

/// An elite strategy: the best solution recorded so far for one archive cell.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EliteStrategy {
    pub id: String,
    pub solution: Vec<f64>,
    pub objective: f64,
    pub behavior: [f64; BEHAVIOR_DIM],
    pub params: crate::optimizer::StrategyParams,
}
