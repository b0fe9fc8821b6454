use serde::{Deserialize, Serialize};

/// Nominal length of a solution vector.
pub const SOLUTION_DIM: usize = 10;

/// Trading-strategy parameters decoded from a solution vector.
///
/// Every field is guaranteed to be inside its documented range no
/// matter what the solution vector looks like.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyParams {
    /// RSI lookback, bars. Range [1, 100].
    pub rsi_period: u32,
    /// Entry level. Range [5, 45].
    pub rsi_oversold: f64,
    /// Exit level. Range [55, 95].
    pub rsi_overbought: f64,
    /// Range [1, 99], always below `macd_slow`.
    pub macd_fast: u32,
    /// Range [2, 100], always above `macd_fast`.
    pub macd_slow: u32,
    /// Range [1, 100].
    pub macd_signal: u32,
    /// Percent. Range [0.1, 10.0].
    pub stop_loss_pct: f64,
    /// Percent. Range [0.2, 20.0].
    pub take_profit_pct: f64,
    /// Fraction of capital per entry. Range [0.001, 1.0].
    pub position_size: f64,
    /// Range [1, 10].
    pub max_positions: u32,
}

/// Coercion layer: pad or truncate to `SOLUTION_DIM` components and
/// replace non-finite values with zero. This is the single entry point
/// for malformed candidates; nothing downstream re-checks.
fn coerce(solution: &[f64]) -> [f64; SOLUTION_DIM] {
    let mut out = [0.0; SOLUTION_DIM];
    for (slot, &value) in out.iter_mut().zip(solution.iter()) {
        if value.is_finite() {
            *slot = value;
        }
    }
    out
}

fn affine_u32(x: f64, center: f64, gain: f64, lo: u32, hi: u32) -> u32 {
    let value = (center + gain * x).round();
    // Clamp in f64 space first so huge magnitudes cannot wrap.
    value.clamp(lo as f64, hi as f64) as u32
}

fn affine_f64(x: f64, center: f64, gain: f64, lo: f64, hi: f64) -> f64 {
    (center + gain * x).clamp(lo, hi)
}

/// Affine decode-and-clamp from a raw solution vector.
///
/// Never fails: wrong lengths, NaNs and extreme magnitudes are coerced
/// to the nearest valid parameter values.
pub fn decode_solution(solution: &[f64]) -> StrategyParams {
    let x = coerce(solution);

    let macd_fast = affine_u32(x[3], 12.0, 6.0, 1, 99);
    let macd_slow = affine_u32(x[4], 26.0, 10.0, 2, 100).max(macd_fast + 1);

    StrategyParams {
        rsi_period: affine_u32(x[0], 14.0, 10.0, 1, 100),
        rsi_oversold: affine_f64(x[1], 30.0, 10.0, 5.0, 45.0),
        rsi_overbought: affine_f64(x[2], 70.0, 10.0, 55.0, 95.0),
        macd_fast,
        macd_slow,
        macd_signal: affine_u32(x[5], 9.0, 4.0, 1, 100),
        stop_loss_pct: affine_f64(x[6], 2.0, 2.0, 0.1, 10.0),
        take_profit_pct: affine_f64(x[7], 4.0, 3.0, 0.2, 20.0),
        position_size: affine_f64(x[8], 0.1, 0.1, 0.001, 1.0),
        max_positions: affine_u32(x[9], 3.0, 2.0, 1, 10),
    }
}

impl StrategyParams {
    /// Invariant check used by tests and defensive assertions.
    pub fn in_bounds(&self) -> bool {
        (1..=100).contains(&self.rsi_period)
            && (5.0..=45.0).contains(&self.rsi_oversold)
            && (55.0..=95.0).contains(&self.rsi_overbought)
            && (1..=99).contains(&self.macd_fast)
            && (2..=100).contains(&self.macd_slow)
            && self.macd_slow > self.macd_fast
            && (1..=100).contains(&self.macd_signal)
            && (0.1..=10.0).contains(&self.stop_loss_pct)
            && (0.2..=20.0).contains(&self.take_profit_pct)
            && (0.001..=1.0).contains(&self.position_size)
            && (1..=10).contains(&self.max_positions)
    }
}
