pub mod indicators;
pub mod metrics;
pub mod portfolio;

pub use indicators::{rsi, RSI_NEUTRAL};
pub use portfolio::Portfolio;

use crate::error::Result;
use crate::optimizer::StrategyParams;
use crate::types::{BacktestMetrics, ExitReason};
use polars::prelude::*;

/// Fewest bars a backtest needs to produce a meaningful signal: enough
/// for the longest default indicator warm-up plus some trading room.
pub const MIN_BARS: usize = 60;

/// Reference-strategy backtester.
///
/// Runs an RSI threshold-crossing strategy purely to produce a fitness
/// signal for the search: enter long when RSI crosses below the
/// oversold level, exit on the overbought level, stop loss or take
/// profit. This is deliberately minimal; it is not an execution model.
pub struct Backtester {
    initial_capital: f64,
}

impl Default for Backtester {
    fn default() -> Self {
        Self::new(10_000.0)
    }
}

impl Backtester {
    pub fn new(initial_capital: f64) -> Self {
        Self { initial_capital }
    }

    /// Run the reference strategy. Unusable input (missing close column
    /// or too few bars) yields the fixed finite penalty metrics instead
    /// of an error so the search loop keeps moving.
    pub fn run(&self, params: &StrategyParams, data: &DataFrame) -> Result<BacktestMetrics> {
        let closes = close_series(data)?;
        if closes.len() < MIN_BARS {
            log::debug!(
                "backtest input too short: {} bars (need {})",
                closes.len(),
                MIN_BARS
            );
            return Ok(BacktestMetrics::penalty());
        }

        let rsi_values = rsi(&closes, params.rsi_period as usize);
        let mut portfolio = Portfolio::new(self.initial_capital);

        for (bar, (&price, &rsi_value)) in closes.iter().zip(rsi_values.iter()).enumerate() {
            if !price.is_finite() || price <= 0.0 {
                continue;
            }

            match portfolio.position.as_ref().map(|p| p.entry_price) {
                None => {
                    if rsi_value < params.rsi_oversold {
                        portfolio.open_position(bar, price, params.position_size);
                    }
                }
                Some(entry_price) => {
                    let change_pct = (price - entry_price) / entry_price * 100.0;
                    if change_pct <= -params.stop_loss_pct {
                        portfolio.close_position(bar, price, ExitReason::StopLoss);
                    } else if change_pct >= params.take_profit_pct {
                        portfolio.close_position(bar, price, ExitReason::TakeProfit);
                    } else if rsi_value > params.rsi_overbought {
                        portfolio.close_position(bar, price, ExitReason::Signal);
                    }
                }
            }

            portfolio.mark(price);
        }

        if let Some(&last_price) = closes.last() {
            portfolio.close_position(closes.len() - 1, last_price, ExitReason::EndOfData);
        }

        Ok(metrics::summarize(
            &portfolio.equity_curve,
            &portfolio.trades,
            self.initial_capital,
        ))
    }
}

/// Extract the close column as plain f64s, casting integer columns.
fn close_series(data: &DataFrame) -> Result<Vec<f64>> {
    if data.height() == 0 || data.column("close").is_err() {
        return Ok(Vec::new());
    }
    let close = data.column("close")?.cast(&DataType::Float64)?;
    Ok(close.f64()?.into_iter().flatten().collect())
}
