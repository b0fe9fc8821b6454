use crate::types::{BacktestMetrics, Trade};

/// Derives the summary metrics from an equity curve and its trades.
pub fn summarize(equity_curve: &[f64], trades: &[Trade], initial_capital: f64) -> BacktestMetrics {
    if equity_curve.len() < 2 || initial_capital <= 0.0 {
        return BacktestMetrics::penalty();
    }

    let final_equity = *equity_curve.last().unwrap();
    let total_return = (final_equity - initial_capital) / initial_capital * 100.0;

    let returns: Vec<f64> = equity_curve
        .windows(2)
        .filter(|w| w[0] != 0.0)
        .map(|w| (w[1] - w[0]) / w[0])
        .collect();

    let sharpe_ratio = sharpe(&returns);
    let max_drawdown = max_drawdown_pct(equity_curve);

    let wins = trades.iter().filter(|t| t.profit > 0.0).count();
    let win_rate = if trades.is_empty() {
        0.0
    } else {
        wins as f64 / trades.len() as f64 * 100.0
    };

    BacktestMetrics {
        total_return,
        sharpe_ratio,
        max_drawdown,
        win_rate,
        num_trades: trades.len(),
    }
}

/// Per-bar Sharpe ratio with risk-free rate 0; zero when volatility is.
fn sharpe(returns: &[f64]) -> f64 {
    if returns.is_empty() {
        return 0.0;
    }
    let mean = returns.iter().sum::<f64>() / returns.len() as f64;
    let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / returns.len() as f64;
    let volatility = variance.sqrt();
    if volatility > 0.0 {
        mean / volatility
    } else {
        0.0
    }
}

fn max_drawdown_pct(equity: &[f64]) -> f64 {
    let mut max_dd = 0.0;
    let mut peak = equity[0];
    for &value in equity {
        if value > peak {
            peak = value;
        }
        if peak > 0.0 {
            let dd = (peak - value) / peak * 100.0;
            if dd > max_dd {
                max_dd = dd;
            }
        }
    }
    max_dd
}
