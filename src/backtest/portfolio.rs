use crate::types::{ExitReason, Trade};

pub struct Position {
    pub entry_bar: usize,
    pub entry_price: f64,
    pub size: f64,
}

/// Long-only portfolio used by the reference strategy backtest.
///
/// Tracks cash, one open position, closed trades and the equity curve.
pub struct Portfolio {
    pub initial_capital: f64,
    pub cash: f64,
    pub position: Option<Position>,
    pub trades: Vec<Trade>,
    pub equity_curve: Vec<f64>,
    peak_equity: f64,
    max_drawdown: f64,
}

impl Portfolio {
    pub fn new(initial_capital: f64) -> Self {
        Self {
            initial_capital,
            cash: initial_capital,
            position: None,
            trades: Vec::new(),
            equity_curve: vec![initial_capital],
            peak_equity: initial_capital,
            max_drawdown: 0.0,
        }
    }

    pub fn open_position(&mut self, bar: usize, price: f64, fraction: f64) {
        if self.position.is_some() || price <= 0.0 {
            return;
        }
        let budget = self.cash * fraction.clamp(0.0, 1.0);
        let size = budget / price;
        if size <= 0.0 {
            return;
        }
        self.cash -= budget;
        self.position = Some(Position {
            entry_bar: bar,
            entry_price: price,
            size,
        });
    }

    pub fn close_position(&mut self, bar: usize, price: f64, reason: ExitReason) {
        if let Some(pos) = self.position.take() {
            let proceeds = pos.size * price;
            let profit = proceeds - pos.size * pos.entry_price;
            self.cash += proceeds;
            self.trades.push(Trade {
                entry_bar: pos.entry_bar,
                exit_bar: bar,
                entry_price: pos.entry_price,
                exit_price: price,
                size: pos.size,
                profit,
                exit_reason: reason,
            });
        }
    }

    /// Record end-of-bar equity and update drawdown tracking.
    pub fn mark(&mut self, price: f64) {
        let equity = self.equity(price);
        if equity > self.peak_equity {
            self.peak_equity = equity;
        }
        if self.peak_equity > 0.0 {
            let drawdown = (self.peak_equity - equity) / self.peak_equity;
            if drawdown > self.max_drawdown {
                self.max_drawdown = drawdown;
            }
        }
        self.equity_curve.push(equity);
    }

    pub fn equity(&self, price: f64) -> f64 {
        let position_value = self
            .position
            .as_ref()
            .map(|p| p.size * price)
            .unwrap_or(0.0);
        self.cash + position_value
    }

    /// Maximum peak-to-trough drawdown seen so far, as a fraction.
    pub fn max_drawdown(&self) -> f64 {
        self.max_drawdown
    }
}
