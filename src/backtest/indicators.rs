/// RSI values before enough bars have accumulated, and the whole series
/// when the period is unusable.
pub const RSI_NEUTRAL: f64 = 50.0;

/// Wilder-smoothed Relative Strength Index over a close series.
///
/// Returns one value per input bar. Bars before the warm-up window are
/// neutral (50). A period of zero, or a period the series cannot cover,
/// yields an all-neutral series rather than an error; the decode layer
/// normally guarantees a sane period, this is the backstop.
pub fn rsi(closes: &[f64], period: usize) -> Vec<f64> {
    let len = closes.len();
    if period == 0 || len < period + 1 {
        return vec![RSI_NEUTRAL; len];
    }

    let mut out = vec![RSI_NEUTRAL; len];

    // Seed averages from the first `period` changes.
    let mut avg_gain = 0.0;
    let mut avg_loss = 0.0;
    for i in 1..=period {
        let change = closes[i] - closes[i - 1];
        if change > 0.0 {
            avg_gain += change;
        } else {
            avg_loss -= change;
        }
    }
    avg_gain /= period as f64;
    avg_loss /= period as f64;
    out[period] = rsi_from_averages(avg_gain, avg_loss);

    // Wilder smoothing for the remainder.
    for i in (period + 1)..len {
        let change = closes[i] - closes[i - 1];
        let gain = if change > 0.0 { change } else { 0.0 };
        let loss = if change < 0.0 { -change } else { 0.0 };
        let p = period as f64;
        avg_gain = (avg_gain * (p - 1.0) + gain) / p;
        avg_loss = (avg_loss * (p - 1.0) + loss) / p;
        out[i] = rsi_from_averages(avg_gain, avg_loss);
    }

    out
}

fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        if avg_gain == 0.0 {
            RSI_NEUTRAL
        } else {
            100.0
        }
    } else {
        let rs = avg_gain / avg_loss;
        100.0 - (100.0 / (1.0 + rs))
    }
}
