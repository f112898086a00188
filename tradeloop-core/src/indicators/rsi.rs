//! Relative Strength Index (RSI) over a fixed leading window.
//!
//! Takes the first `RSI_PERIOD` first-differences of the supplied closes
//! (the leading slice, not the most recent one), averages gains and losses
//! separately and returns RSI = 100 - 100 / (1 + avg_gain / avg_loss).
//! Edge cases: fewer than `RSI_PERIOD` deltas → 50.0; no losses → avg_loss
//! is floored at 1e-9; a NaN result collapses to 50.0.

use tracing::debug;

pub const RSI_PERIOD: usize = 14;

/// Value returned whenever RSI cannot be computed.
pub const RSI_NEUTRAL: f64 = 50.0;

const LOSS_FLOOR: f64 = 1e-9;

pub fn rsi(closes: &[f64]) -> f64 {
    if closes.len() < RSI_PERIOD + 1 {
        return RSI_NEUTRAL;
    }

    let mut gain_sum = 0.0;
    let mut gain_count = 0usize;
    let mut loss_sum = 0.0;
    let mut loss_count = 0usize;

    // Leading slice: deltas[0..RSI_PERIOD]
    for w in closes.windows(2).take(RSI_PERIOD) {
        let delta = w[1] - w[0];
        if delta >= 0.0 {
            gain_sum += delta;
            gain_count += 1;
        } else if delta < 0.0 {
            loss_sum += delta;
            loss_count += 1;
        }
    }

    let avg_gain = if gain_count > 0 {
        gain_sum / gain_count as f64
    } else {
        0.0
    };
    let avg_loss = if loss_count > 0 {
        (loss_sum / loss_count as f64).abs()
    } else {
        LOSS_FLOOR
    };

    let rs = avg_gain / avg_loss;
    let value = 100.0 - 100.0 / (1.0 + rs);
    if value.is_nan() {
        debug!(avg_gain, avg_loss, "RSI collapsed to NaN, using neutral value");
        return RSI_NEUTRAL;
    }
    value
}
