//! Support/resistance confirmation signal over the last three candles.
//!
//! BUY when every one of the last three closes sits at or above the SMA and
//! at or above either the support or the resistance level. SELL is the
//! mirror image with "at or below". Anything else, including fewer than
//! three candles, is HOLD.

use serde::{Deserialize, Serialize};

use crate::domain::{Action, Bar};

const CONFIRMATION_CANDLES: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalParams {
    pub sma_period: usize,
    pub resistance_window: usize,
    pub support_window: usize,
}

impl Default for SignalParams {
    fn default() -> Self {
        Self {
            sma_period: 40,
            resistance_window: 36,
            support_window: 78,
        }
    }
}

/// Mean close of the last `period` bars; the mean of all bars when shorter.
pub fn sma(bars: &[Bar], period: usize) -> Option<f64> {
    if bars.is_empty() {
        return None;
    }
    let window = &bars[bars.len().saturating_sub(period.max(1))..];
    Some(window.iter().map(|b| b.close).sum::<f64>() / window.len() as f64)
}

/// Highest high of the last `window` bars.
pub fn dynamic_resistance(bars: &[Bar], window: usize) -> Option<f64> {
    bars[bars.len().saturating_sub(window)..]
        .iter()
        .map(|b| b.high)
        .reduce(f64::max)
}

/// Lowest low of the last `window` bars.
pub fn dynamic_support(bars: &[Bar], window: usize) -> Option<f64> {
    bars[bars.len().saturating_sub(window)..]
        .iter()
        .map(|b| b.low)
        .reduce(f64::min)
}

pub fn evaluate_signal(bars: &[Bar], support: f64, resistance: f64, sma: f64) -> Action {
    if bars.len() < CONFIRMATION_CANDLES {
        return Action::Hold;
    }
    let last = &bars[bars.len() - CONFIRMATION_CANDLES..];
    let all = |pred: &dyn Fn(f64) -> bool| last.iter().all(|b| pred(b.close));

    let buy = all(&|c| c >= support && c >= sma) || all(&|c| c >= resistance && c >= sma);
    let sell = all(&|c| c <= support && c <= sma) || all(&|c| c <= resistance && c <= sma);

    if buy {
        Action::Buy
    } else if sell {
        Action::Sell
    } else {
        Action::Hold
    }
}

/// Compute the levels from `bars` and evaluate the newest candles.
pub fn signal_for(bars: &[Bar], params: &SignalParams) -> Action {
    match (
        dynamic_support(bars, params.support_window),
        dynamic_resistance(bars, params.resistance_window),
        sma(bars, params.sma_period),
    ) {
        (Some(support), Some(resistance), Some(avg)) => {
            evaluate_signal(bars, support, resistance, avg)
        }
        _ => Action::Hold,
    }
}
