//! Moving Average Convergence Divergence (MACD line only).
//!
//! MACD = EMA12(last) - EMA26(last), both EMAs run over the full close
//! history supplied. Needs at least `MACD_SLOW` closes, else 0.0.

use super::ema::EmaState;
use tracing::debug;

pub const MACD_FAST: usize = 12;
pub const MACD_SLOW: usize = 26;

/// Incremental MACD over a growing close history.
#[derive(Debug, Clone, Copy)]
pub struct MacdState {
    fast: EmaState,
    slow: EmaState,
    seen: usize,
}

impl MacdState {
    pub fn new() -> Self {
        Self {
            fast: EmaState::new(MACD_FAST),
            slow: EmaState::new(MACD_SLOW),
            seen: 0,
        }
    }

    /// Feed the next close and return the MACD value for the history so far.
    pub fn update(&mut self, close: f64) -> f64 {
        let fast = self.fast.update(close);
        let slow = self.slow.update(close);
        self.seen += 1;

        if self.seen < MACD_SLOW {
            return 0.0;
        }
        let value = fast - slow;
        if value.is_nan() {
            debug!(fast, slow, "MACD collapsed to NaN, using 0.0");
            return 0.0;
        }
        value
    }
}

impl Default for MacdState {
    fn default() -> Self {
        Self::new()
    }
}

pub fn macd(closes: &[f64]) -> f64 {
    if closes.len() < MACD_SLOW {
        return 0.0;
    }
    let mut state = MacdState::new();
    let mut value = 0.0;
    for &close in closes {
        value = state.update(close);
    }
    value
}
