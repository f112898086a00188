//! Per-bar indicator values, precomputed once per price history.
//!
//! Value `i` equals the pure indicator applied to `closes[..=i]`, so the
//! State Extractor can look values up by bar index instead of rescanning
//! the history on every episode step.

use super::macd::MacdState;
use super::rsi::{rsi, RSI_NEUTRAL, RSI_PERIOD};

#[derive(Debug, Clone, Default)]
pub struct IndicatorSeries {
    rsi: Vec<f64>,
    macd: Vec<f64>,
}

impl IndicatorSeries {
    pub fn precompute(closes: &[f64]) -> Self {
        let n = closes.len();

        // The leading-window RSI is fixed once RSI_PERIOD deltas exist.
        let mut rsi_values = vec![RSI_NEUTRAL; n];
        if n > RSI_PERIOD {
            let settled = rsi(&closes[..=RSI_PERIOD]);
            for v in rsi_values.iter_mut().skip(RSI_PERIOD) {
                *v = settled;
            }
        }

        let mut state = MacdState::new();
        let macd_values = closes.iter().map(|&c| state.update(c)).collect();

        Self {
            rsi: rsi_values,
            macd: macd_values,
        }
    }

    pub fn rsi(&self, bar_index: usize) -> Option<f64> {
        self.rsi.get(bar_index).copied()
    }

    pub fn macd(&self, bar_index: usize) -> Option<f64> {
        self.macd.get(bar_index).copied()
    }

    pub fn len(&self) -> usize {
        self.rsi.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rsi.is_empty()
    }
}
