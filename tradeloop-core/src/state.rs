//! State Extractor — per-bar market state records.
//!
//! A `MarketState` is derived from one bar plus the close history up to and
//! including it. It is recomputed on every episode step and never stored.
//! Fields are optional so that cleaning can mark NaN values as absent
//! (serialised as `null`) before the state is handed to an oracle.

use serde::{Deserialize, Serialize};

use crate::domain::Bar;
use crate::indicators::IndicatorSeries;

/// Spread assumed when the bar does not carry its own.
pub const DEFAULT_SPREAD: f64 = 0.0002;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MarketState {
    pub price: Option<f64>,
    pub spread: Option<f64>,
    pub volume: Option<f64>,
    pub rsi: Option<f64>,
    pub macd: Option<f64>,
}

impl MarketState {
    /// Replace every NaN field with `None`.
    pub fn cleaned(self) -> Self {
        fn drop_nan(v: Option<f64>) -> Option<f64> {
            v.filter(|x| !x.is_nan())
        }
        Self {
            price: drop_nan(self.price),
            spread: drop_nan(self.spread),
            volume: drop_nan(self.volume),
            rsi: drop_nan(self.rsi),
            macd: drop_nan(self.macd),
        }
    }

    pub fn has_nan(&self) -> bool {
        [self.price, self.spread, self.volume, self.rsi, self.macd]
            .iter()
            .any(|v| v.is_some_and(f64::is_nan))
    }
}

/// Free-function form of [`MarketState::cleaned`].
pub fn clean(state: MarketState) -> MarketState {
    state.cleaned()
}

/// Owns the bar history and its precomputed indicator series.
#[derive(Debug, Clone)]
pub struct StateExtractor {
    bars: Vec<Bar>,
    closes: Vec<f64>,
    indicators: IndicatorSeries,
}

impl StateExtractor {
    pub fn new(bars: Vec<Bar>) -> Self {
        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
        let indicators = IndicatorSeries::precompute(&closes);
        Self {
            bars,
            closes,
            indicators,
        }
    }

    /// Market state for the bar at `bar_index`, or `None` past the end.
    ///
    /// Indicator values attached to the bar win over computed ones.
    pub fn extract(&self, bar_index: usize) -> Option<MarketState> {
        let bar = self.bars.get(bar_index)?;
        Some(MarketState {
            price: Some(bar.close),
            spread: Some(bar.spread.unwrap_or(DEFAULT_SPREAD)),
            volume: Some(bar.volume),
            rsi: bar.rsi.or_else(|| self.indicators.rsi(bar_index)),
            macd: bar.macd.or_else(|| self.indicators.macd(bar_index)),
        })
    }

    /// Map an unbounded step counter onto the history (wrap-around).
    pub fn wrapped_index(&self, index: usize) -> Option<usize> {
        if self.bars.is_empty() {
            None
        } else {
            Some(index % self.bars.len())
        }
    }

    /// Close prices up to and including `bar_index`.
    pub fn closes_through(&self, bar_index: usize) -> &[f64] {
        let end = (bar_index + 1).min(self.closes.len());
        &self.closes[..end]
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{macd, rsi};
    use crate::test_support::rising_bars;

    #[test]
    fn extract_uses_close_volume_and_default_spread() {
        let extractor = StateExtractor::new(rising_bars(5, 100.0));
        let state = extractor.extract(2).unwrap();
        assert_eq!(state.price, Some(102.0));
        assert_eq!(state.volume, Some(1000.0));
        assert_eq!(state.spread, Some(DEFAULT_SPREAD));
        assert_eq!(state.rsi, Some(50.0));
        assert_eq!(state.macd, Some(0.0));
    }

    #[test]
    fn indicators_cover_history_through_the_bar() {
        let bars = rising_bars(40, 100.0);
        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
        let extractor = StateExtractor::new(bars);
        let state = extractor.extract(30).unwrap();
        assert_eq!(state.rsi, Some(rsi(&closes[..=30])));
        assert_eq!(state.macd, Some(macd(&closes[..=30])));
    }

    #[test]
    fn attached_values_override_computed_ones() {
        let mut bars = rising_bars(3, 100.0);
        bars[1].spread = Some(0.0005);
        bars[1].rsi = Some(12.5);
        bars[1].macd = Some(-0.3);
        let extractor = StateExtractor::new(bars);
        let state = extractor.extract(1).unwrap();
        assert_eq!(state.spread, Some(0.0005));
        assert_eq!(state.rsi, Some(12.5));
        assert_eq!(state.macd, Some(-0.3));
    }

    #[test]
    fn out_of_range_is_none() {
        let extractor = StateExtractor::new(rising_bars(3, 100.0));
        assert!(extractor.extract(3).is_none());
    }

    #[test]
    fn wrapped_index_cycles() {
        let extractor = StateExtractor::new(rising_bars(4, 100.0));
        assert_eq!(extractor.wrapped_index(9), Some(1));
        assert_eq!(StateExtractor::new(vec![]).wrapped_index(3), None);
    }

    #[test]
    fn clean_turns_nan_into_none() {
        let state = MarketState {
            price: Some(1.1),
            spread: Some(f64::NAN),
            volume: Some(10.0),
            rsi: Some(f64::NAN),
            macd: Some(0.0),
        };
        assert!(state.has_nan());
        let cleaned = clean(state);
        assert!(!cleaned.has_nan());
        assert_eq!(cleaned.spread, None);
        assert_eq!(cleaned.rsi, None);
        assert_eq!(cleaned.price, Some(1.1));

        let json = serde_json::to_string(&cleaned).unwrap();
        assert!(json.contains("\"rsi\":null"));
    }
}
