//! Indicator Engine.
//!
//! Pure functions of the close history visible at call time:
//! - `rsi` — leading-window Relative Strength Index, neutral 50.0 fallback
//! - `macd` — EMA12 − EMA26 over the full history, 0.0 fallback
//! - `return_volatility` — trailing dispersion of returns for position sizing
//!
//! None of them panic or return NaN for NaN-free input.

pub mod ema;
pub mod macd;
pub mod rsi;
pub mod series;
pub mod volatility;

pub use ema::{ema_series, EmaState};
pub use macd::{macd, MacdState, MACD_FAST, MACD_SLOW};
pub use rsi::{rsi, RSI_NEUTRAL, RSI_PERIOD};
pub use series::IndicatorSeries;
pub use volatility::return_volatility;

/// Closes rising by 1.0 per bar, for tests.
#[cfg(test)]
pub fn rising_closes(n: usize, start: f64) -> Vec<f64> {
    (0..n).map(|i| start + i as f64).collect()
}

/// Assert two f64 values are approximately equal (within epsilon).
#[cfg(test)]
pub fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "assert_approx failed: actual={actual}, expected={expected}, diff={}, epsilon={epsilon}",
        (actual - expected).abs()
    );
}

/// Default epsilon for indicator tests.
#[cfg(test)]
pub const DEFAULT_EPSILON: f64 = 1e-10;
