//! Trailing return volatility.
//!
//! Population standard deviation of simple close-to-close returns over the
//! last `window` returns. Fewer than two returns, or a non-finite result,
//! yields 0.0; callers floor the value before dividing by it.

pub fn return_volatility(closes: &[f64], window: usize) -> f64 {
    if window == 0 || closes.len() < 3 {
        return 0.0;
    }

    let start = closes.len().saturating_sub(window + 1);
    let returns: Vec<f64> = closes[start..]
        .windows(2)
        .filter(|w| w[0] != 0.0)
        .map(|w| w[1] / w[0] - 1.0)
        .collect();

    if returns.len() < 2 {
        return 0.0;
    }

    let n = returns.len() as f64;
    let mean = returns.iter().sum::<f64>() / n;
    let var = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n;
    let std = var.sqrt();
    if std.is_finite() {
        std
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, DEFAULT_EPSILON};

    #[test]
    fn short_history_is_zero() {
        assert_eq!(return_volatility(&[], 14), 0.0);
        assert_eq!(return_volatility(&[100.0, 101.0], 14), 0.0);
    }

    #[test]
    fn constant_returns_have_zero_dispersion() {
        let closes: Vec<f64> = (0..20).map(|i| 100.0 * 1.01_f64.powi(i)).collect();
        assert!(return_volatility(&closes, 14) < 1e-12);
    }

    #[test]
    fn alternating_returns_known_value() {
        // closes 100, 110, 99 → returns 0.1, -0.1
        // mean 0, var = (0.01 + 0.01) / 2
        let vol = return_volatility(&[100.0, 110.0, 99.0], 14);
        assert_approx(vol, 0.1, DEFAULT_EPSILON);
    }

    #[test]
    fn only_trailing_window_is_used() {
        let mut closes = vec![100.0, 150.0, 50.0, 120.0];
        closes.extend([200.0; 10]);
        // last 3 returns are all zero
        assert_eq!(return_volatility(&closes, 3), 0.0);
        assert!(return_volatility(&closes, 13) > 0.0);
    }
}
