//! Exponential Moving Average (EMA).
//!
//! Plain recursion without bias correction:
//! EMA[0] = x[0], EMA[t] = alpha * x[t] + (1 - alpha) * EMA[t-1],
//! with alpha = 2 / (span + 1).

/// Incremental EMA accumulator.
#[derive(Debug, Clone, Copy)]
pub struct EmaState {
    alpha: f64,
    value: Option<f64>,
}

impl EmaState {
    pub fn new(span: usize) -> Self {
        assert!(span >= 1, "EMA span must be >= 1");
        Self {
            alpha: 2.0 / (span as f64 + 1.0),
            value: None,
        }
    }

    /// Feed the next observation and return the updated average.
    pub fn update(&mut self, x: f64) -> f64 {
        let next = match self.value {
            None => x,
            Some(prev) => self.alpha * x + (1.0 - self.alpha) * prev,
        };
        self.value = Some(next);
        next
    }

    pub fn value(&self) -> Option<f64> {
        self.value
    }
}

/// EMA of every prefix of `values`; same length as the input.
pub fn ema_series(values: &[f64], span: usize) -> Vec<f64> {
    let mut state = EmaState::new(span);
    values.iter().map(|&v| state.update(v)).collect()
}
