//! Action Policy — oracle first, deterministic RSI rule as fallback.
//!
//! `select_action` never fails: an oracle error, timeout or unusable answer
//! always resolves through [`ActionPolicy::fallback`].

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::domain::Action;
use crate::oracle::{OracleError, PolicyOracle};
use crate::state::{MarketState, StateExtractor};

/// RSI thresholds for the fallback rule.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FallbackThresholds {
    /// RSI strictly below this → BUY.
    pub oversold: f64,
    /// RSI strictly above this → SELL.
    pub overbought: f64,
}

impl Default for FallbackThresholds {
    fn default() -> Self {
        Self {
            oversold: 30.0,
            overbought: 70.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ActionPolicy {
    thresholds: FallbackThresholds,
}

impl ActionPolicy {
    pub fn new(thresholds: FallbackThresholds) -> Self {
        Self { thresholds }
    }

    /// Choose an action for step `bar_index`, wrapping past the end of history.
    pub fn select_action<O>(
        &self,
        extractor: &StateExtractor,
        bar_index: usize,
        oracle: &mut O,
    ) -> Action
    where
        O: PolicyOracle + ?Sized,
    {
        let Some(state) = extractor
            .wrapped_index(bar_index)
            .and_then(|idx| extractor.extract(idx))
        else {
            return Action::Hold;
        };
        self.decide(&state.cleaned(), oracle)
    }

    /// Oracle answer for an already-cleaned state, or the fallback rule.
    pub fn decide<O>(&self, state: &MarketState, oracle: &mut O) -> Action
    where
        O: PolicyOracle + ?Sized,
    {
        match oracle.query_action(state) {
            Ok(action) => {
                debug!(%action, "oracle action");
                action
            }
            Err(OracleError::Disabled) => self.fallback(state),
            Err(e) => {
                warn!(error = %e, "oracle query failed, using RSI fallback");
                self.fallback(state)
            }
        }
    }

    /// RSI < oversold → BUY; RSI > overbought → SELL; otherwise HOLD.
    pub fn fallback(&self, state: &MarketState) -> Action {
        match state.rsi {
            Some(rsi) if rsi < self.thresholds.oversold => Action::Buy,
            Some(rsi) if rsi > self.thresholds.overbought => Action::Sell,
            _ => Action::Hold,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::{DisabledOracle, RefreshPayload};
    use crate::test_support::rising_bars;
    use std::time::Duration;

    struct FixedOracle(Result<Action, fn() -> OracleError>, Vec<MarketState>);

    impl PolicyOracle for FixedOracle {
        fn query_action(&mut self, state: &MarketState) -> Result<Action, OracleError> {
            self.1.push(*state);
            self.0.map_err(|make| make())
        }

        fn trigger_refresh(&mut self, _payload: &RefreshPayload) -> Result<(), OracleError> {
            Ok(())
        }
    }

    fn state_with_rsi(rsi: Option<f64>) -> MarketState {
        MarketState {
            price: Some(1.1),
            spread: Some(0.0002),
            volume: Some(100.0),
            rsi,
            macd: Some(0.0),
        }
    }

    #[test]
    fn fallback_thresholds() {
        let policy = ActionPolicy::default();
        assert_eq!(policy.fallback(&state_with_rsi(Some(29.9))), Action::Buy);
        assert_eq!(policy.fallback(&state_with_rsi(Some(30.0))), Action::Hold);
        assert_eq!(policy.fallback(&state_with_rsi(Some(70.0))), Action::Hold);
        assert_eq!(policy.fallback(&state_with_rsi(Some(70.1))), Action::Sell);
        assert_eq!(policy.fallback(&state_with_rsi(None)), Action::Hold);
    }

    #[test]
    fn oracle_answer_wins() {
        let policy = ActionPolicy::default();
        let mut oracle = FixedOracle(Ok(Action::Buy), Vec::new());
        let action = policy.decide(&state_with_rsi(Some(90.0)), &mut oracle);
        assert_eq!(action, Action::Buy);
    }

    #[test]
    fn oracle_failures_resolve_through_fallback() {
        let policy = ActionPolicy::default();
        let failures: [fn() -> OracleError; 3] = [
            || OracleError::Timeout {
                operation: "action query",
                after: Duration::from_secs(15),
            },
            || OracleError::ProcessFailure("exit status 1".into()),
            || OracleError::InvalidResponse("maybe".into()),
        ];
        for make in failures {
            let mut oracle = FixedOracle(Err(make), Vec::new());
            let action = policy.decide(&state_with_rsi(Some(10.0)), &mut oracle);
            assert_eq!(action, Action::Buy);
        }
    }

    #[test]
    fn select_action_wraps_and_cleans_state() {
        let mut bars = rising_bars(3, 100.0);
        bars[1].rsi = Some(f64::NAN);
        let extractor = StateExtractor::new(bars);
        let mut oracle = FixedOracle(Ok(Action::Hold), Vec::new());

        // step 4 wraps onto bar 1
        let action = ActionPolicy::default().select_action(&extractor, 4, &mut oracle);
        assert_eq!(action, Action::Hold);
        assert_eq!(oracle.1.len(), 1);
        assert_eq!(oracle.1[0].price, Some(101.0));
        assert_eq!(oracle.1[0].rsi, None);
    }

    #[test]
    fn empty_history_holds() {
        let extractor = StateExtractor::new(vec![]);
        let action = ActionPolicy::default().select_action(&extractor, 0, &mut DisabledOracle);
        assert_eq!(action, Action::Hold);
    }
}
