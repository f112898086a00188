//! Reward Model — risk-adjusted, volatility-scaled reward for one action.
//!
//! ```text
//! volatility    = std of the last `volatility_window` returns
//! position_size = clamp(risk_adjustment_factor / max(volatility, 1e-5), min, max)
//! cost          = spread + transaction_cost
//! BUY  pips     = (next_price - price - cost) * 10_000
//! SELL pips     = (price - next_price - cost) * 10_000
//! reward        = clamp(pips * position_size * (1 - risk_adjustment_factor), -1000, 1000)
//! ```
//!
//! HOLD always earns `default_reward`. A NaN result collapses to
//! `default_reward`; a missing current price yields 0.0.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::domain::Action;
use crate::indicators::return_volatility;
use crate::state::{MarketState, DEFAULT_SPREAD};

/// Rewards are clipped to `[-REWARD_CLIP, REWARD_CLIP]`.
pub const REWARD_CLIP: f64 = 1000.0;

/// Price difference → pips.
pub const PIP_SCALE: f64 = 10_000.0;

const VOLATILITY_FLOOR: f64 = 1e-5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RewardConfig {
    pub transaction_cost: f64,
    pub risk_adjustment_factor: f64,
    pub volatility_window: usize,
    pub min_position_size: f64,
    pub max_position_size: f64,
    pub default_reward: f64,
}

impl Default for RewardConfig {
    fn default() -> Self {
        Self {
            transaction_cost: 0.0005,
            risk_adjustment_factor: 0.15,
            volatility_window: 14,
            min_position_size: 0.01,
            max_position_size: 1.0,
            default_reward: -0.1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RewardError {
    #[error("missing state field '{0}'")]
    MissingField(&'static str),
}

/// Intermediate terms of a directional reward, kept for logging and tests.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RewardBreakdown {
    pub volatility: f64,
    pub position_size: f64,
    pub pips: f64,
    pub cost: f64,
    pub reward: f64,
}

#[derive(Debug, Clone, Default)]
pub struct RewardModel {
    config: RewardConfig,
}

impl RewardModel {
    pub fn new(config: RewardConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RewardConfig {
        &self.config
    }

    /// Reward for taking `action` in `state` and observing `next_state`.
    ///
    /// `closes` is the close history up to the current bar. Never fails.
    pub fn reward(
        &self,
        action: Action,
        state: &MarketState,
        next_state: &MarketState,
        closes: &[f64],
    ) -> f64 {
        if action == Action::Hold {
            return self.config.default_reward;
        }
        match self.evaluate(action, state, next_state, closes) {
            Ok(b) => {
                debug!(
                    %action,
                    pips = b.pips,
                    position_size = b.position_size,
                    volatility = b.volatility,
                    reward = b.reward,
                    "reward"
                );
                b.reward
            }
            Err(e) => {
                warn!(error = %e, %action, "reward calculation failed, using 0.0");
                0.0
            }
        }
    }

    /// Full breakdown for a directional action; HOLD yields `default_reward`.
    pub fn evaluate(
        &self,
        action: Action,
        state: &MarketState,
        next_state: &MarketState,
        closes: &[f64],
    ) -> Result<RewardBreakdown, RewardError> {
        let cfg = &self.config;
        let price = finite_or_zero(state.price.ok_or(RewardError::MissingField("price"))?);
        let next_price = next_state.price.map_or(price, finite_or_zero);
        let price_move = next_price - price;

        let volatility = return_volatility(closes, cfg.volatility_window);
        let position_size = (cfg.risk_adjustment_factor / volatility.max(VOLATILITY_FLOOR))
            .max(cfg.min_position_size)
            .min(cfg.max_position_size);
        let cost = finite_or_zero(state.spread.unwrap_or(DEFAULT_SPREAD)) + cfg.transaction_cost;

        let pips = match action {
            Action::Buy => (price_move - cost) * PIP_SCALE,
            Action::Sell => (-price_move - cost) * PIP_SCALE,
            Action::Hold => {
                return Ok(RewardBreakdown {
                    volatility,
                    position_size,
                    pips: 0.0,
                    cost,
                    reward: cfg.default_reward,
                })
            }
        };

        let raw = pips * position_size * (1.0 - cfg.risk_adjustment_factor);
        let reward = if raw.is_nan() {
            cfg.default_reward
        } else {
            raw.clamp(-REWARD_CLIP, REWARD_CLIP)
        };

        Ok(RewardBreakdown {
            volatility,
            position_size,
            pips,
            cost,
            reward,
        })
    }
}

fn finite_or_zero(x: f64) -> f64 {
    if x.is_finite() {
        x
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::assert_approx;

    fn state(price: f64) -> MarketState {
        MarketState {
            price: Some(price),
            spread: Some(0.0002),
            volume: Some(1000.0),
            rsi: Some(50.0),
            macd: Some(0.0),
        }
    }

    #[test]
    fn hold_returns_default_reward() {
        let model = RewardModel::default();
        let r = model.reward(Action::Hold, &state(1.1), &state(1.2), &[1.0, 1.1]);
        assert_eq!(r, -0.1);

        // even when the state is unusable
        let r = model.reward(
            Action::Hold,
            &MarketState::default(),
            &MarketState::default(),
            &[],
        );
        assert_eq!(r, -0.1);
    }

    #[test]
    fn flat_history_uses_max_position_size() {
        // Zero volatility → size saturates at max_position_size (1.0).
        let model = RewardModel::default();
        let closes = [1.1000; 20];
        let b = model
            .evaluate(Action::Buy, &state(1.1000), &state(1.1010), &closes)
            .unwrap();
        assert_eq!(b.volatility, 0.0);
        assert_eq!(b.position_size, 1.0);
        // (0.0010 - 0.0007) * 10_000 = 3 pips, scaled by (1 - 0.15)
        assert_approx(b.pips, 3.0, 1e-6);
        assert_approx(b.reward, 3.0 * 0.85, 1e-6);
    }

    #[test]
    fn sell_mirrors_buy_before_costs() {
        let model = RewardModel::default();
        let closes = [1.1000; 20];
        let buy = model.reward(Action::Buy, &state(1.1), &state(1.101), &closes);
        let sell = model.reward(Action::Sell, &state(1.1), &state(1.101), &closes);
        // both legs pay 7 pips of cost
        assert_approx(buy + sell, -2.0 * 7.0 * 0.85, 1e-6);
    }

    #[test]
    fn unchanged_price_costs_the_spread() {
        let model = RewardModel::default();
        let r = model.reward(Action::Buy, &state(1.1), &state(1.1), &[1.1; 20]);
        assert_approx(r, -7.0 * 0.85, 1e-6);
    }

    #[test]
    fn rewards_are_clipped() {
        let model = RewardModel::default();
        let closes = [100.0; 20];
        assert_eq!(
            model.reward(Action::Buy, &state(100.0), &state(200.0), &closes),
            REWARD_CLIP
        );
        assert_eq!(
            model.reward(Action::Sell, &state(100.0), &state(200.0), &closes),
            -REWARD_CLIP
        );
    }

    #[test]
    fn high_volatility_shrinks_position() {
        let model = RewardModel::default();
        let closes: Vec<f64> = (0..20)
            .map(|i| if i % 2 == 0 { 100.0 } else { 150.0 })
            .collect();
        let b = model
            .evaluate(Action::Buy, &state(100.0), &state(100.0), &closes)
            .unwrap();
        assert!(b.volatility > 0.3);
        assert!(b.position_size < 1.0);
        assert!(b.position_size >= 0.01);
    }

    #[test]
    fn missing_price_yields_zero() {
        let model = RewardModel::default();
        let mut missing = state(1.1);
        missing.price = None;
        assert_eq!(
            model.evaluate(Action::Buy, &missing, &state(1.1), &[]),
            Err(RewardError::MissingField("price"))
        );
        assert_eq!(model.reward(Action::Buy, &missing, &state(1.1), &[]), 0.0);

        // a missing next price means no move
        let r = model.reward(Action::Sell, &state(1.1), &missing, &[]);
        assert_approx(r, -7.0 * 0.85, 1e-6);
    }

    #[test]
    fn missing_spread_uses_default() {
        let model = RewardModel::default();
        let mut s = state(1.1);
        s.spread = None;
        let b = model
            .evaluate(Action::Buy, &s, &state(1.1), &[1.1; 20])
            .unwrap();
        assert_approx(b.cost, DEFAULT_SPREAD + 0.0005, 1e-12);
    }

    #[test]
    fn config_defaults_fill_missing_fields() {
        let cfg: RewardConfig = serde_json::from_str(r#"{"transaction_cost": 0.001}"#).unwrap();
        assert_eq!(cfg.transaction_cost, 0.001);
        assert_eq!(cfg.volatility_window, 14);
        assert_eq!(cfg.default_reward, -0.1);
    }
}
