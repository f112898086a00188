//! Property tests for engine invariants.
//!
//! Uses proptest to verify:
//! 1. RSI bounds — always in [0, 100], never NaN; neutral below the window
//! 2. MACD — never NaN; exactly 0.0 before the slow EMA is warm
//! 3. Reward bounds — HOLD ignores prices, directional rewards are clipped
//! 4. Trade book — cap and shared-price guards, idempotent reverse

use proptest::prelude::*;
use tradeloop_core::domain::Action;
use tradeloop_core::indicators::{macd, rsi, MACD_SLOW, RSI_NEUTRAL, RSI_PERIOD};
use tradeloop_core::orders::{EntryRejection, TradeManager};
use tradeloop_core::reward::{RewardModel, REWARD_CLIP};
use tradeloop_core::state::MarketState;

// ── Strategies (proptest) ────────────────────────────────────────────

fn arb_price() -> impl Strategy<Value = f64> {
    (0.5..500.0_f64).prop_map(|p| (p * 10_000.0).round() / 10_000.0)
}

fn arb_closes(max_len: usize) -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(arb_price(), 0..max_len)
}

fn arb_state() -> impl Strategy<Value = MarketState> {
    (arb_price(), 0.0..0.01_f64, 0.0..1e6_f64).prop_map(|(price, spread, volume)| MarketState {
        price: Some(price),
        spread: Some(spread),
        volume: Some(volume),
        rsi: Some(50.0),
        macd: Some(0.0),
    })
}

fn arb_directional() -> impl Strategy<Value = Action> {
    prop_oneof![Just(Action::Buy), Just(Action::Sell)]
}

// ── 1. RSI ───────────────────────────────────────────────────────────

proptest! {
    #[test]
    fn rsi_is_bounded(closes in arb_closes(80)) {
        let value = rsi(&closes);
        prop_assert!(!value.is_nan());
        prop_assert!((0.0..=100.0).contains(&value));
    }

    #[test]
    fn rsi_is_neutral_without_enough_deltas(closes in arb_closes(RSI_PERIOD + 1)) {
        prop_assert_eq!(rsi(&closes), RSI_NEUTRAL);
    }
}

// ── 2. MACD ──────────────────────────────────────────────────────────

proptest! {
    #[test]
    fn macd_is_never_nan(closes in arb_closes(120)) {
        prop_assert!(macd(&closes).is_finite());
    }

    #[test]
    fn macd_is_zero_before_slow_window(closes in arb_closes(MACD_SLOW)) {
        prop_assert_eq!(macd(&closes), 0.0);
    }
}

// ── 3. Reward ────────────────────────────────────────────────────────

proptest! {
    #[test]
    fn hold_reward_ignores_prices(
        s in arb_state(),
        s2 in arb_state(),
        closes in arb_closes(40),
    ) {
        let model = RewardModel::default();
        prop_assert_eq!(model.reward(Action::Hold, &s, &s2, &closes), -0.1);
    }

    #[test]
    fn directional_reward_is_clipped(
        action in arb_directional(),
        s in arb_state(),
        s2 in arb_state(),
        closes in arb_closes(40),
    ) {
        let r = RewardModel::default().reward(action, &s, &s2, &closes);
        prop_assert!(r.is_finite());
        prop_assert!((-REWARD_CLIP..=REWARD_CLIP).contains(&r));
    }
}

// ── 4. Trade book ────────────────────────────────────────────────────

proptest! {
    #[test]
    fn cap_is_enforced_at_shared_price(max in 1usize..20, price in arb_price()) {
        let mut tm = TradeManager::with_max_orders(max);
        for _ in 0..max {
            prop_assert!(tm.enter(Action::Buy, price).is_ok());
        }
        prop_assert_eq!(
            tm.enter(Action::Buy, price),
            Err(EntryRejection::MaxOrdersReached { max })
        );
        prop_assert_eq!(tm.active().len(), max);
    }

    #[test]
    fn other_price_is_a_mismatch_at_any_fill(
        max in 1usize..20,
        filled in 1usize..20,
        price in arb_price(),
        other in arb_price(),
    ) {
        prop_assume!(price != other);
        let mut tm = TradeManager::with_max_orders(max);
        for _ in 0..filled.min(max) {
            tm.enter(Action::Sell, price).unwrap();
        }
        let is_mismatch = matches!(
            tm.enter(Action::Sell, other),
            Err(EntryRejection::PriceMismatch { .. })
        );
        prop_assert!(is_mismatch);
    }

    #[test]
    fn reverse_always_empties(entries in 0usize..15, price in arb_price()) {
        let mut tm = TradeManager::new();
        for _ in 0..entries {
            let _ = tm.enter(Action::Buy, price);
        }
        tm.reverse();
        prop_assert!(tm.active().is_empty());
        tm.reverse();
        prop_assert!(tm.active().is_empty());
    }
}
