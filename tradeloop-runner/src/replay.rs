//! Trade replay — walks bars through the support/resistance signal and the
//! trade manager, one bar at a time, and summarises what the book did.

use serde::{Deserialize, Serialize};
use tracing::debug;

use tradeloop_core::domain::{Action, Bar};
use tradeloop_core::orders::{BookState, EntryRejection, TradeManager};
use tradeloop_core::signals::{signal_for, SignalParams};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReplaySummary {
    pub bars: usize,
    pub buy_signals: usize,
    pub sell_signals: usize,
    pub hold_signals: usize,
    pub entries: usize,
    pub reversals: usize,
    pub rejected_max_orders: usize,
    pub rejected_price_mismatch: usize,
    pub final_state: Option<BookState>,
}

/// Replay `bars` in order; each bar sees only the history up to itself.
pub fn replay_trades(bars: &[Bar], params: &SignalParams, max_orders: usize) -> ReplaySummary {
    let mut book = TradeManager::with_max_orders(max_orders);
    let mut summary = ReplaySummary {
        bars: bars.len(),
        ..ReplaySummary::default()
    };

    for (i, bar) in bars.iter().enumerate() {
        let signal = signal_for(&bars[..=i], params);
        match signal {
            Action::Buy => summary.buy_signals += 1,
            Action::Sell => summary.sell_signals += 1,
            Action::Hold => summary.hold_signals += 1,
        }

        let outcome = book.on_signal(signal, bar.close);
        if outcome.reversed {
            summary.reversals += 1;
        }
        match outcome.entry {
            Some(Ok(())) => summary.entries += 1,
            Some(Err(EntryRejection::MaxOrdersReached { .. })) => summary.rejected_max_orders += 1,
            Some(Err(EntryRejection::PriceMismatch { .. })) => {
                summary.rejected_price_mismatch += 1
            }
            None => {}
        }
        debug!(bar = i, %signal, state = %book.state(), "replay step");
    }

    summary.final_state = Some(book.state());
    summary
}
