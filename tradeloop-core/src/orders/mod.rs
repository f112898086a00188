//! Order/trade management for a single instrument.

pub mod trade_manager;

pub use trade_manager::{
    ActiveTrade, BookState, EntryRejection, SignalOutcome, TradeManager, DEFAULT_MAX_ORDERS,
};
