//! Trade Manager — bounded book of same-price entries with reversal.
//!
//! Entry guards are checked in a fixed order:
//! 1. Price mismatch: while positioned, a new entry must match the first
//!    trade's entry price exactly.
//! 2. Capacity: at most `max_orders` active trades.
//!
//! A rejected entry is a value, not an error; the book is left untouched.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use tracing::{debug, info};

use crate::domain::Action;

pub const DEFAULT_MAX_ORDERS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ActiveTrade {
    pub signal: Action,
    pub entry_price: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Error, Serialize, Deserialize)]
pub enum EntryRejection {
    #[error("max orders reached ({max})")]
    MaxOrdersReached { max: usize },

    #[error("price mismatch: {candidate} differs from initial entry {initial}")]
    PriceMismatch { candidate: f64, initial: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum BookState {
    Flat,
    Positioned { count: usize, entry_price: f64 },
}

impl fmt::Display for BookState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BookState::Flat => write!(f, "flat"),
            BookState::Positioned { count, entry_price } => {
                write!(f, "positioned ({count} @ {entry_price})")
            }
        }
    }
}

/// What a single `on_signal` call did.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SignalOutcome {
    /// Existing trades were closed because the signal flipped.
    pub reversed: bool,
    /// `Some(Ok)` entered, `Some(Err)` rejected, `None` no entry attempted.
    pub entry: Option<Result<(), EntryRejection>>,
}

#[derive(Debug, Clone)]
pub struct TradeManager {
    max_orders: usize,
    active: Vec<ActiveTrade>,
}

impl Default for TradeManager {
    fn default() -> Self {
        Self::new()
    }
}

impl TradeManager {
    pub fn new() -> Self {
        Self::with_max_orders(DEFAULT_MAX_ORDERS)
    }

    pub fn with_max_orders(max_orders: usize) -> Self {
        Self {
            max_orders,
            active: Vec::new(),
        }
    }

    pub fn max_orders(&self) -> usize {
        self.max_orders
    }

    pub fn active(&self) -> &[ActiveTrade] {
        &self.active
    }

    pub fn state(&self) -> BookState {
        match self.active.first() {
            None => BookState::Flat,
            Some(first) => BookState::Positioned {
                count: self.active.len(),
                entry_price: first.entry_price,
            },
        }
    }

    pub fn can_enter(&self, price: f64) -> Result<(), EntryRejection> {
        if let Some(first) = self.active.first() {
            if price != first.entry_price {
                return Err(EntryRejection::PriceMismatch {
                    candidate: price,
                    initial: first.entry_price,
                });
            }
        }
        if self.active.len() >= self.max_orders {
            return Err(EntryRejection::MaxOrdersReached {
                max: self.max_orders,
            });
        }
        Ok(())
    }

    pub fn enter(&mut self, signal: Action, price: f64) -> Result<(), EntryRejection> {
        if let Err(rejection) = self.can_enter(price) {
            debug!(%signal, price, %rejection, "entry rejected");
            return Err(rejection);
        }
        self.active.push(ActiveTrade {
            signal,
            entry_price: price,
        });
        info!(%signal, price, count = self.active.len(), "trade entered");
        Ok(())
    }

    /// Close every active trade. Returns how many were closed.
    pub fn reverse(&mut self) -> usize {
        let closed = self.active.len();
        if closed > 0 {
            info!(closed, "trades reversed");
        }
        self.active.clear();
        closed
    }

    /// Apply a signal: reverse on a direction change, then enter on BUY/SELL.
    ///
    /// HOLD while positioned counts as a change and flattens the book.
    pub fn on_signal(&mut self, signal: Action, price: f64) -> SignalOutcome {
        let reversed = match self.active.first() {
            Some(first) if first.signal != signal => {
                self.reverse();
                true
            }
            _ => false,
        };
        let entry = signal
            .is_directional()
            .then(|| self.enter(signal, price));
        SignalOutcome { reversed, entry }
    }
}
