//! Domain types for the trading engine.

pub mod action;
pub mod bar;

pub use action::{Action, ParseActionError};
pub use bar::Bar;
