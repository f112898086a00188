//! Bar-based signal helpers used by the live trading path.

pub mod support_resistance;

pub use support_resistance::{
    dynamic_resistance, dynamic_support, evaluate_signal, signal_for, sma, SignalParams,
};
