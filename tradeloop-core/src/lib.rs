//! Tradeloop Core — decision engine for a single traded instrument.
//!
//! - Domain types (bars, actions)
//! - Indicator engine (RSI, MACD, return volatility)
//! - State extraction per bar
//! - Action policy: external oracle with a deterministic RSI fallback
//! - Risk-adjusted reward model
//! - Trade manager and the support/resistance signal used for live trading
//!
//! Nothing in this crate performs I/O beyond the [`oracle::PolicyOracle`]
//! seam; runners and process management live in `tradeloop-runner`.

pub mod domain;
pub mod indicators;
pub mod oracle;
pub mod orders;
pub mod policy;
pub mod reward;
pub mod signals;
pub mod state;

pub use domain::{Action, Bar};
pub use oracle::{DisabledOracle, OracleError, PolicyOracle, RefreshPayload};
pub use policy::{ActionPolicy, FallbackThresholds};
pub use reward::{RewardConfig, RewardModel};
pub use state::{MarketState, StateExtractor};
