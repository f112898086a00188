//! Policy oracle capability.
//!
//! The external inference service is reached only through [`PolicyOracle`],
//! so tests and offline runs can substitute a deterministic implementation.
//! Every failure is an [`OracleError`] value; callers resolve it locally.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::domain::Action;
use crate::state::MarketState;

#[derive(Debug, Error)]
pub enum OracleError {
    #[error("oracle disabled")]
    Disabled,

    #[error("{operation} timed out after {after:?}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    #[error("failed to spawn inference process: {0}")]
    Spawn(String),

    #[error("inference process failed: {0}")]
    ProcessFailure(String),

    #[error("failed to write to inference process: {0}")]
    ChannelWrite(String),

    #[error("invalid oracle response: {0:?}")]
    InvalidResponse(String),

    #[error("oracle I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl OracleError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, OracleError::Timeout { .. })
    }
}

/// Fixed hyperparameters sent with every model refresh.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Hyperparameters {
    pub clip_range: f64,
    pub entropy_coeff: f64,
    pub batch_size: u32,
    pub gamma: f64,
    pub experience_window: u32,
}

impl Default for Hyperparameters {
    fn default() -> Self {
        Self {
            clip_range: 0.1,
            entropy_coeff: 0.02,
            batch_size: 16,
            gamma: 0.90,
            experience_window: 500,
        }
    }
}

/// Training-update message for the inference process.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RefreshPayload {
    pub episodes: u64,
    pub total_reward: f64,
    pub hyperparameters: Hyperparameters,
}

impl RefreshPayload {
    pub fn new(episodes: u64, total_reward: f64) -> Self {
        Self {
            episodes,
            total_reward,
            hyperparameters: Hyperparameters::default(),
        }
    }

    /// Text block written to the inference process stdin.
    pub fn to_prompt(&self) -> String {
        let h = &self.hyperparameters;
        format!(
            "PPO_UPDATE:\nEPISODES={}\nTOTAL_REWARD={:.2}\nHYPERPARAMETERS:\nclip_range={}\nentropy_coeff={}\nbatch_size={}\ngamma={:.2}\nexperience_window={}\n",
            self.episodes,
            self.total_reward,
            h.clip_range,
            h.entropy_coeff,
            h.batch_size,
            h.gamma,
            h.experience_window,
        )
    }
}

pub trait PolicyOracle {
    /// Ask for an action given a cleaned market state.
    fn query_action(&mut self, state: &MarketState) -> Result<Action, OracleError>;

    /// Push a training update; `Ok` only when the update ran to a zero exit.
    fn trigger_refresh(&mut self, payload: &RefreshPayload) -> Result<(), OracleError>;
}

impl<O: PolicyOracle + ?Sized> PolicyOracle for Box<O> {
    fn query_action(&mut self, state: &MarketState) -> Result<Action, OracleError> {
        (**self).query_action(state)
    }

    fn trigger_refresh(&mut self, payload: &RefreshPayload) -> Result<(), OracleError> {
        (**self).trigger_refresh(payload)
    }
}

/// Oracle used when no inference service is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledOracle;

impl PolicyOracle for DisabledOracle {
    fn query_action(&mut self, _state: &MarketState) -> Result<Action, OracleError> {
        Err(OracleError::Disabled)
    }

    fn trigger_refresh(&mut self, _payload: &RefreshPayload) -> Result<(), OracleError> {
        Err(OracleError::Disabled)
    }
}
