//! Trainer configuration: a TOML file plus environment overrides.
//!
//! Every section is optional; absent keys take their defaults. Overrides
//! are read through a lookup function so callers (and tests) decide where
//! values come from. [`TrainerConfig::apply_env_overrides`] uses the
//! process environment.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use tradeloop_core::orders::DEFAULT_MAX_ORDERS;
use tradeloop_core::reward::RewardConfig;

use crate::logging::default_log_dir;
use crate::oracle::OracleConfig;
use crate::scheduler::SchedulerConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid value for {var}: {value:?}")]
    InvalidOverride { var: &'static str, value: String },

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TradeConfig {
    pub max_orders: usize,
}

impl Default for TradeConfig {
    fn default() -> Self {
        Self {
            max_orders: DEFAULT_MAX_ORDERS,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub log_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainerConfig {
    pub data: DataConfig,
    pub scheduler: SchedulerConfig,
    pub reward: RewardConfig,
    pub oracle: OracleConfig,
    pub trade: TradeConfig,
    pub logging: LoggingConfig,
}

impl TrainerConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Apply overrides from the process environment.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|var| std::env::var(var).ok())
    }

    /// Apply `TRANSACTION_COST`, `RISK_ADJUSTMENT_FACTOR`, `VOLATILITY_WINDOW`,
    /// `MIN_POSITION_SIZE`, `MAX_POSITION_SIZE`, `DEFAULT_REWARD`,
    /// `HISTORICAL_DATA_PATH` and `LOG_DIR` as resolved by `lookup`.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let reward = &mut self.reward;
        override_with(&lookup, "TRANSACTION_COST", &mut reward.transaction_cost)?;
        override_with(&lookup, "RISK_ADJUSTMENT_FACTOR", &mut reward.risk_adjustment_factor)?;
        override_with(&lookup, "VOLATILITY_WINDOW", &mut reward.volatility_window)?;
        override_with(&lookup, "MIN_POSITION_SIZE", &mut reward.min_position_size)?;
        override_with(&lookup, "MAX_POSITION_SIZE", &mut reward.max_position_size)?;
        override_with(&lookup, "DEFAULT_REWARD", &mut reward.default_reward)?;

        if let Some(path) = lookup("HISTORICAL_DATA_PATH").filter(|v| !v.trim().is_empty()) {
            self.data.path = Some(PathBuf::from(path.trim()));
        }
        if let Some(dir) = lookup("LOG_DIR").filter(|v| !v.trim().is_empty()) {
            self.logging.log_dir = Some(PathBuf::from(dir.trim()));
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let r = &self.reward;
        if !(r.transaction_cost.is_finite() && r.transaction_cost >= 0.0) {
            return invalid("reward.transaction_cost must be a non-negative number");
        }
        if !r.risk_adjustment_factor.is_finite() {
            return invalid("reward.risk_adjustment_factor must be finite");
        }
        if r.volatility_window == 0 {
            return invalid("reward.volatility_window must be at least 1");
        }
        if !(r.min_position_size.is_finite() && r.max_position_size.is_finite()) {
            return invalid("reward position sizes must be finite");
        }
        if r.min_position_size > r.max_position_size {
            return invalid("reward.min_position_size exceeds reward.max_position_size");
        }
        if !r.default_reward.is_finite() {
            return invalid("reward.default_reward must be finite");
        }

        let s = &self.scheduler;
        if !(s.time_limit_secs.is_finite() && s.time_limit_secs >= 0.0) {
            return invalid("scheduler.time_limit_secs must be a non-negative number");
        }
        if !(s.step_interval_secs.is_finite() && s.step_interval_secs >= 0.0) {
            return invalid("scheduler.step_interval_secs must be a non-negative number");
        }
        if s.refresh_every == 0 {
            return invalid("scheduler.refresh_every must be at least 1");
        }
        if s.progress_every == 0 {
            return invalid("scheduler.progress_every must be at least 1");
        }
        if s.max_passes == Some(0) {
            return invalid("scheduler.max_passes must be at least 1 when set");
        }

        if self.trade.max_orders == 0 {
            return invalid("trade.max_orders must be at least 1");
        }
        if self.oracle.enabled && self.oracle.program.trim().is_empty() {
            return invalid("oracle.program is empty");
        }
        Ok(())
    }

    /// Configured log dir, or the platform default.
    pub fn log_dir(&self) -> PathBuf {
        self.logging.log_dir.clone().unwrap_or_else(default_log_dir)
    }
}

fn invalid(msg: &str) -> Result<(), ConfigError> {
    Err(ConfigError::Invalid(msg.to_string()))
}

fn override_with<F, T>(lookup: &F, var: &'static str, target: &mut T) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    if let Some(raw) = lookup(var) {
        *target = raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidOverride { var, value: raw })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn empty_toml_gives_defaults() {
        let cfg = TrainerConfig::from_toml("").unwrap();
        assert_eq!(cfg, TrainerConfig::default());
        assert_eq!(cfg.scheduler.time_limit_secs, 1800.0);
        assert_eq!(cfg.scheduler.refresh_every, 5);
        assert_eq!(cfg.oracle.model, "deepseek-r1:1.5b");
        assert_eq!(cfg.oracle.refresh_timeout_secs, 480);
        assert_eq!(cfg.trade.max_orders, 10);
        assert_eq!(cfg.reward.transaction_cost, 0.0005);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let cfg = TrainerConfig::from_toml(
            r#"
            [data]
            path = "data/eurusd.csv"

            [scheduler]
            time_limit_secs = 60
            max_passes = 2

            [reward]
            volatility_window = 20

            [oracle]
            enabled = false
            "#,
        )
        .unwrap();
        assert_eq!(cfg.data.path, Some(PathBuf::from("data/eurusd.csv")));
        assert_eq!(cfg.scheduler.time_limit_secs, 60.0);
        assert_eq!(cfg.scheduler.max_passes, Some(2));
        assert_eq!(cfg.scheduler.step_interval_secs, 1.0);
        assert_eq!(cfg.reward.volatility_window, 20);
        assert_eq!(cfg.reward.default_reward, -0.1);
        assert!(!cfg.oracle.enabled);
        assert_eq!(cfg.oracle.program, "ollama");
    }

    #[test]
    fn mistyped_value_is_parse_error() {
        let err = TrainerConfig::from_toml("[scheduler]\ntime_limit_secs = \"soon\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn overrides_apply_independently() {
        let mut cfg = TrainerConfig::default();
        cfg.apply_overrides(lookup_from(&[
            ("TRANSACTION_COST", "0.001"),
            ("VOLATILITY_WINDOW", " 30 "),
            ("HISTORICAL_DATA_PATH", "/tmp/bars.csv"),
            ("LOG_DIR", "/tmp/logs"),
        ]))
        .unwrap();
        assert_eq!(cfg.reward.transaction_cost, 0.001);
        assert_eq!(cfg.reward.volatility_window, 30);
        assert_eq!(cfg.reward.risk_adjustment_factor, 0.15);
        assert_eq!(cfg.data.path, Some(PathBuf::from("/tmp/bars.csv")));
        assert_eq!(cfg.log_dir(), PathBuf::from("/tmp/logs"));
    }

    #[test]
    fn unparseable_override_is_fatal() {
        let mut cfg = TrainerConfig::default();
        let err = cfg
            .apply_overrides(lookup_from(&[("DEFAULT_REWARD", "minus one")]))
            .unwrap_err();
        match err {
            ConfigError::InvalidOverride { var, value } => {
                assert_eq!(var, "DEFAULT_REWARD");
                assert_eq!(value, "minus one");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn validate_rejects_inverted_position_bounds() {
        let mut cfg = TrainerConfig::default();
        cfg.reward.min_position_size = 2.0;
        assert!(matches!(cfg.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn validate_rejects_zero_cadences() {
        let mut cfg = TrainerConfig::default();
        cfg.scheduler.refresh_every = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = TrainerConfig::default();
        cfg.trade.max_orders = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = TrainerConfig::default();
        cfg.reward.volatility_window = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = TrainerConfig::default();
        cfg.reward.transaction_cost = -0.1;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn from_file_reports_path() {
        let tmp = tempfile::TempDir::new().unwrap();
        let missing = tmp.path().join("missing.toml");
        let err = TrainerConfig::from_file(&missing).unwrap_err();
        assert!(err.to_string().contains("missing.toml"));

        let present = tmp.path().join("trainer.toml");
        std::fs::write(&present, "[trade]\nmax_orders = 4\n").unwrap();
        assert_eq!(TrainerConfig::from_file(&present).unwrap().trade.max_orders, 4);
    }
}
