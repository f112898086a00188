//! Tradeloop Runner — training orchestration around `tradeloop-core`.
//!
//! This crate provides:
//! - Trainer configuration (TOML file + environment overrides)
//! - Historical CSV loading with validation, and synthetic data
//! - The process-backed inference oracle
//! - The Episode Scheduler with improvement and session logs
//! - Trade replay over the support/resistance signal
//! - Tracing initialisation
//! - Two-stage Ctrl-C handling

pub mod config;
pub mod data_loader;
pub mod interrupt;
pub mod logging;
pub mod oracle;
pub mod replay;
pub mod scheduler;
pub mod session;

pub use config::{ConfigError, TrainerConfig};
pub use data_loader::{
    dataset_hash, generate_synthetic_bars, load_bars_csv, load_synthetic, write_bars_csv,
    LoadError, LoadedData,
};
pub use interrupt::{watch_interrupts, InterruptWatch};
pub use logging::{default_log_dir, init_tracing, LoggingError};
pub use oracle::{OracleConfig, ProcessOracle};
pub use replay::{replay_trades, ReplaySummary};
pub use scheduler::{EpisodeScheduler, SchedulerConfig, SchedulerError, SchedulerState};
pub use session::{
    ImprovementEvent, ImprovementLog, SessionLog, SessionRecord, TerminalState,
};
