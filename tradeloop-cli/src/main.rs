//! Tradeloop CLI — training, trade replay and oracle management commands.
//!
//! Commands:
//! - `train` — run one time-boxed training session over historical bars
//! - `trade` — replay bars through the support/resistance signal and trade book
//! - `oracle-status` — report whether the configured model is loaded
//! - `synth` — write a synthetic bar CSV

use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tokio::runtime::Runtime;
use tracing::info;

use tradeloop_core::oracle::{DisabledOracle, PolicyOracle};
use tradeloop_core::reward::RewardModel;
use tradeloop_core::signals::SignalParams;
use tradeloop_runner::{
    generate_synthetic_bars, init_tracing, load_bars_csv, load_synthetic, replay_trades,
    watch_interrupts, write_bars_csv, EpisodeScheduler, ImprovementLog, InterruptWatch, LoadedData,
    ProcessOracle, ReplaySummary, SessionLog, SessionRecord, TrainerConfig,
};

#[derive(Parser)]
#[command(
    name = "tradeloop",
    about = "Tradeloop — episodic trading decision engine"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one training session until the time limit or the pass limit.
    ///
    /// Ctrl-C stops after the current episode and still writes the session
    /// record; an episode inside a model refresh can take up to the refresh
    /// timeout. A second Ctrl-C exits immediately without finalizing.
    Train {
        /// Path to a TOML config file.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Historical bar CSV. Overrides the config and HISTORICAL_DATA_PATH.
        #[arg(long)]
        data: Option<PathBuf>,

        /// Train on this many synthetic bars instead of a CSV.
        #[arg(long, conflicts_with = "data")]
        synthetic: Option<usize>,

        /// Seed for synthetic bars.
        #[arg(long, default_value_t = 42)]
        seed: u64,

        /// Wall-clock budget in seconds.
        #[arg(long)]
        time_limit: Option<f64>,

        /// Pause between episodes in seconds.
        #[arg(long)]
        step_interval: Option<f64>,

        /// Stop after this many passes over the data.
        #[arg(long)]
        max_passes: Option<u64>,

        /// Decide with the RSI fallback only.
        #[arg(long, default_value_t = false)]
        no_oracle: bool,

        /// Directory for tracing, improvement and session logs.
        #[arg(long)]
        log_dir: Option<PathBuf>,
    },
    /// Replay bars through the support/resistance signal and the trade book.
    Trade {
        /// Historical bar CSV.
        #[arg(long)]
        data: PathBuf,

        /// Maximum simultaneously open trades.
        #[arg(long)]
        max_orders: Option<usize>,

        /// Path to a TOML config file.
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Report whether the configured model is loaded.
    OracleStatus {
        /// Path to a TOML config file.
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Write synthetic minute bars to a CSV file.
    Synth {
        /// Number of bars.
        #[arg(long, default_value_t = 1000)]
        bars: usize,

        /// Output CSV path.
        #[arg(long)]
        out: PathBuf,

        /// Generator seed.
        #[arg(long, default_value_t = 42)]
        seed: u64,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Train {
            config,
            data,
            synthetic,
            seed,
            time_limit,
            step_interval,
            max_passes,
            no_oracle,
            log_dir,
        } => {
            let mut cfg = load_config(config.as_deref())?;
            if let Some(path) = data {
                cfg.data.path = Some(path);
            }
            if let Some(secs) = time_limit {
                cfg.scheduler.time_limit_secs = secs;
            }
            if let Some(secs) = step_interval {
                cfg.scheduler.step_interval_secs = secs;
            }
            if max_passes.is_some() {
                cfg.scheduler.max_passes = max_passes;
            }
            if no_oracle {
                cfg.oracle.enabled = false;
            }
            if let Some(dir) = log_dir {
                cfg.logging.log_dir = Some(dir);
            }
            cfg.validate()?;
            run_train(cfg, synthetic, seed)
        }
        Commands::Trade {
            data,
            max_orders,
            config,
        } => {
            let mut cfg = load_config(config.as_deref())?;
            if let Some(max) = max_orders {
                cfg.trade.max_orders = max;
            }
            cfg.validate()?;
            run_trade(&data, cfg.trade.max_orders)
        }
        Commands::OracleStatus { config } => {
            let cfg = load_config(config.as_deref())?;
            run_oracle_status(cfg)
        }
        Commands::Synth { bars, out, seed } => run_synth(bars, &out, seed),
    }
}

/// File (if any), then environment overrides.
fn load_config(path: Option<&Path>) -> Result<TrainerConfig> {
    let mut cfg = match path {
        Some(p) => TrainerConfig::from_file(p)?,
        None => TrainerConfig::default(),
    };
    cfg.apply_env_overrides()?;
    Ok(cfg)
}

fn subprocess_runtime() -> Result<Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .enable_all()
        .build()
        .context("failed to start async runtime")
}

fn run_train(cfg: TrainerConfig, synthetic: Option<usize>, seed: u64) -> Result<()> {
    let log_dir = cfg.log_dir();
    let _guard = init_tracing(&log_dir)?;

    let data = match (synthetic, cfg.data.path.as_deref()) {
        (Some(n), _) => load_synthetic(n, seed),
        (None, Some(path)) => load_bars_csv(path)?,
        (None, None) => bail!("no historical data: pass --data, --synthetic or set HISTORICAL_DATA_PATH"),
    };
    report_load(&data);

    let runtime = subprocess_runtime()?;
    let stop = Arc::new(AtomicBool::new(false));
    {
        let stop = Arc::clone(&stop);
        runtime.spawn(async move {
            if watch_interrupts(stop, tokio::signal::ctrl_c).await == InterruptWatch::Forced {
                std::process::exit(130);
            }
        });
    }

    let oracle: Box<dyn PolicyOracle + Send> = if cfg.oracle.enabled {
        Box::new(ProcessOracle::new(
            cfg.oracle.clone(),
            log_dir.clone(),
            runtime.handle().clone(),
        ))
    } else {
        info!("oracle disabled, using RSI fallback");
        Box::new(DisabledOracle)
    };

    let mut scheduler = EpisodeScheduler::new(
        cfg.scheduler.clone(),
        data.bars,
        RewardModel::new(cfg.reward.clone()),
        oracle,
    )
    .with_stop_flag(stop)
    .with_improvement_log(ImprovementLog::in_dir(&log_dir))
    .with_session_log(SessionLog::in_dir(&log_dir))
    .with_dataset_hash(data.dataset_hash);

    let record = scheduler.run()?;
    print_session(&record, &log_dir);
    println!();
    println!("{}", serde_json::to_string_pretty(&record)?);

    if let Some(e) = scheduler.last_error() {
        bail!("training session failed: {e}");
    }
    Ok(())
}

fn run_trade(data: &Path, max_orders: usize) -> Result<()> {
    let loaded = load_bars_csv(data)?;
    report_load(&loaded);
    let summary = replay_trades(&loaded.bars, &SignalParams::default(), max_orders);
    print_replay(&summary, max_orders);
    Ok(())
}

fn run_oracle_status(cfg: TrainerConfig) -> Result<()> {
    if !cfg.oracle.enabled {
        println!("Oracle disabled in config.");
        return Ok(());
    }
    let runtime = subprocess_runtime()?;
    let log_dir = cfg.log_dir();
    let oracle = ProcessOracle::new(cfg.oracle, log_dir, runtime.handle().clone());
    let config = oracle.config();
    match oracle.probe() {
        Ok(true) => println!("Model {} is loaded ({}).", config.model, config.program),
        Ok(false) => println!("Model {} is not loaded.", config.model),
        Err(e) => bail!("status probe failed: {e}"),
    }
    Ok(())
}

fn run_synth(n: usize, out: &Path, seed: u64) -> Result<()> {
    if n == 0 {
        bail!("--bars must be at least 1");
    }
    let bars = generate_synthetic_bars(n, seed);
    write_bars_csv(out, &bars)?;
    println!("Wrote {n} bars to {}", out.display());
    Ok(())
}

fn report_load(data: &LoadedData) {
    if data.synthetic {
        println!("Data:           {} synthetic bars", data.bars.len());
    } else {
        println!(
            "Data:           {} bars ({} rows, {} invalid, {} duplicate)",
            data.bars.len(),
            data.rows_read,
            data.dropped_invalid,
            data.dropped_duplicates
        );
    }
    println!("Dataset hash:   {}", &data.dataset_hash[..16.min(data.dataset_hash.len())]);
}

fn print_session(record: &SessionRecord, log_dir: &Path) {
    println!();
    println!("=== Training Session ===");
    if let Some(state) = record.terminal_state {
        println!("State:          {state}");
    }
    println!("Episodes:       {}", record.episodes);
    println!("Duration:       {:.1}s", record.duration_secs);
    println!(
        "Reward:         {:.2} -> {:.2}",
        record.start_reward, record.end_reward
    );
    println!("Improvements:   {}", record.improvements.len());
    println!(
        "Refreshes:      {} ({} failed)",
        record.refresh_attempts, record.refresh_failures
    );
    if let Some(err) = &record.error {
        println!("Error:          {err}");
    }
    println!("Logs:           {}", log_dir.display());
}

fn print_replay(summary: &ReplaySummary, max_orders: usize) {
    println!();
    println!("=== Trade Replay ===");
    println!("Bars:           {}", summary.bars);
    println!(
        "Signals:        {} buy / {} sell / {} hold",
        summary.buy_signals, summary.sell_signals, summary.hold_signals
    );
    println!("Entries:        {}", summary.entries);
    println!("Reversals:      {}", summary.reversals);
    println!(
        "Rejected:       {} at max orders ({max_orders}), {} price mismatch",
        summary.rejected_max_orders, summary.rejected_price_mismatch
    );
    match summary.final_state {
        Some(state) => println!("Final book:     {state}"),
        None => println!("Final book:     flat"),
    }
}
