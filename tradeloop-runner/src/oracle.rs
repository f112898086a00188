//! Process-backed policy oracle.
//!
//! Talks to a local model runner CLI (`ollama` by default):
//! - `<program> ps` lists loaded models (status probe)
//! - `<program> run <model>` loads a model, or with a prompt argument
//!   answers an action query
//! - `<program> run <model>` with the update payload on stdin performs a
//!   model refresh, its output captured in `training_<timestamp>.log`
//!
//! Every call is bounded by a timeout. Children are spawned with
//! `kill_on_drop`, and refresh children are additionally shut down through
//! [`ChildGuard`] (SIGTERM, grace period, then kill) on every exit path.

use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use std::time::Duration;

use chrono::Local;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::process::{Child, Command};
use tokio::runtime::Handle;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use tradeloop_core::domain::Action;
use tradeloop_core::oracle::{OracleError, PolicyOracle, RefreshPayload};
use tradeloop_core::state::MarketState;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OracleConfig {
    pub enabled: bool,
    pub program: String,
    pub model: String,
    pub query_timeout_secs: u64,
    pub probe_timeout_secs: u64,
    pub load_timeout_secs: u64,
    pub refresh_timeout_secs: u64,
    pub terminate_timeout_secs: u64,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            program: "ollama".into(),
            model: "deepseek-r1:1.5b".into(),
            query_timeout_secs: 15,
            probe_timeout_secs: 30,
            load_timeout_secs: 120,
            refresh_timeout_secs: 480,
            terminate_timeout_secs: 5,
        }
    }
}

pub struct ProcessOracle {
    config: OracleConfig,
    log_dir: PathBuf,
    runtime: Handle,
}

impl ProcessOracle {
    /// `runtime` drives the async subprocess calls; the oracle itself must be
    /// used from a thread outside that runtime.
    pub fn new(config: OracleConfig, log_dir: PathBuf, runtime: Handle) -> Self {
        Self {
            config,
            log_dir,
            runtime,
        }
    }

    pub fn config(&self) -> &OracleConfig {
        &self.config
    }

    /// Whether the configured model is currently loaded.
    pub fn probe(&self) -> Result<bool, OracleError> {
        self.runtime.block_on(self.model_loaded())
    }

    async fn model_loaded(&self) -> Result<bool, OracleError> {
        let mut cmd = Command::new(&self.config.program);
        cmd.arg("ps");
        let output = run_bounded(cmd, secs(self.config.probe_timeout_secs), "status probe").await?;
        let listing = String::from_utf8_lossy(&output.stdout);
        Ok(listing.contains(&self.config.model))
    }

    async fn load_model(&self) -> Result<(), OracleError> {
        info!(model = %self.config.model, "loading model");
        let mut cmd = Command::new(&self.config.program);
        cmd.arg("run").arg(&self.config.model);
        run_bounded(cmd, secs(self.config.load_timeout_secs), "model load").await?;
        Ok(())
    }

    /// Load the model unless the status probe lists it. A failed probe
    /// fails the refresh.
    async fn ensure_loaded(&self) -> Result<(), OracleError> {
        if self.model_loaded().await? {
            return Ok(());
        }
        self.load_model().await
    }

    async fn query(&self, state: &MarketState) -> Result<Action, OracleError> {
        let json = serde_json::to_string(state).map_err(std::io::Error::from)?;
        let mut cmd = Command::new(&self.config.program);
        cmd.arg("run")
            .arg(&self.config.model)
            .arg(format!("ACTION_QUERY: {json}"));
        let output = run_bounded(cmd, secs(self.config.query_timeout_secs), "action query").await?;
        let answer = String::from_utf8_lossy(&output.stdout);
        answer
            .parse::<Action>()
            .map_err(|_| OracleError::InvalidResponse(answer.trim().to_string()))
    }

    async fn refresh(&self, payload: &RefreshPayload) -> Result<(), OracleError> {
        self.ensure_loaded().await?;

        let log_path = training_log_path(&self.log_dir);
        std::fs::create_dir_all(&self.log_dir)?;
        let stdout_log = std::fs::File::create(&log_path)?;
        let stderr_log = stdout_log.try_clone()?;
        debug!(path = %log_path.display(), "refresh output");

        let child = Command::new(&self.config.program)
            .arg("run")
            .arg(&self.config.model)
            .stdin(Stdio::piped())
            .stdout(Stdio::from(stdout_log))
            .stderr(Stdio::from(stderr_log))
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| OracleError::Spawn(e.to_string()))?;

        let mut guard = ChildGuard::new(child, secs(self.config.terminate_timeout_secs));
        let wait_for = secs(self.config.refresh_timeout_secs);
        let result: Result<(), OracleError> = async {
            let mut stdin = guard
                .child
                .stdin
                .take()
                .ok_or_else(|| OracleError::ChannelWrite("stdin not captured".into()))?;
            stdin
                .write_all(payload.to_prompt().as_bytes())
                .await
                .map_err(|e| OracleError::ChannelWrite(e.to_string()))?;
            drop(stdin);

            match timeout(wait_for, guard.child.wait()).await {
                Err(_) => Err(OracleError::Timeout {
                    operation: "model refresh",
                    after: wait_for,
                }),
                Ok(Err(e)) => Err(OracleError::Io(e)),
                Ok(Ok(status)) if status.success() => Ok(()),
                Ok(Ok(status)) => Err(OracleError::ProcessFailure(status.to_string())),
            }
        }
        .await;

        guard.shutdown().await;
        result
    }
}

impl PolicyOracle for ProcessOracle {
    fn query_action(&mut self, state: &MarketState) -> Result<Action, OracleError> {
        if !self.config.enabled {
            return Err(OracleError::Disabled);
        }
        self.runtime.block_on(self.query(state))
    }

    fn trigger_refresh(&mut self, payload: &RefreshPayload) -> Result<(), OracleError> {
        if !self.config.enabled {
            return Err(OracleError::Disabled);
        }
        info!(episodes = payload.episodes, total_reward = payload.total_reward, "model refresh");
        self.runtime.block_on(self.refresh(payload))
    }
}

/// `training_<YYYYmmddHHMMSS>.log` under `dir`.
pub fn training_log_path(dir: &Path) -> PathBuf {
    dir.join(format!("training_{}.log", Local::now().format("%Y%m%d%H%M%S")))
}

/// Run to completion within `limit`; non-zero exit is a `ProcessFailure`.
async fn run_bounded(
    mut cmd: Command,
    limit: Duration,
    operation: &'static str,
) -> Result<Output, OracleError> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let output = timeout(limit, cmd.output())
        .await
        .map_err(|_| OracleError::Timeout {
            operation,
            after: limit,
        })?
        .map_err(|e| OracleError::Spawn(e.to_string()))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(OracleError::ProcessFailure(format!(
            "{operation}: {} {}",
            output.status,
            stderr.trim()
        )));
    }
    Ok(output)
}

fn secs(n: u64) -> Duration {
    Duration::from_secs(n)
}

/// Owns a refresh child until it has exited.
struct ChildGuard {
    child: Child,
    grace: Duration,
}

impl ChildGuard {
    fn new(child: Child, grace: Duration) -> Self {
        Self { child, grace }
    }

    /// Ask the child to stop, then force it after the grace period.
    async fn shutdown(&mut self) {
        if matches!(self.child.try_wait(), Ok(Some(_))) {
            return;
        }
        terminate(&mut self.child);
        if timeout(self.grace, self.child.wait()).await.is_err() {
            warn!(grace = ?self.grace, "child ignored termination, killing");
            if let Err(e) = self.child.kill().await {
                warn!(error = %e, "failed to kill child");
            }
        }
    }
}

#[cfg(unix)]
fn terminate(child: &mut Child) {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    if let Some(pid) = child.id() {
        if let Err(e) = kill(Pid::from_raw(pid as i32), Signal::SIGTERM) {
            debug!(pid, error = %e, "SIGTERM failed");
        }
    }
}

#[cfg(not(unix))]
fn terminate(child: &mut Child) {
    let _ = child.start_kill();
}
