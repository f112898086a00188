//! Episode Scheduler — the time-boxed training loop.
//!
//! ```text
//! Idle → Running → Completed | HaltedByTimeLimit | Failed | Interrupted → Finalized
//! ```
//!
//! Each bar is one episode: select an action, score it, accumulate the
//! reward, refresh the model every `refresh_every` episodes and record an
//! Improvement Event whenever the running total beats its high-water mark.
//! History is consumed as a cyclic stream until the wall-clock limit, the
//! optional pass limit or the stop flag ends the run. Finalization always
//! runs, including after a panic inside the loop.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use tradeloop_core::domain::Bar;
use tradeloop_core::oracle::{OracleError, PolicyOracle, RefreshPayload};
use tradeloop_core::policy::ActionPolicy;
use tradeloop_core::reward::RewardModel;
use tradeloop_core::state::StateExtractor;

use crate::session::{ImprovementEvent, ImprovementLog, SessionLog, SessionRecord, TerminalState};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Wall-clock budget for one session.
    pub time_limit_secs: f64,
    /// Pause after every episode.
    pub step_interval_secs: f64,
    /// Model refresh cadence in episodes.
    pub refresh_every: u64,
    /// Progress log cadence in episodes.
    pub progress_every: u64,
    /// Stop after this many full passes; unset cycles until the time limit.
    pub max_passes: Option<u64>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            time_limit_secs: 1800.0,
            step_interval_secs: 1.0,
            refresh_every: 5,
            progress_every: 10,
            max_passes: None,
        }
    }
}

impl SchedulerConfig {
    pub fn time_limit(&self) -> Duration {
        Duration::try_from_secs_f64(self.time_limit_secs).unwrap_or(Duration::ZERO)
    }

    pub fn step_interval(&self) -> Duration {
        Duration::try_from_secs_f64(self.step_interval_secs).unwrap_or(Duration::ZERO)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulerState {
    Idle,
    Running,
    Completed,
    HaltedByTimeLimit,
    Failed,
    Interrupted,
    Finalized,
}

impl From<TerminalState> for SchedulerState {
    fn from(t: TerminalState) -> Self {
        match t {
            TerminalState::Completed => SchedulerState::Completed,
            TerminalState::HaltedByTimeLimit => SchedulerState::HaltedByTimeLimit,
            TerminalState::Failed => SchedulerState::Failed,
            TerminalState::Interrupted => SchedulerState::Interrupted,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchedulerError {
    #[error("historical data is empty")]
    EmptyHistory,

    #[error("episode loop panicked: {0}")]
    Panicked(String),

    #[error("scheduler already finalized")]
    AlreadyFinalized,
}

pub struct EpisodeScheduler<O> {
    config: SchedulerConfig,
    extractor: StateExtractor,
    policy: ActionPolicy,
    reward_model: RewardModel,
    oracle: O,
    state: SchedulerState,
    episodes: u64,
    total_reward: f64,
    high_water: f64,
    stop: Arc<AtomicBool>,
    improvement_log: Option<ImprovementLog>,
    session_log: Option<SessionLog>,
    dataset_hash: Option<String>,
    sessions: Vec<SessionRecord>,
    last_error: Option<SchedulerError>,
}

impl<O: PolicyOracle> EpisodeScheduler<O> {
    pub fn new(
        config: SchedulerConfig,
        bars: Vec<Bar>,
        reward_model: RewardModel,
        oracle: O,
    ) -> Self {
        Self {
            config,
            extractor: StateExtractor::new(bars),
            policy: ActionPolicy::default(),
            reward_model,
            oracle,
            state: SchedulerState::Idle,
            episodes: 0,
            total_reward: 0.0,
            high_water: 0.0,
            stop: Arc::new(AtomicBool::new(false)),
            improvement_log: None,
            session_log: None,
            dataset_hash: None,
            sessions: Vec::new(),
            last_error: None,
        }
    }

    pub fn with_policy(mut self, policy: ActionPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Share a flag that ends the run as `Interrupted` once set.
    pub fn with_stop_flag(mut self, stop: Arc<AtomicBool>) -> Self {
        self.stop = stop;
        self
    }

    pub fn with_improvement_log(mut self, log: ImprovementLog) -> Self {
        self.improvement_log = Some(log);
        self
    }

    pub fn with_session_log(mut self, log: SessionLog) -> Self {
        self.session_log = Some(log);
        self
    }

    pub fn with_dataset_hash(mut self, hash: impl Into<String>) -> Self {
        self.dataset_hash = Some(hash.into());
        self
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn episodes(&self) -> u64 {
        self.episodes
    }

    pub fn total_reward(&self) -> f64 {
        self.total_reward
    }

    pub fn sessions(&self) -> &[SessionRecord] {
        &self.sessions
    }

    pub fn last_error(&self) -> Option<&SchedulerError> {
        self.last_error.as_ref()
    }

    pub fn oracle(&self) -> &O {
        &self.oracle
    }

    /// Run one session to a terminal state and finalize it.
    ///
    /// The returned record is closed whatever the outcome; loop failures are
    /// reported through its `terminal_state`/`error` and [`Self::last_error`].
    pub fn run(&mut self) -> Result<SessionRecord, SchedulerError> {
        if self.state != SchedulerState::Idle {
            return Err(SchedulerError::AlreadyFinalized);
        }

        let started = Instant::now();
        let mut record = SessionRecord::open(Utc::now(), self.total_reward);
        self.state = SchedulerState::Running;
        info!(
            bars = self.extractor.len(),
            time_limit_secs = self.config.time_limit_secs,
            transaction_cost = self.reward_model.config().transaction_cost,
            risk_adjustment_factor = self.reward_model.config().risk_adjustment_factor,
            "training session started"
        );

        let outcome = catch_unwind(AssertUnwindSafe(|| self.run_loop(&mut record, started)));
        let terminal = match outcome {
            Ok(Ok(terminal)) => terminal,
            Ok(Err(e)) => self.fail(&mut record, e),
            Err(payload) => {
                let e = SchedulerError::Panicked(panic_message(payload.as_ref()));
                self.fail(&mut record, e)
            }
        };
        self.state = terminal.into();

        Ok(self.finalize(record, terminal))
    }

    fn fail(&mut self, record: &mut SessionRecord, e: SchedulerError) -> TerminalState {
        error!(error = %e, "training session failed");
        record.error = Some(e.to_string());
        self.last_error = Some(e);
        TerminalState::Failed
    }

    fn run_loop(
        &mut self,
        record: &mut SessionRecord,
        started: Instant,
    ) -> Result<TerminalState, SchedulerError> {
        if self.extractor.is_empty() {
            return Err(SchedulerError::EmptyHistory);
        }

        let time_limit = self.config.time_limit();
        let step_interval = self.config.step_interval();
        let mut passes = 0u64;

        loop {
            for bar_index in 0..self.extractor.len() {
                if self.stop.load(Ordering::SeqCst) {
                    info!(episodes = self.episodes, "stop requested");
                    return Ok(TerminalState::Interrupted);
                }
                if started.elapsed() >= time_limit {
                    warn!(
                        episodes = self.episodes,
                        total_reward = self.total_reward,
                        "time limit reached"
                    );
                    return Ok(TerminalState::HaltedByTimeLimit);
                }

                self.step(bar_index, record, started);

                if !step_interval.is_zero() {
                    std::thread::sleep(step_interval);
                }
            }

            passes += 1;
            info!(
                passes,
                episodes = self.episodes,
                total_reward = self.total_reward,
                "data pass complete"
            );
            if self.config.max_passes.is_some_and(|max| passes >= max) {
                return Ok(TerminalState::Completed);
            }
        }
    }

    fn step(&mut self, bar_index: usize, record: &mut SessionRecord, started: Instant) {
        self.episodes += 1;
        let episode = self.episodes;

        // The policy walks history by episode count; the reward is scored on
        // the iterated bar with the same snapshot as both current and next.
        let action = self
            .policy
            .select_action(&self.extractor, episode as usize, &mut self.oracle);
        let reward = match self.extractor.extract(bar_index) {
            Some(state) => self.reward_model.reward(
                action,
                &state,
                &state,
                self.extractor.closes_through(bar_index),
            ),
            None => 0.0,
        };
        let reward = finite_or_zero(reward);
        self.total_reward = finite_or_zero(self.total_reward + reward);
        debug!(episode, %action, reward, total_reward = self.total_reward, "episode");

        if self.config.refresh_every > 0 && episode % self.config.refresh_every == 0 {
            self.refresh(episode, record);
        }

        if self.total_reward > self.high_water {
            self.record_improvement(episode, record);
        }

        if self.config.progress_every > 0 && episode % self.config.progress_every == 0 {
            debug!(
                episode,
                total_reward = self.total_reward,
                elapsed_secs = started.elapsed().as_secs_f64(),
                "progress"
            );
        }
    }

    fn refresh(&mut self, episode: u64, record: &mut SessionRecord) {
        let payload = RefreshPayload::new(episode, self.total_reward);
        match self.oracle.trigger_refresh(&payload) {
            Ok(()) => {
                record.refresh_attempts += 1;
                info!(episode, "model refresh succeeded");
            }
            Err(OracleError::Disabled) => {
                debug!(episode, "model refresh skipped, oracle disabled");
            }
            Err(e) => {
                record.refresh_attempts += 1;
                record.refresh_failures += 1;
                warn!(episode, error = %e, "model refresh failed");
            }
        }
    }

    fn record_improvement(&mut self, episode: u64, record: &mut SessionRecord) {
        let event = ImprovementEvent {
            episode,
            timestamp: Utc::now(),
            improvement_pct: ImprovementEvent::percentage(self.high_water, self.total_reward),
            total_reward: self.total_reward,
        };
        info!(
            episode,
            improvement_pct = event.improvement_pct,
            total_reward = event.total_reward,
            "improvement"
        );
        if let Some(log) = &self.improvement_log {
            if let Err(e) = log.append(&event) {
                warn!(path = %log.path().display(), error = %e, "failed to write improvement log");
            }
        }
        record.improvements.push(event);
        self.high_water = self.total_reward;
    }

    fn finalize(&mut self, mut record: SessionRecord, terminal: TerminalState) -> SessionRecord {
        record.episodes = self.episodes;
        record.dataset_hash = self.dataset_hash.clone();
        record.close(Utc::now(), self.total_reward, terminal);

        if let Some(log) = &self.session_log {
            if let Err(e) = log.append(&record) {
                warn!(path = %log.path().display(), error = %e, "failed to write session log");
            }
        }
        info!(
            state = %terminal,
            episodes = record.episodes,
            duration_secs = record.duration_secs,
            start_reward = record.start_reward,
            end_reward = record.end_reward,
            improvements = record.improvements.len(),
            "training session finalized"
        );

        self.state = SchedulerState::Finalized;
        self.sessions.push(record.clone());
        record
    }
}

fn finite_or_zero(x: f64) -> f64 {
    if x.is_finite() {
        x
    } else {
        0.0
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
