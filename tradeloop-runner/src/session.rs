//! Session records and their append-only logs.
//!
//! - `improvements.log` — one human-readable line per Improvement Event
//! - `sessions.jsonl` — one JSON Session Record per line
//!
//! Both files are only ever appended to by the scheduler; `read_all` exists
//! for reporting and tests.

use std::fs::{self, OpenOptions};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const IMPROVEMENT_LOG_FILE: &str = "improvements.log";
pub const SESSION_LOG_FILE: &str = "sessions.jsonl";

/// Total reward strictly exceeded the previous high-water mark.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImprovementEvent {
    pub episode: u64,
    pub timestamp: DateTime<Utc>,
    pub improvement_pct: f64,
    pub total_reward: f64,
}

impl ImprovementEvent {
    /// Percentage gain over `previous`, relative to `max(previous, 1.0)`.
    pub fn percentage(previous: f64, total: f64) -> f64 {
        (total - previous) / previous.max(1.0) * 100.0
    }

    /// `YYYY-mm-dd HH:MM:SS - Episode N: Improvement of X.XX% (Total Reward: Y.YY)`
    pub fn log_line(&self) -> String {
        format!(
            "{} - Episode {}: Improvement of {:.2}% (Total Reward: {:.2})",
            self.timestamp.format("%Y-%m-%d %H:%M:%S"),
            self.episode,
            self.improvement_pct,
            self.total_reward,
        )
    }
}

/// How a session's running phase ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminalState {
    Completed,
    HaltedByTimeLimit,
    Failed,
    Interrupted,
}

impl std::fmt::Display for TerminalState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TerminalState::Completed => "completed",
            TerminalState::HaltedByTimeLimit => "halted_by_time_limit",
            TerminalState::Failed => "failed",
            TerminalState::Interrupted => "interrupted",
        };
        f.write_str(s)
    }
}

/// One training run, opened on start and closed by finalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub start_reward: f64,
    pub end_reward: f64,
    pub duration_secs: f64,
    pub episodes: u64,
    pub terminal_state: Option<TerminalState>,
    pub improvements: Vec<ImprovementEvent>,
    pub refresh_attempts: u64,
    pub refresh_failures: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dataset_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SessionRecord {
    pub fn open(start_time: DateTime<Utc>, start_reward: f64) -> Self {
        Self {
            start_time,
            end_time: None,
            start_reward,
            end_reward: start_reward,
            duration_secs: 0.0,
            episodes: 0,
            terminal_state: None,
            improvements: Vec::new(),
            refresh_attempts: 0,
            refresh_failures: 0,
            dataset_hash: None,
            error: None,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.end_time.is_some()
    }

    pub fn close(&mut self, end_time: DateTime<Utc>, end_reward: f64, state: TerminalState) {
        self.end_time = Some(end_time);
        self.end_reward = end_reward;
        self.terminal_state = Some(state);
        self.duration_secs = (end_time - self.start_time)
            .to_std()
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0);
    }
}

/// Append-only text log of Improvement Events.
#[derive(Debug, Clone)]
pub struct ImprovementLog {
    path: PathBuf,
}

impl ImprovementLog {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join(IMPROVEMENT_LOG_FILE))
    }

    pub fn append(&self, event: &ImprovementEvent) -> io::Result<()> {
        let mut file = open_append(&self.path)?;
        writeln!(file, "{}", event.log_line())?;
        file.flush()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Append-only JSONL log of Session Records.
#[derive(Debug, Clone)]
pub struct SessionLog {
    path: PathBuf,
}

impl SessionLog {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join(SESSION_LOG_FILE))
    }

    pub fn append(&self, record: &SessionRecord) -> io::Result<()> {
        let json = serde_json::to_string(record)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        let mut file = open_append(&self.path)?;
        writeln!(file, "{json}")?;
        file.flush()
    }

    /// Read every record; malformed lines are skipped.
    pub fn read_all(&self) -> io::Result<Vec<SessionRecord>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let reader = io::BufReader::new(fs::File::open(&self.path)?);
        let mut records = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            if let Ok(record) = serde_json::from_str::<SessionRecord>(&line) {
                records.push(record);
            }
        }
        Ok(records)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn open_append(path: &Path) -> io::Result<fs::File> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    OpenOptions::new().create(true).append(true).open(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn event(episode: u64, pct: f64, total: f64) -> ImprovementEvent {
        ImprovementEvent {
            episode,
            timestamp: Utc.with_ymd_and_hms(2025, 2, 3, 14, 5, 9).unwrap(),
            improvement_pct: pct,
            total_reward: total,
        }
    }

    #[test]
    fn percentage_uses_unit_floor() {
        // previous below 1.0 → divide by 1.0
        assert_eq!(ImprovementEvent::percentage(0.0, 2.5), 250.0);
        assert_eq!(ImprovementEvent::percentage(-3.0, -1.0), 200.0);
        assert_eq!(ImprovementEvent::percentage(4.0, 5.0), 25.0);
    }

    #[test]
    fn log_line_format() {
        assert_eq!(
            event(7, 12.3456, 42.0).log_line(),
            "2025-02-03 14:05:09 - Episode 7: Improvement of 12.35% (Total Reward: 42.00)"
        );
    }

    #[test]
    fn improvement_log_appends_lines() {
        let tmp = TempDir::new().unwrap();
        let log = ImprovementLog::in_dir(&tmp.path().join("nested"));
        log.append(&event(1, 100.0, 1.0)).unwrap();
        log.append(&event(2, 50.0, 1.5)).unwrap();

        let text = fs::read_to_string(log.path()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[1].contains("Episode 2"));
    }

    #[test]
    fn close_sets_duration_and_state() {
        let start = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let mut record = SessionRecord::open(start, 0.0);
        assert!(!record.is_closed());

        record.close(
            start + chrono::Duration::seconds(90),
            12.5,
            TerminalState::HaltedByTimeLimit,
        );
        assert!(record.is_closed());
        assert_eq!(record.duration_secs, 90.0);
        assert_eq!(record.end_reward, 12.5);
        assert_eq!(record.terminal_state, Some(TerminalState::HaltedByTimeLimit));
    }

    #[test]
    fn session_log_appends_and_reads_back() {
        let tmp = TempDir::new().unwrap();
        let log = SessionLog::in_dir(tmp.path());
        assert!(log.read_all().unwrap().is_empty());

        let start = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        for i in 0..3 {
            let mut record = SessionRecord::open(start, 0.0);
            record.episodes = i;
            record.improvements.push(event(i, 10.0, i as f64));
            record.close(start, i as f64, TerminalState::Completed);
            log.append(&record).unwrap();
        }
        fs::OpenOptions::new()
            .append(true)
            .open(log.path())
            .and_then(|mut f| writeln!(f, "not json"))
            .unwrap();

        let records = log.read_all().unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[2].episodes, 2);
        assert_eq!(records[2].terminal_state, Some(TerminalState::Completed));
    }

    #[test]
    fn terminal_state_serialises_snake_case() {
        let json = serde_json::to_string(&TerminalState::HaltedByTimeLimit).unwrap();
        assert_eq!(json, "\"halted_by_time_limit\"");
        assert_eq!(TerminalState::Interrupted.to_string(), "interrupted");
    }
}
