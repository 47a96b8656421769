//! Import run log: persisted progress and outcome of one import invocation

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::util::truncate_str;

/// Lifecycle state of a run log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    Draft,
    Running,
    Done,
    Failed,
}

impl RunState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Running => "running",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-entity counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityCounts {
    /// Rows that referenced an entity of this kind
    pub processed: u64,
    /// Entities created in the store
    pub created: u64,
    /// Existing entities found in the store and refreshed
    pub updated: u64,
}

impl EntityCounts {
    pub fn merge(&mut self, other: &EntityCounts) {
        self.processed += other.processed;
        self.created += other.created;
        self.updated += other.updated;
    }

    /// Distinct entities touched by the run
    pub fn total(&self) -> u64 {
        self.created + self.updated
    }
}

/// One record per import invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportRunLog {
    pub id: u64,
    /// Target period of the run (`YYYYMMDD`)
    pub name: String,
    pub start_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
    pub state: RunState,
    pub rows: u64,
    /// Number of delimited members in the archive
    pub file_count: u64,
    /// Members processed so far
    pub files: u64,
    pub towns: EntityCounts,
    pub streets: EntityCounts,
    pub numbers: EntityCounts,
    pub warnings: u64,
    pub error_message: Option<String>,
}

impl ImportRunLog {
    /// Create a log in `draft` state
    pub fn new(id: u64, name: impl Into<String>, start_date: DateTime<Utc>) -> Self {
        Self {
            id,
            name: name.into(),
            start_date,
            end_date: None,
            state: RunState::Draft,
            rows: 0,
            file_count: 0,
            files: 0,
            towns: EntityCounts::default(),
            streets: EntityCounts::default(),
            numbers: EntityCounts::default(),
            warnings: 0,
            error_message: None,
        }
    }

    /// Create a log already in `running` state
    pub fn started(id: u64, name: impl Into<String>, start_date: DateTime<Utc>) -> Self {
        let mut log = Self::new(id, name, start_date);
        log.state = RunState::Running;
        log
    }

    pub fn is_running(&self) -> bool {
        self.state == RunState::Running
    }

    /// Record the number of members to process
    pub fn set_file_count(&mut self, count: u64) {
        self.file_count = count;
        self.files = self.files.min(count);
    }

    /// Record one more processed member, never exceeding `file_count`
    pub fn file_done(&mut self) {
        if self.files < self.file_count {
            self.files += 1;
        }
    }

    /// Transition to `done`
    pub fn mark_done(&mut self, now: DateTime<Utc>) {
        self.state = RunState::Done;
        self.end_date = Some(now);
    }

    /// Transition to `failed`, keeping at most `max_len` bytes of the message
    pub fn mark_failed(&mut self, now: DateTime<Utc>, message: &str, max_len: usize) {
        self.state = RunState::Failed;
        self.end_date = Some(now);
        self.error_message = Some(truncate_str(message, max_len));
    }

    /// Run duration in hours; zero until the run has ended
    pub fn duration_hours(&self) -> f64 {
        match self.end_date {
            Some(end) => (end - self.start_date).num_milliseconds() as f64 / 3_600_000.0,
            None => 0.0,
        }
    }

    /// Completed fraction in percent
    pub fn percent(&self) -> f64 {
        if self.file_count > 0 {
            self.files as f64 / self.file_count as f64 * 100.0
        } else {
            0.0
        }
    }

    /// Human readable progress, e.g. `"3 / 14 (21%)"`
    pub fn progress(&self) -> String {
        format!("{} / {} ({:.0}%)", self.files, self.file_count, self.percent())
    }

    /// Estimated time remaining, linearly extrapolated from elapsed time
    pub fn eta(&self, now: DateTime<Utc>) -> String {
        if !self.is_running() || self.end_date.is_some() {
            return String::new();
        }
        if self.file_count == 0 || self.files == 0 || self.files > self.file_count {
            return "Estimating...".to_string();
        }

        let elapsed_hours = (now - self.start_date).num_milliseconds() as f64 / 3_600_000.0;
        let fraction = self.files as f64 / self.file_count as f64;
        let remaining = elapsed_hours / fraction - elapsed_hours;
        if remaining <= 0.0 {
            return "About to complete".to_string();
        }

        let hours = remaining.trunc() as u64;
        let minutes = ((remaining - remaining.trunc()) * 60.0) as u64;
        format!("{}h {}m", hours, minutes)
    }
}
