//! Pipeline run records
//!
//! Structure of one pipeline execution: overall status, per-stage progress
//! and the log collected along the way.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Status of a whole run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    Running,
    Succeeded,
    Failed,
}

/// Status of one stage within a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StageStatus {
    /// Not reached because an earlier stage failed
    Skipped,
    Succeeded,
    Failed,
}

impl fmt::Display for StageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StageStatus::Skipped => write!(f, "Skipped"),
            StageStatus::Succeeded => write!(f, "Succeeded"),
            StageStatus::Failed => write!(f, "Failed"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageRecord {
    pub name: String,
    pub status: StageStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
}

impl StageRecord {
    pub fn skipped(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: StageStatus::Skipped,
            started_at: None,
            completed_at: None,
            error_message: None,
        }
    }
}

/// One execution of a pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    pub id: Uuid,
    pub pipeline_name: String,
    pub status: RunStatus,
    /// Revision of the source snapshot, once fetched
    pub source_revision: Option<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub stages: Vec<StageRecord>,
    pub logs: Vec<LogEntry>,
}

impl RunRecord {
    pub fn start(pipeline_name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            pipeline_name: pipeline_name.into(),
            status: RunStatus::Running,
            source_revision: None,
            started_at: Utc::now(),
            completed_at: None,
            stages: Vec::new(),
            logs: Vec::new(),
        }
    }

    pub fn succeeded(&self) -> bool {
        self.status == RunStatus::Succeeded
    }

    /// First stage that failed, if any
    pub fn failed_stage(&self) -> Option<&StageRecord> {
        self.stages.iter().find(|s| s.status == StageStatus::Failed)
    }
}

/// A log entry from a pipeline run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}
