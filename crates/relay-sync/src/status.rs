//! In-flight run status tracking.

use chrono::{DateTime, Utc};
use relay_connector::{ConfigurationId, RunId};
use serde::{Deserialize, Serialize};

use crate::conflict::SyncConflict;

/// Error code for failures scoped to one record/target pairing.
pub const RECORD_PROCESSING_ERROR: &str = "RECORD_PROCESSING_ERROR";
/// Error code for a failed source data fetch.
pub const FETCH_ERROR: &str = "FETCH_ERROR";

/// Lifecycle state of a sync run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    /// Created but not yet processing.
    Pending,
    /// Actively processing records.
    Running,
    /// Terminated with no failures.
    Completed,
    /// Terminated with at least one recorded failure.
    CompletedWithErrors,
    /// Source fetch failed; no records were processed to completion.
    Failed,
    /// Cancelled cooperatively between records.
    Cancelled,
}

impl RunState {
    /// Convert to string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            RunState::Pending => "pending",
            RunState::Running => "running",
            RunState::Completed => "completed",
            RunState::CompletedWithErrors => "completed_with_errors",
            RunState::Failed => "failed",
            RunState::Cancelled => "cancelled",
        }
    }

    /// Check if this is a terminal state. Terminal states trigger history
    /// persistence and removal from the active-run table.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RunState::Pending | RunState::Running)
    }
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for RunState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(RunState::Pending),
            "running" => Ok(RunState::Running),
            "completed" => Ok(RunState::Completed),
            "completed_with_errors" => Ok(RunState::CompletedWithErrors),
            "failed" => Ok(RunState::Failed),
            "cancelled" => Ok(RunState::Cancelled),
            _ => Err(format!("Unknown run state: {s}")),
        }
    }
}

/// Structured error recorded against a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunError {
    /// Classification code (e.g. `RECORD_PROCESSING_ERROR`).
    pub code: String,
    /// Human-readable message.
    pub message: String,
    /// When the error was recorded.
    pub timestamp: DateTime<Utc>,
    /// Key of the record being processed, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record_id: Option<String>,
}

impl RunError {
    /// Create a record processing error for the given record.
    pub fn record_processing(record_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: RECORD_PROCESSING_ERROR.to_string(),
            message: message.into(),
            timestamp: Utc::now(),
            record_id: Some(record_id.into()),
        }
    }

    /// Create a fetch error (run-level, no record in scope).
    pub fn fetch(message: impl Into<String>) -> Self {
        Self {
            code: FETCH_ERROR.to_string(),
            message: message.into(),
            timestamp: Utc::now(),
            record_id: None,
        }
    }
}

/// Live status of an in-flight sync run.
///
/// Owned exclusively by the run that created it; the registry holds read
/// snapshots for monitoring.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncRunStatus {
    /// Run ID.
    pub id: RunId,
    /// Configuration this run executes.
    pub configuration_id: ConfigurationId,
    /// Current lifecycle state.
    pub state: RunState,
    /// When the run started.
    pub start_time: DateTime<Utc>,
    /// Progress in percent, clamped to 0-100. Zero while the total is zero.
    pub progress: f64,
    /// Records processed so far.
    pub processed_records: usize,
    /// Total records fetched from the source.
    pub total_records: usize,
    /// Errors recorded so far, in order.
    pub errors: Vec<RunError>,
    /// Conflicts recorded so far, in order.
    pub conflicts: Vec<SyncConflict>,
}

impl SyncRunStatus {
    /// Create a new running status for a run starting now.
    #[must_use]
    pub fn new(id: RunId, configuration_id: ConfigurationId) -> Self {
        Self {
            id,
            configuration_id,
            state: RunState::Running,
            start_time: Utc::now(),
            progress: 0.0,
            processed_records: 0,
            total_records: 0,
            errors: Vec::new(),
            conflicts: Vec::new(),
        }
    }

    /// Set the total record count for progress derivation.
    pub fn set_total(&mut self, total: usize) {
        self.total_records = total;
        self.recompute_progress();
    }

    /// Record one processed record and recompute progress.
    pub fn mark_processed(&mut self) {
        self.processed_records += 1;
        self.recompute_progress();
    }

    /// Record an error against this run.
    pub fn record_error(&mut self, error: RunError) {
        self.errors.push(error);
    }

    /// Record detected conflicts against this run.
    pub fn record_conflicts(&mut self, conflicts: impl IntoIterator<Item = SyncConflict>) {
        self.conflicts.extend(conflicts);
    }

    fn recompute_progress(&mut self) {
        self.progress = if self.total_records == 0 {
            0.0
        } else {
            let ratio = self.processed_records as f64 / self.total_records as f64;
            (ratio * 100.0).clamp(0.0, 100.0)
        };
    }
}
