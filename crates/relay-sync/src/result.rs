//! Completed run results and derived metrics.

use chrono::{DateTime, Duration, Utc};
use relay_connector::{ConfigurationId, RunId};
use serde::{Deserialize, Serialize};

use crate::conflict::SyncConflict;
use crate::operation::SyncOperation;
use crate::status::{RunError, RunState, SyncRunStatus};

/// Derived throughput and quality metrics for a completed run.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct RunMetrics {
    /// Records processed per second.
    pub records_per_second: f64,
    /// Errors per processed record.
    pub error_rate: f64,
    /// Conflicts per processed record.
    pub conflict_rate: f64,
    /// Records processed per minute.
    pub throughput_per_minute: f64,
}

impl RunMetrics {
    /// Derive metrics from run counters and elapsed time.
    #[must_use]
    pub fn derive(
        processed_records: usize,
        error_count: usize,
        conflict_count: usize,
        duration: Duration,
    ) -> Self {
        let seconds = duration.num_milliseconds() as f64 / 1000.0;
        let records_per_second = if seconds > 0.0 {
            processed_records as f64 / seconds
        } else {
            0.0
        };
        let per_record = |count: usize| {
            if processed_records > 0 {
                count as f64 / processed_records as f64
            } else {
                0.0
            }
        };

        Self {
            records_per_second,
            error_rate: per_record(error_count),
            conflict_rate: per_record(conflict_count),
            throughput_per_minute: records_per_second * 60.0,
        }
    }
}

/// Immutable record of a terminated sync run.
///
/// Every run, including failed and cancelled ones, produces exactly one
/// result that is folded into the registry's bounded history; a run never
/// disappears without a trace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncRunResult {
    /// Run ID.
    pub id: RunId,
    /// Configuration this run executed.
    pub configuration_id: ConfigurationId,
    /// Terminal state.
    pub state: RunState,
    /// When the run started.
    pub start_time: DateTime<Utc>,
    /// When the run terminated.
    pub end_time: DateTime<Utc>,
    /// Elapsed wall-clock time in milliseconds.
    pub duration_ms: i64,
    /// Records processed.
    pub processed_records: usize,
    /// Total records fetched from the source.
    pub total_records: usize,
    /// Records that completed with no failures on any target.
    pub successful_records: usize,
    /// Failed record/target pairings plus record-level failures.
    pub failed_records: usize,
    /// Errors recorded, in order.
    pub errors: Vec<RunError>,
    /// Conflicts recorded, in order.
    pub conflicts: Vec<SyncConflict>,
    /// Derived metrics.
    pub metrics: RunMetrics,
    /// Planned operations; present only for dry runs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operations: Option<Vec<SyncOperation>>,
}

impl SyncRunResult {
    /// Fold a terminated status into an immutable result.
    #[must_use]
    pub fn from_status(
        status: SyncRunStatus,
        state: RunState,
        successful_records: usize,
        failed_records: usize,
        operations: Option<Vec<SyncOperation>>,
    ) -> Self {
        let end_time = Utc::now();
        let duration = end_time - status.start_time;
        let metrics = RunMetrics::derive(
            status.processed_records,
            status.errors.len(),
            status.conflicts.len(),
            duration,
        );

        Self {
            id: status.id,
            configuration_id: status.configuration_id,
            state,
            start_time: status.start_time,
            end_time,
            duration_ms: duration.num_milliseconds(),
            processed_records: status.processed_records,
            total_records: status.total_records,
            successful_records,
            failed_records,
            errors: status.errors,
            conflicts: status.conflicts,
            metrics,
            operations,
        }
    }

    /// Conflicts flagged for human follow-up.
    pub fn manual_review_conflicts(&self) -> impl Iterator<Item = &SyncConflict> {
        self.conflicts.iter().filter(|c| c.needs_manual_review())
    }
}
