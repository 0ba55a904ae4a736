//! Conflict detection and resolution.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use relay_connector::record::get_path;

use crate::config::{ConflictStrategy, FieldMapping};

/// How a detected conflict was resolved. `Pending` until resolution runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictResolution {
    /// Awaiting resolution.
    Pending,
    /// Source value applied.
    SourceWins,
    /// Target value kept.
    TargetWins,
    /// Newer timestamp's value applied.
    NewestWins,
    /// Source value applied provisionally; human follow-up required.
    ManualReviewRequired,
}

impl ConflictResolution {
    /// Convert to string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ConflictResolution::Pending => "pending",
            ConflictResolution::SourceWins => "source_wins",
            ConflictResolution::TargetWins => "target_wins",
            ConflictResolution::NewestWins => "newest_wins",
            ConflictResolution::ManualReviewRequired => "manual_review_required",
        }
    }

    /// Check if this is a final resolution.
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        !matches!(self, ConflictResolution::Pending)
    }
}

impl std::fmt::Display for ConflictResolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Detected divergence for one field on one record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConflict {
    /// Target field dot-path the conflict was detected on.
    pub field: String,
    /// Freshly mapped source value.
    pub source_value: Value,
    /// Existing target value.
    pub target_value: Value,
    /// Source record's last-modified timestamp, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_timestamp: Option<DateTime<Utc>>,
    /// Target record's last-modified timestamp, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_timestamp: Option<DateTime<Utc>>,
    /// Resolution applied to this conflict.
    pub resolution: ConflictResolution,
}

impl SyncConflict {
    /// Check if this conflict needs human follow-up.
    #[must_use]
    pub fn needs_manual_review(&self) -> bool {
        self.resolution == ConflictResolution::ManualReviewRequired
    }
}

/// Compare a mapped record against an existing target record field by field.
///
/// A conflict is emitted only when both sides hold different values and the
/// existing value is defined: a null or missing target value is an absence to
/// be filled, not a conflict. Conflict order follows mapping declaration
/// order. Pure; mutates neither input.
#[must_use]
pub fn detect_conflicts(
    mapped: &Value,
    existing: &Value,
    mappings: &[FieldMapping],
    source_timestamp: Option<DateTime<Utc>>,
    target_timestamp: Option<DateTime<Utc>>,
) -> Vec<SyncConflict> {
    let mut conflicts = Vec::new();

    for mapping in mappings {
        let target_value = match get_path(existing, &mapping.target_field) {
            Some(value) if !value.is_null() => value,
            _ => continue,
        };

        let mapped_value = get_path(mapped, &mapping.target_field).unwrap_or(&Value::Null);
        if mapped_value == target_value {
            continue;
        }

        conflicts.push(SyncConflict {
            field: mapping.target_field.clone(),
            source_value: mapped_value.clone(),
            target_value: target_value.clone(),
            source_timestamp,
            target_timestamp,
            resolution: ConflictResolution::Pending,
        });
    }

    conflicts
}

/// Resolve conflicts under `strategy`, producing the winning value per field.
///
/// Each conflict is stamped with the resolution applied. For `NewestWins`,
/// the strictly newer timestamp's value wins; on a tie the source value wins
/// (deliberate, documented default). A missing timestamp is treated as older
/// than a present one; when both are missing the source wins. For `Manual`,
/// the source value is provisionally applied and the conflict is stamped
/// `ManualReviewRequired` for the caller to surface.
pub fn resolve_conflicts(
    conflicts: &mut [SyncConflict],
    strategy: ConflictStrategy,
) -> HashMap<String, Value> {
    let mut winners = HashMap::new();

    for conflict in conflicts {
        let (winner, resolution) = match strategy {
            ConflictStrategy::SourceWins => {
                (conflict.source_value.clone(), ConflictResolution::SourceWins)
            }
            ConflictStrategy::TargetWins => {
                (conflict.target_value.clone(), ConflictResolution::TargetWins)
            }
            ConflictStrategy::NewestWins => {
                let source_wins = match (conflict.source_timestamp, conflict.target_timestamp) {
                    (Some(source), Some(target)) => source >= target,
                    (Some(_), None) => true,
                    (None, Some(_)) => false,
                    (None, None) => true,
                };
                let winner = if source_wins {
                    conflict.source_value.clone()
                } else {
                    conflict.target_value.clone()
                };
                (winner, ConflictResolution::NewestWins)
            }
            ConflictStrategy::Manual => (
                conflict.source_value.clone(),
                ConflictResolution::ManualReviewRequired,
            ),
        };

        conflict.resolution = resolution;
        winners.insert(conflict.field.clone(), winner);
    }

    winners
}
