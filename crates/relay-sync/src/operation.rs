//! Planned and executed write operations.

use chrono::{DateTime, Utc};
use relay_connector::SystemKind;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Type of write against a target system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationType {
    /// No existing target record; a new one is created.
    Create,
    /// An existing target record is updated.
    Update,
}

impl OperationType {
    /// Convert to string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationType::Create => "create",
            OperationType::Update => "update",
        }
    }
}

impl std::fmt::Display for OperationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One planned or executed write of a mapped record to a target system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncOperation {
    /// Write type.
    pub op_type: OperationType,
    /// System the record was read from.
    pub source: SystemKind,
    /// System the record is written to.
    pub target: SystemKind,
    /// Raw source record.
    pub source_record: Value,
    /// Post-mapping, post-resolution payload.
    pub mapped_data: Value,
    /// Existing target record, when one was found.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_record: Option<Value>,
    /// When the operation was planned.
    pub timestamp: DateTime<Utc>,
}

impl SyncOperation {
    /// Plan a create of `mapped_data` on `target`.
    #[must_use]
    pub fn create(
        source: SystemKind,
        target: SystemKind,
        source_record: Value,
        mapped_data: Value,
    ) -> Self {
        Self {
            op_type: OperationType::Create,
            source,
            target,
            source_record,
            mapped_data,
            target_record: None,
            timestamp: Utc::now(),
        }
    }

    /// Plan an update of `target_record` with `mapped_data` on `target`.
    #[must_use]
    pub fn update(
        source: SystemKind,
        target: SystemKind,
        source_record: Value,
        mapped_data: Value,
        target_record: Value,
    ) -> Self {
        Self {
            op_type: OperationType::Update,
            source,
            target,
            source_record,
            mapped_data,
            target_record: Some(target_record),
            timestamp: Utc::now(),
        }
    }
}
