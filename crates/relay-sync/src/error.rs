//! Sync engine error types.

use relay_connector::ConnectorError;
use thiserror::Error;

/// Errors that can occur during synchronization.
///
/// Configuration and fetch failures abort a run before or at its start;
/// everything else is caught at the record level, recorded against the run,
/// and processing continues.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Invalid or disabled configuration. Fails fast before a run starts.
    #[error("configuration error: {message}")]
    Configuration { message: String },

    /// Source data retrieval failed; the run terminates as failed.
    #[error("fetch error: {message}")]
    Fetch { message: String },

    /// Failure scoped to one record/target pairing; recorded, run continues.
    #[error("record processing error for '{record_id}': {message}")]
    RecordProcessing { record_id: String, message: String },

    /// Connector error.
    #[error("connector error: {0}")]
    Connector(#[from] ConnectorError),

    /// Not found.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SyncError {
    /// Create a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create a fetch error.
    pub fn fetch(message: impl Into<String>) -> Self {
        Self::Fetch {
            message: message.into(),
        }
    }

    /// Create a record processing error.
    pub fn record_processing(record_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::RecordProcessing {
            record_id: record_id.into(),
            message: message.into(),
        }
    }

    /// Create a not found error.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Check if this error indicates a rejected configuration.
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        matches!(self, SyncError::Configuration { .. })
    }
}

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;
