//! Connector error types with transient/permanent classification for retry logic.

use thiserror::Error;

/// Error that can occur during connector operations.
#[derive(Debug, Error)]
pub enum ConnectorError {
    // Connection errors (usually transient)
    /// Failed to establish connection to the external system.
    #[error("connection failed: {message}")]
    ConnectionFailed {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Call timed out.
    #[error("connection timeout after {timeout_secs} seconds")]
    ConnectionTimeout { timeout_secs: u64 },

    /// External system is temporarily unavailable.
    #[error("target system unavailable: {message}")]
    TargetUnavailable { message: String },

    // Read errors
    /// Retrieving a collection of records failed.
    #[error("fetch failed: {message}")]
    FetchFailed {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The query expression was rejected by the external system.
    #[error("invalid query: {message}")]
    InvalidQuery { message: String },

    // Write errors
    /// A create or update received a non-success response.
    #[error("write failed: {message}")]
    WriteFailed {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Update addressed a key that does not exist in the external system.
    #[error("record not found: {key}")]
    RecordNotFound { key: String },

    /// Record payload was rejected as malformed.
    #[error("invalid record: {message}")]
    InvalidRecord { message: String },

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ConnectorError {
    /// Check if this error is transient and the operation should be retried.
    ///
    /// Transient errors are those caused by temporary conditions that may
    /// resolve themselves, such as network issues or temporary unavailability.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ConnectorError::ConnectionFailed { .. }
                | ConnectorError::ConnectionTimeout { .. }
                | ConnectorError::TargetUnavailable { .. }
        )
    }

    /// Check if this error is permanent and retry won't help.
    #[must_use]
    pub fn is_permanent(&self) -> bool {
        !self.is_transient()
    }

    /// Get an error code for classification.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            ConnectorError::ConnectionFailed { .. } => "CONNECTION_FAILED",
            ConnectorError::ConnectionTimeout { .. } => "CONNECTION_TIMEOUT",
            ConnectorError::TargetUnavailable { .. } => "TARGET_UNAVAILABLE",
            ConnectorError::FetchFailed { .. } => "FETCH_FAILED",
            ConnectorError::InvalidQuery { .. } => "INVALID_QUERY",
            ConnectorError::WriteFailed { .. } => "WRITE_FAILED",
            ConnectorError::RecordNotFound { .. } => "RECORD_NOT_FOUND",
            ConnectorError::InvalidRecord { .. } => "INVALID_RECORD",
            ConnectorError::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }

    // Convenience constructors

    /// Create a connection failed error.
    pub fn connection_failed(message: impl Into<String>) -> Self {
        ConnectorError::ConnectionFailed {
            message: message.into(),
            source: None,
        }
    }

    /// Create a fetch failed error.
    pub fn fetch_failed(message: impl Into<String>) -> Self {
        ConnectorError::FetchFailed {
            message: message.into(),
            source: None,
        }
    }

    /// Create a fetch failed error with source.
    pub fn fetch_failed_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        ConnectorError::FetchFailed {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a write failed error.
    pub fn write_failed(message: impl Into<String>) -> Self {
        ConnectorError::WriteFailed {
            message: message.into(),
            source: None,
        }
    }

    /// Create a write failed error with source.
    pub fn write_failed_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        ConnectorError::WriteFailed {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a record not found error.
    pub fn record_not_found(key: impl Into<String>) -> Self {
        ConnectorError::RecordNotFound { key: key.into() }
    }

    /// Create an invalid query error.
    pub fn invalid_query(message: impl Into<String>) -> Self {
        ConnectorError::InvalidQuery {
            message: message.into(),
        }
    }

    /// Create an invalid record error.
    pub fn invalid_record(message: impl Into<String>) -> Self {
        ConnectorError::InvalidRecord {
            message: message.into(),
        }
    }

    /// Create a target unavailable error.
    pub fn unavailable(message: impl Into<String>) -> Self {
        ConnectorError::TargetUnavailable {
            message: message.into(),
        }
    }
}

/// Result type for connector operations.
pub type ConnectorResult<T> = Result<T, ConnectorError>;
