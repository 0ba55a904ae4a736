//! Connector capability contract.
//!
//! One implementation per external system. The sync engine depends only on
//! this four-method contract; wire protocols, authentication, and pagination
//! live behind it.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::ConnectorResult;
use crate::query::RecordQuery;
use crate::types::SystemKind;

/// Uniform capability contract for an external business system.
///
/// Implementations perform no local caching or buffering; the only side
/// effects are in the remote system. Retry policy is decided by callers, not
/// by this layer.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Which external system this connector talks to.
    fn system_kind(&self) -> SystemKind;

    /// Display name for this connector instance.
    fn display_name(&self) -> &str;

    /// Fetch a collection of records, optionally filtered.
    ///
    /// Pagination is consumed internally; the returned list is finite and
    /// complete for the given query.
    async fn fetch_all(&self, query: Option<&RecordQuery>) -> ConnectorResult<Vec<Value>>;

    /// Fetch one record by its key.
    ///
    /// Absence is NOT an error: `Ok(None)` signals "does not exist yet" to
    /// the caller.
    async fn fetch_by_key(&self, key: &str) -> ConnectorResult<Option<Value>>;

    /// Create a record, returning the created record.
    ///
    /// Fails with a write error on any non-success response. Must be safe to
    /// retry.
    async fn create(&self, record: Value) -> ConnectorResult<Value>;

    /// Update a record by key with a partial record, returning the updated
    /// record.
    ///
    /// Fails with [`crate::ConnectorError::RecordNotFound`] if the key does
    /// not exist.
    async fn update(&self, key: &str, changes: Value) -> ConnectorResult<Value>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConnectorError;
    use serde_json::json;

    struct StubConnector;

    #[async_trait]
    impl Connector for StubConnector {
        fn system_kind(&self) -> SystemKind {
            SystemKind::Crm
        }

        fn display_name(&self) -> &str {
            "stub"
        }

        async fn fetch_all(&self, _query: Option<&RecordQuery>) -> ConnectorResult<Vec<Value>> {
            Ok(vec![json!({"id": "A1"})])
        }

        async fn fetch_by_key(&self, key: &str) -> ConnectorResult<Option<Value>> {
            Ok((key == "A1").then(|| json!({"id": "A1"})))
        }

        async fn create(&self, record: Value) -> ConnectorResult<Value> {
            Ok(record)
        }

        async fn update(&self, key: &str, _changes: Value) -> ConnectorResult<Value> {
            Err(ConnectorError::record_not_found(key))
        }
    }

    #[tokio::test]
    async fn test_absent_record_is_not_an_error() {
        let connector = StubConnector;
        let found = connector.fetch_by_key("A1").await.unwrap();
        assert!(found.is_some());

        let missing = connector.fetch_by_key("B2").await.unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_object_safety() {
        let connector: Box<dyn Connector> = Box::new(StubConnector);
        assert_eq!(connector.system_kind(), SystemKind::Crm);
        assert_eq!(connector.fetch_all(None).await.unwrap().len(), 1);
    }
}
