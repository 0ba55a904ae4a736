//! In-memory connector for tests and local development.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::error::{ConnectorError, ConnectorResult};
use crate::query::RecordQuery;
use crate::record::{get_path, key_string};
use crate::traits::Connector;
use crate::types::SystemKind;

/// A keyed, thread-safe [`Connector`] backed by an in-process map.
///
/// Records are keyed by the value at `key_field` and returned from
/// `fetch_all` in key order, so test runs are deterministic. Failure modes
/// can be injected to exercise error containment and retry behavior.
pub struct InMemoryConnector {
    kind: SystemKind,
    name: String,
    key_field: String,
    records: RwLock<BTreeMap<String, Value>>,
    /// Number of upcoming calls that fail with a transient error.
    transient_failures: AtomicU32,
    /// When set, every write fails with a permanent write error.
    fail_writes: AtomicBool,
    /// When set, `fetch_all` fails with a permanent fetch error.
    fail_fetch: AtomicBool,
}

impl InMemoryConnector {
    /// Create an empty connector keyed by `key_field`.
    #[must_use]
    pub fn new(kind: SystemKind, name: impl Into<String>, key_field: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            key_field: key_field.into(),
            records: RwLock::new(BTreeMap::new()),
            transient_failures: AtomicU32::new(0),
            fail_writes: AtomicBool::new(false),
            fail_fetch: AtomicBool::new(false),
        }
    }

    /// Seed the connector with records (builder style).
    pub async fn with_records(self, records: impl IntoIterator<Item = Value>) -> Self {
        {
            let mut map = self.records.write().await;
            for record in records {
                if let Some(key) = key_string(get_path(&record, &self.key_field)) {
                    map.insert(key, record);
                }
            }
        }
        self
    }

    /// Make the next `count` calls fail with a transient error.
    pub fn inject_transient_failures(&self, count: u32) {
        self.transient_failures.store(count, Ordering::SeqCst);
    }

    /// Toggle permanent write failures.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Toggle permanent fetch failures.
    pub fn set_fail_fetch(&self, fail: bool) {
        self.fail_fetch.store(fail, Ordering::SeqCst);
    }

    /// Number of records currently stored.
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    /// Check if the store is empty.
    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    /// Snapshot a stored record by key.
    pub async fn get(&self, key: &str) -> Option<Value> {
        self.records.read().await.get(key).cloned()
    }

    fn take_transient_failure(&self) -> Option<ConnectorError> {
        let remaining = self.transient_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.transient_failures.store(remaining - 1, Ordering::SeqCst);
            Some(ConnectorError::unavailable(format!(
                "{} simulating transient outage",
                self.name
            )))
        } else {
            None
        }
    }

    /// Match a record against a `field=value` equality filter.
    fn matches_filter(record: &Value, filter: &str) -> bool {
        let Some((field, expected)) = filter.split_once('=') else {
            return true;
        };
        match key_string(get_path(record, field.trim())) {
            Some(actual) => actual == expected.trim(),
            None => false,
        }
    }
}

#[async_trait]
impl Connector for InMemoryConnector {
    fn system_kind(&self) -> SystemKind {
        self.kind
    }

    fn display_name(&self) -> &str {
        &self.name
    }

    async fn fetch_all(&self, query: Option<&RecordQuery>) -> ConnectorResult<Vec<Value>> {
        if let Some(err) = self.take_transient_failure() {
            return Err(err);
        }
        if self.fail_fetch.load(Ordering::SeqCst) {
            return Err(ConnectorError::fetch_failed(format!(
                "{} simulating fetch failure",
                self.name
            )));
        }

        let records = self.records.read().await;
        let filter = query.and_then(|q| q.filter.as_deref());
        Ok(records
            .values()
            .filter(|record| filter.map_or(true, |f| Self::matches_filter(record, f)))
            .cloned()
            .collect())
    }

    async fn fetch_by_key(&self, key: &str) -> ConnectorResult<Option<Value>> {
        if let Some(err) = self.take_transient_failure() {
            return Err(err);
        }
        Ok(self.records.read().await.get(key).cloned())
    }

    async fn create(&self, record: Value) -> ConnectorResult<Value> {
        if let Some(err) = self.take_transient_failure() {
            return Err(err);
        }
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(ConnectorError::write_failed(format!(
                "{} simulating write failure",
                self.name
            )));
        }

        let key = key_string(get_path(&record, &self.key_field)).ok_or_else(|| {
            ConnectorError::invalid_record(format!("missing key field '{}'", self.key_field))
        })?;

        self.records.write().await.insert(key, record.clone());
        Ok(record)
    }

    async fn update(&self, key: &str, changes: Value) -> ConnectorResult<Value> {
        if let Some(err) = self.take_transient_failure() {
            return Err(err);
        }
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(ConnectorError::write_failed(format!(
                "{} simulating write failure",
                self.name
            )));
        }

        let mut records = self.records.write().await;
        let existing = records
            .get_mut(key)
            .ok_or_else(|| ConnectorError::record_not_found(key))?;

        match (existing.as_object_mut(), changes.as_object()) {
            (Some(target), Some(partial)) => {
                for (field, value) in partial {
                    target.insert(field.clone(), value.clone());
                }
            }
            _ => *existing = changes,
        }

        Ok(existing.clone())
    }
}
