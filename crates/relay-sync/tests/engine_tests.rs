//! End-to-end sync engine scenarios over in-memory connectors.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use relay_connector::{
    async_trait, Connector, ConnectorError, ConnectorResult, InMemoryConnector, RecordQuery,
    RetryConfig, RetryExecutor, SystemKind,
};
use relay_sync::prelude::*;
use serde_json::{json, Value};
use tokio::sync::Notify;

fn customer_configuration() -> SyncConfiguration {
    SyncConfiguration::new("customers", SystemKind::Crm, vec![SystemKind::Erp])
        .with_mapping(FieldMapping::new("id", "No").required())
        .with_mapping(FieldMapping::new("name", "Name"))
}

async fn crm_with(records: impl IntoIterator<Item = Value>) -> Arc<InMemoryConnector> {
    Arc::new(
        InMemoryConnector::new(SystemKind::Crm, "crm", "id")
            .with_records(records)
            .await,
    )
}

fn erp() -> Arc<InMemoryConnector> {
    Arc::new(InMemoryConnector::new(SystemKind::Erp, "erp", "No"))
}

fn engine(
    registry: &Arc<SyncRegistry>,
    connectors: impl IntoIterator<Item = Arc<dyn Connector>>,
) -> SyncEngine {
    let mut engine = SyncEngine::new(Arc::clone(registry))
        .with_retry(RetryExecutor::new(RetryConfig::no_retries()));
    for connector in connectors {
        engine = engine.with_connector(connector);
    }
    engine
}

#[tokio::test]
async fn clean_run_creates_all_records() {
    let crm = crm_with([
        json!({"id": "A1", "name": "Acme"}),
        json!({"id": "B2", "name": "Beta"}),
    ])
    .await;
    let erp = erp();

    let registry = Arc::new(SyncRegistry::new());
    let engine = engine(&registry, [crm as _, Arc::clone(&erp) as _]);
    let config = registry.upsert(customer_configuration()).await;

    let result = engine.run(config.id, RunOptions::default()).await.unwrap();

    assert_eq!(result.state, RunState::Completed);
    assert_eq!(result.total_records, 2);
    assert_eq!(result.processed_records, 2);
    assert_eq!(result.successful_records, 2);
    assert_eq!(result.failed_records, 0);
    assert!(result.errors.is_empty());
    assert!(result.conflicts.is_empty());

    assert_eq!(erp.len().await, 2);
    assert_eq!(
        erp.get("A1").await,
        Some(json!({"No": "A1", "Name": "Acme"}))
    );

    let stored = registry.get(config.id).await.unwrap();
    assert!(stored.last_run_at.is_some());
    assert_eq!(registry.history_for(config.id, None).await.len(), 1);
}

#[tokio::test]
async fn conflicting_update_resolved_by_strategy() {
    let crm = crm_with([json!({"id": "A1", "name": "Acme"})]).await;
    let erp_connector = Arc::new(
        InMemoryConnector::new(SystemKind::Erp, "erp", "No")
            .with_records([json!({"No": "A1", "Name": "ACME Corp"})])
            .await,
    );

    let registry = Arc::new(SyncRegistry::new());
    let engine = engine(&registry, [crm as _, Arc::clone(&erp_connector) as _]);
    let config = registry
        .upsert(customer_configuration().with_strategy(ConflictStrategy::TargetWins))
        .await;

    let result = engine.run(config.id, RunOptions::default()).await.unwrap();

    assert_eq!(result.state, RunState::Completed);
    assert_eq!(result.conflicts.len(), 1);
    assert_eq!(result.conflicts[0].field, "Name");
    assert_eq!(
        result.conflicts[0].resolution,
        ConflictResolution::TargetWins
    );

    // The existing target value survived the write.
    let stored = erp_connector.get("A1").await.unwrap();
    assert_eq!(stored["Name"], "ACME Corp");
}

#[tokio::test]
async fn manual_strategy_flags_conflicts_for_review() {
    let crm = crm_with([json!({"id": "A1", "name": "Acme"})]).await;
    let erp_connector = Arc::new(
        InMemoryConnector::new(SystemKind::Erp, "erp", "No")
            .with_records([json!({"No": "A1", "Name": "ACME Corp"})])
            .await,
    );

    let registry = Arc::new(SyncRegistry::new());
    let engine = engine(&registry, [crm as _, Arc::clone(&erp_connector) as _]);
    let config = registry
        .upsert(customer_configuration().with_strategy(ConflictStrategy::Manual))
        .await;

    let result = engine.run(config.id, RunOptions::default()).await.unwrap();

    assert_eq!(result.state, RunState::Completed);
    assert_eq!(result.manual_review_conflicts().count(), 1);

    // The source value was applied provisionally.
    let stored = erp_connector.get("A1").await.unwrap();
    assert_eq!(stored["Name"], "Acme");
}

#[tokio::test]
async fn newest_wins_uses_configured_timestamp_fields() {
    let crm = crm_with([json!({
        "id": "A1",
        "name": "Acme",
        "modified_at": "2026-08-01T10:00:00Z"
    })])
    .await;
    let erp_connector = Arc::new(
        InMemoryConnector::new(SystemKind::Erp, "erp", "No")
            .with_records([json!({
                "No": "A1",
                "Name": "ACME Corp",
                "Last_Modified": "2026-08-02T10:00:00Z"
            })])
            .await,
    );

    let registry = Arc::new(SyncRegistry::new());
    let engine = engine(&registry, [crm as _, Arc::clone(&erp_connector) as _]);
    let mut config = customer_configuration().with_strategy(ConflictStrategy::NewestWins);
    config.source_timestamp_field = Some("modified_at".to_string());
    config.target_timestamp_field = Some("Last_Modified".to_string());
    let config = registry.upsert(config).await;

    let result = engine.run(config.id, RunOptions::default()).await.unwrap();

    assert_eq!(result.conflicts.len(), 1);
    assert_eq!(
        result.conflicts[0].resolution,
        ConflictResolution::NewestWins
    );
    // The target record is newer, so its value wins.
    let stored = erp_connector.get("A1").await.unwrap();
    assert_eq!(stored["Name"], "ACME Corp");
}

#[tokio::test]
async fn disabled_configuration_is_rejected_unless_forced() {
    let crm = crm_with([json!({"id": "A1", "name": "Acme"})]).await;
    let erp = erp();

    let registry = Arc::new(SyncRegistry::new());
    let engine = engine(&registry, [crm as _, Arc::clone(&erp) as _]);
    let mut config = customer_configuration();
    config.enabled = false;
    let config = registry.upsert(config).await;

    let err = engine
        .run(config.id, RunOptions::default())
        .await
        .unwrap_err();
    assert!(err.is_configuration());
    assert!(registry.get_history(None).await.is_empty());

    let result = engine
        .run(config.id, RunOptions::default().force())
        .await
        .unwrap();
    assert_eq!(result.state, RunState::Completed);
    assert_eq!(erp.len().await, 1);
}

#[tokio::test]
async fn unknown_configuration_is_not_found() {
    let registry = Arc::new(SyncRegistry::new());
    let engine = engine(&registry, []);

    let err = engine
        .run(relay_connector::ConfigurationId::new(), RunOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::NotFound { .. }));
}

#[tokio::test]
async fn missing_connector_is_a_configuration_error() {
    let crm = crm_with([]).await;
    let registry = Arc::new(SyncRegistry::new());
    let engine = engine(&registry, [crm as _]);
    let config = registry.upsert(customer_configuration()).await;

    let err = engine
        .run(config.id, RunOptions::default())
        .await
        .unwrap_err();
    assert!(err.is_configuration());
}

#[tokio::test]
async fn fetch_failure_terminates_run_as_failed() {
    let crm = InMemoryConnector::new(SystemKind::Crm, "crm", "id");
    crm.set_fail_fetch(true);
    let erp = erp();

    let registry = Arc::new(SyncRegistry::new());
    let engine = engine(&registry, [Arc::new(crm) as _, erp as _]);
    let config = registry.upsert(customer_configuration()).await;

    let result = engine.run(config.id, RunOptions::default()).await.unwrap();

    assert_eq!(result.state, RunState::Failed);
    assert_eq!(result.processed_records, 0);
    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].code, "FETCH_ERROR");

    // Failed runs still leave a history entry and stamp last_run_at.
    assert_eq!(registry.history_for(config.id, None).await.len(), 1);
    assert!(registry.get(config.id).await.unwrap().last_run_at.is_some());
    assert!(registry.list_active_runs().await.is_empty());
}

#[tokio::test]
async fn transient_fetch_failure_is_retried() {
    let crm = InMemoryConnector::new(SystemKind::Crm, "crm", "id")
        .with_records([json!({"id": "A1", "name": "Acme"})])
        .await;
    crm.inject_transient_failures(2);
    let erp = erp();

    let registry = Arc::new(SyncRegistry::new());
    let config = registry.upsert(customer_configuration()).await;
    let engine = SyncEngine::new(Arc::clone(&registry))
        .with_retry(RetryExecutor::new(RetryConfig {
            max_retries: 3,
            initial_delay: std::time::Duration::from_millis(1),
            max_delay: std::time::Duration::from_millis(5),
            backoff_multiplier: 2.0,
            jitter: false,
        }))
        .with_connector(Arc::new(crm))
        .with_connector(erp);

    let result = engine.run(config.id, RunOptions::default()).await.unwrap();
    assert_eq!(result.state, RunState::Completed);
    assert_eq!(result.processed_records, 1);
}

#[tokio::test]
async fn dry_run_plans_operations_without_writing() {
    let crm = crm_with([
        json!({"id": "A1", "name": "Acme"}),
        json!({"id": "B2", "name": "Beta"}),
    ])
    .await;
    let erp_connector = Arc::new(
        InMemoryConnector::new(SystemKind::Erp, "erp", "No")
            .with_records([json!({"No": "A1", "Name": "ACME Corp"})])
            .await,
    );

    let registry = Arc::new(SyncRegistry::new());
    let engine = engine(&registry, [crm as _, Arc::clone(&erp_connector) as _]);
    let config = registry.upsert(customer_configuration()).await;

    let result = engine
        .run(config.id, RunOptions::default().dry_run())
        .await
        .unwrap();

    let operations = result.operations.as_ref().unwrap();
    assert_eq!(operations.len(), 2);
    assert_eq!(operations[0].op_type, OperationType::Update);
    assert_eq!(operations[1].op_type, OperationType::Create);

    // Conflicts are still detected; no write happened.
    assert_eq!(result.conflicts.len(), 1);
    assert_eq!(erp_connector.len().await, 1);
    assert_eq!(
        erp_connector.get("A1").await.unwrap()["Name"],
        "ACME Corp"
    );
    // Dry runs are recorded in history like any other run.
    assert_eq!(registry.history_for(config.id, None).await.len(), 1);
}

#[tokio::test]
async fn source_query_filter_is_forwarded() {
    let crm = crm_with([
        json!({"id": "A1", "name": "Acme", "city": "Vienna"}),
        json!({"id": "B2", "name": "Beta", "city": "Graz"}),
    ])
    .await;
    let erp = erp();

    let registry = Arc::new(SyncRegistry::new());
    let engine = engine(&registry, [crm as _, Arc::clone(&erp) as _]);
    let config = registry
        .upsert(customer_configuration().with_query(RecordQuery::new().with_filter("city=Graz")))
        .await;

    let result = engine.run(config.id, RunOptions::default()).await.unwrap();

    assert_eq!(result.total_records, 1);
    assert_eq!(erp.len().await, 1);
    assert!(erp.get("B2").await.is_some());
}

/// Target connector that rejects writes for a fixed set of keys.
struct FlakyTarget {
    inner: InMemoryConnector,
    rejected_keys: HashSet<String>,
}

impl FlakyTarget {
    fn new(rejected_keys: impl IntoIterator<Item = &'static str>) -> Self {
        Self {
            inner: InMemoryConnector::new(SystemKind::Erp, "flaky-erp", "No"),
            rejected_keys: rejected_keys.into_iter().map(String::from).collect(),
        }
    }

    fn rejects(&self, record: &Value) -> bool {
        record["No"]
            .as_str()
            .is_some_and(|key| self.rejected_keys.contains(key))
    }
}

#[async_trait]
impl Connector for FlakyTarget {
    fn system_kind(&self) -> SystemKind {
        self.inner.system_kind()
    }

    fn display_name(&self) -> &str {
        self.inner.display_name()
    }

    async fn fetch_all(&self, query: Option<&RecordQuery>) -> ConnectorResult<Vec<Value>> {
        self.inner.fetch_all(query).await
    }

    async fn fetch_by_key(&self, key: &str) -> ConnectorResult<Option<Value>> {
        self.inner.fetch_by_key(key).await
    }

    async fn create(&self, record: Value) -> ConnectorResult<Value> {
        if self.rejects(&record) {
            return Err(ConnectorError::write_failed("422 rejected by target"));
        }
        self.inner.create(record).await
    }

    async fn update(&self, key: &str, changes: Value) -> ConnectorResult<Value> {
        if self.rejected_keys.contains(key) {
            return Err(ConnectorError::write_failed("422 rejected by target"));
        }
        self.inner.update(key, changes).await
    }
}

#[tokio::test]
async fn record_failures_do_not_stop_the_run() {
    let crm = crm_with([
        json!({"id": "A1", "name": "Acme"}),
        json!({"id": "B2", "name": "Beta"}),
        json!({"id": "C3", "name": "Gamma"}),
        json!({"id": "D4", "name": "Delta"}),
    ])
    .await;
    let flaky = Arc::new(FlakyTarget::new(["B2", "D4"]));

    let registry = Arc::new(SyncRegistry::new());
    let engine = engine(&registry, [crm as _, Arc::clone(&flaky) as _]);
    let config = registry.upsert(customer_configuration()).await;

    let result = engine.run(config.id, RunOptions::default()).await.unwrap();

    assert_eq!(result.state, RunState::CompletedWithErrors);
    assert_eq!(result.processed_records, 4);
    assert_eq!(result.successful_records, 2);
    assert_eq!(result.failed_records, 2);
    assert_eq!(result.errors.len(), 2);
    assert_eq!(result.errors[0].record_id.as_deref(), Some("B2"));
    assert_eq!(result.errors[1].record_id.as_deref(), Some("D4"));

    // The records that could be written were.
    assert!(flaky.inner.get("A1").await.is_some());
    assert!(flaky.inner.get("C3").await.is_some());
    assert!(flaky.inner.get("B2").await.is_none());
}

#[tokio::test]
async fn record_without_key_value_is_a_record_error() {
    let crm = crm_with([
        json!({"id": "A1", "name": "Acme"}),
        json!({"name": "No Key"}),
    ])
    .await;
    let erp = erp();

    let registry = Arc::new(SyncRegistry::new());
    let engine = engine(&registry, [crm as _, Arc::clone(&erp) as _]);
    let config = registry.upsert(customer_configuration()).await;

    let result = engine.run(config.id, RunOptions::default()).await.unwrap();

    assert_eq!(result.state, RunState::CompletedWithErrors);
    assert_eq!(result.successful_records, 1);
    assert_eq!(result.failed_records, 1);
    assert_eq!(erp.len().await, 1);
}

#[tokio::test]
async fn multi_target_writes_every_target_in_order() {
    let crm = crm_with([json!({"id": "A1", "name": "Acme"})]).await;
    let erp = erp();
    let docs = Arc::new(InMemoryConnector::new(SystemKind::DocStore, "docs", "No"));

    let registry = Arc::new(SyncRegistry::new());
    let engine = engine(
        &registry,
        [crm as _, Arc::clone(&erp) as _, Arc::clone(&docs) as _],
    );
    let config = registry
        .upsert(
            SyncConfiguration::new(
                "customers",
                SystemKind::Crm,
                vec![SystemKind::Erp, SystemKind::DocStore],
            )
            .with_mapping(FieldMapping::new("id", "No").required())
            .with_mapping(FieldMapping::new("name", "Name")),
        )
        .await;

    let result = engine.run(config.id, RunOptions::default()).await.unwrap();

    assert_eq!(result.state, RunState::Completed);
    assert_eq!(erp.len().await, 1);
    assert_eq!(docs.len().await, 1);
}

/// Target connector that blocks its first lookup until released, so a test
/// can act while the run is provably in flight.
struct GatedTarget {
    inner: InMemoryConnector,
    gate_armed: AtomicBool,
    started: Notify,
    resume: Notify,
}

impl GatedTarget {
    fn new() -> Self {
        Self {
            inner: InMemoryConnector::new(SystemKind::Erp, "gated-erp", "No"),
            gate_armed: AtomicBool::new(true),
            started: Notify::new(),
            resume: Notify::new(),
        }
    }
}

#[async_trait]
impl Connector for GatedTarget {
    fn system_kind(&self) -> SystemKind {
        self.inner.system_kind()
    }

    fn display_name(&self) -> &str {
        self.inner.display_name()
    }

    async fn fetch_all(&self, query: Option<&RecordQuery>) -> ConnectorResult<Vec<Value>> {
        self.inner.fetch_all(query).await
    }

    async fn fetch_by_key(&self, key: &str) -> ConnectorResult<Option<Value>> {
        if self.gate_armed.swap(false, Ordering::SeqCst) {
            self.started.notify_one();
            self.resume.notified().await;
        }
        self.inner.fetch_by_key(key).await
    }

    async fn create(&self, record: Value) -> ConnectorResult<Value> {
        self.inner.create(record).await
    }

    async fn update(&self, key: &str, changes: Value) -> ConnectorResult<Value> {
        self.inner.update(key, changes).await
    }
}

#[tokio::test]
async fn cancellation_stops_between_records() {
    let crm = crm_with([
        json!({"id": "A1", "name": "Acme"}),
        json!({"id": "B2", "name": "Beta"}),
        json!({"id": "C3", "name": "Gamma"}),
    ])
    .await;
    let gated = Arc::new(GatedTarget::new());

    let registry = Arc::new(SyncRegistry::new());
    let engine = Arc::new(engine(&registry, [crm as _, Arc::clone(&gated) as _]));
    let config = registry.upsert(customer_configuration()).await;

    let run_engine = Arc::clone(&engine);
    let config_id = config.id;
    let handle =
        tokio::spawn(async move { run_engine.run(config_id, RunOptions::default()).await });

    gated.started.notified().await;
    let active = registry.list_active_runs().await;
    assert_eq!(active.len(), 1);
    assert!(registry.cancel(active[0].id).await);
    gated.resume.notify_one();

    let result = handle.await.unwrap().unwrap();
    assert_eq!(result.state, RunState::Cancelled);
    // The record in flight completed; the rest were never started.
    assert_eq!(result.processed_records, 1);
    assert_eq!(result.total_records, 3);
    assert_eq!(gated.inner.len().await, 1);
    assert!(registry.list_active_runs().await.is_empty());
    assert_eq!(registry.history_for(config.id, None).await.len(), 1);
}

#[tokio::test]
async fn concurrent_runs_own_independent_status() {
    let crm = crm_with([json!({"id": "A1", "name": "Acme"})]).await;
    let gated = Arc::new(GatedTarget::new());

    let registry = Arc::new(SyncRegistry::new());
    let engine = Arc::new(engine(&registry, [crm as _, Arc::clone(&gated) as _]));
    let config = registry.upsert(customer_configuration()).await;

    let run_engine = Arc::clone(&engine);
    let config_id = config.id;
    let handle =
        tokio::spawn(async move { run_engine.run(config_id, RunOptions::default()).await });

    // While the first run is blocked mid-record, a second run of the same
    // configuration proceeds to completion on its own status.
    gated.started.notified().await;
    assert_eq!(registry.list_active_runs().await.len(), 1);

    let second = engine.run(config.id, RunOptions::default()).await.unwrap();
    assert_eq!(second.state, RunState::Completed);
    assert_eq!(registry.list_active_runs().await.len(), 1);

    gated.resume.notify_one();
    let first = handle.await.unwrap().unwrap();
    assert_eq!(first.state, RunState::Completed);

    assert!(registry.list_active_runs().await.is_empty());
    assert_eq!(registry.history_for(config.id, None).await.len(), 2);
}

#[tokio::test]
async fn custom_transform_is_applied_end_to_end() {
    let crm = crm_with([json!({"id": "A1", "first": "Ada", "last": "Lovelace"})]).await;
    let erp = erp();

    let registry = Arc::new(SyncRegistry::new());
    let mapper = FieldMapper::new().with_transform("full_name", |_, record| {
        let first = record["first"].as_str().unwrap_or_default();
        let last = record["last"].as_str().unwrap_or_default();
        Value::String(format!("{first} {last}"))
    });
    let engine = SyncEngine::new(Arc::clone(&registry))
        .with_mapper(mapper)
        .with_connector(crm)
        .with_connector(Arc::clone(&erp) as _);

    let config = registry
        .upsert(
            SyncConfiguration::new("contacts", SystemKind::Crm, vec![SystemKind::Erp])
                .with_mapping(FieldMapping::new("id", "No").required())
                .with_mapping(FieldMapping::new("first", "Name").with_transformation(
                    FieldTransform::Custom {
                        function: "full_name".to_string(),
                    },
                )),
        )
        .await;

    let result = engine.run(config.id, RunOptions::default()).await.unwrap();
    assert_eq!(result.state, RunState::Completed);
    assert_eq!(erp.get("A1").await.unwrap()["Name"], "Ada Lovelace");
}

#[tokio::test]
async fn unregistered_custom_transform_fails_before_the_run_starts() {
    let crm = crm_with([json!({"id": "A1"})]).await;
    let erp = erp();

    let registry = Arc::new(SyncRegistry::new());
    let engine = engine(&registry, [crm as _, erp as _]);
    let config = registry
        .upsert(
            customer_configuration().with_mapping(FieldMapping::new("name", "Name")
                .with_transformation(FieldTransform::Custom {
                    function: "missing".to_string(),
                })),
        )
        .await;

    let err = engine
        .run(config.id, RunOptions::default())
        .await
        .unwrap_err();
    assert!(err.is_configuration());
    assert!(registry.get_history(None).await.is_empty());
}
