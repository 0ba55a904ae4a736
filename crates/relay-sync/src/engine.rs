//! Sync run orchestration.

use std::collections::HashMap;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use relay_connector::record::{get_path, key_string, set_path};
use relay_connector::{ConfigurationId, Connector, RetryExecutor, RunId, SystemKind};
use serde_json::Value;
use tracing::{info, instrument, warn};

use crate::config::SyncConfiguration;
use crate::conflict::{detect_conflicts, resolve_conflicts, SyncConflict};
use crate::error::{SyncError, SyncResult};
use crate::mapper::FieldMapper;
use crate::operation::SyncOperation;
use crate::registry::SyncRegistry;
use crate::result::SyncRunResult;
use crate::status::{RunError, RunState, SyncRunStatus};

/// Per-run execution options.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Run even when the configuration is disabled.
    pub force: bool,
    /// Plan all operations but perform no writes.
    pub dry_run: bool,
}

impl RunOptions {
    /// Force the run past the enabled check.
    #[must_use]
    pub fn force(mut self) -> Self {
        self.force = true;
        self
    }

    /// Plan writes without performing them.
    #[must_use]
    pub fn dry_run(mut self) -> Self {
        self.dry_run = true;
        self
    }
}

/// Orchestrates sync runs over registered connectors.
///
/// One engine serves many configurations. Each run pins an immutable snapshot
/// of its configuration, fetches the full source collection, and pushes each
/// record through map, conflict detection, resolution, and write for every
/// target in order. Failures below the fetch are scoped to one record/target
/// pairing; the run keeps going.
pub struct SyncEngine {
    registry: Arc<SyncRegistry>,
    connectors: HashMap<SystemKind, Arc<dyn Connector>>,
    retry: RetryExecutor,
    mapper: FieldMapper,
}

impl SyncEngine {
    /// Create an engine over the given registry with no connectors.
    #[must_use]
    pub fn new(registry: Arc<SyncRegistry>) -> Self {
        Self {
            registry,
            connectors: HashMap::new(),
            retry: RetryExecutor::with_defaults(),
            mapper: FieldMapper::new(),
        }
    }

    /// Register a connector under its system kind (builder style).
    #[must_use]
    pub fn with_connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.connectors.insert(connector.system_kind(), connector);
        self
    }

    /// Replace the retry executor (builder style).
    #[must_use]
    pub fn with_retry(mut self, retry: RetryExecutor) -> Self {
        self.retry = retry;
        self
    }

    /// Replace the field mapper, e.g. to register custom transforms.
    #[must_use]
    pub fn with_mapper(mut self, mapper: FieldMapper) -> Self {
        self.mapper = mapper;
        self
    }

    /// The registry this engine operates on.
    #[must_use]
    pub fn registry(&self) -> &Arc<SyncRegistry> {
        &self.registry
    }

    fn connector(&self, kind: SystemKind) -> SyncResult<&Arc<dyn Connector>> {
        self.connectors.get(&kind).ok_or_else(|| {
            SyncError::configuration(format!("no connector registered for system '{kind}'"))
        })
    }

    /// Execute one sync run for the given configuration.
    ///
    /// Pre-flight failures (unknown or disabled configuration, invalid
    /// mappings, missing connectors) return an error and leave no trace in
    /// history. Once the run is registered, every outcome terminates through
    /// history: a failed source fetch yields a `Failed` result, cancellation
    /// a `Cancelled` one, and record-level failures are absorbed into
    /// `CompletedWithErrors`. Concurrent runs, including runs of the same
    /// configuration, each own their status independently.
    #[instrument(skip(self, options), fields(configuration_id = %configuration_id))]
    pub async fn run(
        &self,
        configuration_id: ConfigurationId,
        options: RunOptions,
    ) -> SyncResult<SyncRunResult> {
        let config = self
            .registry
            .get(configuration_id)
            .await
            .ok_or_else(|| {
                SyncError::not_found("sync configuration", configuration_id.to_string())
            })?;

        if !config.enabled && !options.force {
            return Err(SyncError::configuration(format!(
                "configuration '{}' is disabled",
                config.name
            )));
        }
        config.validate()?;
        self.mapper.validate_mappings(&config.field_mappings)?;

        let source = Arc::clone(self.connector(config.source_system)?);
        let mut targets = Vec::with_capacity(config.target_systems.len());
        for kind in &config.target_systems {
            targets.push((*kind, Arc::clone(self.connector(*kind)?)));
        }

        let mut status = SyncRunStatus::new(RunId::new(), config.id);
        let cancel = self.registry.register_run(status.clone()).await;
        info!(
            run_id = %status.id,
            configuration = %config.name,
            dry_run = options.dry_run,
            "Sync run started"
        );

        let records = match self
            .retry
            .execute(|| source.fetch_all(config.query.as_ref()))
            .await
        {
            Ok(records) => records,
            Err(e) => {
                warn!(run_id = %status.id, error = %e, "Source fetch failed");
                status.record_error(RunError::fetch(e.to_string()));
                let operations = options.dry_run.then(Vec::new);
                return Ok(self
                    .finish(&config, status, RunState::Failed, 0, 0, operations)
                    .await);
            }
        };

        status.set_total(records.len());
        self.registry.update_run(status.clone()).await;

        let key_field = config
            .key_mapping()
            .map(|m| m.target_field.clone())
            .unwrap_or_default();

        let mut operations = Vec::new();
        let mut successful_records = 0;
        let mut failed_records = 0;
        let mut cancelled = false;

        for record in &records {
            if cancel.load(Ordering::SeqCst) {
                cancelled = true;
                break;
            }

            let failures_before = status.errors.len();
            match self.mapper.apply(record, &config.field_mappings) {
                Ok(mapped) => match key_string(get_path(&mapped, &key_field)) {
                    Some(key) => {
                        for (target_kind, target) in &targets {
                            match self
                                .sync_record_to_target(
                                    &config,
                                    *target_kind,
                                    target,
                                    record,
                                    &mapped,
                                    &key,
                                    options.dry_run,
                                )
                                .await
                            {
                                Ok((operation, conflicts)) => {
                                    status.record_conflicts(conflicts);
                                    operations.push(operation);
                                }
                                Err(e) => {
                                    status.record_error(RunError::record_processing(
                                        key.clone(),
                                        format!("target '{target_kind}': {e}"),
                                    ));
                                }
                            }
                        }
                    }
                    None => {
                        status.record_error(RunError::record_processing(
                            record_label(record, &config),
                            format!("record has no value for key field '{key_field}'"),
                        ));
                    }
                },
                Err(e) => {
                    status.record_error(RunError::record_processing(
                        record_label(record, &config),
                        e.to_string(),
                    ));
                }
            }

            let failures = status.errors.len() - failures_before;
            failed_records += failures;
            if failures == 0 {
                successful_records += 1;
            }
            status.mark_processed();
            self.registry.update_run(status.clone()).await;
        }

        let state = if cancelled {
            RunState::Cancelled
        } else if status.errors.is_empty() {
            RunState::Completed
        } else {
            RunState::CompletedWithErrors
        };
        let operations = options.dry_run.then_some(operations);

        Ok(self
            .finish(&config, status, state, successful_records, failed_records, operations)
            .await)
    }

    #[allow(clippy::too_many_arguments)]
    async fn sync_record_to_target(
        &self,
        config: &SyncConfiguration,
        target_kind: SystemKind,
        target: &Arc<dyn Connector>,
        record: &Value,
        mapped: &Value,
        key: &str,
        dry_run: bool,
    ) -> SyncResult<(SyncOperation, Vec<SyncConflict>)> {
        let existing = self.retry.execute(|| target.fetch_by_key(key)).await?;

        let (operation, conflicts) = match existing {
            None => {
                let operation = SyncOperation::create(
                    config.source_system,
                    target_kind,
                    record.clone(),
                    mapped.clone(),
                );
                (operation, Vec::new())
            }
            Some(existing) => {
                let source_ts = timestamp_at(record, config.source_timestamp_field.as_deref());
                let target_ts = timestamp_at(&existing, config.target_timestamp_field.as_deref());

                let mut conflicts = detect_conflicts(
                    mapped,
                    &existing,
                    &config.field_mappings,
                    source_ts,
                    target_ts,
                );
                let mut payload = mapped.clone();
                for (field, winner) in resolve_conflicts(&mut conflicts, config.conflict_strategy)
                {
                    set_path(&mut payload, &field, winner);
                }

                let operation = SyncOperation::update(
                    config.source_system,
                    target_kind,
                    record.clone(),
                    payload,
                    existing,
                );
                (operation, conflicts)
            }
        };

        if !dry_run {
            match operation.target_record {
                None => {
                    self.retry
                        .execute(|| target.create(operation.mapped_data.clone()))
                        .await?;
                }
                Some(_) => {
                    self.retry
                        .execute(|| target.update(key, operation.mapped_data.clone()))
                        .await?;
                }
            }
        }

        Ok((operation, conflicts))
    }

    async fn finish(
        &self,
        config: &SyncConfiguration,
        status: SyncRunStatus,
        state: RunState,
        successful_records: usize,
        failed_records: usize,
        operations: Option<Vec<SyncOperation>>,
    ) -> SyncRunResult {
        let result = SyncRunResult::from_status(
            status,
            state,
            successful_records,
            failed_records,
            operations,
        );

        self.registry.set_last_run_at(config.id, result.end_time).await;
        self.registry.complete_run(result.clone()).await;

        info!(
            run_id = %result.id,
            configuration = %config.name,
            state = %result.state,
            processed = result.processed_records,
            successful = result.successful_records,
            failed = result.failed_records,
            conflicts = result.conflicts.len(),
            duration_ms = result.duration_ms,
            "Sync run finished"
        );

        result
    }
}

impl std::fmt::Debug for SyncEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncEngine")
            .field("connectors", &self.connectors.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

fn timestamp_at(record: &Value, field: Option<&str>) -> Option<DateTime<Utc>> {
    let raw = get_path(record, field?)?.as_str()?;
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|ts| ts.with_timezone(&Utc))
}

fn record_label(record: &Value, config: &SyncConfiguration) -> String {
    config
        .key_mapping()
        .and_then(|m| key_string(get_path(record, &m.source_field)))
        .unwrap_or_else(|| "<unknown>".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_timestamp_parsing() {
        let record = json!({"modified_at": "2026-08-01T10:30:00Z"});
        let ts = timestamp_at(&record, Some("modified_at")).unwrap();
        assert_eq!(ts.to_rfc3339(), "2026-08-01T10:30:00+00:00");

        assert!(timestamp_at(&record, None).is_none());
        assert!(timestamp_at(&record, Some("missing")).is_none());
        assert!(timestamp_at(&json!({"modified_at": "not a date"}), Some("modified_at")).is_none());
    }

    #[test]
    fn test_run_options_builders() {
        let options = RunOptions::default().force().dry_run();
        assert!(options.force);
        assert!(options.dry_run);
    }
}
