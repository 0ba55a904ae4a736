//! In-process registry of configurations, active runs, and run history.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use relay_connector::{ConfigurationId, RunId};
use tokio::sync::{Mutex, RwLock};

use crate::config::SyncConfiguration;
use crate::result::SyncRunResult;
use crate::status::SyncRunStatus;

/// Default bound on retained run results.
pub const DEFAULT_HISTORY_LIMIT: usize = 100;

struct ActiveRun {
    status: SyncRunStatus,
    cancel: Arc<AtomicBool>,
}

/// Shared registry backing the sync engine.
///
/// Holds the configuration table, the table of in-flight runs, and a bounded
/// history of completed runs. Configurations are replaced whole on update; a
/// running sync keeps the snapshot it started with and is unaffected by a
/// concurrent replace. History is kept most recent first and evicts the
/// oldest entries once the bound is reached.
pub struct SyncRegistry {
    configurations: RwLock<HashMap<ConfigurationId, SyncConfiguration>>,
    active: RwLock<HashMap<RunId, ActiveRun>>,
    history: Mutex<VecDeque<SyncRunResult>>,
    history_limit: usize,
}

impl SyncRegistry {
    /// Create an empty registry with the default history bound.
    #[must_use]
    pub fn new() -> Self {
        Self::with_history_limit(DEFAULT_HISTORY_LIMIT)
    }

    /// Create an empty registry retaining at most `history_limit` results.
    #[must_use]
    pub fn with_history_limit(history_limit: usize) -> Self {
        Self {
            configurations: RwLock::new(HashMap::new()),
            active: RwLock::new(HashMap::new()),
            history: Mutex::new(VecDeque::new()),
            history_limit,
        }
    }

    /// Insert or replace a configuration, bumping `updated_at`.
    ///
    /// Replacement is whole-object; there is no field-level patching.
    pub async fn upsert(&self, mut configuration: SyncConfiguration) -> SyncConfiguration {
        configuration.updated_at = Utc::now();
        let mut table = self.configurations.write().await;
        table.insert(configuration.id, configuration.clone());
        configuration
    }

    /// Look up a configuration by ID.
    pub async fn get(&self, id: ConfigurationId) -> Option<SyncConfiguration> {
        self.configurations.read().await.get(&id).cloned()
    }

    /// List all configurations, ordered by creation time.
    pub async fn list(&self) -> Vec<SyncConfiguration> {
        let mut configurations: Vec<_> =
            self.configurations.read().await.values().cloned().collect();
        configurations.sort_by_key(|c| c.created_at);
        configurations
    }

    /// Remove a configuration. Returns the removed entry, if any.
    pub async fn remove(&self, id: ConfigurationId) -> Option<SyncConfiguration> {
        self.configurations.write().await.remove(&id)
    }

    /// Stamp a configuration's `last_run_at` after a run terminates.
    pub async fn set_last_run_at(&self, id: ConfigurationId, at: DateTime<Utc>) {
        let mut table = self.configurations.write().await;
        if let Some(configuration) = table.get_mut(&id) {
            configuration.last_run_at = Some(at);
        }
    }

    /// Register a starting run and hand out its cancellation flag.
    pub async fn register_run(&self, status: SyncRunStatus) -> Arc<AtomicBool> {
        let cancel = Arc::new(AtomicBool::new(false));
        let mut active = self.active.write().await;
        active.insert(
            status.id,
            ActiveRun {
                status,
                cancel: Arc::clone(&cancel),
            },
        );
        cancel
    }

    /// Publish a fresh status snapshot for an in-flight run.
    pub async fn update_run(&self, status: SyncRunStatus) {
        let mut active = self.active.write().await;
        if let Some(run) = active.get_mut(&status.id) {
            run.status = status;
        }
    }

    /// Snapshot the status of an in-flight run.
    pub async fn get_run(&self, id: RunId) -> Option<SyncRunStatus> {
        self.active.read().await.get(&id).map(|r| r.status.clone())
    }

    /// Snapshot all in-flight runs.
    pub async fn list_active_runs(&self) -> Vec<SyncRunStatus> {
        let mut runs: Vec<_> = self
            .active
            .read()
            .await
            .values()
            .map(|r| r.status.clone())
            .collect();
        runs.sort_by_key(|s| s.start_time);
        runs
    }

    /// Check whether a configuration has an in-flight run.
    pub async fn has_active_run(&self, configuration_id: ConfigurationId) -> bool {
        self.active
            .read()
            .await
            .values()
            .any(|r| r.status.configuration_id == configuration_id)
    }

    /// Request cooperative cancellation of an in-flight run.
    ///
    /// Returns `false` when the run is unknown or already terminated. The run
    /// itself observes the flag between records and winds down.
    pub async fn cancel(&self, id: RunId) -> bool {
        match self.active.read().await.get(&id) {
            Some(run) => {
                run.cancel.store(true, Ordering::SeqCst);
                true
            }
            None => false,
        }
    }

    /// Fold a terminated run into history and drop it from the active table.
    pub async fn complete_run(&self, result: SyncRunResult) {
        self.active.write().await.remove(&result.id);

        let mut history = self.history.lock().await;
        history.push_front(result);
        history.truncate(self.history_limit);
    }

    /// Retained run results, most recent first, optionally limited.
    pub async fn get_history(&self, limit: Option<usize>) -> Vec<SyncRunResult> {
        self.history
            .lock()
            .await
            .iter()
            .take(limit.unwrap_or(usize::MAX))
            .cloned()
            .collect()
    }

    /// Retained run results for one configuration, most recent first,
    /// optionally limited.
    pub async fn history_for(
        &self,
        configuration_id: ConfigurationId,
        limit: Option<usize>,
    ) -> Vec<SyncRunResult> {
        self.history
            .lock()
            .await
            .iter()
            .filter(|r| r.configuration_id == configuration_id)
            .take(limit.unwrap_or(usize::MAX))
            .cloned()
            .collect()
    }
}

impl Default for SyncRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SyncRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncRegistry")
            .field("history_limit", &self.history_limit)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FieldMapping;
    use crate::status::RunState;
    use relay_connector::SystemKind;

    fn configuration() -> SyncConfiguration {
        SyncConfiguration::new("customers", SystemKind::Crm, vec![SystemKind::Erp])
            .with_mapping(FieldMapping::new("id", "No").required())
    }

    fn completed_result(configuration_id: ConfigurationId) -> SyncRunResult {
        let status = SyncRunStatus::new(RunId::new(), configuration_id);
        SyncRunResult::from_status(status, RunState::Completed, 0, 0, None)
    }

    #[tokio::test]
    async fn test_upsert_bumps_updated_at() {
        let registry = SyncRegistry::new();
        let config = configuration();
        let before = config.updated_at;

        tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        let stored = registry.upsert(config).await;
        assert!(stored.updated_at > before);

        let fetched = registry.get(stored.id).await.unwrap();
        assert_eq!(fetched.name, "customers");
    }

    #[tokio::test]
    async fn test_upsert_replaces_whole_object() {
        let registry = SyncRegistry::new();
        let mut config = registry.upsert(configuration()).await;

        config.name = "customers-v2".to_string();
        config.field_mappings.push(FieldMapping::new("name", "Name"));
        registry.upsert(config.clone()).await;

        let fetched = registry.get(config.id).await.unwrap();
        assert_eq!(fetched.name, "customers-v2");
        assert_eq!(fetched.field_mappings.len(), 2);
        assert_eq!(registry.list().await.len(), 1);
    }

    #[tokio::test]
    async fn test_remove() {
        let registry = SyncRegistry::new();
        let config = registry.upsert(configuration()).await;

        assert!(registry.remove(config.id).await.is_some());
        assert!(registry.get(config.id).await.is_none());
        assert!(registry.remove(config.id).await.is_none());
    }

    #[tokio::test]
    async fn test_active_run_lifecycle() {
        let registry = SyncRegistry::new();
        let configuration_id = ConfigurationId::new();
        let status = SyncRunStatus::new(RunId::new(), configuration_id);
        let run_id = status.id;

        registry.register_run(status.clone()).await;
        assert!(registry.has_active_run(configuration_id).await);
        assert_eq!(registry.list_active_runs().await.len(), 1);

        let mut updated = status;
        updated.set_total(10);
        registry.update_run(updated).await;
        assert_eq!(registry.get_run(run_id).await.unwrap().total_records, 10);

        let result = completed_result(configuration_id);
        let result = SyncRunResult { id: run_id, ..result };
        registry.complete_run(result).await;

        assert!(!registry.has_active_run(configuration_id).await);
        assert!(registry.get_run(run_id).await.is_none());
        assert_eq!(registry.get_history(None).await.len(), 1);
    }

    #[tokio::test]
    async fn test_cancel_unknown_run_returns_false() {
        let registry = SyncRegistry::new();
        assert!(!registry.cancel(RunId::new()).await);
    }

    #[tokio::test]
    async fn test_cancel_sets_shared_flag() {
        let registry = SyncRegistry::new();
        let status = SyncRunStatus::new(RunId::new(), ConfigurationId::new());
        let run_id = status.id;

        let flag = registry.register_run(status).await;
        assert!(!flag.load(Ordering::SeqCst));
        assert!(registry.cancel(run_id).await);
        assert!(flag.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_history_bound_evicts_oldest_and_keeps_newest_first() {
        let registry = SyncRegistry::with_history_limit(3);
        let configuration_id = ConfigurationId::new();

        let mut ids = Vec::new();
        for _ in 0..5 {
            let result = completed_result(configuration_id);
            ids.push(result.id);
            registry.complete_run(result).await;
        }

        let history = registry.get_history(None).await;
        assert_eq!(history.len(), 3);
        let kept: Vec<_> = history.iter().map(|r| r.id).collect();
        assert_eq!(kept, vec![ids[4], ids[3], ids[2]]);

        let limited = registry.get_history(Some(1)).await;
        assert_eq!(limited.len(), 1);
        assert_eq!(limited[0].id, ids[4]);
    }

    #[tokio::test]
    async fn test_history_for_filters_by_configuration() {
        let registry = SyncRegistry::new();
        let first = ConfigurationId::new();
        let second = ConfigurationId::new();

        registry.complete_run(completed_result(first)).await;
        registry.complete_run(completed_result(second)).await;
        registry.complete_run(completed_result(first)).await;

        assert_eq!(registry.history_for(first, None).await.len(), 2);
        assert_eq!(registry.history_for(first, Some(1)).await.len(), 1);
        assert_eq!(registry.history_for(second, None).await.len(), 1);
        assert!(registry
            .history_for(ConfigurationId::new(), None)
            .await
            .is_empty());
    }
}
