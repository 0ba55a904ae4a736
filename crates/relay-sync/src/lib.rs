//! # Sync Engine
//!
//! Orchestrates data synchronization between business systems connected
//! through the `relay-connector` framework.
//!
//! A [`SyncConfiguration`] declares one job: a source system, one or more
//! target systems, ordered field mappings, and a conflict strategy. The
//! [`SyncEngine`] executes runs against it: fetch the source collection, map
//! each record, detect and resolve conflicts against the existing target
//! record, and write. The [`SyncRegistry`] tracks configurations, in-flight
//! runs, and a bounded history of results; the [`SyncScheduler`] launches
//! runs whose interval has elapsed.
//!
//! ## Crate Organization
//!
//! - [`config`] - Sync configurations, field mappings, conflict strategies
//! - [`mapper`] - Declarative field mapping with transforms
//! - [`conflict`] - Conflict detection and resolution
//! - [`engine`] - Run orchestration
//! - [`registry`] - Configuration store, active runs, run history
//! - [`scheduler`] - Interval scheduling
//! - [`status`] - In-flight run status
//! - [`result`] - Terminated run results and metrics
//! - [`operation`] - Planned write operations (dry-run output)
//! - [`error`] - Error types
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use relay_connector::prelude::*;
//! use relay_sync::prelude::*;
//! use serde_json::json;
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let crm = InMemoryConnector::new(SystemKind::Crm, "crm", "id")
//!     .with_records([json!({"id": "A1", "name": "Acme"})])
//!     .await;
//! let erp = InMemoryConnector::new(SystemKind::Erp, "erp", "No");
//!
//! let registry = Arc::new(SyncRegistry::new());
//! let engine = SyncEngine::new(Arc::clone(&registry))
//!     .with_connector(Arc::new(crm))
//!     .with_connector(Arc::new(erp));
//!
//! let config = registry
//!     .upsert(
//!         SyncConfiguration::new("customers", SystemKind::Crm, vec![SystemKind::Erp])
//!             .with_mapping(FieldMapping::new("id", "No").required())
//!             .with_mapping(FieldMapping::new("name", "Name")),
//!     )
//!     .await;
//!
//! let result = engine.run(config.id, RunOptions::default()).await?;
//! assert_eq!(result.state, RunState::Completed);
//! # Ok::<(), relay_sync::SyncError>(())
//! # }).unwrap();
//! ```

pub mod config;
pub mod conflict;
pub mod engine;
pub mod error;
pub mod mapper;
pub mod operation;
pub mod registry;
pub mod result;
pub mod scheduler;
pub mod status;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::config::{
        ConflictStrategy, FieldMapping, FieldTransform, Schedule, SyncConfiguration,
    };
    pub use crate::conflict::{
        detect_conflicts, resolve_conflicts, ConflictResolution, SyncConflict,
    };
    pub use crate::engine::{RunOptions, SyncEngine};
    pub use crate::error::{SyncError, SyncResult};
    pub use crate::mapper::{FieldMapper, TransformFn};
    pub use crate::operation::{OperationType, SyncOperation};
    pub use crate::registry::SyncRegistry;
    pub use crate::result::{RunMetrics, SyncRunResult};
    pub use crate::scheduler::SyncScheduler;
    pub use crate::status::{RunError, RunState, SyncRunStatus};
}

pub use config::{ConflictStrategy, FieldMapping, FieldTransform, Schedule, SyncConfiguration};
pub use conflict::{ConflictResolution, SyncConflict};
pub use engine::{RunOptions, SyncEngine};
pub use error::{SyncError, SyncResult};
pub use mapper::FieldMapper;
pub use operation::{OperationType, SyncOperation};
pub use registry::SyncRegistry;
pub use result::{RunMetrics, SyncRunResult};
pub use scheduler::SyncScheduler;
pub use status::{RunError, RunState, SyncRunStatus};
