//! # Connector Framework
//!
//! Core abstractions for connecting the relay sync engine to external
//! business systems (CRM, ERP, document store).
//!
//! The engine depends only on the four-method [`Connector`] contract: fetch a
//! collection, fetch one record by key, create a record, update a record.
//! Wire protocols, authentication, and pagination are the concern of each
//! concrete adapter behind the trait.
//!
//! ## Crate Organization
//!
//! - [`types`] - System enums ([`SystemKind`])
//! - [`ids`] - Type-safe identifiers ([`ConfigurationId`], [`RunId`])
//! - [`error`] - Error types with transient/permanent classification
//! - [`traits`] - The connector capability contract
//! - [`record`] - Dot-path access over raw records (mapping boundary only)
//! - [`query`] - Collection fetch parameters
//! - [`resilience`] - Retry with exponential backoff
//! - [`memory`] - In-memory connector for tests and local development
//!
//! ## Example
//!
//! ```
//! use relay_connector::prelude::*;
//! use serde_json::json;
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let erp = InMemoryConnector::new(SystemKind::Erp, "erp", "No");
//! erp.create(json!({"No": "A1", "Name": "Acme"})).await?;
//!
//! let existing = erp.fetch_by_key("A1").await?;
//! assert!(existing.is_some());
//! # Ok::<(), ConnectorError>(())
//! # }).unwrap();
//! ```

pub mod error;
pub mod ids;
pub mod memory;
pub mod query;
pub mod record;
pub mod resilience;
pub mod traits;
pub mod types;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::error::{ConnectorError, ConnectorResult};
    pub use crate::ids::{ConfigurationId, RunId};
    pub use crate::memory::InMemoryConnector;
    pub use crate::query::RecordQuery;
    pub use crate::record::{get_path, key_string, set_path};
    pub use crate::resilience::{RetryConfig, RetryExecutor};
    pub use crate::traits::Connector;
    pub use crate::types::SystemKind;
}

pub use error::{ConnectorError, ConnectorResult};
pub use ids::{ConfigurationId, RunId};
pub use memory::InMemoryConnector;
pub use query::RecordQuery;
pub use resilience::{RetryConfig, RetryExecutor};
pub use traits::Connector;
pub use types::SystemKind;

// Re-export async_trait for connector implementors
pub use async_trait::async_trait;
