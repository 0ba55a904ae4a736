//! Connector framework enums and status types.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The external business systems relay can connect to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SystemKind {
    /// Sales CRM (REST/OData).
    Crm,
    /// ERP (SOAP/OData).
    Erp,
    /// Document database.
    DocStore,
}

impl SystemKind {
    /// Convert to string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            SystemKind::Crm => "crm",
            SystemKind::Erp => "erp",
            SystemKind::DocStore => "doc_store",
        }
    }

    /// All known system kinds.
    #[must_use]
    pub fn all() -> [SystemKind; 3] {
        [SystemKind::Crm, SystemKind::Erp, SystemKind::DocStore]
    }
}

impl fmt::Display for SystemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for SystemKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "crm" => Ok(SystemKind::Crm),
            "erp" => Ok(SystemKind::Erp),
            "doc_store" | "docstore" => Ok(SystemKind::DocStore),
            _ => Err(format!("Unknown system kind: {s}")),
        }
    }
}
