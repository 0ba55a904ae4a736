//! Declarative field mapping from source records to target record shapes.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{Map, Value};

use relay_connector::record::{get_path, set_path};

use crate::config::{FieldMapping, FieldTransform};
use crate::error::{SyncError, SyncResult};

/// A caller-supplied pure transform of `(value, whole_source_record)`.
pub type TransformFn = Arc<dyn Fn(&Value, &Value) -> Value + Send + Sync>;

/// Applies a declarative field-to-field mapping to a source record.
///
/// Mapping is deterministic, performs no I/O, and mutates neither input:
/// identical inputs produce identical output on every call. Dot-path access
/// stays inside this boundary; downstream code works with the materialized
/// mapped record.
#[derive(Clone, Default)]
pub struct FieldMapper {
    custom: HashMap<String, TransformFn>,
}

impl FieldMapper {
    /// Create a mapper with no custom transforms registered.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a named custom transform function (builder style).
    #[must_use]
    pub fn with_transform(
        mut self,
        name: impl Into<String>,
        transform: impl Fn(&Value, &Value) -> Value + Send + Sync + 'static,
    ) -> Self {
        self.custom.insert(name.into(), Arc::new(transform));
        self
    }

    /// Check that every custom transform named by `mappings` is registered.
    pub fn validate_mappings(&self, mappings: &[FieldMapping]) -> SyncResult<()> {
        for mapping in mappings {
            if let FieldTransform::Custom { function } = &mapping.transformation {
                if !self.custom.contains_key(function) {
                    return Err(SyncError::configuration(format!(
                        "unknown custom transform function '{function}' for field '{}'",
                        mapping.target_field
                    )));
                }
            }
        }
        Ok(())
    }

    /// Apply `mappings` to `source`, producing a mapped record.
    ///
    /// A missing source path leaves the target field absent rather than
    /// writing a null. `Uppercase`/`Lowercase` only affect string values and
    /// pass non-strings through unchanged.
    pub fn apply(&self, source: &Value, mappings: &[FieldMapping]) -> SyncResult<Value> {
        let mut mapped = Value::Object(Map::new());

        for mapping in mappings {
            let Some(value) = get_path(source, &mapping.source_field) else {
                continue;
            };

            let transformed = match &mapping.transformation {
                FieldTransform::Direct => value.clone(),
                FieldTransform::Uppercase => case_transform(value, str::to_uppercase),
                FieldTransform::Lowercase => case_transform(value, str::to_lowercase),
                FieldTransform::Custom { function } => {
                    let transform = self.custom.get(function).ok_or_else(|| {
                        SyncError::configuration(format!(
                            "unknown custom transform function '{function}'"
                        ))
                    })?;
                    transform(value, source)
                }
            };

            set_path(&mut mapped, &mapping.target_field, transformed);
        }

        Ok(mapped)
    }
}

impl std::fmt::Debug for FieldMapper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldMapper")
            .field("custom", &self.custom.keys().collect::<Vec<_>>())
            .finish()
    }
}

fn case_transform(value: &Value, transform: impl Fn(&str) -> String) -> Value {
    match value {
        Value::String(s) => Value::String(transform(s)),
        other => other.clone(),
    }
}
