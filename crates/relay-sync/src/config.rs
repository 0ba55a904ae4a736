//! Sync configuration entities.

use chrono::{DateTime, Duration, Utc};
use relay_connector::{ConfigurationId, RecordQuery, SystemKind};
use serde::{Deserialize, Serialize};

use crate::error::{SyncError, SyncResult};

/// Transformation applied to a mapped field value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FieldTransform {
    /// Pass the value through unchanged.
    #[default]
    Direct,
    /// Uppercase string values; non-strings pass through unchanged.
    Uppercase,
    /// Lowercase string values; non-strings pass through unchanged.
    Lowercase,
    /// Invoke a named caller-supplied pure function of (value, whole record).
    Custom {
        /// Name of the registered transform function.
        function: String,
    },
}

/// One field projection rule from a source record shape to a target shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldMapping {
    /// Dot-path into the source record.
    pub source_field: String,

    /// Dot-path into the target record.
    pub target_field: String,

    /// Transformation to apply.
    #[serde(default)]
    pub transformation: FieldTransform,

    /// Marks key fields. The first required mapping is the natural key for
    /// target lookups.
    #[serde(default)]
    pub required: bool,
}

impl FieldMapping {
    /// Create a direct mapping between two fields.
    pub fn new(source_field: impl Into<String>, target_field: impl Into<String>) -> Self {
        Self {
            source_field: source_field.into(),
            target_field: target_field.into(),
            transformation: FieldTransform::Direct,
            required: false,
        }
    }

    /// Set the transformation.
    #[must_use]
    pub fn with_transformation(mut self, transformation: FieldTransform) -> Self {
        self.transformation = transformation;
        self
    }

    /// Mark this mapping as required (key field).
    #[must_use]
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }
}

/// Conflict resolution strategy configured per sync job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictStrategy {
    /// The freshly mapped source value always wins.
    SourceWins,
    /// The existing target value always wins.
    TargetWins,
    /// The strictly newer timestamp's value wins; ties go to the source.
    NewestWins,
    /// Source value applied provisionally, conflict flagged for human review.
    Manual,
}

impl ConflictStrategy {
    /// Convert to string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ConflictStrategy::SourceWins => "source_wins",
            ConflictStrategy::TargetWins => "target_wins",
            ConflictStrategy::NewestWins => "newest_wins",
            ConflictStrategy::Manual => "manual",
        }
    }
}

impl std::fmt::Display for ConflictStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ConflictStrategy {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "source_wins" => Ok(ConflictStrategy::SourceWins),
            "target_wins" => Ok(ConflictStrategy::TargetWins),
            "newest_wins" => Ok(ConflictStrategy::NewestWins),
            "manual" => Ok(ConflictStrategy::Manual),
            _ => Err(SyncError::configuration(format!(
                "unknown conflict resolution strategy: {s}"
            ))),
        }
    }
}

/// Interval schedule for automatic runs. Absence means manual-only.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Schedule {
    /// Interval between runs in minutes.
    pub interval_minutes: u32,
    /// Whether scheduled runs are enabled.
    pub enabled: bool,
}

impl Schedule {
    /// Create an enabled schedule with the given interval.
    #[must_use]
    pub fn every_minutes(interval_minutes: u32) -> Self {
        Self {
            interval_minutes,
            enabled: true,
        }
    }

    /// Check whether a run is due at `now` given the last run time.
    #[must_use]
    pub fn is_due(&self, last_run_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
        if !self.enabled || self.interval_minutes == 0 {
            return false;
        }
        match last_run_at {
            None => true,
            Some(last) => now - last >= Duration::minutes(i64::from(self.interval_minutes)),
        }
    }
}

/// A named, durable description of one synchronization job.
///
/// Mutated only via whole-object replace through the registry; a run holds an
/// immutable snapshot for its lifetime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfiguration {
    /// Configuration ID.
    pub id: ConfigurationId,
    /// Human-readable name.
    pub name: String,
    /// System records are read from.
    pub source_system: SystemKind,
    /// Ordered targets records are written to. Never contains the source.
    pub target_systems: Vec<SystemKind>,
    /// Ordered field projection rules.
    pub field_mappings: Vec<FieldMapping>,
    /// Optional source query (filter, projection, page size).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<RecordQuery>,
    /// Interval schedule; `None` means manual-only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schedule: Option<Schedule>,
    /// Conflict resolution strategy.
    pub conflict_strategy: ConflictStrategy,
    /// Whether this configuration may run.
    pub enabled: bool,
    /// Source dot-path holding the record's last-modified timestamp.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_timestamp_field: Option<String>,
    /// Target dot-path holding the record's last-modified timestamp.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_timestamp_field: Option<String>,
    /// When the last run terminated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_run_at: Option<DateTime<Utc>>,
    /// When this configuration was created.
    pub created_at: DateTime<Utc>,
    /// When this configuration was last replaced.
    pub updated_at: DateTime<Utc>,
}

impl SyncConfiguration {
    /// Create a new enabled configuration with defaults.
    pub fn new(
        name: impl Into<String>,
        source_system: SystemKind,
        target_systems: Vec<SystemKind>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: ConfigurationId::new(),
            name: name.into(),
            source_system,
            target_systems,
            field_mappings: Vec::new(),
            query: None,
            schedule: None,
            conflict_strategy: ConflictStrategy::SourceWins,
            enabled: true,
            source_timestamp_field: None,
            target_timestamp_field: None,
            last_run_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Add a field mapping.
    #[must_use]
    pub fn with_mapping(mut self, mapping: FieldMapping) -> Self {
        self.field_mappings.push(mapping);
        self
    }

    /// Set the conflict strategy.
    #[must_use]
    pub fn with_strategy(mut self, strategy: ConflictStrategy) -> Self {
        self.conflict_strategy = strategy;
        self
    }

    /// Set the schedule.
    #[must_use]
    pub fn with_schedule(mut self, schedule: Schedule) -> Self {
        self.schedule = Some(schedule);
        self
    }

    /// Set the source query.
    #[must_use]
    pub fn with_query(mut self, query: RecordQuery) -> Self {
        self.query = Some(query);
        self
    }

    /// The natural key mapping: the first mapping marked `required`.
    #[must_use]
    pub fn key_mapping(&self) -> Option<&FieldMapping> {
        self.field_mappings.iter().find(|m| m.required)
    }

    /// Check whether a scheduled run is due at `now`.
    #[must_use]
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.enabled
            && self
                .schedule
                .map_or(false, |s| s.is_due(self.last_run_at, now))
    }

    /// Validate the configuration's structural invariants.
    pub fn validate(&self) -> SyncResult<()> {
        if self.target_systems.is_empty() {
            return Err(SyncError::configuration(
                "at least one target system is required",
            ));
        }
        if self.target_systems.contains(&self.source_system) {
            return Err(SyncError::configuration(format!(
                "target systems must not contain the source system '{}'",
                self.source_system
            )));
        }
        let mut seen = Vec::new();
        for target in &self.target_systems {
            if seen.contains(target) {
                return Err(SyncError::configuration(format!(
                    "duplicate target system '{target}'"
                )));
            }
            seen.push(*target);
        }
        if self.field_mappings.is_empty() {
            return Err(SyncError::configuration(
                "at least one field mapping is required",
            ));
        }
        if self.key_mapping().is_none() {
            return Err(SyncError::configuration(
                "at least one field mapping must be marked required (the natural key)",
            ));
        }
        Ok(())
    }
}
