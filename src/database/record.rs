use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Value};

/// Columns owned by the store; callers cannot set them
pub const SYSTEM_FIELDS: &[&str] = &["id", "created_at", "updated_at"];

/// Errors that can occur while turning caller input into record attributes
#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    #[error("Invalid JSON format: {0}")]
    InvalidJson(String),
}

/// One stored row: the `id` column plus every other column, in column order
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    fields: Map<String, Value>,
}

impl Record {
    /// Create record from row data as read from a store (system fields included)
    pub fn from_row(fields: Map<String, Value>) -> Self {
        Self { fields }
    }

    /// Get record ID
    pub fn id(&self) -> Option<i64> {
        self.fields.get("id").and_then(Value::as_i64)
    }

    /// Get field value
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Get field value, `null` when the column is absent
    pub fn value(&self, key: &str) -> Value {
        self.fields.get(key).cloned().unwrap_or(Value::Null)
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.timestamp("created_at")
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.timestamp("updated_at")
    }

    fn timestamp(&self, key: &str) -> Option<DateTime<Utc>> {
        self.get(key)
            .and_then(|v| v.as_str())
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc))
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Set system field (stores only)
    pub fn set_system_field(&mut self, key: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// The subset of `attributes` whose value differs from the stored one
    pub fn changes(&self, attributes: &Map<String, Value>) -> Map<String, Value> {
        attributes
            .iter()
            .filter(|(key, value)| self.fields.get(key.as_str()) != Some(*value))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }

    /// Current fields overlaid with `attributes`, without touching the record
    pub fn merged(&self, attributes: &Map<String, Value>) -> Map<String, Value> {
        let mut merged = self.fields.clone();
        for (key, value) in attributes {
            merged.insert(key.clone(), value.clone());
        }
        merged
    }

    /// Apply attribute changes; returns whether anything changed
    pub fn apply_changes(&mut self, attributes: &Map<String, Value>) -> bool {
        let changes = self.changes(attributes);
        let changed = !changes.is_empty();
        for (key, value) in changes {
            self.fields.insert(key, value);
        }
        changed
    }
}

/// Turn caller input into attributes: must be a JSON object, and system
/// fields are dropped with a warning.
pub fn into_attributes(input: Value) -> Result<Map<String, Value>, RecordError> {
    match input {
        Value::Object(map) => Ok(sanitize_attributes(map)),
        _ => Err(RecordError::InvalidJson("Expected JSON object".to_string())),
    }
}

pub fn sanitize_attributes(mut attributes: Map<String, Value>) -> Map<String, Value> {
    for field in SYSTEM_FIELDS {
        if attributes.remove(*field).is_some() {
            tracing::warn!("Attempted to set system field '{}' - ignoring", field);
        }
    }
    attributes
}

/// Timestamp format shared by every store so ordering and equality agree
pub fn timestamp_string(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}
