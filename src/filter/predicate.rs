use serde_json::{json, Map, Value};

use super::error::FilterError;
use super::filter::validate_identifier;

/// Exact-equality AND-conjunction over named fields, e.g. `role = 'guest' AND active = true`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Predicate {
    fields: Map<String, Value>,
}

impl Predicate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a predicate with one field
    pub fn by(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new().and(field, value)
    }

    pub fn and(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(field.into(), value.into());
        self
    }

    /// Build from a JSON object of `field: scalar` pairs
    pub fn from_json(value: Value) -> Result<Self, FilterError> {
        match value {
            Value::Object(fields) => {
                let predicate = Self { fields };
                predicate.validate()?;
                Ok(predicate)
            }
            other => Err(FilterError::InvalidWhereClause(format!("predicate must be an object, got {}", other))),
        }
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Keys must be plain column names and values scalars (or null)
    pub fn validate(&self) -> Result<(), FilterError> {
        for (field, value) in &self.fields {
            validate_identifier(field).map_err(FilterError::InvalidColumn)?;
            if value.is_array() || value.is_object() {
                return Err(FilterError::InvalidOperatorData(format!(
                    "predicate value for '{}' must be a scalar",
                    field
                )));
            }
        }
        Ok(())
    }

    /// Where-clause form with explicit `$eq` so values are never read as operators
    pub fn to_where(&self) -> Value {
        let clauses: Map<String, Value> = self
            .fields
            .iter()
            .map(|(field, value)| (field.clone(), json!({ "$eq": value })))
            .collect();
        Value::Object(clauses)
    }
}

impl From<Map<String, Value>> for Predicate {
    fn from(fields: Map<String, Value>) -> Self {
        Self { fields }
    }
}
