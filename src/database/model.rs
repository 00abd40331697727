use serde_json::{Map, Value};

use super::record::SYSTEM_FIELDS;
use super::validation::{ValidationErrors, Validations};

/// Table definition a store is bound to: name, known columns, timestamp
/// handling and validation rules.
#[derive(Debug, Clone)]
pub struct Model {
    table: String,
    columns: Vec<String>,
    timestamps: bool,
    validations: Validations,
}

impl Model {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            columns: Vec::new(),
            timestamps: true,
            validations: Validations::default(),
        }
    }

    /// Declare the user columns. When none are declared any column is accepted.
    pub fn columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Rows carry no `created_at`/`updated_at`
    pub fn without_timestamps(mut self) -> Self {
        self.timestamps = false;
        self
    }

    pub fn validations(mut self, validations: Validations) -> Self {
        self.validations = validations;
        self
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn has_timestamps(&self) -> bool {
        self.timestamps
    }

    pub fn rules(&self) -> &Validations {
        &self.validations
    }

    pub fn has_column(&self, column: &str) -> bool {
        if self.columns.is_empty() || column == "id" {
            return true;
        }
        if self.timestamps && SYSTEM_FIELDS.contains(&column) {
            return true;
        }
        self.columns.iter().any(|c| c == column)
    }

    /// First column not known to this model, if any
    pub fn unknown_column<'a, I>(&self, columns: I) -> Option<String>
    where
        I: IntoIterator<Item = &'a str>,
    {
        columns.into_iter().find(|c| !self.has_column(c)).map(str::to_string)
    }

    pub fn validate(&self, attributes: &Map<String, Value>, taken: &dyn Fn(&str, &Value) -> bool) -> Result<(), ValidationErrors> {
        self.validations.run(attributes, taken)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_columns_include_system_fields() {
        let model = Model::new("documents").columns(["title", "body"]);
        assert!(model.has_column("title"));
        assert!(model.has_column("id"));
        assert!(model.has_column("created_at"));
        assert_eq!(model.unknown_column(["title", "author"]), Some("author".to_string()));
    }

    #[test]
    fn untimestamped_models_reject_timestamp_columns() {
        let model = Model::new("tags").columns(["name"]).without_timestamps();
        assert!(!model.has_column("created_at"));
        assert!(Model::new("anything").has_column("whatever"));
    }
}
