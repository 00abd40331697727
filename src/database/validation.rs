use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use serde_json::{Map, Value};

/// Field-level validation messages, e.g. `first_name => ["can't be blank"]`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationErrors {
    errors: BTreeMap<String, Vec<String>>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.entry(field.into()).or_default().push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn contains(&self, field: &str) -> bool {
        self.errors.contains_key(field)
    }

    /// Messages for one field
    pub fn on(&self, field: &str) -> &[String] {
        self.errors.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.errors.keys().map(String::as_str)
    }

    /// `"<field> <message>"` per message; `base` messages stand alone
    pub fn full_messages(&self) -> Vec<String> {
        self.errors
            .iter()
            .flat_map(|(field, messages)| {
                messages.iter().map(move |message| {
                    if field == "base" { message.clone() } else { format!("{} {}", field, message) }
                })
            })
            .collect()
    }

    pub fn into_result(self) -> Result<(), Self> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

impl std::fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.full_messages().join(", "))
    }
}

impl std::error::Error for ValidationErrors {}

pub type Check = Arc<dyn Fn(&Value) -> Result<(), String> + Send + Sync>;

#[derive(Clone)]
enum Rule {
    Presence(String),
    Uniqueness(String),
    Custom { field: String, check: Check },
}

impl std::fmt::Debug for Rule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Rule::Presence(field) => write!(f, "presence_of({})", field),
            Rule::Uniqueness(field) => write!(f, "uniqueness_of({})", field),
            Rule::Custom { field, .. } => write!(f, "custom({})", field),
        }
    }
}

/// Declarative per-table validation rules, run by stores on insert and update
#[derive(Debug, Clone, Default)]
pub struct Validations {
    rules: Vec<Rule>,
}

impl Validations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Value must be present, non-null and not a blank string
    pub fn presence_of(mut self, field: impl Into<String>) -> Self {
        self.rules.push(Rule::Presence(field.into()));
        self
    }

    /// No other row may hold the same non-null value
    pub fn uniqueness_of(mut self, field: impl Into<String>) -> Self {
        self.rules.push(Rule::Uniqueness(field.into()));
        self
    }

    /// Runs `check` on non-null values; `Err(message)` fails the field
    pub fn custom<F>(mut self, field: impl Into<String>, check: F) -> Self
    where
        F: Fn(&Value) -> Result<(), String> + Send + Sync + 'static,
    {
        self.rules.push(Rule::Custom { field: field.into(), check: Arc::new(check) });
        self
    }

    pub fn unique_fields(&self) -> impl Iterator<Item = &str> {
        self.rules.iter().filter_map(|rule| match rule {
            Rule::Uniqueness(field) => Some(field.as_str()),
            _ => None,
        })
    }

    /// Validate the complete attribute set a row would have after the write.
    /// `taken(field, value)` answers whether another row already holds `value`.
    pub fn run(&self, attributes: &Map<String, Value>, taken: &dyn Fn(&str, &Value) -> bool) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        for rule in &self.rules {
            match rule {
                Rule::Presence(field) => {
                    if is_blank(attributes.get(field)) {
                        errors.add(field.clone(), "can't be blank");
                    }
                }
                Rule::Uniqueness(field) => match attributes.get(field) {
                    Some(value) if !value.is_null() && taken(field, value) => {
                        errors.add(field.clone(), "has already been taken");
                    }
                    _ => {}
                },
                Rule::Custom { field, check } => match attributes.get(field) {
                    Some(value) if !value.is_null() => {
                        if let Err(message) = check(value) {
                            errors.add(field.clone(), message);
                        }
                    }
                    _ => {}
                },
            }
        }
        errors.into_result()
    }
}

fn is_blank(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.trim().is_empty(),
        Some(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn attrs(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    fn rules() -> Validations {
        Validations::new()
            .presence_of("first_name")
            .uniqueness_of("email")
            .custom("email", |v| match v.as_str() {
                Some(s) if s.contains('@') => Ok(()),
                _ => Err("is invalid".to_string()),
            })
    }

    #[test]
    fn collects_every_failure() {
        let result = rules().run(&attrs(json!({ "first_name": "  ", "email": "nope" })), &|_, _| true);
        let errors = result.unwrap_err();
        assert_eq!(errors.on("first_name"), ["can't be blank"]);
        assert_eq!(errors.on("email"), ["has already been taken", "is invalid"]);
        assert_eq!(
            errors.to_string(),
            "email has already been taken, email is invalid, first_name can't be blank"
        );
    }

    #[test]
    fn passes_valid_attributes() {
        let result = rules().run(&attrs(json!({ "first_name": "Ada", "email": "ada@example.com" })), &|_, _| false);
        assert!(result.is_ok());
        assert_eq!(rules().unique_fields().collect::<Vec<_>>(), vec!["email"]);
    }

    #[test]
    fn null_values_skip_uniqueness_and_custom_checks() {
        let result = rules().run(&attrs(json!({ "first_name": "Ada", "email": null })), &|_, _| true);
        assert!(result.is_ok());
    }
}
