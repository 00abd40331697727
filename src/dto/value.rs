use std::fmt;

use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

use super::error::DtoError;
use super::schema::DtoSchema;
use super::source::Source;

/// Immutable attribute bag materialized from one source snapshot.
/// Keys are the registered names, punctuation included (`administrator?`).
#[derive(Clone, PartialEq)]
pub struct Dto {
    name: String,
    values: Map<String, Value>,
}

impl Dto {
    pub(crate) fn new(name: String, values: Map<String, Value>) -> Self {
        Self { name, values }
    }

    /// DTO type name
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// Attribute value, `null` when the name is not registered
    pub fn value(&self, name: &str) -> Value {
        self.get(name).cloned().unwrap_or(Value::Null)
    }

    pub fn str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Value::as_str)
    }

    pub fn i64(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(Value::as_i64)
    }

    pub fn bool(&self, name: &str) -> Option<bool> {
        self.get(name).and_then(Value::as_bool)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn to_map(&self) -> Map<String, Value> {
        self.values.clone()
    }

    /// JSON text of `to_map()`
    pub fn to_serialized(&self) -> String {
        Value::Object(self.values.clone()).to_string()
    }
}

impl Serialize for Dto {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.values.serialize(serializer)
    }
}

/// `AccountDto { id: 1, email: "a@b.com" }`
impl fmt::Debug for Dto {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {{", self.name)?;
        for (i, (name, value)) in self.values.iter().enumerate() {
            let sep = if i == 0 { " " } else { ", " };
            write!(f, "{}{}: {}", sep, name, value)?;
        }
        if self.values.is_empty() {
            f.write_str("}")
        } else {
            f.write_str(" }")
        }
    }
}

impl fmt::Display for Dto {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Reads through a DTO answer its registered attributes
impl Source for Dto {
    fn attribute(&self, name: &str) -> Option<Value> {
        self.get(name).cloned()
    }
}

/// A typed DTO: a newtype over `Dto` with its own `'static` schema.
///
/// ```ignore
/// static SCHEMA: Lazy<DtoSchema> = Lazy::new(|| DtoSchema::new("TagDto").attribute("id"));
/// ```
pub trait DataTransferObject: Sized + Send + Sync + 'static {
    fn schema() -> &'static DtoSchema;

    fn from_dto(dto: Dto) -> Self;

    fn as_dto(&self) -> &Dto;

    fn build(source: &dyn Source) -> Result<Self, DtoError> {
        Self::schema().materialize(source).map(Self::from_dto)
    }

    fn id(&self) -> Option<i64> {
        self.as_dto().i64("id")
    }

    fn to_map(&self) -> Map<String, Value> {
        self.as_dto().to_map()
    }

    fn to_serialized(&self) -> String {
        self.as_dto().to_serialized()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn dto() -> Dto {
        let mut values = Map::new();
        values.insert("id".into(), json!(1));
        values.insert("email".into(), json!("a@b.com"));
        values.insert("administrator?".into(), json!(true));
        Dto::new("AccountDto".into(), values)
    }

    #[test]
    fn debug_lists_assignments_in_order() {
        assert_eq!(
            format!("{:?}", dto()),
            "AccountDto { id: 1, email: \"a@b.com\", administrator?: true }"
        );
        assert_eq!(format!("{:?}", Dto::new("Empty".into(), Map::new())), "Empty {}");
    }

    #[test]
    fn serializes_registered_names_in_order() {
        assert_eq!(dto().to_serialized(), r#"{"id":1,"email":"a@b.com","administrator?":true}"#);
        assert_eq!(serde_json::to_value(dto()).unwrap(), json!({ "id": 1, "email": "a@b.com", "administrator?": true }));
    }

    #[test]
    fn readers_use_original_names() {
        let dto = dto();
        assert_eq!(dto.bool("administrator?"), Some(true));
        assert_eq!(dto.bool("administrator"), None);
        assert_eq!(dto.i64("id"), Some(1));
        assert_eq!(dto.value("nope"), Value::Null);
    }
}
