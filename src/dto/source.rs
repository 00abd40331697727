use std::collections::HashMap;

use serde_json::{Map, Value};

use crate::database::record::Record;

/// Anything a DTO can be materialized from.
///
/// `attribute` is the object-style read (a field or a zero-argument method);
/// `lookup` is the map-style read by key. `None` means the source does not
/// respond to that name, which is different from answering `null`.
pub trait Source {
    fn attribute(&self, _name: &str) -> Option<Value> {
        None
    }

    fn lookup(&self, _key: &str) -> Option<Value> {
        None
    }
}

impl Source for Map<String, Value> {
    fn lookup(&self, key: &str) -> Option<Value> {
        self.get(key).cloned()
    }
}

impl Source for HashMap<String, Value> {
    fn lookup(&self, key: &str) -> Option<Value> {
        self.get(key).cloned()
    }
}

impl Source for Value {
    fn lookup(&self, key: &str) -> Option<Value> {
        self.as_object().and_then(|map| map.get(key).cloned())
    }
}

/// Rows answer every column, and `column?` with the truthiness of `column`
impl Source for Record {
    fn attribute(&self, name: &str) -> Option<Value> {
        match name.strip_suffix('?') {
            Some(column) => self.get(column).map(|value| Value::Bool(truthy(value))),
            None => self.get(name).cloned(),
        }
    }
}

impl<S: Source + ?Sized> Source for &S {
    fn attribute(&self, name: &str) -> Option<Value> {
        (**self).attribute(name)
    }

    fn lookup(&self, key: &str) -> Option<Value> {
        (**self).lookup(key)
    }
}

/// Object-style read, then map lookup, then `null`
pub fn read(source: &dyn Source, name: &str) -> Value {
    source.attribute(name).or_else(|| source.lookup(name)).unwrap_or(Value::Null)
}

/// Attribute-query truthiness: null, false, zero and blank strings are false
pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.trim().is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}
