use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use super::source::Source;

/// Unary transform applied to the value read from the source
pub type TransformFn = Arc<dyn Fn(Value) -> anyhow::Result<Value> + Send + Sync>;

/// Derives a value from the whole source, for attributes no single read answers
pub type ComputeFn = Arc<dyn Fn(&dyn Source) -> anyhow::Result<Value> + Send + Sync>;

#[derive(Clone)]
pub enum Derivation {
    Read,
    Transform(TransformFn),
    Computed(ComputeFn),
}

impl fmt::Debug for Derivation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Derivation::Read => f.write_str("Read"),
            Derivation::Transform(_) => f.write_str("Transform"),
            Derivation::Computed(_) => f.write_str("Computed"),
        }
    }
}

/// One registered `(name, derivation)` pair
#[derive(Debug, Clone)]
pub struct AttributeDescriptor {
    name: String,
    derivation: Derivation,
}

impl AttributeDescriptor {
    pub fn new(name: impl Into<String>, derivation: Derivation) -> Self {
        Self { name: name.into(), derivation }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn derivation(&self) -> &Derivation {
        &self.derivation
    }

    pub(crate) fn set_derivation(&mut self, derivation: Derivation) {
        self.derivation = derivation;
    }
}

/// Identifier with at most one trailing `?` or `!`
pub fn is_valid_attribute_name(name: &str) -> bool {
    let base = name.strip_suffix(&['?', '!'][..]).unwrap_or(name);
    crate::filter::filter::validate_identifier(base).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_predicate_and_bang_suffixes() {
        assert!(is_valid_attribute_name("email"));
        assert!(is_valid_attribute_name("administrator?"));
        assert!(is_valid_attribute_name("reset!"));
        assert!(is_valid_attribute_name("_private"));
    }

    #[test]
    fn rejects_malformed_names() {
        assert!(!is_valid_attribute_name(""));
        assert!(!is_valid_attribute_name("?"));
        assert!(!is_valid_attribute_name("admin??"));
        assert!(!is_valid_attribute_name("full name"));
        assert!(!is_valid_attribute_name("1st"));
    }
}
