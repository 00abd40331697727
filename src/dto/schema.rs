use std::sync::Arc;

use serde_json::{Map, Value};

use super::descriptor::{is_valid_attribute_name, AttributeDescriptor, Derivation, TransformFn};
use super::error::DtoError;
use super::source::Source;
use super::value::Dto;

/// Ordered attribute registry for one DTO type.
///
/// Registration order is the order of `to_map`, serialization and debug
/// output. Registering a name twice replaces its derivation in place.
#[derive(Debug, Clone)]
pub struct DtoSchema {
    name: String,
    descriptors: Vec<AttributeDescriptor>,
    invalid: Vec<String>,
    strict: bool,
}

impl DtoSchema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            descriptors: Vec::new(),
            invalid: Vec::new(),
            strict: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Copy of this registry under another DTO name, to refine further
    pub fn extend(&self, name: impl Into<String>) -> Self {
        Self { name: name.into(), ..self.clone() }
    }

    pub fn register(&mut self, name: &str, transform: Option<TransformFn>) -> Result<(), DtoError> {
        let derivation = match transform {
            Some(transform) => Derivation::Transform(transform),
            None => Derivation::Read,
        };
        self.insert(name, derivation)
    }

    /// Plain read of `name`
    pub fn attribute(mut self, name: &str) -> Self {
        self.remember(name, Derivation::Read);
        self
    }

    /// Read of `name` passed through `transform`
    pub fn attribute_with<F>(mut self, name: &str, transform: F) -> Self
    where
        F: Fn(Value) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        self.remember(name, Derivation::Transform(Arc::new(transform)));
        self
    }

    /// Value derived from the whole source
    pub fn computed<F>(mut self, name: &str, compute: F) -> Self
    where
        F: Fn(&dyn Source) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        self.remember(name, Derivation::Computed(Arc::new(compute)));
        self
    }

    /// Fail unknown attributes instead of reading them as `null`
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn is_strict(&self) -> bool {
        self.strict || crate::config::CONFIG.dto.strict_attributes
    }

    pub fn descriptors(&self) -> &[AttributeDescriptor] {
        &self.descriptors
    }

    pub fn attribute_names(&self) -> impl Iterator<Item = &str> {
        self.descriptors.iter().map(AttributeDescriptor::name)
    }

    /// Reports the first invalid name given to a chaining builder
    pub fn validate(&self) -> Result<(), DtoError> {
        match self.invalid.first() {
            Some(name) => Err(DtoError::InvalidAttributeName(name.clone())),
            None => Ok(()),
        }
    }

    /// Build one immutable DTO from `source`. Any failure aborts the whole build.
    pub fn materialize(&self, source: &dyn Source) -> Result<Dto, DtoError> {
        self.validate()?;
        let strict = self.is_strict();

        let mut values = Map::new();
        for descriptor in &self.descriptors {
            let name = descriptor.name();
            let value = match descriptor.derivation() {
                Derivation::Computed(compute) => {
                    compute(source).map_err(|e| DtoError::transform(&self.name, name, e))?
                }
                Derivation::Read => self.read(source, name, strict)?,
                Derivation::Transform(transform) => {
                    let raw = self.read(source, name, strict)?;
                    transform(raw).map_err(|e| DtoError::transform(&self.name, name, e))?
                }
            };
            values.insert(name.to_string(), value);
        }
        Ok(Dto::new(self.name.clone(), values))
    }

    fn read(&self, source: &dyn Source, name: &str, strict: bool) -> Result<Value, DtoError> {
        match source.attribute(name).or_else(|| source.lookup(name)) {
            Some(value) => Ok(value),
            None if strict => Err(DtoError::UnknownAttribute {
                dto: self.name.clone(),
                attribute: name.to_string(),
            }),
            None => Ok(Value::Null),
        }
    }

    fn insert(&mut self, name: &str, derivation: Derivation) -> Result<(), DtoError> {
        if !is_valid_attribute_name(name) {
            return Err(DtoError::InvalidAttributeName(name.to_string()));
        }
        match self.descriptors.iter_mut().find(|d| d.name() == name) {
            Some(existing) => existing.set_derivation(derivation),
            None => self.descriptors.push(AttributeDescriptor::new(name, derivation)),
        }
        Ok(())
    }

    fn remember(&mut self, name: &str, derivation: Derivation) {
        if self.insert(name, derivation).is_err() {
            self.invalid.push(name.to_string());
        }
    }
}
