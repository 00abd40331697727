use thiserror::Error;

type Cause = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors raised while declaring or materializing a DTO
#[derive(Debug, Error)]
pub enum DtoError {
    /// A registered transform failed; nothing is materialized
    #[error("Transform failed for {dto}.{attribute}: {source}")]
    Transform {
        dto: String,
        attribute: String,
        #[source]
        source: Cause,
    },

    /// Strict mode only: the source answers neither a read nor a lookup
    #[error("Unknown attribute '{attribute}' for {dto}")]
    UnknownAttribute { dto: String, attribute: String },

    #[error("Invalid attribute name: '{0}'")]
    InvalidAttributeName(String),
}

impl DtoError {
    pub(crate) fn transform(dto: &str, attribute: &str, cause: anyhow::Error) -> Self {
        DtoError::Transform {
            dto: dto.to_string(),
            attribute: attribute.to_string(),
            source: cause.into(),
        }
    }

    /// Name of the attribute involved, if any
    pub fn attribute(&self) -> &str {
        match self {
            DtoError::Transform { attribute, .. } | DtoError::UnknownAttribute { attribute, .. } => attribute,
            DtoError::InvalidAttributeName(name) => name,
        }
    }
}
