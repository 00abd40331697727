//! Declarative data-transfer objects: an ordered attribute registry per DTO
//! type and the materializer that projects any `Source` through it.

pub mod descriptor;
pub mod error;
pub mod schema;
pub mod source;
pub mod value;

pub use descriptor::{AttributeDescriptor, ComputeFn, Derivation, TransformFn};
pub use error::DtoError;
pub use schema::DtoSchema;
pub use source::{read, truthy, Source};
pub use value::{DataTransferObject, Dto};
