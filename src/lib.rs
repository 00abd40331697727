//! DTO / PublicApi boundary layer.
//!
//! Callers reach an entity only through its `PublicApi` gateway, which is
//! bound to one injected `Store` and one DTO type and hands back immutable
//! DTOs or plain values, never store records.

pub mod config;
pub mod database;
pub mod documents;
pub mod dto;
pub mod filter;
pub mod public_api;
pub mod services;
pub mod types;
pub mod user_management;

#[cfg(test)]
pub mod testing;

pub use dto::{DataTransferObject, Dto, DtoError, DtoSchema, Source};
pub use filter::Predicate;
pub use public_api::{BatchOutcome, GatewayError, PublicApi};
