//! DTO-only gateways over backing stores

pub mod batch;
pub mod error;
pub mod gateway;

pub use batch::{BatchFailure, BatchOutcome};
pub use error::GatewayError;
pub use gateway::PublicApi;
