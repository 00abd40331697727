pub mod manager;
pub mod memory;
pub mod model;
pub mod postgres;
pub mod query_builder;
pub mod record;
pub mod store;
pub mod validation;

pub use manager::{DatabaseError, DatabaseManager};
pub use memory::MemoryStore;
pub use model::Model;
pub use postgres::PgStore;
pub use query_builder::Query;
pub use record::{Record, RecordError};
pub use store::{Store, StoreError};
pub use validation::{ValidationErrors, Validations};
