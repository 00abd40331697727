pub mod types;
pub mod filter;
pub mod filter_where;
pub mod filter_order;
pub mod predicate;
pub mod error;

pub use types::*;
pub use filter::Filter;
pub use predicate::Predicate;
pub use error::FilterError;
