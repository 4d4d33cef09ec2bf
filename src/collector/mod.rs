//! Custom query collection.
//!
//! The dispatcher fans a cycle's query definitions out to concurrent
//! executors; each executor streams rows through the mapper, which uses the
//! sanitizer to build metric names.

pub mod convert;
pub mod dispatcher;
pub mod executor;
pub mod mapper;
pub mod sanitize;

pub use dispatcher::QueryDispatcher;
pub use executor::{QueryExecutor, QueryStats};
pub use mapper::{map_row, MappedRow};
pub use sanitize::sanitize_name;
