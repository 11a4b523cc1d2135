//! Services: an in-memory registry, its query language and name resolution.

pub mod query;
mod registry;
mod resolver;

pub use query::{Query, QueryError};
pub use registry::LocalServiceRegistry;
pub use resolver::{SymbolResolver, TypeResolver};
