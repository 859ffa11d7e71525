//! Symbol indexing and graph queries

pub mod index;
pub mod memory;
pub mod provider;
pub mod query;
pub mod relationships;
pub mod schema;
pub mod syntax;
pub mod workspace;

#[cfg(test)]
mod tests;

pub use index::{FileEntry, IndexSummary, SymbolIndex};
pub use memory::InMemoryProvider;
pub use provider::{AnalysisProvider, EmptyScopeResolver, ScopeResolver};
pub use query::{GraphQuery, QueryEngine, QueryFilter, QueryResult, QuerySelect, Traversal, TraversalDirection};
pub use schema::{RawKind, RawSymbol};
pub use syntax::TreeSitterProvider;
pub use workspace::WorkspaceScopeResolver;
