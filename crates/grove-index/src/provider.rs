//! Collaborator seams: language analysis and scope-to-files resolution

use anyhow::Result;
use grove_core::{Location, Position, QueryScope};

use crate::schema::RawSymbol;

/// Source of raw symbol data for files.
///
/// Implementations wrap a language server, a parser, or an in-memory
/// fixture. Errors are per call; the index treats a failing file as
/// contributing nothing.
#[async_trait::async_trait]
pub trait AnalysisProvider: Send + Sync {
    /// Raw hierarchical symbol tree for a file.
    async fn document_symbols(&self, uri: &str) -> Result<Vec<RawSymbol>>;

    /// Full text of a file.
    async fn document_text(&self, uri: &str) -> Result<String>;

    /// Locations referencing the symbol at `position`.
    async fn references(&self, uri: &str, position: Position) -> Result<Vec<Location>>;

    async fn definition(&self, uri: &str, position: Position) -> Result<Vec<Location>>;

    async fn implementations(&self, uri: &str, position: Position) -> Result<Vec<Location>>;

    async fn type_definition(&self, uri: &str, position: Position) -> Result<Vec<Location>>;

    /// Identifier under the cursor, if any.
    async fn word_at(&self, uri: &str, position: Position) -> Result<Option<String>>;

    /// Release external resources. Awaited on engine disposal.
    async fn shutdown(&self) -> Result<()> {
        Ok(())
    }

    /// Provider name for logs
    fn name(&self) -> &str;
}

/// Enumerates the files belonging to a scope.
#[async_trait::async_trait]
pub trait ScopeResolver: Send + Sync {
    /// File identifiers for the scope. An empty list is a valid answer.
    async fn files_in_scope(&self, scope: &QueryScope) -> Result<Vec<String>>;
}

/// Resolver that knows no files. The index stays empty rather than failing.
pub struct EmptyScopeResolver;

#[async_trait::async_trait]
impl ScopeResolver for EmptyScopeResolver {
    async fn files_in_scope(&self, _scope: &QueryScope) -> Result<Vec<String>> {
        Ok(Vec::new())
    }
}
