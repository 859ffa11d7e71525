//! Structured graph queries over the symbol index

pub mod executor;
pub mod glob;
pub mod natural;
pub mod result_cache;
pub mod suggest;
pub mod validate;

use grove_core::{Language, Relationship, RelationshipType, Symbol, SymbolKind};
use serde::{Deserialize, Serialize};

pub use executor::{QueryEngine, cache_key};
pub use glob::GlobSet;
pub use natural::translate;
pub use result_cache::QueryResultCache;
pub use validate::{optimize, validate};

/// Hard ceiling on the number of results per page.
pub const MAX_LIMIT: i64 = 1000;
/// Traversal depth bounds.
pub const MIN_DEPTH: i64 = 1;
pub const MAX_DEPTH: i64 = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct GraphQuery {
    pub select: QuerySelect,
    #[serde(default, rename = "where", skip_serializing_if = "Option::is_none")]
    pub filter: Option<QueryFilter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub traverse: Option<Traversal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<i64>,
}

impl GraphQuery {
    /// Select symbols whose names match any of the glob patterns.
    pub fn symbols(patterns: impl IntoIterator<Item = impl Into<String>>) -> Self {
        GraphQuery {
            select: QuerySelect {
                symbols: Some(patterns.into_iter().map(Into::into).collect()),
                relationships: None,
            },
            ..Default::default()
        }
    }

    pub fn with_relationships(mut self, types: impl IntoIterator<Item = RelationshipType>) -> Self {
        self.select.relationships = Some(types.into_iter().collect());
        self
    }

    pub fn with_filter(mut self, filter: QueryFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn with_traversal(mut self, traversal: Traversal) -> Self {
        self.traverse = Some(traversal);
        self
    }

    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_offset(mut self, offset: i64) -> Self {
        self.offset = Some(offset);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct QuerySelect {
    /// Name glob patterns; `*` is the only wildcard.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symbols: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relationships: Option<Vec<RelationshipType>>,
}

/// Conjunction of symbol predicates. Unset fields match everything.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct QueryFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kinds: Option<Vec<SymbolKind>>,
    /// Name glob
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Substring of the file identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_exported: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_deprecated: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_static: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_abstract: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<Language>,
    /// Container name glob
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container: Option<String>,
    /// Every listed tag must be present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include_tests: Option<bool>,
}

impl QueryFilter {
    pub fn kinds(kinds: impl IntoIterator<Item = SymbolKind>) -> Self {
        QueryFilter {
            kinds: Some(kinds.into_iter().collect()),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == QueryFilter::default()
    }

    /// Whether `symbol` satisfies every specified sub-condition.
    pub fn matches(&self, symbol: &Symbol) -> bool {
        if let Some(kinds) = &self.kinds {
            if !kinds.contains(&symbol.kind) {
                return false;
            }
        }
        if let Some(name) = &self.name {
            if !GlobSet::new([name.as_str()]).is_match(&symbol.name) {
                return false;
            }
        }
        if let Some(path) = &self.path {
            if !symbol.location.uri.contains(path.as_str()) {
                return false;
            }
        }
        let flags = [
            (self.is_exported, symbol.metadata.is_exported),
            (self.is_deprecated, symbol.metadata.is_deprecated),
            (self.is_static, symbol.metadata.is_static),
            (self.is_abstract, symbol.metadata.is_abstract),
        ];
        if flags.iter().any(|(want, have)| want.is_some_and(|w| w != *have)) {
            return false;
        }
        if let Some(language) = self.language {
            if symbol.language != language {
                return false;
            }
        }
        if let Some(container) = &self.container {
            match &symbol.container_name {
                Some(actual) if GlobSet::new([container.as_str()]).is_match(actual) => {}
                _ => return false,
            }
        }
        if let Some(tags) = &self.tags {
            if !tags.iter().all(|t| symbol.metadata.tags.contains(t)) {
                return false;
            }
        }
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TraversalDirection {
    Incoming,
    #[default]
    Outgoing,
    Both,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Traversal {
    pub depth: i64,
    #[serde(default)]
    pub direction: TraversalDirection,
    /// Only follow these relationship types. Unset follows all.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relationship_types: Option<Vec<RelationshipType>>,
}

impl Traversal {
    pub fn new(depth: i64, direction: TraversalDirection) -> Self {
        Traversal {
            depth,
            direction,
            relationship_types: None,
        }
    }

    pub fn over(mut self, types: impl IntoIterator<Item = RelationshipType>) -> Self {
        self.relationship_types = Some(types.into_iter().collect());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct QueryResult {
    pub symbols: Vec<Symbol>,
    pub relationships: Vec<Relationship>,
    /// `symbols.len() + relationships.len()`, not a distinct count.
    pub total: usize,
    pub execution_time_ms: f64,
    #[serde(default)]
    pub from_cache: bool,
}

impl QueryResult {
    pub fn new(symbols: Vec<Symbol>, relationships: Vec<Relationship>) -> Self {
        let total = symbols.len() + relationships.len();
        QueryResult {
            symbols,
            relationships,
            total,
            execution_time_ms: 0.0,
            from_cache: false,
        }
    }

    /// Files the returned symbols live in, sorted and deduplicated.
    pub fn files(&self) -> Vec<String> {
        let mut files: Vec<String> = self.symbols.iter().map(|s| s.location.uri.clone()).collect();
        files.sort();
        files.dedup();
        files
    }
}
