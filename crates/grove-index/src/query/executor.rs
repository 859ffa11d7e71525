//! Query execution: matching, traversal, pagination and result caching

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use grove_core::config::QuerySettings;
use grove_core::{EventBus, GraphError, GraphEvent, GraphResult, IndexedSymbol, QueryScope, Relationship, Symbol};
use indexmap::IndexMap;
use tokio::sync::Mutex;

use super::natural::translate;
use super::suggest;
use super::{GlobSet, GraphQuery, QueryResult, QueryResultCache, Traversal, TraversalDirection, optimize, validate};
use crate::index::SymbolIndex;

/// Runs structured and natural-language queries against a [`SymbolIndex`].
pub struct QueryEngine {
    index: Arc<SymbolIndex>,
    cache: Mutex<QueryResultCache>,
    settings: QuerySettings,
    events: EventBus,
}

impl QueryEngine {
    pub fn new(index: Arc<SymbolIndex>, settings: QuerySettings, events: EventBus) -> Self {
        QueryEngine {
            index,
            cache: Mutex::new(QueryResultCache::new(settings.result_cache_capacity)),
            settings,
            events,
        }
    }

    pub fn index(&self) -> &Arc<SymbolIndex> {
        &self.index
    }

    /// Validate, normalise and run `query` over the files in `scope`.
    pub async fn execute_query(&self, query: &GraphQuery, scope: &QueryScope) -> GraphResult<QueryResult> {
        let start = Instant::now();
        let key = cache_key(query, scope)?;

        if let Some(mut cached) = self.cache.lock().await.get(&key) {
            cached.from_cache = true;
            cached.execution_time_ms = elapsed_ms(start);
            self.emit_executed(&cached);
            return Ok(cached);
        }

        let violations = validate(query);
        if !violations.is_empty() {
            return Err(GraphError::InvalidQuery { violations });
        }
        let query = optimize(query, self.settings.max_limit as i64);

        if self.index.is_empty().await {
            tracing::debug!("Index empty, building before query");
            self.index.build_index(scope).await?;
        }

        let mut result = self.run(&query, scope).await;
        result.execution_time_ms = elapsed_ms(start);
        tracing::debug!(
            "Query matched {} symbols and {} relationships in {:.1}ms",
            result.symbols.len(),
            result.relationships.len(),
            result.execution_time_ms
        );

        self.cache.lock().await.insert(key, result.clone());
        self.emit_executed(&result);
        Ok(result)
    }

    /// Translate free text into a structured query and run it.
    pub async fn execute_natural_language_query(&self, text: &str, scope: &QueryScope) -> GraphResult<QueryResult> {
        let query = translate(text);
        tracing::debug!("Translated '{}' into {:?}", text, query);
        self.execute_query(&query, scope).await
    }

    pub async fn query_suggestions(&self, partial: &str) -> Vec<String> {
        let names = self.index.symbol_names().await;
        suggest::query_suggestions(partial, &names)
    }

    pub async fn symbol_suggestions(&self, partial: &str) -> Vec<String> {
        let names = self.index.symbol_names().await;
        suggest::symbol_suggestions(partial, &names)
    }

    /// Empty the index and the result cache.
    pub async fn clear_index(&self) {
        self.index.clear().await;
        self.cache.lock().await.clear();
    }

    pub async fn clear_result_cache(&self) {
        self.cache.lock().await.clear();
    }

    /// Number of query results currently held in the result cache.
    pub async fn cached_results(&self) -> usize {
        self.cache.lock().await.len()
    }

    async fn run(&self, query: &GraphQuery, scope: &QueryScope) -> QueryResult {
        let include_tests = query
            .filter
            .as_ref()
            .and_then(|f| f.include_tests)
            .unwrap_or(false);
        let mut scope = scope.clone();
        scope.include_tests |= include_tests;

        // Traversal needs every symbol in scope to resolve reached ids
        let indexed = match (&query.traverse, literal_names(query)) {
            (None, Some(names)) => self.index.symbols_named(&names, &scope).await,
            _ => self.index.symbols_in_scope(&scope).await,
        };
        let relationships = self.index.relationships_in_scope(&scope).await;

        let matched_symbols = match_symbols(query, &indexed);
        let matched_relationships: Vec<Relationship> = match &query.select.relationships {
            Some(types) => relationships.iter().filter(|r| types.contains(&r.kind)).cloned().collect(),
            None => Vec::new(),
        };

        if let Some(traversal) = &query.traverse {
            let by_id: HashMap<&str, &Symbol> = indexed.iter().map(|s| (s.symbol.id.as_str(), &s.symbol)).collect();
            let (symbols, rels) = traverse(traversal, matched_symbols, matched_relationships, &relationships, &by_id);
            return QueryResult::new(symbols, rels);
        }

        let offset = query.offset.unwrap_or(0).max(0) as usize;
        let limit = query.limit.unwrap_or(self.settings.max_limit as i64).max(0) as usize;
        QueryResult::new(paginate(matched_symbols, offset, limit), paginate(matched_relationships, offset, limit))
    }

    fn emit_executed(&self, result: &QueryResult) {
        self.events.emit(GraphEvent::QueryExecuted {
            total: result.total,
            elapsed_ms: result.execution_time_ms,
            from_cache: result.from_cache,
        });
    }
}

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}

/// Canonical cache key for a (query, scope) pair.
pub fn cache_key(query: &GraphQuery, scope: &QueryScope) -> GraphResult<String> {
    Ok(format!("{}|{}", serde_json::to_string(query)?, serde_json::to_string(scope)?))
}

fn match_symbols(query: &GraphQuery, indexed: &[IndexedSymbol]) -> Vec<Symbol> {
    let Some(patterns) = &query.select.symbols else {
        return Vec::new();
    };
    let globs = GlobSet::new(patterns.iter().map(String::as_str));
    indexed
        .iter()
        .filter(|s| globs.is_match(&s.symbol.name))
        .filter(|s| query.filter.as_ref().is_none_or(|f| f.matches(&s.symbol)))
        .map(|s| s.symbol.clone())
        .collect()
}

/// The select patterns as plain names, when none of them is a wildcard.
///
/// Non-ASCII patterns go through the glob scan, whose case folding differs
/// from the name table's.
fn literal_names(query: &GraphQuery) -> Option<Vec<&str>> {
    let patterns = query.select.symbols.as_ref()?;
    let names: Vec<&str> = patterns.iter().map(|p| p.trim()).filter(|p| !p.is_empty()).collect();
    let literal = !names.is_empty() && names.iter().all(|n| n.is_ascii() && !n.contains('*'));
    literal.then_some(names)
}

fn paginate<T>(items: Vec<T>, offset: usize, limit: usize) -> Vec<T> {
    items.into_iter().skip(offset).take(limit).collect()
}

/// Breadth-first expansion from the matched symbols.
///
/// A relationship joins the result only when it introduces a symbol not yet
/// visited. Ids with no indexed symbol still count as visited and are
/// expanded further, but only indexed symbols are returned.
fn traverse(
    traversal: &Traversal,
    matched: Vec<Symbol>,
    matched_relationships: Vec<Relationship>,
    all_relationships: &[Relationship],
    by_id: &HashMap<&str, &Symbol>,
) -> (Vec<Symbol>, Vec<Relationship>) {
    let candidates: Vec<&Relationship> = all_relationships
        .iter()
        .filter(|r| {
            traversal
                .relationship_types
                .as_ref()
                .is_none_or(|types| types.contains(&r.kind))
        })
        .collect();

    let mut visited: HashSet<String> = matched.iter().map(|s| s.id.clone()).collect();
    let mut symbols = matched;
    let mut relationships: IndexMap<String, Relationship> = IndexMap::new();
    for rel in matched_relationships {
        relationships.entry(rel.key()).or_insert(rel);
    }

    let mut frontier: HashSet<String> = visited.clone();
    for step in 0..traversal.depth.max(0) {
        let mut next = HashSet::new();
        for rel in &candidates {
            let reached = match traversal.direction {
                TraversalDirection::Outgoing => frontier.contains(&rel.source_id).then_some(&rel.target_id),
                TraversalDirection::Incoming => frontier.contains(&rel.target_id).then_some(&rel.source_id),
                TraversalDirection::Both => {
                    if frontier.contains(&rel.source_id) && !visited.contains(&rel.target_id) {
                        Some(&rel.target_id)
                    } else if frontier.contains(&rel.target_id) {
                        Some(&rel.source_id)
                    } else {
                        None
                    }
                }
            };
            let Some(id) = reached else { continue };
            if visited.insert(id.clone()) {
                relationships.entry(rel.key()).or_insert_with(|| (*rel).clone());
                if let Some(symbol) = by_id.get(id.as_str()) {
                    symbols.push((*symbol).clone());
                }
                next.insert(id.clone());
            }
        }
        if next.is_empty() {
            tracing::trace!("Traversal settled after {} steps", step + 1);
            break;
        }
        frontier = next;
    }

    (symbols, relationships.into_values().collect())
}
