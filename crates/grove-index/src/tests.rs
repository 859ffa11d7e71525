//! Unit tests for grove-index

use std::sync::Arc;

use grove_core::config::QuerySettings;
use grove_core::{EventBus, GraphEvent, Position, QueryScope, Range, RelationshipType, SymbolKind};

use crate::index::SymbolIndex;
use crate::memory::InMemoryProvider;
use crate::query::{GraphQuery, QueryEngine, QueryFilter, Traversal, TraversalDirection};
use crate::schema::RawSymbol;

const LIB: &str = "file:///repo/src/lib.rs";
const NET: &str = "file:///repo/src/net.rs";
const UI: &str = "file:///repo/web/app.ts";
const SPEC: &str = "file:///repo/tests/lib_test.rs";

fn span(line: u32) -> Range {
    Range::new(Position::new(line, 0), Position::new(line + 1, 0))
}

fn fixture() -> Arc<InMemoryProvider> {
    let provider = InMemoryProvider::new();
    provider.add_file(
        LIB,
        vec![
            RawSymbol::new("Foo", SymbolKind::Class, span(0))
                .with_modifiers(&["pub"])
                .with_children(vec![RawSymbol::new("render", SymbolKind::Method, span(1))]),
            RawSymbol::new("foo_bar", SymbolKind::Function, span(5)),
        ],
        "use crate::net;\nuse serde::Serialize;\n",
    );
    provider.add_file(
        NET,
        vec![
            RawSymbol::new("connect", SymbolKind::Function, span(0)).with_modifiers(&["pub"]),
            RawSymbol::new("retry", SymbolKind::Function, span(3)),
        ],
        "use std::net::TcpStream;\n",
    );
    provider.add_file(
        UI,
        vec![RawSymbol::new("App", SymbolKind::Class, span(0)).with_modifiers(&["export", "deprecated"])],
        "import { x } from './x';\n",
    );
    provider.add_file(SPEC, vec![RawSymbol::new("checks", SymbolKind::Function, span(0))], "");
    Arc::new(provider)
}

fn engine_with(provider: Arc<InMemoryProvider>) -> (QueryEngine, EventBus) {
    let events = EventBus::new();
    let index = Arc::new(SymbolIndex::new(provider.clone(), provider, events.clone()));
    (QueryEngine::new(index, QuerySettings::default(), events.clone()), events)
}

fn names(result: &crate::query::QueryResult) -> Vec<&str> {
    result.symbols.iter().map(|s| s.name.as_str()).collect()
}

#[tokio::test]
async fn test_empty_resolver_yields_empty_index() {
    let index = SymbolIndex::new(fixture(), Arc::new(crate::provider::EmptyScopeResolver), EventBus::new());
    let summary = index.build_index(&QueryScope::workspace()).await.unwrap();
    assert_eq!(summary.file_count, 0);
    assert_eq!(summary.symbol_count, 0);
    assert!(index.is_empty().await);
}

#[tokio::test]
async fn test_build_index_flattens_and_excludes_tests() {
    let provider = fixture();
    let (engine, events) = engine_with(provider);
    let mut sub = events.subscribe();

    let summary = engine.index().build_index(&QueryScope::workspace()).await.unwrap();
    assert_eq!(summary.file_count, 3);
    assert_eq!(summary.symbol_count, 6);
    assert_eq!(summary.relationship_count, 4);

    let lib = engine.index().file_symbols(LIB).await;
    assert_eq!(lib.len(), 3);
    assert_eq!(lib[1].container_name.as_deref(), Some("Foo"));
    assert!(engine.index().file_entry(SPEC).await.is_none());

    let names: Vec<&str> = sub.drain().iter().map(|e| e.name()).collect();
    assert_eq!(names, vec!["symbols-changed", "relationships-changed", "index-updated"]);
}

#[tokio::test]
async fn test_failing_file_is_skipped_not_fatal() {
    let provider = fixture();
    provider.fail_file(NET);
    let (engine, _) = engine_with(provider);

    let summary = engine.index().build_index(&QueryScope::workspace()).await.unwrap();
    assert_eq!(summary.file_count, 2);
    assert_eq!(summary.failed_files, 1);
    assert!(engine.index().file_symbols(NET).await.is_empty());
}

#[tokio::test]
async fn test_update_index_replaces_named_files_and_rebuilds_relationships() {
    let provider = fixture();
    let (engine, _) = engine_with(provider.clone());
    engine.index().build_index(&QueryScope::workspace()).await.unwrap();

    provider.add_file(
        NET,
        vec![RawSymbol::new("listen", SymbolKind::Function, span(0))],
        "use tokio::net;\nuse std::io;\n",
    );
    let summary = engine.index().update_index(&[NET.to_string()]).await.unwrap();

    let net: Vec<String> = engine.index().file_symbols(NET).await.into_iter().map(|s| s.name).collect();
    assert_eq!(net, vec!["listen"]);
    assert_eq!(engine.index().file_symbols(LIB).await.len(), 3);
    assert_eq!(engine.index().file_relationships(NET).await.len(), 2);
    assert_eq!(summary.relationship_count, 5);
    let scope = QueryScope::workspace();
    assert!(engine.index().symbols_named(&["connect"], &scope).await.is_empty());
    assert_eq!(engine.index().symbols_named(&["LISTEN"], &scope).await.len(), 1);
}

#[tokio::test]
async fn test_update_drops_files_that_fail() {
    let provider = fixture();
    let (engine, _) = engine_with(provider.clone());
    engine.index().build_index(&QueryScope::workspace()).await.unwrap();

    provider.remove_file(UI);
    let summary = engine.index().update_index(&[UI.to_string()]).await.unwrap();
    assert_eq!(summary.failed_files, 1);
    assert_eq!(summary.file_count, 2);
    assert!(engine.index().file_relationships(UI).await.is_empty());
}

#[tokio::test]
async fn test_select_all_returns_each_symbol_once() {
    let (engine, _) = engine_with(fixture());
    let result = engine
        .execute_query(&GraphQuery::symbols(["*"]), &QueryScope::workspace())
        .await
        .unwrap();

    assert_eq!(result.symbols.len(), 6);
    let mut ids: Vec<&str> = result.symbols.iter().map(|s| s.id.as_str()).collect();
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 6);
    assert!(result.relationships.is_empty());
    assert_eq!(result.total, 6);
}

#[tokio::test]
async fn test_total_adds_symbols_and_relationships() {
    let (engine, _) = engine_with(fixture());
    let query = GraphQuery::symbols(["*"]).with_relationships([RelationshipType::Imports]);
    let result = engine.execute_query(&query, &QueryScope::workspace()).await.unwrap();
    assert_eq!(result.relationships.len(), 4);
    assert_eq!(result.total, result.symbols.len() + result.relationships.len());
}

#[tokio::test]
async fn test_case_insensitive_glob_excludes_suffixed_words() {
    let (engine, _) = engine_with(fixture());
    let result = engine
        .execute_query(&GraphQuery::symbols(["foo*"]), &QueryScope::workspace())
        .await
        .unwrap();
    assert_eq!(names(&result), vec!["Foo"]);
}

#[tokio::test]
async fn test_plain_names_match_in_index_order() {
    let (engine, _) = engine_with(fixture());
    let scope = QueryScope::workspace();
    let query = GraphQuery::symbols(["app", "RETRY", "foo"]);
    let result = engine.execute_query(&query, &scope).await.unwrap();
    assert_eq!(names(&result), vec!["Foo", "retry", "App"]);

    let page = engine
        .execute_query(&query.clone().with_offset(1).with_limit(1), &scope)
        .await
        .unwrap();
    assert_eq!(names(&page), vec!["retry"]);

    // Same answer as the glob scan over every symbol
    let mixed = GraphQuery::symbols(["app", "RETRY", "foo", "nothing*"]);
    let scanned = engine.execute_query(&mixed, &scope).await.unwrap();
    assert_eq!(scanned.symbols, result.symbols);
}

#[tokio::test]
async fn test_name_lookup_respects_scope() {
    let (engine, _) = engine_with(fixture());
    let index = engine.index();
    index.build_index(&QueryScope::workspace().including_tests()).await.unwrap();

    let everywhere = QueryScope::workspace().including_tests();
    let found = index.symbols_named(&["checks", "App"], &everywhere).await;
    let found: Vec<&str> = found.iter().map(|s| s.symbol.name.as_str()).collect();
    assert_eq!(found, vec!["checks", "App"]);

    let plain = index.symbols_named(&["checks", "App"], &QueryScope::workspace()).await;
    assert_eq!(plain.len(), 1);
    assert_eq!(plain[0].symbol.name, "App");
}

#[tokio::test]
async fn test_where_clause_is_a_conjunction() {
    let (engine, _) = engine_with(fixture());
    let filter = QueryFilter {
        kinds: Some(vec![SymbolKind::Function]),
        is_exported: Some(true),
        path: Some("src/".into()),
        ..Default::default()
    };
    let result = engine
        .execute_query(&GraphQuery::symbols(["*"]).with_filter(filter), &QueryScope::workspace())
        .await
        .unwrap();
    assert_eq!(names(&result), vec!["connect"]);
}

#[tokio::test]
async fn test_include_tests_in_where_widens_scope() {
    let (engine, _) = engine_with(fixture());
    let scope = QueryScope::workspace();
    engine.index().build_index(&scope.clone().including_tests()).await.unwrap();

    let plain = engine.execute_query(&GraphQuery::symbols(["checks"]), &scope).await.unwrap();
    assert!(plain.symbols.is_empty());

    let filter = QueryFilter {
        include_tests: Some(true),
        ..Default::default()
    };
    let widened = engine
        .execute_query(&GraphQuery::symbols(["checks"]).with_filter(filter), &scope)
        .await
        .unwrap();
    assert_eq!(names(&widened), vec!["checks"]);
}

#[tokio::test]
async fn test_pagination_applies_to_both_lists() {
    let (engine, _) = engine_with(fixture());
    let query = GraphQuery::symbols(["*"])
        .with_relationships([RelationshipType::Imports])
        .with_offset(2)
        .with_limit(3);
    let result = engine.execute_query(&query, &QueryScope::workspace()).await.unwrap();

    // 6 symbols, 4 relationships
    assert_eq!(result.symbols.len(), 3);
    assert_eq!(result.relationships.len(), 2);
    assert_eq!(result.total, 5);

    let past_end = GraphQuery::symbols(["*"]).with_offset(10).with_limit(3);
    let result = engine.execute_query(&past_end, &QueryScope::workspace()).await.unwrap();
    assert!(result.symbols.is_empty());
}

#[tokio::test]
async fn test_traversal_bypasses_pagination() {
    let (engine, _) = engine_with(fixture());
    let query = GraphQuery::symbols(["*"])
        .with_limit(1)
        .with_offset(0)
        .with_traversal(Traversal::new(2, TraversalDirection::Outgoing).over([RelationshipType::Imports]));
    let result = engine.execute_query(&query, &QueryScope::workspace()).await.unwrap();

    // Every matched symbol comes back despite limit 1
    assert_eq!(result.symbols.len(), 6);
    // Import edges start at module ids, which none of these symbols carry
    assert!(result.relationships.is_empty());
}

#[tokio::test]
async fn test_traversal_reaches_import_targets() {
    let provider = InMemoryProvider::new();
    provider.add_file(
        LIB,
        vec![RawSymbol::new("lib.rs", SymbolKind::File, span(0))],
        "use crate::net;\nuse serde::Serialize;\n",
    );
    let (engine, _) = engine_with(Arc::new(provider));

    let query = GraphQuery::symbols(["lib.rs"])
        .with_limit(1)
        .with_traversal(Traversal::new(3, TraversalDirection::Outgoing));
    let result = engine.execute_query(&query, &QueryScope::workspace()).await.unwrap();

    assert_eq!(result.symbols.len(), 1);
    assert_eq!(result.relationships.len(), 2);
    let targets: Vec<&str> = result.relationships.iter().map(|r| r.target_id.as_str()).collect();
    assert_eq!(targets, vec!["crate::net", "serde::Serialize"]);
    assert_eq!(result.total, 3);

    let incoming = GraphQuery::symbols(["lib.rs"]).with_traversal(Traversal::new(1, TraversalDirection::Incoming));
    let result = engine.execute_query(&incoming, &QueryScope::workspace()).await.unwrap();
    assert!(result.relationships.is_empty());
}

#[tokio::test]
async fn test_invalid_query_is_rejected() {
    let (engine, _) = engine_with(fixture());
    let query = GraphQuery::symbols(Vec::<String>::new()).with_offset(-1);
    let err = engine.execute_query(&query, &QueryScope::workspace()).await.unwrap_err();
    assert_eq!(err.code(), "INVALID_QUERY");
    assert!(engine.index().is_empty().await);
}

#[tokio::test]
async fn test_results_are_cached_until_index_cleared() {
    let provider = fixture();
    let (engine, events) = engine_with(provider.clone());
    let mut sub = events.subscribe();
    let query = GraphQuery::symbols(["*"]);
    let scope = QueryScope::workspace();

    let first = engine.execute_query(&query, &scope).await.unwrap();
    assert!(!first.from_cache);
    let requests = provider.symbol_requests();

    let second = engine.execute_query(&query, &scope).await.unwrap();
    assert!(second.from_cache);
    assert_eq!(second.symbols, first.symbols);
    assert_eq!(provider.symbol_requests(), requests);
    assert_eq!(engine.cached_results().await, 1);

    let executed: Vec<bool> = sub
        .drain()
        .into_iter()
        .filter_map(|e| match e {
            GraphEvent::QueryExecuted { from_cache, .. } => Some(from_cache),
            _ => None,
        })
        .collect();
    assert_eq!(executed, vec![false, true]);

    engine.clear_index().await;
    assert_eq!(engine.cached_results().await, 0);
    assert!(engine.index().is_empty().await);
}

#[tokio::test]
async fn test_natural_language_query() {
    let (engine, _) = engine_with(fixture());
    let result = engine
        .execute_natural_language_query("all classes", &QueryScope::workspace())
        .await
        .unwrap();
    assert_eq!(names(&result), vec!["Foo", "App"]);

    let deprecated = engine
        .execute_natural_language_query("deprecated classes", &QueryScope::workspace())
        .await
        .unwrap();
    assert_eq!(names(&deprecated), vec!["App"]);

    let fallback = engine
        .execute_natural_language_query("retry", &QueryScope::workspace())
        .await
        .unwrap();
    assert_eq!(names(&fallback), vec!["retry"]);
}

#[tokio::test]
async fn test_suggestions_use_indexed_names() {
    let (engine, _) = engine_with(fixture());
    engine.index().build_index(&QueryScope::workspace()).await.unwrap();

    assert_eq!(engine.symbol_suggestions("re").await, vec!["render", "retry"]);
    let queries = engine.query_suggestions("calls con").await;
    assert!(queries.contains(&"calls connect".to_string()));
    assert!(queries.len() <= 10);
}
