//! Unit tests for grove-server

use std::sync::Arc;
use std::time::Duration;

use axum::body::{Body, to_bytes};
use axum::http::{Method, Request, StatusCode};
use grove_cache::NeverModified;
use grove_core::{CacheStore, GraphEvent, GroveConfig, Location, Position, QueryScope, Range, SymbolKind};
use grove_index::{GraphQuery, InMemoryProvider, RawSymbol, ScopeResolver};
use grove_layout::LayoutOptionsUpdate;
use serde_json::{Value, json};
use tower::ServiceExt;

use crate::commands::{CommandRequest, dispatch};
use crate::engine::{Collaborators, Engine};
use crate::websocket::{WsMessage, handle_client_message};
use crate::{ServerState, create_router};

const LIB: &str = "file:///repo/src/lib.rs";
const NET: &str = "file:///repo/src/net.rs";
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
                .with_children(vec![RawSymbol::new("render", SymbolKind::Method, span(1))]),
            RawSymbol::new("foo_bar", SymbolKind::Function, span(5)),
        ],
        "use crate::net;\n",
    );
    provider.add_file(
        NET,
        vec![
            RawSymbol::new("connect", SymbolKind::Function, span(0)),
            RawSymbol::new("retry", SymbolKind::Function, span(3)),
        ],
        "",
    );
    provider.add_file(SPEC, vec![RawSymbol::new("checks", SymbolKind::Function, span(0))], "");
    Arc::new(provider)
}

fn engine_with(provider: Arc<InMemoryProvider>, resolver: Arc<dyn ScopeResolver>) -> Engine {
    let mut config = GroveConfig::default();
    config.layout.algorithm = "grid".to_string();
    Engine::new(
        &config,
        Collaborators {
            provider,
            resolver,
            oracle: Arc::new(NeverModified),
        },
    )
}

fn engine_for(provider: Arc<InMemoryProvider>) -> Engine {
    engine_with(provider.clone(), provider)
}

/// Resolver that suspends once before answering.
struct YieldingResolver(Arc<InMemoryProvider>);

#[async_trait::async_trait]
impl ScopeResolver for YieldingResolver {
    async fn files_in_scope(&self, scope: &QueryScope) -> anyhow::Result<Vec<String>> {
        tokio::task::yield_now().await;
        self.0.files_in_scope(scope).await
    }
}

async fn command(engine: &Engine, name: &str, args: Vec<Value>) -> grove_core::GraphResult<Value> {
    dispatch(engine, &CommandRequest::new(name, args)).await
}

// ── Engine ───────────────────────────────────────────────

#[tokio::test]
async fn test_query_results_served_from_cache_manager() {
    let engine = engine_for(fixture());
    let query = GraphQuery::symbols(["*"]);

    let first = engine.execute_query(&query, None).await.unwrap();
    assert!(!first.from_cache);
    assert_eq!(first.symbols.len(), 5);

    let before = engine.get_cache_stats().await;
    let second = engine.execute_query(&query, None).await.unwrap();
    assert!(second.from_cache);
    assert_eq!(second.symbols, first.symbols);
    assert_eq!(engine.get_cache_stats().await.hit_count, before.hit_count + 1);
}

#[tokio::test]
async fn test_graph_data_cached_and_dropped_on_rebuild() {
    let engine = engine_for(fixture());
    let data = engine.get_graph_data(None, None).await.unwrap();
    assert_eq!(data.nodes.len(), 5);
    // Import targets are raw paths, never symbol ids
    assert!(data.edges.is_empty());
    assert_eq!(engine.get_cache_stats().await.entry_count, 2);

    let again = engine.get_graph_data(None, None).await.unwrap();
    assert_eq!(again, data);

    engine.build_index(None).await.unwrap();
    assert_eq!(engine.get_cache_stats().await.entry_count, 0);
}

#[tokio::test]
async fn test_older_graph_request_is_superseded() {
    let provider = fixture();
    let engine = engine_with(provider.clone(), Arc::new(YieldingResolver(provider)));

    let (older, newer) = tokio::join!(engine.get_graph_data(None, None), engine.get_graph_data(None, None));
    assert_eq!(older.unwrap_err().code(), "REQUEST_SUPERSEDED");
    assert_eq!(newer.unwrap().nodes.len(), 5);
}

#[tokio::test]
async fn test_scope_override_includes_tests() {
    let engine = engine_for(fixture());
    engine.build_index(Some(&QueryScope::workspace().including_tests())).await.unwrap();
    let scope = QueryScope::workspace().including_tests();
    let data = engine.get_graph_data(None, Some(&scope)).await.unwrap();
    assert_eq!(data.nodes.len(), 6);
}

#[tokio::test]
async fn test_file_symbols_refresh_after_update() {
    let provider = fixture();
    let engine = engine_for(provider.clone());
    engine.build_index(None).await.unwrap();

    assert_eq!(engine.file_symbols(NET).await.unwrap().len(), 2);
    let hits = engine.get_cache_stats().await.hit_count;
    assert_eq!(engine.file_symbols(NET).await.unwrap().len(), 2);
    assert_eq!(engine.get_cache_stats().await.hit_count, hits + 1);

    provider.add_file(NET, vec![RawSymbol::new("connect", SymbolKind::Function, span(0))], "");
    engine.update_index(&[NET.to_string()]).await.unwrap();
    assert_eq!(engine.file_symbols(NET).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_file_relationships_from_import_scan() {
    let engine = engine_for(fixture());
    engine.build_index(None).await.unwrap();
    let relationships = engine.file_relationships(LIB).await.unwrap();
    assert_eq!(relationships.len(), 1);
    assert!(engine.file_relationships(NET).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_find_references_cached_and_failures_tagged() {
    let provider = fixture();
    let from = Location::new(LIB, span(5));
    provider.add_reference(NET, Position::new(0, 3), from.clone());
    let engine = engine_for(provider.clone());

    let found = engine.find_references(NET, Position::new(0, 3)).await.unwrap();
    assert_eq!(found, vec![from.clone()]);

    // A cached answer survives the provider going away
    provider.fail_file(NET);
    assert_eq!(engine.find_references(NET, Position::new(0, 3)).await.unwrap(), vec![from]);

    let err = engine.find_references(NET, Position::new(3, 0)).await.unwrap_err();
    assert_eq!(err.code(), "ANALYSIS_FAILED");
}

#[tokio::test]
async fn test_layout_cached_by_input() {
    let engine = engine_for(fixture());
    let data = engine.get_graph_data(None, None).await.unwrap();

    let first = engine.compute_layout(&data, None, &LayoutOptionsUpdate::default()).await.unwrap();
    assert_eq!(first.algorithm, "grid");
    let second = engine.compute_layout(&data, None, &LayoutOptionsUpdate::default()).await.unwrap();
    let ids = |r: &grove_layout::LayoutResult| r.nodes.iter().map(|n| n.id.clone()).collect::<Vec<_>>();
    assert_eq!(ids(&second), ids(&first));
    // Served from the layout store, not recomputed
    assert_eq!(engine.performance_metrics().await.layout_count, 1);

    let circular = engine
        .compute_layout(&data, Some("circular"), &LayoutOptionsUpdate::default())
        .await
        .unwrap();
    assert_eq!(circular.algorithm, "circular");
    assert_eq!(engine.performance_metrics().await.layout_count, 2);
}

#[tokio::test]
async fn test_clear_cache_single_store() {
    let engine = engine_for(fixture());
    engine.get_graph_data(None, None).await.unwrap();
    engine.clear_cache(Some(CacheStore::GraphData)).await;
    assert_eq!(engine.get_cache_stats().await.entry_count, 1);
    engine.clear_cache(None).await;
    assert_eq!(engine.get_cache_stats().await.entry_count, 0);
}

#[tokio::test]
async fn test_metrics_count_queries_and_index() {
    let engine = engine_for(fixture());
    engine.build_index(None).await.unwrap();
    engine.execute_query(&GraphQuery::symbols(["retry"]), None).await.unwrap();
    engine.execute_query(&GraphQuery::symbols(["retry"]), None).await.unwrap();

    let metrics = engine.performance_metrics().await;
    assert_eq!(metrics.query_count, 2);
    assert_eq!(metrics.cached_queries, 1);
    assert_eq!(metrics.file_count, 2);
    assert_eq!(metrics.symbol_count, 5);
    assert!(metrics.cache.hit_count >= 1);
}

#[tokio::test(start_paused = true)]
async fn test_periodic_metrics_signal() {
    let engine = Arc::new(engine_for(fixture()));
    let mut sub = engine.subscribe();
    engine.start_metrics(Duration::from_secs(30)).await;

    tokio::time::sleep(Duration::from_secs(31)).await;
    let updates = sub
        .drain()
        .into_iter()
        .filter(|e| matches!(e, GraphEvent::PerformanceMetricsUpdated { .. }))
        .count();
    assert_eq!(updates, 1);

    engine.dispose().await;
    tokio::time::sleep(Duration::from_secs(90)).await;
    assert!(sub.drain().iter().all(|e| !matches!(e, GraphEvent::PerformanceMetricsUpdated { .. })));
}

#[tokio::test]
async fn test_dispose_clears_and_shuts_down_provider() {
    let provider = fixture();
    let engine = engine_for(provider.clone());
    engine.get_graph_data(None, None).await.unwrap();

    engine.dispose().await;
    assert!(provider.is_shut_down());
    assert!(engine.index().is_empty().await);
    assert_eq!(engine.get_cache_stats().await.entry_count, 0);
}

#[tokio::test]
async fn test_health_reports_provider_and_algorithms() {
    let engine = engine_for(fixture());
    engine.build_index(None).await.unwrap();
    let health = engine.health_check().await;
    assert_eq!(health.status, "ok");
    assert_eq!(health.provider, "memory");
    assert_eq!(health.indexed_files, 2);
    assert!(health.layout_algorithms.contains(&"hierarchical".to_string()));
}

// ── Commands ─────────────────────────────────────────────

#[tokio::test]
async fn test_dispatch_query_and_layout_round() {
    let engine = engine_for(fixture());
    let result = command(&engine, "executeQuery", vec![json!({ "select": { "symbols": ["Foo*"] } })])
        .await
        .unwrap();
    assert_eq!(result["symbols"].as_array().unwrap().len(), 1);
    assert_eq!(result["symbols"][0]["name"], "Foo");

    let data = command(&engine, "getGraphData", vec![]).await.unwrap();
    let layout = command(&engine, "computeLayout", vec![data.clone(), json!("circular")])
        .await
        .unwrap();
    assert_eq!(layout["algorithm"], "circular");

    let quality = command(&engine, "analyzeLayoutQuality", vec![layout.clone()]).await.unwrap();
    assert!(quality["score"].as_f64().unwrap() <= 100.0);

    let first = data["nodes"][0]["id"].clone();
    let incremental = command(&engine, "computeIncrementalLayout", vec![data, layout.clone(), json!([first])])
        .await
        .unwrap();
    assert_eq!(incremental["algorithm"], "circular");

    let optimized = command(&engine, "optimizeLayout", vec![layout, json!(10)]).await.unwrap();
    assert_eq!(optimized["algorithm"], "force-directed");
}

#[tokio::test]
async fn test_dispatch_rejects_unknown_and_bad_arguments() {
    let engine = engine_for(fixture());
    let err = command(&engine, "reticulateSplines", vec![]).await.unwrap_err();
    assert_eq!(err.code(), "UNKNOWN_COMMAND");

    let err = command(&engine, "executeQuery", vec![]).await.unwrap_err();
    assert_eq!(err.code(), "INVALID_ARGUMENTS");
    assert_eq!(err.details()["command"], "executeQuery");

    let err = command(&engine, "executeQuery", vec![json!("not a query")]).await.unwrap_err();
    assert_eq!(err.code(), "INVALID_ARGUMENTS");

    let err = command(&engine, "clearCache", vec![json!("attic")]).await.unwrap_err();
    assert_eq!(err.code(), "INVALID_ARGUMENTS");

    let err = command(&engine, "setCacheOptions", vec![json!({ "maxEntries": 0 })]).await.unwrap_err();
    assert_eq!(err.code(), "INVALID_ARGUMENTS");

    let err = command(&engine, "computeLayout", vec![json!({ "nodes": [], "edges": [] }), json!("spiral")])
        .await
        .unwrap_err();
    assert_eq!(err.code(), "UNKNOWN_ALGORITHM");
}

#[tokio::test]
async fn test_dispatch_layout_with_negative_canvas_fails_cleanly() {
    let engine = engine_for(fixture());
    let data = command(&engine, "getGraphData", vec![]).await.unwrap();
    for algorithm in ["force-directed", "clustered"] {
        let err = command(&engine, "computeLayout", vec![data.clone(), json!(algorithm), json!({ "width": -10 })])
            .await
            .unwrap_err();
        assert_eq!(err.code(), "LAYOUT_COMPUTATION_FAILED");
    }
    // The engine is still usable afterwards
    let layout = command(&engine, "computeLayout", vec![data, json!("clustered")]).await.unwrap();
    assert_eq!(layout["algorithm"], "clustered");
}

#[tokio::test]
async fn test_dispatch_cache_and_index_commands() {
    let engine = engine_for(fixture());
    let summary = command(&engine, "buildIndex", vec![]).await.unwrap();
    assert_eq!(summary["fileCount"], 2);

    let options = command(&engine, "setCacheOptions", vec![json!({ "maxEntries": 600, "ttlSecs": 60 })])
        .await
        .unwrap();
    assert_eq!(options["maxEntries"], 600);
    assert_eq!(options["ttlSecs"], 60);

    command(&engine, "getFileSymbols", vec![json!(LIB)]).await.unwrap();
    let stats = command(&engine, "getCache", vec![]).await.unwrap();
    assert_eq!(stats["entryCount"], 1);

    let cleared = command(&engine, "clearCache", vec![json!("symbols")]).await.unwrap();
    assert_eq!(cleared["cleared"], "symbols");
    assert_eq!(command(&engine, "optimizeCache", vec![]).await.unwrap()["removed"], 0);

    let suggestions = command(&engine, "getSymbolSuggestions", vec![json!("re")]).await.unwrap();
    let names: Vec<&str> = suggestions.as_array().unwrap().iter().filter_map(Value::as_str).collect();
    assert!(names.contains(&"render"));
    assert!(names.contains(&"retry"));

    command(&engine, "clearIndex", vec![]).await.unwrap();
    let metrics = command(&engine, "getPerformanceMetrics", vec![]).await.unwrap();
    assert_eq!(metrics["symbolCount"], 0);
    assert_eq!(metrics["cachedQueries"], 0);
}

#[tokio::test]
async fn test_websocket_command_replies() {
    let engine = engine_for(fixture());
    let reply = handle_client_message(
        WsMessage::Command {
            id: Some(7),
            command: "healthCheck".into(),
            args: vec![],
        },
        &engine,
    )
    .await;
    match reply {
        Some(WsMessage::Response { id, result }) => {
            assert_eq!(id, Some(7));
            assert_eq!(result["status"], "ok");
        }
        other => panic!("unexpected reply: {other:?}"),
    }

    let reply = handle_client_message(
        WsMessage::Command {
            id: None,
            command: "nope".into(),
            args: vec![],
        },
        &engine,
    )
    .await;
    assert!(matches!(reply, Some(WsMessage::Error { code, .. }) if code == "UNKNOWN_COMMAND"));
    assert_eq!(handle_client_message(WsMessage::Ping, &engine).await, Some(WsMessage::Pong));
    assert_eq!(handle_client_message(WsMessage::Pong, &engine).await, None);
}

// ── HTTP ─────────────────────────────────────────────────

fn router() -> axum::Router {
    let engine = Arc::new(engine_for(fixture()));
    create_router(Arc::new(ServerState::new(engine)))
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn test_health_route() {
    let response = router()
        .oneshot(Request::builder().uri("/api/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_command_route_maps_errors() {
    let response = router()
        .oneshot(post_json("/api/command", json!({ "command": "nope" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["code"], "UNKNOWN_COMMAND");
    assert_eq!(body["details"]["command"], "nope");

    let response = router()
        .oneshot(post_json(
            "/api/command",
            json!({ "command": "executeQuery", "args": [{ "select": { "symbols": ["*"] } }] }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["total"], 5);
}

#[tokio::test]
async fn test_graph_and_layout_routes() {
    let app = router();
    let response = app
        .clone()
        .oneshot(Request::builder().uri("/api/graph?pattern=re*").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let graph = body_json(response).await;
    assert_eq!(graph["nodes"].as_array().unwrap().len(), 2);

    let response = app
        .oneshot(post_json("/api/layout", json!({ "data": graph, "algorithm": "grid" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["layout"]["algorithm"], "grid");
    assert!(body["quality"]["score"].is_number());
}

#[tokio::test]
async fn test_invalid_query_route() {
    let response = router()
        .oneshot(post_json("/api/query", json!({ "query": { "select": { "symbols": [] } } })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "INVALID_QUERY");
}
