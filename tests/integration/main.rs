//! Integration tests for Grove
//!
//! These drive the engine end to end: indexing, queries, graph data,
//! layout and cache coordination, through both the Rust API and the
//! command surface.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use grove_cache::{FsModificationOracle, NeverModified};
use grove_core::{GraphEvent, GroveConfig, Position, QueryScope, Range, SymbolKind};
use grove_index::{GraphQuery, InMemoryProvider, RawSymbol, ScopeResolver, TreeSitterProvider, WorkspaceScopeResolver};
use grove_layout::LayoutOptionsUpdate;
use grove_server::{CommandRequest, Collaborators, Engine, dispatch};
use serde_json::json;

const APP: &str = "file:///proj/src/app.rs";
const STORE: &str = "file:///proj/src/store.rs";

fn span(line: u32) -> Range {
    Range::new(Position::new(line, 0), Position::new(line + 1, 0))
}

fn project() -> Arc<InMemoryProvider> {
    let provider = InMemoryProvider::new();
    provider.add_file(
        APP,
        vec![
            RawSymbol::new("App", SymbolKind::Struct, span(0)),
            RawSymbol::new("run", SymbolKind::Function, span(4)),
        ],
        "use crate::store;\n",
    );
    provider.add_file(
        STORE,
        vec![
            RawSymbol::new("Store", SymbolKind::Struct, span(0)),
            RawSymbol::new("load", SymbolKind::Function, span(6)),
            RawSymbol::new("save", SymbolKind::Function, span(9)),
        ],
        "",
    );
    Arc::new(provider)
}

fn memory_engine(provider: Arc<InMemoryProvider>) -> Engine {
    Engine::new(
        &GroveConfig::default(),
        Collaborators {
            provider: provider.clone(),
            resolver: provider,
            oracle: Arc::new(NeverModified),
        },
    )
}

fn workspace_engine(root: &Path) -> Engine {
    let config = GroveConfig::default();
    Engine::new(
        &config,
        Collaborators {
            provider: Arc::new(TreeSitterProvider::new(config.index.max_file_bytes)),
            resolver: Arc::new(WorkspaceScopeResolver::new(root)),
            oracle: Arc::new(FsModificationOracle),
        },
    )
}

/// Build, query, lay out, then relayout after an edit.
#[tokio::test]
async fn test_index_query_layout_flow() {
    let provider = project();
    let engine = memory_engine(provider.clone());
    let mut signals = engine.subscribe();

    let summary = engine.build_index(None).await.unwrap();
    assert_eq!(summary.file_count, 2);
    assert_eq!(summary.symbol_count, 5);
    assert!(
        signals
            .drain()
            .iter()
            .any(|e| matches!(e, GraphEvent::IndexUpdated { symbol_count: 5 }))
    );

    let functions = engine
        .execute_query(
            &GraphQuery::symbols(["*"]).with_filter(grove_index::QueryFilter::kinds([SymbolKind::Function])),
            None,
        )
        .await
        .unwrap();
    let mut names: Vec<_> = functions.symbols.iter().map(|s| s.name.as_str()).collect();
    names.sort();
    assert_eq!(names, vec!["load", "run", "save"]);

    let data = engine.get_graph_data(None, None).await.unwrap();
    assert_eq!(data.nodes.len(), 5);

    let layout = engine
        .compute_layout(&data, Some("hierarchical"), &LayoutOptionsUpdate::default())
        .await
        .unwrap();
    assert_eq!(layout.nodes.len(), 5);
    assert!(layout.nodes.iter().all(|n| n.x.is_finite() && n.y.is_finite()));

    // An edit adds a symbol; only the new node needs placing
    provider.add_file(
        STORE,
        vec![
            RawSymbol::new("Store", SymbolKind::Struct, span(0)),
            RawSymbol::new("load", SymbolKind::Function, span(6)),
            RawSymbol::new("save", SymbolKind::Function, span(9)),
            RawSymbol::new("flush", SymbolKind::Function, span(12)),
        ],
        "",
    );
    engine.update_index(&[STORE.to_string()]).await.unwrap();
    let updated = engine.get_graph_data(None, None).await.unwrap();
    assert_eq!(updated.nodes.len(), 6);

    let flush = updated
        .nodes
        .iter()
        .find(|n| n.symbol.name == "flush")
        .map(|n| n.id.clone())
        .unwrap();
    let relaid = engine
        .compute_incremental_layout(&updated, &layout, &[flush])
        .await
        .unwrap();
    assert_eq!(relaid.nodes.len(), 6);
    assert_eq!(relaid.algorithm, layout.algorithm);

    let quality = engine.analyze_layout_quality(&relaid);
    assert!((0.0..=100.0).contains(&quality.score));

    let metrics = engine.performance_metrics().await;
    assert_eq!(metrics.symbol_count, 6);
    assert_eq!(metrics.layout_count, 2);
}

/// The command surface and the Rust API agree.
#[tokio::test]
async fn test_command_surface_round() {
    let engine = memory_engine(project());

    let run = |name: &str, args: Vec<serde_json::Value>| {
        let request = CommandRequest::new(name, args);
        let engine = &engine;
        async move { dispatch(engine, &request).await }
    };

    let built = run("buildIndex", vec![]).await.unwrap();
    assert_eq!(built["symbolCount"], 5);

    let result = run("executeQuery", vec![json!({ "select": { "symbols": ["s*"] } })])
        .await
        .unwrap();
    let mut names: Vec<_> = result["symbols"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["name"].as_str().unwrap().to_string())
        .collect();
    names.sort();
    assert_eq!(names, vec!["Store", "save"]);

    let suggestions = run("getSymbolSuggestions", vec![json!("lo")]).await.unwrap();
    assert_eq!(suggestions, json!(["load"]));

    let stats = run("getCache", vec![]).await.unwrap();
    assert!(stats["entryCount"].as_u64().unwrap() >= 1);

    run("clearCache", vec![]).await.unwrap();
    let stats = run("getCache", vec![]).await.unwrap();
    assert_eq!(stats["entryCount"], 0);

    let removed = run("optimizeCache", vec![]).await.unwrap();
    assert_eq!(removed["removed"], 0);

    let health = run("healthCheck", vec![]).await.unwrap();
    assert_eq!(health["status"], "ok");
    assert_eq!(health["indexedFiles"], 2);
}

/// Index a real directory with the tree-sitter provider.
#[tokio::test]
async fn test_workspace_index_with_tree_sitter() {
    let dir = tempfile::Builder::new().prefix("grove-ws").tempdir().unwrap();
    let root = dir.path().canonicalize().unwrap();
    fs::create_dir_all(root.join("src")).unwrap();
    let lib = root.join("src/lib.rs");
    fs::write(&lib, "pub struct Engine { ready: bool }\n\npub fn alpha() {}\n").unwrap();

    let engine = workspace_engine(&root);
    let summary = engine.build_index(Some(&QueryScope::workspace())).await.unwrap();
    assert_eq!(summary.file_count, 1);
    assert_eq!(summary.failed_files, 0);

    let found = engine.execute_query(&GraphQuery::symbols(["alpha"]), None).await.unwrap();
    assert_eq!(found.symbols.len(), 1);
    assert_eq!(found.symbols[0].kind, SymbolKind::Function);

    fs::write(&lib, "pub struct Engine { ready: bool }\n\npub fn alpha() {}\n\npub fn gamma() {}\n").unwrap();
    let uri = grove_index::workspace::path_to_uri(&lib);
    engine.update_index(&[uri.clone()]).await.unwrap();

    let found = engine.execute_query(&GraphQuery::symbols(["gamma"]), None).await.unwrap();
    assert_eq!(found.symbols.len(), 1);
    let names: Vec<_> = engine
        .file_symbols(&uri)
        .await
        .unwrap()
        .into_iter()
        .map(|s| s.name)
        .collect();
    assert!(names.contains(&"gamma".to_string()));

    engine.dispose().await;
    assert!(engine.index().is_empty().await);
}

/// A caller-supplied resolver narrows what gets indexed.
#[tokio::test]
async fn test_custom_scope_resolver() {
    struct AppOnly(Arc<InMemoryProvider>);

    #[async_trait::async_trait]
    impl ScopeResolver for AppOnly {
        async fn files_in_scope(&self, scope: &QueryScope) -> anyhow::Result<Vec<String>> {
            let files = self.0.files_in_scope(scope).await?;
            Ok(files.into_iter().filter(|uri| uri.ends_with("app.rs")).collect())
        }
    }

    let provider = project();
    let engine = Engine::new(
        &GroveConfig::default(),
        Collaborators {
            provider: provider.clone(),
            resolver: Arc::new(AppOnly(provider)),
            oracle: Arc::new(NeverModified),
        },
    );
    let summary = engine.build_index(None).await.unwrap();
    assert_eq!(summary.file_count, 1);
    assert_eq!(summary.symbol_count, 2);
    assert!(engine.symbol_suggestions("sa").await.is_empty());
}
