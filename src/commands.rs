//! CLI command implementations

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use grove_cache::FsModificationOracle;
use grove_core::GroveConfig;
use grove_index::query::translate;
use grove_index::{GraphQuery, TreeSitterProvider, WorkspaceScopeResolver};
use grove_layout::LayoutOptionsUpdate;
use grove_server::{Collaborators, Engine, GroveServer, ServerConfig};
use serde_json::json;

/// Engine over the workspace at `root` with the reference collaborators.
pub fn workspace_engine(root: &Path, config: &GroveConfig) -> Engine {
    let root = root.canonicalize().unwrap_or_else(|_| root.to_path_buf());
    Engine::new(
        config,
        Collaborators {
            provider: Arc::new(TreeSitterProvider::new(config.index.max_file_bytes)),
            resolver: Arc::new(WorkspaceScopeResolver::new(root)),
            oracle: Arc::new(FsModificationOracle),
        },
    )
}

/// Split `a, b,c` into trimmed, non-empty patterns.
pub fn patterns(text: &str) -> Vec<String> {
    text.split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}

pub async fn serve(root: &Path, config: &GroveConfig, host: String, port: u16) -> anyhow::Result<()> {
    tracing::info!("Starting Grove server on {}:{}", host, port);

    let engine = Arc::new(workspace_engine(root, config));
    let summary = engine.build_index(None).await?;
    tracing::info!(
        "Indexed {} symbols across {} files",
        summary.symbol_count,
        summary.file_count
    );
    engine
        .start_metrics(Duration::from_secs(config.server.metrics_interval_secs.max(1)))
        .await;

    let server = GroveServer::new(Arc::clone(&engine), ServerConfig { host, port });
    tokio::select! {
        result = server.start() => result?,
        _ = tokio::signal::ctrl_c() => tracing::info!("Shutting down"),
    }

    engine.dispose().await;
    Ok(())
}

pub async fn index(root: &Path, config: &GroveConfig) -> anyhow::Result<()> {
    tracing::info!("Indexing repository: {}", root.display());

    let engine = workspace_engine(root, config);
    let summary = engine.build_index(None).await?;
    println!(
        "Indexed {} symbols and {} relationships across {} files in {:.1}ms",
        summary.symbol_count, summary.relationship_count, summary.file_count, summary.elapsed_ms
    );
    if summary.failed_files > 0 || summary.quarantined_symbols > 0 {
        println!(
            "Skipped {} files and quarantined {} symbols",
            summary.failed_files, summary.quarantined_symbols
        );
    }

    engine.dispose().await;
    Ok(())
}

pub async fn query(
    root: &Path,
    config: &GroveConfig,
    text: &str,
    natural: bool,
    limit: Option<i64>,
) -> anyhow::Result<()> {
    let engine = workspace_engine(root, config);
    engine.build_index(None).await?;

    let mut query = if natural {
        translate(text)
    } else {
        GraphQuery::symbols(patterns(text))
    };
    if let Some(limit) = limit {
        query = query.with_limit(limit);
    }
    let result = engine.execute_query(&query, None).await?;
    println!("{}", serde_json::to_string_pretty(&result)?);

    engine.dispose().await;
    Ok(())
}

pub async fn layout(root: &Path, config: &GroveConfig, pattern: &str, algorithm: Option<&str>) -> anyhow::Result<()> {
    let engine = workspace_engine(root, config);
    engine.build_index(None).await?;

    let query = GraphQuery::symbols(patterns(pattern));
    let data = engine.get_graph_data(Some(&query), None).await?;
    let layout = engine
        .compute_layout(&data, algorithm, &LayoutOptionsUpdate::default())
        .await?;
    let quality = engine.analyze_layout_quality(&layout);
    println!("{}", serde_json::to_string_pretty(&json!({ "layout": layout, "quality": quality }))?);

    engine.dispose().await;
    Ok(())
}
