//! Engine facade owning the index, query engine, cache manager and layout engine
//!
//! Every request-shaped result (graph data, per-file symbols and
//! relationships, references, layouts and query results) goes through the
//! cache manager before touching the subsystem that computes it.

use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use grove_cache::{CacheManager, CacheOptions, CacheOptionsUpdate, ModificationOracle, deps};
use grove_core::{
    CacheStats, CacheStore, EventBus, GraphData, GraphError, GraphEvent, GraphResult, GroveConfig, Location, Position,
    QueryScope, Relationship, Subscription, Symbol,
};
use grove_index::query::{cache_key, translate};
use grove_index::{AnalysisProvider, GraphQuery, IndexSummary, QueryEngine, QueryResult, ScopeResolver, SymbolIndex};
use grove_layout::{LayoutEngine, LayoutOptions, LayoutOptionsUpdate, LayoutQuality, LayoutResult, LayoutStrategy};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::interval_at;

use crate::metrics::{MetricsRecorder, PerformanceMetrics};

/// Stores whose contents derive from the index and go stale when it changes.
const INDEX_DERIVED_STORES: [CacheStore; 4] = [
    CacheStore::Symbols,
    CacheStore::Relationships,
    CacheStore::GraphData,
    CacheStore::QueryResult,
];

/// External collaborators the engine consumes.
pub struct Collaborators {
    pub provider: Arc<dyn AnalysisProvider>,
    pub resolver: Arc<dyn ScopeResolver>,
    pub oracle: Arc<dyn ModificationOracle>,
}

/// Health check response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthStatus {
    pub status: String,
    pub version: String,
    pub provider: String,
    pub indexed_files: usize,
    pub symbol_count: usize,
    pub cache_entries: usize,
    pub layout_algorithms: Vec<String>,
    pub uptime_secs: f64,
}

pub struct Engine {
    query: QueryEngine,
    cache: CacheManager,
    layout: LayoutEngine,
    events: EventBus,
    metrics: MetricsRecorder,
    scope: QueryScope,
    default_algorithm: String,
    graph_generation: AtomicU64,
    metrics_task: Mutex<Option<JoinHandle<()>>>,
    started: Instant,
}

impl Engine {
    pub fn new(config: &GroveConfig, collaborators: Collaborators) -> Self {
        let events = EventBus::new();
        let index = Arc::new(SymbolIndex::new(
            collaborators.provider,
            collaborators.resolver,
            events.clone(),
        ));
        let mut scope = QueryScope::workspace();
        scope.include_tests = config.index.include_tests;

        Engine {
            query: QueryEngine::new(index, config.query.clone(), events.clone()),
            cache: CacheManager::new(CacheOptions::from(&config.cache), collaborators.oracle, events.clone()),
            layout: LayoutEngine::new(LayoutOptions::from(&config.layout), events.clone()),
            events,
            metrics: MetricsRecorder::new(),
            scope,
            default_algorithm: config.layout.algorithm.clone(),
            graph_generation: AtomicU64::new(0),
            metrics_task: Mutex::new(None),
            started: Instant::now(),
        }
    }

    /// Add or replace a layout strategy. Call before sharing the engine.
    pub fn register_layout(&mut self, tag: impl Into<String>, strategy: Arc<dyn LayoutStrategy>) {
        self.layout.register(tag, strategy);
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn subscribe(&self) -> Subscription {
        self.events.subscribe()
    }

    pub fn index(&self) -> &Arc<SymbolIndex> {
        self.query.index()
    }

    /// Scope used when a request does not carry one.
    pub fn default_scope(&self) -> &QueryScope {
        &self.scope
    }

    pub fn default_algorithm(&self) -> &str {
        &self.default_algorithm
    }

    pub fn layout_algorithms(&self) -> Vec<String> {
        self.layout.algorithms()
    }

    // ── Index ────────────────────────────────────────────

    pub async fn build_index(&self, scope: Option<&QueryScope>) -> GraphResult<IndexSummary> {
        let scope = scope.unwrap_or(&self.scope);
        let summary = self.index().build_index(scope).await?;
        self.drop_index_derived().await;
        self.metrics.record_index_build(summary.elapsed_ms).await;
        Ok(summary)
    }

    pub async fn update_index(&self, uris: &[String]) -> GraphResult<IndexSummary> {
        let summary = self.index().update_index(uris).await?;
        self.drop_index_derived().await;
        Ok(summary)
    }

    pub async fn clear_index(&self) {
        self.query.clear_index().await;
        self.drop_index_derived().await;
        tracing::info!("Index cleared");
    }

    async fn drop_index_derived(&self) {
        self.query.clear_result_cache().await;
        for store in INDEX_DERIVED_STORES {
            self.cache.clear(Some(store)).await;
        }
    }

    // ── Queries ──────────────────────────────────────────

    pub async fn execute_query(&self, query: &GraphQuery, scope: Option<&QueryScope>) -> GraphResult<QueryResult> {
        let started = Instant::now();
        let scope = scope.unwrap_or(&self.scope);
        let key = cache_key(query, scope)?;

        if let Some(mut cached) = self.cache.get::<QueryResult>(CacheStore::QueryResult, &key).await {
            cached.from_cache = true;
            cached.execution_time_ms = started.elapsed().as_secs_f64() * 1000.0;
            self.events.emit(GraphEvent::QueryExecuted {
                total: cached.total,
                elapsed_ms: cached.execution_time_ms,
                from_cache: true,
            });
            self.metrics.record_query(cached.execution_time_ms).await;
            return Ok(cached);
        }

        let result = self.query.execute_query(query, scope).await?;
        self.cache
            .set(CacheStore::QueryResult, key, &result, deps::query_dependencies(&result.symbols))
            .await?;
        self.metrics.record_query(result.execution_time_ms).await;
        Ok(result)
    }

    pub async fn execute_natural_language_query(
        &self,
        text: &str,
        scope: Option<&QueryScope>,
    ) -> GraphResult<QueryResult> {
        let query = translate(text);
        tracing::debug!("Translated '{}' into {:?}", text, query);
        self.execute_query(&query, scope).await
    }

    pub async fn query_suggestions(&self, partial: &str) -> Vec<String> {
        self.query.query_suggestions(partial).await
    }

    pub async fn symbol_suggestions(&self, partial: &str) -> Vec<String> {
        self.query.symbol_suggestions(partial).await
    }

    /// Nodes and edges for `query` (every symbol when absent).
    ///
    /// A call that resumes after a newer call has started is discarded with
    /// `RequestSuperseded`.
    pub async fn get_graph_data(&self, query: Option<&GraphQuery>, scope: Option<&QueryScope>) -> GraphResult<GraphData> {
        let ticket = self.graph_generation.fetch_add(1, Ordering::SeqCst) + 1;
        let scope = scope.unwrap_or(&self.scope);
        let query = query.cloned().unwrap_or_else(|| GraphQuery::symbols(["*"]));
        let key = cache_key(&query, scope)?;

        let cached = self.cache.get::<GraphData>(CacheStore::GraphData, &key).await;
        self.ensure_current(ticket)?;
        if let Some(data) = cached {
            return Ok(data);
        }

        let result = self.execute_query(&query, Some(scope)).await?;
        self.ensure_current(ticket)?;
        let mut relationships = self.index().relationships_in_scope(scope).await;
        self.ensure_current(ticket)?;
        relationships.extend(result.relationships);

        let data = GraphData::from_parts(&result.symbols, &relationships);
        tracing::debug!("Assembled graph with {} nodes and {} edges", data.nodes.len(), data.edges.len());
        self.cache
            .set(CacheStore::GraphData, key, &data, deps::graph_dependencies(&data))
            .await?;
        Ok(data)
    }

    fn ensure_current(&self, ticket: u64) -> GraphResult<()> {
        if self.graph_generation.load(Ordering::SeqCst) == ticket {
            return Ok(());
        }
        tracing::debug!("Discarding superseded graph request #{}", ticket);
        Err(GraphError::RequestSuperseded {
            operation: "getGraphData".to_string(),
        })
    }

    pub async fn file_symbols(&self, uri: &str) -> GraphResult<Vec<Symbol>> {
        if let Some(symbols) = self.cache.get::<Vec<Symbol>>(CacheStore::Symbols, uri).await {
            return Ok(symbols);
        }
        let symbols = self.index().file_symbols(uri).await;
        self.cache
            .set(CacheStore::Symbols, uri, &symbols, deps::symbol_dependencies(uri))
            .await?;
        Ok(symbols)
    }

    pub async fn file_relationships(&self, uri: &str) -> GraphResult<Vec<Relationship>> {
        if let Some(relationships) = self.cache.get::<Vec<Relationship>>(CacheStore::Relationships, uri).await {
            return Ok(relationships);
        }
        let relationships = self.index().file_relationships(uri).await;
        self.cache
            .set(
                CacheStore::Relationships,
                uri,
                &relationships,
                deps::relationship_dependencies(&relationships),
            )
            .await?;
        Ok(relationships)
    }

    pub async fn find_references(&self, uri: &str, position: Position) -> GraphResult<Vec<Location>> {
        let key = format!("{uri}:{}:{}", position.line, position.character);
        if let Some(locations) = self.cache.get::<Vec<Location>>(CacheStore::References, &key).await {
            return Ok(locations);
        }
        let locations = self
            .index()
            .provider()
            .references(uri, position)
            .await
            .map_err(|e| GraphError::AnalysisFailed {
                uri: uri.to_string(),
                cause: e.to_string(),
            })?;
        self.cache
            .set(CacheStore::References, key, &locations, deps::reference_dependencies(&locations))
            .await?;
        Ok(locations)
    }

    // ── Layout ───────────────────────────────────────────

    /// Lay out `data`, `algorithm` defaulting to the configured one.
    pub async fn compute_layout(
        &self,
        data: &GraphData,
        algorithm: Option<&str>,
        update: &LayoutOptionsUpdate,
    ) -> GraphResult<LayoutResult> {
        let algorithm = algorithm.unwrap_or(&self.default_algorithm);
        let key = layout_key(data, algorithm, update)?;
        if let Some(result) = self.cache.get::<LayoutResult>(CacheStore::Layout, &key).await {
            return Ok(result);
        }

        let result = self.layout.compute_layout(data, algorithm, update)?;
        self.metrics.record_layout(result.elapsed_ms).await;
        self.cache.set(CacheStore::Layout, key, &result, Vec::new()).await?;
        Ok(result)
    }

    pub async fn compute_incremental_layout(
        &self,
        data: &GraphData,
        previous: &LayoutResult,
        changed: &[String],
    ) -> GraphResult<LayoutResult> {
        let result = self.layout.compute_incremental_layout(data, previous, changed)?;
        self.metrics.record_layout(result.elapsed_ms).await;
        Ok(result)
    }

    pub async fn optimize_layout(&self, result: &LayoutResult, extra_iterations: Option<usize>) -> GraphResult<LayoutResult> {
        let optimized = self.layout.optimize_layout(result, extra_iterations)?;
        self.metrics.record_layout(optimized.elapsed_ms).await;
        Ok(optimized)
    }

    pub fn analyze_layout_quality(&self, result: &LayoutResult) -> LayoutQuality {
        self.layout.analyze_layout_quality(result)
    }

    // ── Cache ────────────────────────────────────────────

    pub async fn get_cache_stats(&self) -> CacheStats {
        self.cache.stats().await
    }

    /// Clear one store, or everything when `store` is `None`.
    ///
    /// Clearing the query-result store also empties the executor's own result cache.
    pub async fn clear_cache(&self, store: Option<CacheStore>) {
        self.cache.clear(store).await;
        if matches!(store, None | Some(CacheStore::QueryResult)) {
            self.query.clear_result_cache().await;
        }
    }

    pub async fn optimize_cache(&self) -> usize {
        self.cache.optimize_cache().await
    }

    pub async fn set_cache_options(&self, update: &CacheOptionsUpdate) -> GraphResult<CacheOptions> {
        self.cache.set_cache_options(update).await
    }

    pub async fn cache_options(&self) -> CacheOptions {
        self.cache.options().await
    }

    // ── Metrics & lifecycle ──────────────────────────────

    pub async fn performance_metrics(&self) -> PerformanceMetrics {
        let summary = self.index().summary().await;
        let cache = self.cache.stats().await;
        let mut metrics = PerformanceMetrics {
            file_count: summary.file_count,
            symbol_count: summary.symbol_count,
            relationship_count: summary.relationship_count,
            cache,
            cache_hit_rate: cache.hit_rate(),
            cached_queries: self.query.cached_results().await,
            ..PerformanceMetrics::default()
        };
        self.metrics.fill(&mut metrics, self.started.elapsed()).await;
        metrics
    }

    /// Snapshot the metrics and publish them as `performance-metrics-updated`.
    pub async fn refresh_metrics(&self) -> GraphResult<PerformanceMetrics> {
        let metrics = self.performance_metrics().await;
        self.events.emit(GraphEvent::PerformanceMetricsUpdated {
            metrics: serde_json::to_value(&metrics)?,
        });
        Ok(metrics)
    }

    /// Publish metrics every `period` until disposal. Replaces any running refresh task.
    pub async fn start_metrics(self: &Arc<Self>, period: Duration) {
        let engine: Weak<Engine> = Arc::downgrade(self);
        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(tokio::time::Instant::now() + period, period);
            loop {
                ticker.tick().await;
                let Some(engine) = engine.upgrade() else {
                    break;
                };
                if let Err(e) = engine.refresh_metrics().await {
                    tracing::warn!("Metrics refresh failed: {}", e);
                }
            }
        });
        if let Some(previous) = self.metrics_task.lock().await.replace(handle) {
            previous.abort();
        }
        tracing::debug!("Metrics refresh every {:?}", period);
    }

    pub async fn health_check(&self) -> HealthStatus {
        let summary = self.index().summary().await;
        HealthStatus {
            status: "ok".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            provider: self.index().provider().name().to_string(),
            indexed_files: summary.file_count,
            symbol_count: summary.symbol_count,
            cache_entries: self.cache.stats().await.entry_count,
            layout_algorithms: self.layout.algorithms(),
            uptime_secs: self.started.elapsed().as_secs_f64(),
        }
    }

    /// Stop the timers, drop every index and cache entry, and shut the provider down.
    pub async fn dispose(&self) {
        if let Some(task) = self.metrics_task.lock().await.take() {
            task.abort();
        }
        self.query.clear_index().await;
        self.cache.dispose().await;
        self.metrics.reset().await;
        if let Err(e) = self.index().provider().shutdown().await {
            tracing::warn!("Analysis provider shutdown failed: {}", e);
        }
        tracing::info!("Engine disposed");
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        if let Some(task) = self.metrics_task.get_mut().take() {
            task.abort();
        }
    }
}

/// Layout cache key: the tag plus a digest of the input graph and options.
fn layout_key(data: &GraphData, algorithm: &str, update: &LayoutOptionsUpdate) -> GraphResult<String> {
    let mut hasher = DefaultHasher::new();
    serde_json::to_string(data)?.hash(&mut hasher);
    serde_json::to_string(update)?.hash(&mut hasher);
    Ok(format!("{algorithm}:{:016x}", hasher.finish()))
}
