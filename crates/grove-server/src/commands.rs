//! Command surface: `{command, args}` requests dispatched onto the engine
//!
//! Arguments are positional JSON values. Trailing optional arguments may be
//! omitted or `null`.

use grove_cache::{CacheOptions, CacheOptionsUpdate};
use grove_core::{CacheStore, GraphData, GraphError, GraphResult, Position, QueryScope};
use grove_index::GraphQuery;
use grove_layout::{LayoutOptionsUpdate, LayoutResult};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::engine::Engine;

/// Every command name `dispatch` accepts.
pub const COMMANDS: [&str; 21] = [
    "executeQuery",
    "executeNaturalLanguageQuery",
    "getGraphData",
    "computeLayout",
    "computeIncrementalLayout",
    "optimizeLayout",
    "analyzeLayoutQuality",
    "getCache",
    "clearCache",
    "optimizeCache",
    "setCacheOptions",
    "getPerformanceMetrics",
    "healthCheck",
    "buildIndex",
    "updateIndex",
    "clearIndex",
    "getQuerySuggestions",
    "getSymbolSuggestions",
    "getFileSymbols",
    "getFileRelationships",
    "findReferences",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandRequest {
    pub command: String,
    #[serde(default)]
    pub args: Vec<Value>,
}

impl CommandRequest {
    pub fn new(command: impl Into<String>, args: Vec<Value>) -> Self {
        CommandRequest {
            command: command.into(),
            args,
        }
    }
}

struct Args<'a> {
    command: &'a str,
    values: &'a [Value],
}

impl Args<'_> {
    fn required<T: DeserializeOwned>(&self, index: usize, name: &str) -> GraphResult<T> {
        match self.values.get(index) {
            Some(value) if !value.is_null() => self.parse(value, name),
            _ => Err(self.invalid(format!("missing argument {index} ({name})"))),
        }
    }

    fn optional<T: DeserializeOwned>(&self, index: usize, name: &str) -> GraphResult<Option<T>> {
        match self.values.get(index) {
            Some(value) if !value.is_null() => self.parse(value, name).map(Some),
            _ => Ok(None),
        }
    }

    fn parse<T: DeserializeOwned>(&self, value: &Value, name: &str) -> GraphResult<T> {
        T::deserialize(value).map_err(|e| self.invalid(format!("{name}: {e}")))
    }

    fn invalid(&self, reason: impl Into<String>) -> GraphError {
        GraphError::InvalidArguments {
            command: self.command.to_string(),
            reason: reason.into(),
        }
    }
}

/// Run one command against `engine` and serialize its result.
pub async fn dispatch(engine: &Engine, request: &CommandRequest) -> GraphResult<Value> {
    let args = Args {
        command: &request.command,
        values: &request.args,
    };
    tracing::debug!("Dispatching {} ({} args)", request.command, request.args.len());

    let value = match request.command.as_str() {
        "executeQuery" => {
            let query: GraphQuery = args.required(0, "query")?;
            let scope: Option<QueryScope> = args.optional(1, "scope")?;
            serde_json::to_value(engine.execute_query(&query, scope.as_ref()).await?)?
        }
        "executeNaturalLanguageQuery" => {
            let text: String = args.required(0, "text")?;
            let scope: Option<QueryScope> = args.optional(1, "scope")?;
            serde_json::to_value(engine.execute_natural_language_query(&text, scope.as_ref()).await?)?
        }
        "getGraphData" => {
            let query: Option<GraphQuery> = args.optional(0, "query")?;
            let scope: Option<QueryScope> = args.optional(1, "scope")?;
            serde_json::to_value(engine.get_graph_data(query.as_ref(), scope.as_ref()).await?)?
        }
        "computeLayout" => {
            let data: GraphData = args.required(0, "data")?;
            let algorithm: Option<String> = args.optional(1, "algorithm")?;
            let options: LayoutOptionsUpdate = args.optional(2, "options")?.unwrap_or_default();
            serde_json::to_value(engine.compute_layout(&data, algorithm.as_deref(), &options).await?)?
        }
        "computeIncrementalLayout" => {
            let data: GraphData = args.required(0, "data")?;
            let previous: LayoutResult = args.required(1, "previous")?;
            let changed: Vec<String> = args.required(2, "changedNodeIds")?;
            serde_json::to_value(engine.compute_incremental_layout(&data, &previous, &changed).await?)?
        }
        "optimizeLayout" => {
            let result: LayoutResult = args.required(0, "layout")?;
            let extra: Option<usize> = args.optional(1, "iterations")?;
            serde_json::to_value(engine.optimize_layout(&result, extra).await?)?
        }
        "analyzeLayoutQuality" => {
            let result: LayoutResult = args.required(0, "layout")?;
            serde_json::to_value(engine.analyze_layout_quality(&result))?
        }
        "getCache" => serde_json::to_value(engine.get_cache_stats().await)?,
        "clearCache" => {
            let store = args
                .optional::<String>(0, "store")?
                .map(|name| name.parse::<CacheStore>().map_err(|e| args.invalid(e)))
                .transpose()?;
            engine.clear_cache(store).await;
            json!({ "cleared": store.map_or("all", |s| s.as_str()) })
        }
        "optimizeCache" => json!({ "removed": engine.optimize_cache().await }),
        "setCacheOptions" => {
            let update: CacheOptionsUpdate = args.required(0, "options")?;
            let options = engine
                .set_cache_options(&update)
                .await
                .map_err(|e| args.invalid(e.to_string()))?;
            options_json(&options)
        }
        "getPerformanceMetrics" => serde_json::to_value(engine.performance_metrics().await)?,
        "healthCheck" => serde_json::to_value(engine.health_check().await)?,
        "buildIndex" => {
            let scope: Option<QueryScope> = args.optional(0, "scope")?;
            serde_json::to_value(engine.build_index(scope.as_ref()).await?)?
        }
        "updateIndex" => {
            let uris: Vec<String> = args.required(0, "uris")?;
            serde_json::to_value(engine.update_index(&uris).await?)?
        }
        "clearIndex" => {
            engine.clear_index().await;
            json!({ "cleared": true })
        }
        "getQuerySuggestions" => {
            let partial: String = args.required(0, "partial")?;
            serde_json::to_value(engine.query_suggestions(&partial).await)?
        }
        "getSymbolSuggestions" => {
            let partial: String = args.required(0, "partial")?;
            serde_json::to_value(engine.symbol_suggestions(&partial).await)?
        }
        "getFileSymbols" => {
            let uri: String = args.required(0, "uri")?;
            serde_json::to_value(engine.file_symbols(&uri).await?)?
        }
        "getFileRelationships" => {
            let uri: String = args.required(0, "uri")?;
            serde_json::to_value(engine.file_relationships(&uri).await?)?
        }
        "findReferences" => {
            let uri: String = args.required(0, "uri")?;
            let position: Position = args.required(1, "position")?;
            serde_json::to_value(engine.find_references(&uri, position).await?)?
        }
        other => return Err(GraphError::UnknownCommand(other.to_string())),
    };
    Ok(value)
}

/// Cache options in the same shape `setCacheOptions` accepts.
pub fn options_json(options: &CacheOptions) -> Value {
    json!({
        "maxSize": options.max_size_bytes,
        "maxEntries": options.max_entries,
        "ttlSecs": options.ttl.as_secs(),
        "cleanupIntervalSecs": options.cleanup_interval.as_secs(),
    })
}
