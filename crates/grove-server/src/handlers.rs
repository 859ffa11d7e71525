//! REST API handlers for the Grove server

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use grove_core::{CacheStats, GraphData, GraphError, QueryScope};
use grove_index::{GraphQuery, IndexSummary, QueryResult};
use grove_layout::{LayoutOptionsUpdate, LayoutQuality, LayoutResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::commands::{CommandRequest, dispatch};
use crate::engine::HealthStatus;
use crate::metrics::PerformanceMetrics;
use crate::ServerState;

/// JSON error body: `{code, message, details}`
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
    pub details: Value,
}

/// A `GraphError` on its way out as an HTTP response.
#[derive(Debug)]
pub struct ApiError(pub GraphError);

impl From<GraphError> for ApiError {
    fn from(error: GraphError) -> Self {
        ApiError(error)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            GraphError::RequestSuperseded { .. } => StatusCode::CONFLICT,
            e if e.is_client_error() => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            tracing::error!("{} failed: {}", self.0.code(), self.0);
        } else {
            tracing::debug!("Rejected request: {}", self.0);
        }
        let body = ErrorBody {
            code: self.0.code().to_string(),
            message: self.0.to_string(),
            details: self.0.details(),
        };
        (status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<Json<T>, ApiError>;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphParams {
    /// Symbol name pattern; every symbol when absent.
    pub pattern: Option<String>,
    #[serde(default)]
    pub include_tests: bool,
}

#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    pub query: GraphQuery,
    #[serde(default)]
    pub scope: Option<QueryScope>,
}

#[derive(Debug, Deserialize)]
pub struct TextParams {
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct SuggestParams {
    #[serde(default)]
    pub q: String,
}

#[derive(Debug, Serialize)]
pub struct Suggestions {
    pub queries: Vec<String>,
    pub symbols: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct LayoutRequest {
    pub data: GraphData,
    #[serde(default)]
    pub algorithm: Option<String>,
    #[serde(default)]
    pub options: LayoutOptionsUpdate,
}

#[derive(Debug, Serialize)]
pub struct LayoutResponse {
    pub layout: LayoutResult,
    pub quality: LayoutQuality,
}

/// Health check endpoint
pub async fn health_check(State(state): State<Arc<ServerState>>) -> Json<HealthStatus> {
    Json(state.engine.health_check().await)
}

/// Run any command through the dispatch surface
pub async fn run_command(
    State(state): State<Arc<ServerState>>,
    Json(request): Json<CommandRequest>,
) -> ApiResult<Value> {
    Ok(Json(dispatch(&state.engine, &request).await?))
}

/// Graph data for a name pattern
pub async fn get_graph(
    State(state): State<Arc<ServerState>>,
    Query(params): Query<GraphParams>,
) -> ApiResult<GraphData> {
    let query = params.pattern.map(|pattern| GraphQuery::symbols([pattern]));
    let mut scope = state.engine.default_scope().clone();
    scope.include_tests |= params.include_tests;
    Ok(Json(state.engine.get_graph_data(query.as_ref(), Some(&scope)).await?))
}

pub async fn post_query(
    State(state): State<Arc<ServerState>>,
    Json(request): Json<QueryRequest>,
) -> ApiResult<QueryResult> {
    Ok(Json(state.engine.execute_query(&request.query, request.scope.as_ref()).await?))
}

pub async fn natural_query(
    State(state): State<Arc<ServerState>>,
    Query(params): Query<TextParams>,
) -> ApiResult<QueryResult> {
    Ok(Json(state.engine.execute_natural_language_query(&params.text, None).await?))
}

pub async fn suggestions(State(state): State<Arc<ServerState>>, Query(params): Query<SuggestParams>) -> Json<Suggestions> {
    Json(Suggestions {
        queries: state.engine.query_suggestions(&params.q).await,
        symbols: state.engine.symbol_suggestions(&params.q).await,
    })
}

/// Lay out the posted graph and score the result
pub async fn post_layout(
    State(state): State<Arc<ServerState>>,
    Json(request): Json<LayoutRequest>,
) -> ApiResult<LayoutResponse> {
    let layout = state
        .engine
        .compute_layout(&request.data, request.algorithm.as_deref(), &request.options)
        .await?;
    let quality = state.engine.analyze_layout_quality(&layout);
    Ok(Json(LayoutResponse { layout, quality }))
}

pub async fn post_index(State(state): State<Arc<ServerState>>) -> ApiResult<IndexSummary> {
    Ok(Json(state.engine.build_index(None).await?))
}

pub async fn get_cache(State(state): State<Arc<ServerState>>) -> Json<CacheStats> {
    Json(state.engine.get_cache_stats().await)
}

pub async fn clear_cache(State(state): State<Arc<ServerState>>) -> StatusCode {
    state.engine.clear_cache(None).await;
    StatusCode::NO_CONTENT
}

pub async fn get_metrics(State(state): State<Arc<ServerState>>) -> Json<PerformanceMetrics> {
    Json(state.engine.performance_metrics().await)
}
