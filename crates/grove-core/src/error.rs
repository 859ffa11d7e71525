//! Tagged errors shared by every grove crate

use serde_json::{Value, json};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GraphError {
    #[error("Invalid query: {}", violations.join("; "))]
    InvalidQuery { violations: Vec<String> },

    #[error("Index build failed for scope {scope}: {cause}")]
    IndexBuildFailed { scope: String, cause: String },

    #[error("Query execution failed: {cause}")]
    QueryExecutionFailed { cause: String },

    #[error("Layout computation failed for {algorithm}: {cause}")]
    LayoutComputationFailed { algorithm: String, cause: String },

    #[error("Unknown layout algorithm: {0}")]
    UnknownAlgorithm(String),

    #[error("Analysis failed for {uri}: {cause}")]
    AnalysisFailed { uri: String, cause: String },

    #[error("Malformed symbol in {uri}: {reason}")]
    MalformedSymbol { uri: String, reason: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    #[error("Invalid arguments for {command}: {reason}")]
    InvalidArguments { command: String, reason: String },

    #[error("Request superseded: {operation}")]
    RequestSuperseded { operation: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type GraphResult<T> = Result<T, GraphError>;

impl GraphError {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            GraphError::InvalidQuery { .. } => "INVALID_QUERY",
            GraphError::IndexBuildFailed { .. } => "INDEX_BUILD_FAILED",
            GraphError::QueryExecutionFailed { .. } => "QUERY_EXECUTION_FAILED",
            GraphError::LayoutComputationFailed { .. } => "LAYOUT_COMPUTATION_FAILED",
            GraphError::UnknownAlgorithm(_) => "UNKNOWN_ALGORITHM",
            GraphError::AnalysisFailed { .. } => "ANALYSIS_FAILED",
            GraphError::MalformedSymbol { .. } => "MALFORMED_SYMBOL",
            GraphError::InvalidConfig(_) => "INVALID_CONFIG",
            GraphError::UnknownCommand(_) => "UNKNOWN_COMMAND",
            GraphError::InvalidArguments { .. } => "INVALID_ARGUMENTS",
            GraphError::RequestSuperseded { .. } => "REQUEST_SUPERSEDED",
            GraphError::Serialization(_) => "SERIALIZATION_FAILED",
            GraphError::Io(_) => "IO_FAILED",
        }
    }

    /// Structured payload for logs and transport.
    pub fn details(&self) -> Value {
        match self {
            GraphError::InvalidQuery { violations } => json!({
                "operation": "executeQuery",
                "violations": violations,
            }),
            GraphError::IndexBuildFailed { scope, cause } => json!({
                "operation": "buildIndex",
                "scope": scope,
                "cause": cause,
            }),
            GraphError::QueryExecutionFailed { cause } => json!({
                "operation": "executeQuery",
                "cause": cause,
            }),
            GraphError::LayoutComputationFailed { algorithm, cause } => json!({
                "operation": "computeLayout",
                "algorithm": algorithm,
                "cause": cause,
            }),
            GraphError::UnknownAlgorithm(algorithm) => json!({
                "operation": "computeLayout",
                "algorithm": algorithm,
            }),
            GraphError::AnalysisFailed { uri, cause } => json!({
                "operation": "analyzeFile",
                "uri": uri,
                "cause": cause,
            }),
            GraphError::MalformedSymbol { uri, reason } => json!({
                "operation": "ingestSymbols",
                "uri": uri,
                "cause": reason,
            }),
            GraphError::InvalidConfig(cause) => json!({
                "operation": "loadConfig",
                "cause": cause,
            }),
            GraphError::UnknownCommand(command) => json!({
                "operation": "dispatch",
                "command": command,
            }),
            GraphError::InvalidArguments { command, reason } => json!({
                "operation": "dispatch",
                "command": command,
                "cause": reason,
            }),
            GraphError::RequestSuperseded { operation } => json!({
                "operation": operation,
            }),
            GraphError::Serialization(e) => json!({
                "operation": "serialize",
                "cause": e.to_string(),
            }),
            GraphError::Io(e) => json!({
                "operation": "io",
                "cause": e.to_string(),
            }),
        }
    }

    /// Errors callers may surface as a client mistake rather than a server fault.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            GraphError::InvalidQuery { .. }
                | GraphError::UnknownAlgorithm(_)
                | GraphError::UnknownCommand(_)
                | GraphError::InvalidArguments { .. }
                | GraphError::RequestSuperseded { .. }
        )
    }
}
