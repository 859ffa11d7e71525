//! HTTP + WebSocket server around the grove engine
//!
//! [`Engine`] is the facade every transport talks to. Commands arrive as
//! `{command, args}` over `POST /api/command` or the `/ws` socket, which
//! also streams engine signals.

pub mod commands;
pub mod engine;
pub mod handlers;
pub mod metrics;
pub mod router;
pub mod websocket;

#[cfg(test)]
mod tests;

use std::sync::Arc;

use grove_core::config::ServerSettings;

pub use commands::{COMMANDS, CommandRequest, dispatch};
pub use engine::{Collaborators, Engine, HealthStatus};
pub use metrics::PerformanceMetrics;
pub use router::create_router;

/// State shared by every route
pub struct ServerState {
    pub engine: Arc<Engine>,
}

impl ServerState {
    pub fn new(engine: Arc<Engine>) -> Self {
        ServerState { engine }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl From<&ServerSettings> for ServerConfig {
    fn from(settings: &ServerSettings) -> Self {
        ServerConfig {
            host: settings.host.clone(),
            port: settings.port,
        }
    }
}

pub struct GroveServer {
    state: Arc<ServerState>,
    config: ServerConfig,
}

impl GroveServer {
    pub fn new(engine: Arc<Engine>, config: ServerConfig) -> Self {
        GroveServer {
            state: Arc::new(ServerState::new(engine)),
            config,
        }
    }

    pub fn state(&self) -> Arc<ServerState> {
        Arc::clone(&self.state)
    }

    /// Bind and serve until the process is stopped.
    pub async fn start(self) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind((self.config.host.as_str(), self.config.port)).await?;
        tracing::info!("Grove server listening on http://{}", listener.local_addr()?);
        axum::serve(listener, create_router(self.state)).await?;
        Ok(())
    }
}
