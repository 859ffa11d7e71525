//! WebSocket handling: engine signals out, commands in

use std::sync::Arc;

use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use grove_core::{GraphError, GraphEvent};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::ServerState;
use crate::commands::{CommandRequest, dispatch};
use crate::engine::Engine;

/// WebSocket message types for client-server communication
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum WsMessage {
    /// Client runs a command; `id` is echoed in the reply
    Command {
        #[serde(default)]
        id: Option<u64>,
        command: String,
        #[serde(default)]
        args: Vec<Value>,
    },
    /// Server answers a command
    Response { id: Option<u64>, result: Value },
    /// Server reports a failed command
    Error {
        id: Option<u64>,
        code: String,
        message: String,
        details: Value,
    },
    /// Server forwards an engine signal
    Signal { event: GraphEvent },
    /// Ping/pong for keepalive
    Ping,
    Pong,
}

impl WsMessage {
    fn error(id: Option<u64>, error: &GraphError) -> Self {
        WsMessage::Error {
            id,
            code: error.code().to_string(),
            message: error.to_string(),
            details: error.details(),
        }
    }
}

/// Handle WebSocket upgrade requests
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<ServerState>) {
    info!("New WebSocket connection established");

    let (mut sender, mut receiver) = socket.split();
    let mut signals = state.engine.subscribe();
    let (reply_tx, mut reply_rx) = mpsc::unbounded_channel::<WsMessage>();

    // Replies and signals share the one sink
    let mut send_task = tokio::spawn(async move {
        loop {
            let message = tokio::select! {
                event = signals.recv() => match event {
                    Some(event) => WsMessage::Signal { event },
                    None => break,
                },
                reply = reply_rx.recv() => match reply {
                    Some(reply) => reply,
                    None => break,
                },
            };
            let text = match serde_json::to_string(&message) {
                Ok(text) => text,
                Err(e) => {
                    warn!("Failed to serialize WebSocket message: {}", e);
                    continue;
                }
            };
            if sender.send(Message::Text(text)).await.is_err() {
                debug!("Failed to send message to WebSocket client");
                break;
            }
        }
    });

    let engine = Arc::clone(&state.engine);
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => match serde_json::from_str::<WsMessage>(&text) {
                    Ok(ws_msg) => {
                        let Some(reply) = handle_client_message(ws_msg, &engine).await else {
                            continue;
                        };
                        if reply_tx.send(reply).is_err() {
                            break;
                        }
                    }
                    Err(e) => warn!("Failed to parse WebSocket message: {}", e),
                },
                Message::Close(_) => {
                    debug!("WebSocket client disconnected");
                    break;
                }
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = (&mut send_task) => {
            recv_task.abort();
        }
        _ = (&mut recv_task) => {
            send_task.abort();
        }
    }

    info!("WebSocket connection closed");
}

/// Reply to one client message, if it warrants a reply.
pub async fn handle_client_message(msg: WsMessage, engine: &Engine) -> Option<WsMessage> {
    match msg {
        WsMessage::Command { id, command, args } => {
            let request = CommandRequest::new(command, args);
            Some(match dispatch(engine, &request).await {
                Ok(result) => WsMessage::Response { id, result },
                Err(e) => WsMessage::error(id, &e),
            })
        }
        WsMessage::Ping => Some(WsMessage::Pong),
        other => {
            debug!("Ignoring client message: {:?}", other);
            None
        }
    }
}
