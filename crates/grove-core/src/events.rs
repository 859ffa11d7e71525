//! In-process signal bus
//!
//! Signals are fire-and-forget: emitting with no listeners is not an error,
//! and a listener that falls behind the channel capacity loses the oldest
//! signals. Listeners unsubscribe by dropping their [`Subscription`].

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;

use crate::model::{CacheStats, CacheStore};

const DEFAULT_CAPACITY: usize = 256;

/// Every signal the engine emits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum GraphEvent {
    #[serde(rename_all = "camelCase")]
    SymbolsChanged { uris: Vec<String>, symbol_count: usize },
    #[serde(rename_all = "camelCase")]
    RelationshipsChanged { relationship_count: usize },
    #[serde(rename_all = "camelCase")]
    IndexUpdated { symbol_count: usize },
    #[serde(rename_all = "camelCase")]
    QueryExecuted {
        total: usize,
        elapsed_ms: f64,
        from_cache: bool,
    },
    #[serde(rename_all = "camelCase")]
    LayoutComputed {
        algorithm: String,
        node_count: usize,
        elapsed_ms: f64,
    },
    #[serde(rename_all = "camelCase")]
    CacheEvicted {
        store: CacheStore,
        key: String,
        reason: String,
    },
    #[serde(rename_all = "camelCase")]
    CacheStatsUpdated { stats: CacheStats },
    #[serde(rename_all = "camelCase")]
    PerformanceMetricsUpdated { metrics: serde_json::Value },
}

impl GraphEvent {
    /// Signal name as exposed to listeners.
    pub fn name(&self) -> &'static str {
        match self {
            GraphEvent::SymbolsChanged { .. } => "symbols-changed",
            GraphEvent::RelationshipsChanged { .. } => "relationships-changed",
            GraphEvent::IndexUpdated { .. } => "index-updated",
            GraphEvent::QueryExecuted { .. } => "query-executed",
            GraphEvent::LayoutComputed { .. } => "layout-computed",
            GraphEvent::CacheEvicted { .. } => "cache-evicted",
            GraphEvent::CacheStatsUpdated { .. } => "cache-stats-updated",
            GraphEvent::PerformanceMetricsUpdated { .. } => "performance-metrics-updated",
        }
    }
}

/// Cloneable handle for emitting and subscribing to signals.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<GraphEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        EventBus { sender }
    }

    /// Deliver a signal to the currently registered listeners.
    pub fn emit(&self, event: GraphEvent) {
        // No receivers just means nobody is listening
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> Subscription {
        Subscription {
            receiver: self.sender.subscribe(),
        }
    }

    pub fn listener_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// A registered listener. Dropping it unsubscribes.
#[derive(Debug)]
pub struct Subscription {
    receiver: broadcast::Receiver<GraphEvent>,
}

impl Subscription {
    /// Wait for the next signal. Returns `None` once the bus is gone.
    pub async fn recv(&mut self) -> Option<GraphEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!("Signal listener lagged, {} signals dropped", skipped);
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Next already-delivered signal, if any.
    pub fn try_recv(&mut self) -> Option<GraphEvent> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => return Some(event),
                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
                Err(_) => return None,
            }
        }
    }

    /// Drain everything delivered so far.
    pub fn drain(&mut self) -> Vec<GraphEvent> {
        std::iter::from_fn(|| self.try_recv()).collect()
    }

    pub fn unsubscribe(self) {}
}
