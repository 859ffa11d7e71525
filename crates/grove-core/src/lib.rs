//! Grove Core: symbol graph data model, signals, errors and configuration

pub mod config;
pub mod error;
pub mod events;
pub mod graph;
pub mod model;
pub mod scope;
pub mod symbols;


#[cfg(test)]
pub mod test_utils;

pub use config::{CacheSettings, GroveConfig, LayoutSettings, QuerySettings};
pub use error::{GraphError, GraphResult};
pub use events::{EventBus, GraphEvent, Subscription};
pub use graph::SymbolGraph;
pub use model::{
    CacheStats, CacheStore, GraphData, GraphEdge, GraphNode, IndexedSymbol, Language, Location, Position, Range,
    Relationship, RelationshipMetadata, RelationshipType, Symbol, SymbolKind, SymbolMetadata, Visibility, symbol_id,
};
pub use scope::{QueryScope, is_test_file};
pub use symbols::{SymbolRef, SymbolTable};
