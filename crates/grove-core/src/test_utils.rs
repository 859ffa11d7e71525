//! Fixtures shared by grove-core tests

use crate::model::{GraphData, Location, Position, Range, Relationship, RelationshipType, Symbol, SymbolKind};

/// Build a symbol at a one-line span in `uri`.
pub fn make_symbol(uri: &str, name: &str, kind: SymbolKind, line: u32) -> Symbol {
    let range = Range::new(Position::new(line, 0), Position::new(line, 20));
    Symbol::new(name, kind, Location::new(uri, range), None)
}

/// A small graph: a -> b -> c plus an isolated pair d -> e.
pub fn sample_graph() -> GraphData {
    let uri = "file:///repo/src/lib.rs";
    let symbols: Vec<Symbol> = ["a", "b", "c", "d", "e"]
        .iter()
        .enumerate()
        .map(|(i, name)| make_symbol(uri, name, SymbolKind::Function, i as u32))
        .collect();
    let rel = |from: usize, to: usize| Relationship::new(symbols[from].id.clone(), symbols[to].id.clone(), RelationshipType::Calls);
    let relationships = vec![rel(0, 1), rel(1, 2), rel(3, 4)];
    GraphData::from_parts(&symbols, &relationships)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_graph_shape() {
        let data = sample_graph();
        assert_eq!(data.nodes.len(), 5);
        assert_eq!(data.edges.len(), 3);
    }
}
