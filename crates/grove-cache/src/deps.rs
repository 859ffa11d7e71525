//! Dependency lists recorded alongside cached values
//!
//! A dependency is a resource identifier handed to the modification oracle
//! on read. Lists are sorted and deduplicated.

use std::collections::BTreeSet;

use grove_core::{GraphData, Location, Relationship, Symbol};

/// Symbols of one file depend on that file.
pub fn symbol_dependencies(uri: &str) -> Vec<String> {
    vec![uri.to_string()]
}

/// References depend on every file they point into.
pub fn reference_dependencies(locations: &[Location]) -> Vec<String> {
    collect(locations.iter().map(|l| l.uri.as_str()))
}

/// Relationship entries record no dependencies and expire only by age.
///
/// Relationship endpoints are symbol ids or raw import paths rather than
/// resources the oracle can date.
pub fn relationship_dependencies(_relationships: &[Relationship]) -> Vec<String> {
    Vec::new()
}

pub fn graph_dependencies(data: &GraphData) -> Vec<String> {
    collect(data.nodes.iter().map(|n| n.symbol.uri()))
}

/// Query results depend on the files of the returned symbols.
pub fn query_dependencies(symbols: &[Symbol]) -> Vec<String> {
    collect(symbols.iter().map(|s| s.uri()))
}

fn collect<'a>(uris: impl Iterator<Item = &'a str>) -> Vec<String> {
    uris.map(str::to_string).collect::<BTreeSet<_>>().into_iter().collect()
}
