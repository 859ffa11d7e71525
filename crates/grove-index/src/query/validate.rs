//! Query validation and normalisation

use super::{GraphQuery, MAX_DEPTH, MAX_LIMIT, MIN_DEPTH};

/// Every problem with `query`. Empty means the query may run.
pub fn validate(query: &GraphQuery) -> Vec<String> {
    let mut violations = Vec::new();

    match (&query.select.symbols, &query.select.relationships) {
        (None, None) => violations.push("select must name symbols or relationships".to_string()),
        (symbols, relationships) => {
            if symbols.as_ref().is_some_and(Vec::is_empty) {
                violations.push("select.symbols must not be empty".to_string());
            }
            if relationships.as_ref().is_some_and(Vec::is_empty) {
                violations.push("select.relationships must not be empty".to_string());
            }
        }
    }

    if let Some(traverse) = &query.traverse {
        if !(MIN_DEPTH..=MAX_DEPTH).contains(&traverse.depth) {
            violations.push(format!(
                "traverse.depth must be between {MIN_DEPTH} and {MAX_DEPTH}, got {}",
                traverse.depth
            ));
        }
    }
    if let Some(offset) = query.offset {
        if offset < 0 {
            violations.push(format!("offset must not be negative, got {offset}"));
        }
    }
    if let Some(limit) = query.limit {
        if limit < 1 {
            violations.push(format!("limit must be at least 1, got {limit}"));
        }
    }
    violations
}

/// Fill defaults and clamp to the executor's bounds.
///
/// `max_limit` is capped at [`MAX_LIMIT`] whatever the caller passes.
pub fn optimize(query: &GraphQuery, max_limit: i64) -> GraphQuery {
    let ceiling = max_limit.clamp(1, MAX_LIMIT);
    let mut optimized = query.clone();
    optimized.limit = Some(query.limit.unwrap_or(ceiling).min(ceiling));
    optimized.offset = Some(query.offset.unwrap_or(0));
    if let Some(traverse) = optimized.traverse.as_mut() {
        traverse.depth = traverse.depth.min(MAX_DEPTH);
    }
    if let Some(filter) = optimized.filter.as_mut() {
        filter.include_tests.get_or_insert(false);
    }
    optimized
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{QueryFilter, QuerySelect, Traversal, TraversalDirection};

    #[test]
    fn test_valid_query_has_no_violations() {
        let query = GraphQuery::symbols(["*"]).with_limit(10).with_offset(0);
        assert!(validate(&query).is_empty());
    }

    #[test]
    fn test_collects_every_violation() {
        let query = GraphQuery {
            select: QuerySelect {
                symbols: Some(vec![]),
                relationships: Some(vec![]),
            },
            traverse: Some(Traversal::new(11, TraversalDirection::Both)),
            offset: Some(-1),
            limit: Some(0),
            ..Default::default()
        };
        let violations = validate(&query);
        assert_eq!(violations.len(), 5);
        assert!(violations.iter().any(|v| v.contains("traverse.depth")));
    }

    #[test]
    fn test_missing_select_is_a_violation() {
        let violations = validate(&GraphQuery::default());
        assert_eq!(violations, vec!["select must name symbols or relationships".to_string()]);
    }

    #[test]
    fn test_depth_zero_is_invalid() {
        let query = GraphQuery::symbols(["a"]).with_traversal(Traversal::new(0, TraversalDirection::Outgoing));
        assert_eq!(validate(&query).len(), 1);
    }

    #[test]
    fn test_optimize_fills_defaults_and_clamps() {
        let query = GraphQuery::symbols(["*"])
            .with_limit(5000)
            .with_filter(QueryFilter::default());
        let optimized = optimize(&query, 1000);
        assert_eq!(optimized.limit, Some(1000));
        assert_eq!(optimized.offset, Some(0));
        assert_eq!(optimized.filter.unwrap().include_tests, Some(false));

        let defaulted = optimize(&GraphQuery::symbols(["*"]), 1000);
        assert_eq!(defaulted.limit, Some(1000));
        assert!(defaulted.filter.is_none());
    }

    #[test]
    fn test_optimize_keeps_small_limits() {
        let optimized = optimize(&GraphQuery::symbols(["*"]).with_limit(3).with_offset(2), 1000);
        assert_eq!(optimized.limit, Some(3));
        assert_eq!(optimized.offset, Some(2));
    }
}
