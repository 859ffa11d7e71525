//! Bounded insertion-order cache for query results
//!
//! Entries never go stale here: there is no dependency tracking, only
//! capacity eviction of the oldest insertion. Callers that need staleness
//! checks layer the cache manager in front of this one.

use indexmap::IndexMap;

use super::QueryResult;

#[derive(Debug)]
pub struct QueryResultCache {
    entries: IndexMap<String, QueryResult>,
    capacity: usize,
}

impl QueryResultCache {
    pub fn new(capacity: usize) -> Self {
        QueryResultCache {
            entries: IndexMap::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    pub fn get(&self, key: &str) -> Option<QueryResult> {
        self.entries.get(key).cloned()
    }

    /// Insert, evicting the oldest insertion when full.
    pub fn insert(&mut self, key: String, result: QueryResult) {
        if !self.entries.contains_key(&key) && self.entries.len() >= self.capacity {
            if let Some((evicted, _)) = self.entries.shift_remove_index(0) {
                tracing::trace!("Query cache full, evicted {}", evicted);
            }
        }
        self.entries.insert(key, result);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
