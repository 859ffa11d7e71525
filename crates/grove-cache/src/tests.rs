use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use grove_core::{CacheStore, EventBus, GraphEvent};

use crate::manager::{CacheManager, CacheOptions, CacheOptionsUpdate};
use crate::oracle::{ModificationOracle, NeverModified};

/// Oracle whose modification times are set by the test.
#[derive(Default)]
struct ManualOracle {
    times: Mutex<HashMap<String, DateTime<Utc>>>,
}

impl ManualOracle {
    fn touch(&self, resource: &str, at: DateTime<Utc>) {
        self.times.lock().unwrap().insert(resource.to_string(), at);
    }
}

#[async_trait::async_trait]
impl ModificationOracle for ManualOracle {
    async fn last_modified(&self, resource: &str) -> Option<DateTime<Utc>> {
        self.times.lock().unwrap().get(resource).copied()
    }
}

fn options(ttl_secs: u64) -> CacheOptions {
    CacheOptions {
        ttl: Duration::from_secs(ttl_secs),
        ..CacheOptions::default()
    }
}

fn manager(options: CacheOptions) -> (CacheManager, EventBus) {
    let events = EventBus::new();
    (CacheManager::new(options, Arc::new(NeverModified), events.clone()), events)
}

fn evictions(events: Vec<GraphEvent>) -> Vec<(String, String)> {
    events
        .into_iter()
        .filter_map(|e| match e {
            GraphEvent::CacheEvicted { key, reason, .. } => Some((key, reason)),
            _ => None,
        })
        .collect()
}

#[tokio::test(start_paused = true)]
async fn test_round_trip_then_ttl_expiry() {
    let (cache, _events) = manager(options(60));
    let value = vec!["alpha".to_string(), "beta".to_string()];
    cache.set(CacheStore::Symbols, "file:///a.rs", &value, vec![]).await.unwrap();

    let hit: Option<Vec<String>> = cache.get(CacheStore::Symbols, "file:///a.rs").await;
    assert_eq!(hit, Some(value));
    assert_eq!(cache.stats().await.hit_count, 1);

    tokio::time::advance(Duration::from_secs(61)).await;
    let miss: Option<Vec<String>> = cache.get(CacheStore::Symbols, "file:///a.rs").await;
    assert!(miss.is_none());

    let stats = cache.stats().await;
    assert_eq!(stats.miss_count, 1);
    assert_eq!(stats.entry_count, 0);
    assert_eq!(stats.total_size, 0);
    assert!(!cache.contains(CacheStore::Symbols, "file:///a.rs").await);
}

#[tokio::test]
async fn test_stores_are_independent() {
    let (cache, _events) = manager(CacheOptions::default());
    cache.set(CacheStore::Layout, "k", &1, vec![]).await.unwrap();
    cache.set(CacheStore::GraphData, "k", &2, vec![]).await.unwrap();

    assert_eq!(cache.get::<i32>(CacheStore::Layout, "k").await, Some(1));
    assert_eq!(cache.get::<i32>(CacheStore::GraphData, "k").await, Some(2));
    assert_eq!(cache.get::<i32>(CacheStore::Symbols, "k").await, None);
}

#[tokio::test]
async fn test_every_get_publishes_stats() {
    let (cache, events) = manager(CacheOptions::default());
    let mut sub = events.subscribe();
    cache.set(CacheStore::References, "r", &"x", vec![]).await.unwrap();
    cache.get_value(CacheStore::References, "r").await;
    cache.get_value(CacheStore::References, "missing").await;

    let stats: Vec<_> = sub
        .drain()
        .into_iter()
        .filter_map(|e| match e {
            GraphEvent::CacheStatsUpdated { stats } => Some(stats),
            _ => None,
        })
        .collect();
    assert_eq!(stats.len(), 2);
    assert_eq!(stats[1].hit_count, 1);
    assert_eq!(stats[1].miss_count, 1);
}

#[tokio::test]
async fn test_size_is_twice_serialized_length() {
    let (cache, _events) = manager(CacheOptions::default());
    // "abcd" serializes to six characters including quotes
    cache.set(CacheStore::Symbols, "s", "abcd", vec![]).await.unwrap();
    assert_eq!(cache.stats().await.total_size, 12);

    cache.set(CacheStore::Symbols, "s", "ab", vec![]).await.unwrap();
    let stats = cache.stats().await;
    assert_eq!(stats.total_size, 8);
    assert_eq!(stats.entry_count, 1);
}

#[tokio::test(start_paused = true)]
async fn test_space_pressure_evicts_lowest_score() {
    let payload = "x".repeat(40);
    // Each entry is (40 + 2) * 2 = 84 bytes; two fit, three do not
    let (cache, events) = manager(CacheOptions {
        max_size_bytes: 200,
        ..CacheOptions::default()
    });
    let mut sub = events.subscribe();

    cache.set(CacheStore::Symbols, "a", &payload, vec![]).await.unwrap();
    cache.set(CacheStore::Layout, "b", &payload, vec![]).await.unwrap();
    tokio::time::advance(Duration::from_secs(10)).await;
    assert!(cache.get_value(CacheStore::Symbols, "a").await.is_some());

    cache.set(CacheStore::QueryResult, "c", &payload, vec![]).await.unwrap();

    assert!(cache.contains(CacheStore::Symbols, "a").await);
    assert!(!cache.contains(CacheStore::Layout, "b").await);
    assert!(cache.contains(CacheStore::QueryResult, "c").await);

    let stats = cache.stats().await;
    assert_eq!(stats.eviction_count, 1);
    assert_eq!(stats.entry_count, 2);
    assert_eq!(stats.total_size, 168);
    assert_eq!(evictions(sub.drain()), vec![("b".to_string(), "space-needed".to_string())]);
}

#[tokio::test]
async fn test_optimize_trims_each_store_to_its_share() {
    let (cache, events) = manager(CacheOptions {
        max_entries: 600,
        ..CacheOptions::default()
    });
    for i in 0..1000 {
        cache.set(CacheStore::Symbols, format!("k{i}"), &i, vec![]).await.unwrap();
    }
    cache.set(CacheStore::Layout, "only", &0, vec![]).await.unwrap();
    let mut sub = events.subscribe();

    let removed = cache.optimize_cache().await;
    assert_eq!(removed, 900);
    assert!(cache.len(CacheStore::Symbols).await <= 100);
    assert_eq!(cache.len(CacheStore::Layout).await, 1);
    assert_eq!(cache.stats().await.entry_count, 101);
    assert!(evictions(sub.drain()).iter().all(|(_, reason)| reason == "optimize"));
}

#[tokio::test]
async fn test_dependency_staleness() {
    let oracle = Arc::new(ManualOracle::default());
    let events = EventBus::new();
    let cache = CacheManager::new(CacheOptions::default(), oracle.clone(), events.clone());
    let mut sub = events.subscribe();
    let deps = vec!["file:///src/a.rs".to_string()];

    cache.set(CacheStore::GraphData, "g", &"graph", deps.clone()).await.unwrap();
    oracle.touch("file:///src/a.rs", Utc::now() - chrono::Duration::hours(1));
    assert!(cache.get_value(CacheStore::GraphData, "g").await.is_some());

    oracle.touch("file:///src/a.rs", Utc::now() + chrono::Duration::minutes(1));
    assert!(cache.get_value(CacheStore::GraphData, "g").await.is_none());
    assert!(!cache.contains(CacheStore::GraphData, "g").await);
    assert_eq!(evictions(sub.drain()), vec![("g".to_string(), "stale".to_string())]);
}

#[tokio::test]
async fn test_invalidate_and_clear() {
    let (cache, events) = manager(CacheOptions::default());
    let mut sub = events.subscribe();
    cache.set(CacheStore::Relationships, "r1", &1, vec![]).await.unwrap();
    cache.set(CacheStore::Relationships, "r2", &2, vec![]).await.unwrap();
    cache.set(CacheStore::Symbols, "s1", &3, vec![]).await.unwrap();

    assert!(cache.invalidate(CacheStore::Relationships, "r1", "file-changed").await);
    assert!(!cache.invalidate(CacheStore::Relationships, "r1", "file-changed").await);
    assert_eq!(evictions(sub.drain()), vec![("r1".to_string(), "file-changed".to_string())]);
    assert_eq!(cache.stats().await.eviction_count, 1);

    cache.clear(Some(CacheStore::Relationships)).await;
    assert_eq!(cache.len(CacheStore::Relationships).await, 0);
    assert_eq!(cache.stats().await.entry_count, 1);

    cache.clear(None).await;
    assert_eq!(cache.stats().await, grove_core::CacheStats::default());
}

#[tokio::test(start_paused = true)]
async fn test_cleanup_removes_expired_and_idle() {
    let (cache, events) = manager(CacheOptions {
        ttl: Duration::from_secs(100),
        cleanup_interval: Duration::from_secs(1000),
        ..CacheOptions::default()
    });
    let mut sub = events.subscribe();
    cache.set(CacheStore::Symbols, "old", &1, vec![]).await.unwrap();
    tokio::time::advance(Duration::from_secs(60)).await;
    cache.set(CacheStore::Symbols, "fresh", &2, vec![]).await.unwrap();

    // "old" is idle past half the TTL, "fresh" is not
    assert_eq!(cache.cleanup_expired().await, 1);
    assert_eq!(evictions(sub.drain()), vec![("old".to_string(), "idle".to_string())]);

    // Kept busy, so only the TTL can remove it
    for _ in 0..2 {
        tokio::time::advance(Duration::from_secs(45)).await;
        assert!(cache.get_value(CacheStore::Symbols, "fresh").await.is_some());
    }
    tokio::time::advance(Duration::from_secs(15)).await;
    assert_eq!(cache.cleanup_expired().await, 1);
    assert_eq!(evictions(sub.drain()), vec![("fresh".to_string(), "expired".to_string())]);
}

#[tokio::test(start_paused = true)]
async fn test_cleanup_timer_runs_in_background() {
    let (cache, _events) = manager(CacheOptions {
        ttl: Duration::from_secs(60),
        cleanup_interval: Duration::from_secs(10),
        ..CacheOptions::default()
    });
    cache.set(CacheStore::Layout, "l", &1, vec![]).await.unwrap();

    tokio::time::sleep(Duration::from_secs(45)).await;
    assert_eq!(cache.len(CacheStore::Layout).await, 0);
}

#[tokio::test(start_paused = true)]
async fn test_set_options_merges_and_restarts_timer() {
    let (cache, _events) = manager(CacheOptions {
        ttl: Duration::from_secs(60),
        cleanup_interval: Duration::from_secs(10_000),
        ..CacheOptions::default()
    });
    cache.set(CacheStore::Layout, "l", &1, vec![]).await.unwrap();

    let updated = cache
        .set_cache_options(&CacheOptionsUpdate {
            cleanup_interval_secs: Some(5),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(updated.ttl, Duration::from_secs(60));
    assert_eq!(updated.cleanup_interval, Duration::from_secs(5));

    tokio::time::sleep(Duration::from_secs(40)).await;
    assert_eq!(cache.len(CacheStore::Layout).await, 0);
}

#[tokio::test]
async fn test_set_options_rejects_zero_interval() {
    let (cache, _events) = manager(CacheOptions::default());
    let err = cache
        .set_cache_options(&CacheOptionsUpdate {
            cleanup_interval_secs: Some(0),
            ..Default::default()
        })
        .await
        .unwrap_err();
    assert_eq!(err.code(), "INVALID_CONFIG");
    assert_eq!(cache.options().await, CacheOptions::default());
}

#[test]
fn test_options_update_from_camel_case_json() {
    let update: CacheOptionsUpdate = serde_json::from_str(r#"{"maxSize": 1024, "ttlSecs": 5}"#).unwrap();
    assert_eq!(update.max_size, Some(1024));
    assert_eq!(update.ttl_secs, Some(5));
    assert_eq!(update.max_entries, None);
}

#[tokio::test]
async fn test_dispose_empties_everything() {
    let (cache, _events) = manager(CacheOptions::default());
    cache.set(CacheStore::QueryResult, "q", &"r", vec![]).await.unwrap();
    cache.dispose().await;
    assert_eq!(cache.stats().await.entry_count, 0);
    assert!(cache.get_value(CacheStore::QueryResult, "q").await.is_none());
}
