//! Cache manager: six stores sharing one size budget
//!
//! Values are stored as JSON so one manager can hold symbols, layouts and
//! query results side by side. Reads check age first, then ask the
//! modification oracle whether any recorded dependency changed since the
//! value was cached. The state lock is never held across an oracle call;
//! a read re-validates the entry after the call returns.

use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use grove_core::{CacheSettings, CacheStats, CacheStore, EventBus, GraphError, GraphEvent, GraphResult};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::oracle::ModificationOracle;

#[derive(Debug, Clone, PartialEq)]
pub struct CacheOptions {
    /// Total approximate size across all stores.
    pub max_size_bytes: usize,
    /// Summed across stores; `optimize_cache` keeps a sixth of it per store.
    pub max_entries: usize,
    pub ttl: Duration,
    pub cleanup_interval: Duration,
}

impl From<&CacheSettings> for CacheOptions {
    fn from(settings: &CacheSettings) -> Self {
        CacheOptions {
            max_size_bytes: settings.max_size_bytes,
            max_entries: settings.max_entries,
            ttl: Duration::from_secs(settings.ttl_secs),
            cleanup_interval: Duration::from_secs(settings.cleanup_interval_secs),
        }
    }
}

impl Default for CacheOptions {
    fn default() -> Self {
        CacheOptions::from(&CacheSettings::default())
    }
}

/// Partial options; unset fields keep their current value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CacheOptionsUpdate {
    pub max_size: Option<usize>,
    pub max_entries: Option<usize>,
    pub ttl_secs: Option<u64>,
    pub cleanup_interval_secs: Option<u64>,
}

impl CacheOptionsUpdate {
    fn apply(&self, options: &CacheOptions) -> GraphResult<CacheOptions> {
        if self.max_entries == Some(0) {
            return Err(GraphError::InvalidConfig("maxEntries must be positive".into()));
        }
        if self.cleanup_interval_secs == Some(0) {
            return Err(GraphError::InvalidConfig("cleanupIntervalSecs must be positive".into()));
        }
        Ok(CacheOptions {
            max_size_bytes: self.max_size.unwrap_or(options.max_size_bytes),
            max_entries: self.max_entries.unwrap_or(options.max_entries),
            ttl: self.ttl_secs.map(Duration::from_secs).unwrap_or(options.ttl),
            cleanup_interval: self
                .cleanup_interval_secs
                .map(Duration::from_secs)
                .unwrap_or(options.cleanup_interval),
        })
    }
}

/// One cached value and its bookkeeping.
#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
    pub data: T,
    pub created: Instant,
    pub last_access: Instant,
    /// Wall-clock time compared against the oracle's modification times.
    pub cached_at: DateTime<Utc>,
    pub access_count: u64,
    /// Serialized length times two.
    pub size: usize,
    pub dependencies: Vec<String>,
    seq: u64,
}

impl<T> CacheEntry<T> {
    fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.created)
    }

    fn is_expired(&self, ttl: Duration, now: Instant) -> bool {
        self.age(now) > ttl
    }

    /// Eviction score; lowest goes first.
    fn score(&self, now: Instant) -> f64 {
        self.access_count as f64 * self.age(now).as_secs_f64()
    }

    fn touch(&mut self, now: Instant) {
        self.last_access = now;
        self.access_count += 1;
    }
}

fn approximate_size(data: &Value) -> usize {
    data.to_string().len() * 2
}

struct CacheState {
    options: CacheOptions,
    stores: HashMap<CacheStore, HashMap<String, CacheEntry<Value>>>,
    stats: CacheStats,
    next_seq: u64,
}

impl CacheState {
    fn new(options: CacheOptions) -> Self {
        CacheState {
            options,
            stores: CacheStore::ALL.into_iter().map(|s| (s, HashMap::new())).collect(),
            stats: CacheStats::default(),
            next_seq: 0,
        }
    }

    fn entry(&self, store: CacheStore, key: &str) -> Option<&CacheEntry<Value>> {
        self.stores.get(&store).and_then(|entries| entries.get(key))
    }

    fn insert(&mut self, store: CacheStore, key: String, entry: CacheEntry<Value>) {
        self.stats.total_size += entry.size;
        self.stats.entry_count += 1;
        self.stores.entry(store).or_default().insert(key, entry);
    }

    /// Remove an entry together with its accounting.
    fn remove(&mut self, store: CacheStore, key: &str) -> Option<CacheEntry<Value>> {
        let entry = self.stores.get_mut(&store)?.remove(key)?;
        self.stats.total_size = self.stats.total_size.saturating_sub(entry.size);
        self.stats.entry_count = self.stats.entry_count.saturating_sub(1);
        Some(entry)
    }

    fn evict(&mut self, store: CacheStore, key: &str, reason: &str, events: &EventBus) -> bool {
        if self.remove(store, key).is_none() {
            return false;
        }
        self.stats.eviction_count += 1;
        events.emit(GraphEvent::CacheEvicted {
            store,
            key: key.to_string(),
            reason: reason.to_string(),
        });
        true
    }

    /// Evict lowest-scored entries across every store until `incoming`
    /// more bytes fit in the budget.
    fn ensure_space(&mut self, incoming: usize, events: &EventBus) -> usize {
        let max = self.options.max_size_bytes;
        if self.stats.total_size + incoming <= max {
            return 0;
        }

        let now = Instant::now();
        let mut candidates: Vec<(f64, Instant, CacheStore, String)> = self
            .stores
            .iter()
            .flat_map(|(store, entries)| {
                entries
                    .iter()
                    .map(move |(key, e)| (e.score(now), e.last_access, *store, key.clone()))
            })
            .collect();
        candidates.sort_by(|a, b| {
            a.0.total_cmp(&b.0)
                .then(a.1.cmp(&b.1))
                .then(a.2.cmp(&b.2))
                .then_with(|| a.3.cmp(&b.3))
        });

        let mut evicted = 0;
        for (_, _, store, key) in candidates {
            if self.stats.total_size + incoming <= max {
                break;
            }
            if self.evict(store, &key, "space-needed", events) {
                evicted += 1;
            }
        }
        evicted
    }

    /// Entries older than the TTL, or untouched for half of it.
    fn sweep(&mut self, events: &EventBus) -> usize {
        let now = Instant::now();
        let ttl = self.options.ttl;
        let idle = ttl / 2;

        let mut doomed: Vec<(CacheStore, String, &'static str)> = Vec::new();
        for (store, entries) in &self.stores {
            for (key, entry) in entries {
                let reason = if entry.is_expired(ttl, now) {
                    "expired"
                } else if now.saturating_duration_since(entry.last_access) > idle {
                    "idle"
                } else {
                    continue;
                };
                doomed.push((*store, key.clone(), reason));
            }
        }
        doomed.sort();

        let count = doomed.len();
        for (store, key, reason) in doomed {
            self.evict(store, &key, reason, events);
        }
        count
    }
}

struct Shared {
    state: Mutex<CacheState>,
    events: EventBus,
}

impl Shared {
    async fn cleanup(&self) -> usize {
        let mut state = self.state.lock().await;
        let removed = state.sweep(&self.events);
        if removed > 0 {
            tracing::debug!("Cache cleanup removed {} entries", removed);
        }
        removed
    }
}

fn spawn_cleanup(shared: Weak<Shared>, period: Duration) -> Option<JoinHandle<()>> {
    let Ok(runtime) = tokio::runtime::Handle::try_current() else {
        tracing::debug!("No runtime available, cache cleanup timer not started");
        return None;
    };
    Some(runtime.spawn(async move {
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        loop {
            ticker.tick().await;
            let Some(shared) = shared.upgrade() else {
                break;
            };
            shared.cleanup().await;
        }
    }))
}

/// Multi-store cache with TTL, dependency staleness and a size budget.
///
/// Construct inside a tokio runtime to get the periodic cleanup task; the
/// task stops when the manager is disposed or dropped.
pub struct CacheManager {
    shared: Arc<Shared>,
    oracle: Arc<dyn ModificationOracle>,
    cleanup: Mutex<Option<JoinHandle<()>>>,
}

impl CacheManager {
    pub fn new(options: CacheOptions, oracle: Arc<dyn ModificationOracle>, events: EventBus) -> Self {
        let period = options.cleanup_interval;
        let shared = Arc::new(Shared {
            state: Mutex::new(CacheState::new(options)),
            events,
        });
        let cleanup = spawn_cleanup(Arc::downgrade(&shared), period);
        CacheManager {
            shared,
            oracle,
            cleanup: Mutex::new(cleanup),
        }
    }

    /// Look up `key` and deserialize it as `T`.
    ///
    /// A value of the wrong shape is logged and reported as a miss.
    pub async fn get<T: DeserializeOwned>(&self, store: CacheStore, key: &str) -> Option<T> {
        let value = self.get_value(store, key).await?;
        match serde_json::from_value(value) {
            Ok(data) => Some(data),
            Err(e) => {
                tracing::warn!("Cached {} entry {} has an unexpected shape: {}", store, key, e);
                None
            }
        }
    }

    pub async fn get_value(&self, store: CacheStore, key: &str) -> Option<Value> {
        let (seq, dependencies, cached_at) = {
            let mut state = self.shared.state.lock().await;
            let now = Instant::now();
            let ttl = state.options.ttl;
            let lookup = state
                .entry(store, key)
                .map(|e| (e.seq, e.is_expired(ttl, now), e.dependencies.clone(), e.cached_at));
            match lookup {
                None => return self.miss(&mut state),
                Some((_, true, _, _)) => {
                    state.evict(store, key, "expired", &self.shared.events);
                    return self.miss(&mut state);
                }
                Some((seq, false, dependencies, cached_at)) => (seq, dependencies, cached_at),
            }
        };

        let stale = self.is_stale(&dependencies, cached_at).await;

        // The entry may have been replaced or swept while the oracle ran
        let mut state = self.shared.state.lock().await;
        if !state.entry(store, key).is_some_and(|e| e.seq == seq) {
            return self.miss(&mut state);
        }
        if stale {
            state.evict(store, key, "stale", &self.shared.events);
            return self.miss(&mut state);
        }

        let now = Instant::now();
        let data = match state.stores.get_mut(&store).and_then(|entries| entries.get_mut(key)) {
            Some(entry) => {
                entry.touch(now);
                entry.data.clone()
            }
            None => return self.miss(&mut state),
        };
        state.stats.hit_count += 1;
        self.publish(&state);
        Some(data)
    }

    /// Store `data` under `key`, evicting other entries first if the size
    /// budget would be exceeded. Replacing a key releases its old size.
    pub async fn set<T: Serialize + ?Sized>(
        &self,
        store: CacheStore,
        key: impl Into<String>,
        data: &T,
        dependencies: Vec<String>,
    ) -> GraphResult<()> {
        let data = serde_json::to_value(data)?;
        let size = approximate_size(&data);
        let key = key.into();

        let mut state = self.shared.state.lock().await;
        state.remove(store, &key);
        let evicted = state.ensure_space(size, &self.shared.events);
        if evicted > 0 {
            tracing::debug!("Evicted {} cache entries to fit {} bytes", evicted, size);
        }

        let now = Instant::now();
        let seq = state.next_seq;
        state.next_seq += 1;
        state.insert(
            store,
            key,
            CacheEntry {
                data,
                created: now,
                last_access: now,
                cached_at: Utc::now(),
                access_count: 0,
                size,
                dependencies,
                seq,
            },
        );
        Ok(())
    }

    /// Remove one entry. Returns whether it existed.
    pub async fn invalidate(&self, store: CacheStore, key: &str, reason: &str) -> bool {
        let mut state = self.shared.state.lock().await;
        state.evict(store, key, reason, &self.shared.events)
    }

    /// Empty one store, or every store and the counters when `store` is `None`.
    pub async fn clear(&self, store: Option<CacheStore>) {
        let mut state = self.shared.state.lock().await;
        match store {
            Some(store) => {
                let keys: Vec<String> = state
                    .stores
                    .get(&store)
                    .map(|entries| entries.keys().cloned().collect())
                    .unwrap_or_default();
                for key in keys {
                    state.remove(store, &key);
                }
            }
            None => {
                for entries in state.stores.values_mut() {
                    entries.clear();
                }
                state.stats = CacheStats::default();
            }
        }
        self.publish(&state);
    }

    /// Trim every store to its share of `max_entries`, dropping the
    /// lowest-scored entries. Returns how many were removed.
    pub async fn optimize_cache(&self) -> usize {
        let mut state = self.shared.state.lock().await;
        let per_store = (state.options.max_entries / CacheStore::ALL.len()).max(1);
        let now = Instant::now();

        let mut removed = 0;
        for store in CacheStore::ALL {
            let mut ranked: Vec<(f64, Instant, String)> = match state.stores.get(&store) {
                Some(entries) if entries.len() > per_store => entries
                    .iter()
                    .map(|(key, e)| (e.score(now), e.last_access, key.clone()))
                    .collect(),
                _ => continue,
            };
            ranked.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)).then_with(|| a.2.cmp(&b.2)));
            let excess = ranked.len() - per_store;
            for (_, _, key) in ranked.into_iter().take(excess) {
                if state.evict(store, &key, "optimize", &self.shared.events) {
                    removed += 1;
                }
            }
        }

        if removed > 0 {
            tracing::info!("Cache optimization removed {} entries", removed);
        }
        self.publish(&state);
        removed
    }

    /// Run one cleanup pass now, as the timer would.
    pub async fn cleanup_expired(&self) -> usize {
        self.shared.cleanup().await
    }

    /// Merge `update` into the current options and restart the cleanup timer.
    pub async fn set_cache_options(&self, update: &CacheOptionsUpdate) -> GraphResult<CacheOptions> {
        let options = {
            let mut state = self.shared.state.lock().await;
            let options = update.apply(&state.options)?;
            state.options = options.clone();
            options
        };

        let mut cleanup = self.cleanup.lock().await;
        if let Some(handle) = cleanup.take() {
            handle.abort();
        }
        *cleanup = spawn_cleanup(Arc::downgrade(&self.shared), options.cleanup_interval);
        tracing::debug!("Cache options updated: {:?}", options);
        Ok(options)
    }

    pub async fn options(&self) -> CacheOptions {
        self.shared.state.lock().await.options.clone()
    }

    pub async fn stats(&self) -> CacheStats {
        self.shared.state.lock().await.stats
    }

    /// Number of live entries in one store.
    pub async fn len(&self, store: CacheStore) -> usize {
        let state = self.shared.state.lock().await;
        state.stores.get(&store).map_or(0, HashMap::len)
    }

    pub async fn contains(&self, store: CacheStore, key: &str) -> bool {
        self.shared.state.lock().await.entry(store, key).is_some()
    }

    /// Stop the cleanup timer and drop every entry.
    pub async fn dispose(&self) {
        if let Some(handle) = self.cleanup.lock().await.take() {
            handle.abort();
        }
        self.clear(None).await;
    }

    async fn is_stale(&self, dependencies: &[String], cached_at: DateTime<Utc>) -> bool {
        for dependency in dependencies {
            let Some(modified) = self.oracle.last_modified(dependency).await else {
                continue;
            };
            if modified > cached_at {
                tracing::debug!("Cache dependency {} changed since {}", dependency, cached_at);
                return true;
            }
        }
        false
    }

    fn miss(&self, state: &mut CacheState) -> Option<Value> {
        state.stats.miss_count += 1;
        self.publish(state);
        None
    }

    fn publish(&self, state: &CacheState) {
        self.shared.events.emit(GraphEvent::CacheStatsUpdated { stats: state.stats });
    }
}

impl Drop for CacheManager {
    fn drop(&mut self) {
        if let Some(handle) = self.cleanup.get_mut().take() {
            handle.abort();
        }
    }
}
