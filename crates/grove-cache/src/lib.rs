//! Grove Cache - multi-store cache with TTL and dependency staleness
//!
//! Six logical stores share one size budget. Entries expire by age, by a
//! dependency reporting a newer modification time, by score-based eviction
//! under space pressure, or by the periodic cleanup task.

pub mod deps;
pub mod manager;
pub mod oracle;

pub use manager::{CacheEntry, CacheManager, CacheOptions, CacheOptionsUpdate};
pub use oracle::{FsModificationOracle, ModificationOracle, NeverModified};

#[cfg(test)]
mod tests;
