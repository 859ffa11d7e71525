//! Modification oracles consulted by the dependency staleness check

use std::path::Path;

use chrono::{DateTime, Utc};
use grove_core::model::uri_to_path;

/// Reports when a resource last changed.
///
/// `None` means the resource is unknown or its time cannot be read; such a
/// dependency never makes an entry stale.
#[async_trait::async_trait]
pub trait ModificationOracle: Send + Sync {
    async fn last_modified(&self, resource: &str) -> Option<DateTime<Utc>>;
}

/// Oracle for hosts without change tracking. Nothing is ever stale.
#[derive(Debug, Default, Clone, Copy)]
pub struct NeverModified;

#[async_trait::async_trait]
impl ModificationOracle for NeverModified {
    async fn last_modified(&self, _resource: &str) -> Option<DateTime<Utc>> {
        None
    }
}

/// Reads file modification times. Resources are `file://` identifiers or
/// plain paths.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsModificationOracle;

#[async_trait::async_trait]
impl ModificationOracle for FsModificationOracle {
    async fn last_modified(&self, resource: &str) -> Option<DateTime<Utc>> {
        let path = Path::new(uri_to_path(resource));
        match tokio::fs::metadata(path).await.and_then(|m| m.modified()) {
            Ok(time) => Some(DateTime::<Utc>::from(time)),
            Err(e) => {
                tracing::trace!("No modification time for {}: {}", resource, e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_fs_oracle_reads_mtime() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("lib.rs");
        std::fs::write(&file, "fn main() {}").unwrap();

        let oracle = FsModificationOracle;
        let uri = format!("file://{}", file.display());
        let modified = oracle.last_modified(&uri).await.unwrap();
        assert!(modified <= Utc::now() + chrono::Duration::seconds(5));

        let plain = oracle.last_modified(&file.display().to_string()).await;
        assert_eq!(plain, Some(modified));
    }

    #[tokio::test]
    async fn test_missing_resource_is_unknown() {
        assert!(FsModificationOracle.last_modified("file:///no/such/file.rs").await.is_none());
        assert!(NeverModified.last_modified("anything").await.is_none());
    }
}
