//! In-memory analysis provider
//!
//! Holds symbol trees and text per file identifier. Used to embed the
//! engine without a language server, and as the fixture behind tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use anyhow::{Result, anyhow};
use dashmap::{DashMap, DashSet};
use grove_core::{Location, Position, QueryScope};

use crate::provider::{AnalysisProvider, ScopeResolver};
use crate::schema::RawSymbol;

#[derive(Debug, Clone, Default)]
struct MemoryFile {
    symbols: Vec<RawSymbol>,
    text: String,
    references: Vec<(Position, Location)>,
}

#[derive(Default)]
pub struct InMemoryProvider {
    files: DashMap<String, MemoryFile>,
    failing: DashSet<String>,
    symbol_requests: AtomicUsize,
    shut_down: AtomicBool,
}

impl InMemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or replace a file.
    pub fn add_file(&self, uri: impl Into<String>, symbols: Vec<RawSymbol>, text: impl Into<String>) {
        self.files.insert(
            uri.into(),
            MemoryFile {
                symbols,
                text: text.into(),
                references: Vec::new(),
            },
        );
    }

    pub fn remove_file(&self, uri: &str) {
        self.files.remove(uri);
    }

    /// Make every analysis call for `uri` fail until cleared.
    pub fn fail_file(&self, uri: impl Into<String>) {
        self.failing.insert(uri.into());
    }

    pub fn heal_file(&self, uri: &str) {
        self.failing.remove(uri);
    }

    /// Record that the symbol at `position` in `uri` is referenced from `from`.
    pub fn add_reference(&self, uri: &str, position: Position, from: Location) {
        if let Some(mut file) = self.files.get_mut(uri) {
            file.references.push((position, from));
        }
    }

    /// Number of `document_symbols` calls served so far.
    pub fn symbol_requests(&self) -> usize {
        self.symbol_requests.load(Ordering::Relaxed)
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::Relaxed)
    }

    fn file(&self, uri: &str) -> Result<MemoryFile> {
        if self.failing.contains(uri) {
            return Err(anyhow!("analysis unavailable for {uri}"));
        }
        self.files
            .get(uri)
            .map(|f| f.value().clone())
            .ok_or_else(|| anyhow!("unknown file {uri}"))
    }
}

#[async_trait::async_trait]
impl AnalysisProvider for InMemoryProvider {
    async fn document_symbols(&self, uri: &str) -> Result<Vec<RawSymbol>> {
        self.symbol_requests.fetch_add(1, Ordering::Relaxed);
        Ok(self.file(uri)?.symbols)
    }

    async fn document_text(&self, uri: &str) -> Result<String> {
        Ok(self.file(uri)?.text)
    }

    async fn references(&self, uri: &str, position: Position) -> Result<Vec<Location>> {
        Ok(self
            .file(uri)?
            .references
            .into_iter()
            .filter(|(at, _)| *at == position)
            .map(|(_, from)| from)
            .collect())
    }

    async fn definition(&self, uri: &str, position: Position) -> Result<Vec<Location>> {
        let file = self.file(uri)?;
        Ok(file
            .symbols
            .iter()
            .find(|s| s.range.contains(position))
            .map(|s| vec![Location::new(uri, s.selection_range.unwrap_or(s.range))])
            .unwrap_or_default())
    }

    async fn implementations(&self, _uri: &str, _position: Position) -> Result<Vec<Location>> {
        Ok(Vec::new())
    }

    async fn type_definition(&self, _uri: &str, _position: Position) -> Result<Vec<Location>> {
        Ok(Vec::new())
    }

    async fn word_at(&self, uri: &str, position: Position) -> Result<Option<String>> {
        Ok(crate::syntax::word_at(&self.file(uri)?.text, position))
    }

    async fn shutdown(&self) -> Result<()> {
        self.shut_down.store(true, Ordering::Relaxed);
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}

#[async_trait::async_trait]
impl ScopeResolver for InMemoryProvider {
    async fn files_in_scope(&self, scope: &QueryScope) -> Result<Vec<String>> {
        let mut uris: Vec<String> = self
            .files
            .iter()
            .map(|f| f.key().clone())
            .filter(|uri| scope.is_in_scope(uri))
            .collect();
        uris.sort();
        Ok(uris)
    }
}
