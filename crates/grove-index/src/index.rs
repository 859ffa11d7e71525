//! Symbol & relationship index
//!
//! Holds, per file, the flattened symbol list and the relationship list.
//! Provider calls happen with no lock held; results are gathered first and
//! swapped in under one write lock, so readers never see a half-built index.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use grove_core::{
    EventBus, GraphError, GraphEvent, GraphResult, IndexedSymbol, QueryScope, Relationship, Symbol, SymbolTable,
};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::provider::{AnalysisProvider, ScopeResolver};
use crate::relationships::extract_relationships;
use crate::schema::ingest;

/// Per-file bookkeeping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileEntry {
    pub last_indexed: DateTime<Utc>,
    pub symbol_count: usize,
}

/// Counters reported after a build or update.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexSummary {
    pub file_count: usize,
    pub symbol_count: usize,
    pub relationship_count: usize,
    /// Files whose analysis failed and were skipped
    pub failed_files: usize,
    pub quarantined_symbols: usize,
    pub elapsed_ms: f64,
}

#[derive(Default)]
struct IndexState {
    symbols: BTreeMap<String, Vec<IndexedSymbol>>,
    relationships: BTreeMap<String, Vec<Relationship>>,
    files: BTreeMap<String, FileEntry>,
    last_build: Option<IndexSummary>,
}

impl IndexState {
    fn symbol_count(&self) -> usize {
        self.symbols.values().map(Vec::len).sum()
    }

    fn relationship_count(&self) -> usize {
        self.relationships.values().map(Vec::len).sum()
    }
}

/// The analysed result of one file, before it is committed to the index.
struct FileAnalysis {
    uri: String,
    symbols: Vec<Symbol>,
    quarantined: usize,
}

pub struct SymbolIndex {
    provider: Arc<dyn AnalysisProvider>,
    resolver: Arc<dyn ScopeResolver>,
    state: RwLock<IndexState>,
    names: SymbolTable,
    events: EventBus,
}

impl SymbolIndex {
    pub fn new(provider: Arc<dyn AnalysisProvider>, resolver: Arc<dyn ScopeResolver>, events: EventBus) -> Self {
        SymbolIndex {
            provider,
            resolver,
            state: RwLock::new(IndexState::default()),
            names: SymbolTable::new(),
            events,
        }
    }

    pub fn provider(&self) -> &Arc<dyn AnalysisProvider> {
        &self.provider
    }

    /// Clear and repopulate the index for every file in `scope`.
    pub async fn build_index(&self, scope: &QueryScope) -> GraphResult<IndexSummary> {
        let start = Instant::now();
        tracing::info!("Building index for {}", scope.describe());

        let files = self
            .resolver
            .files_in_scope(scope)
            .await
            .map_err(|e| GraphError::IndexBuildFailed {
                scope: scope.describe(),
                cause: e.to_string(),
            })?;
        let files: Vec<String> = files.into_iter().filter(|uri| scope.is_in_scope(uri)).collect();

        let mut analyses = Vec::with_capacity(files.len());
        let mut failed = 0;
        for uri in &files {
            match self.analyze_file(uri).await {
                Ok(analysis) => analyses.push(analysis),
                Err(e) => {
                    tracing::warn!("Skipping {}: {}", uri, e);
                    failed += 1;
                }
            }
        }

        let uris: Vec<String> = analyses.iter().map(|a| a.uri.clone()).collect();
        let relationships = self.scan_relationships(&uris).await;
        let quarantined = analyses.iter().map(|a| a.quarantined).sum();

        let summary = {
            let mut state = self.state.write().await;
            *state = IndexState::default();
            self.names.clear();
            for analysis in analyses {
                self.commit_file(&mut state, analysis);
            }
            state.relationships = relationships;

            let summary = IndexSummary {
                file_count: state.files.len(),
                symbol_count: state.symbol_count(),
                relationship_count: state.relationship_count(),
                failed_files: failed,
                quarantined_symbols: quarantined,
                elapsed_ms: start.elapsed().as_secs_f64() * 1000.0,
            };
            state.last_build = Some(summary.clone());
            summary
        };

        tracing::info!(
            "Indexed {} symbols and {} relationships across {} files in {:.1}ms ({} failed)",
            summary.symbol_count,
            summary.relationship_count,
            summary.file_count,
            summary.elapsed_ms,
            summary.failed_files
        );
        self.events.emit(GraphEvent::SymbolsChanged {
            uris,
            symbol_count: summary.symbol_count,
        });
        self.events.emit(GraphEvent::RelationshipsChanged {
            relationship_count: summary.relationship_count,
        });
        self.events.emit(GraphEvent::IndexUpdated {
            symbol_count: summary.symbol_count,
        });
        Ok(summary)
    }

    /// Re-analyse only `uris`, then rebuild every file's relationships.
    ///
    /// A file whose analysis fails is dropped from the index.
    pub async fn update_index(&self, uris: &[String]) -> GraphResult<IndexSummary> {
        let start = Instant::now();
        let mut analyses = Vec::with_capacity(uris.len());
        let mut dropped = Vec::new();
        for uri in uris {
            match self.analyze_file(uri).await {
                Ok(analysis) => analyses.push(analysis),
                Err(e) => {
                    tracing::warn!("Dropping {} from index: {}", uri, e);
                    dropped.push(uri.clone());
                }
            }
        }
        let quarantined = analyses.iter().map(|a| a.quarantined).sum();

        {
            let mut state = self.state.write().await;
            for uri in uris {
                state.symbols.remove(uri);
                state.files.remove(uri);
                self.names.remove_file(uri);
            }
            for analysis in analyses {
                self.commit_file(&mut state, analysis);
            }
        }

        // Full relationship rebuild over whatever files are indexed now
        let indexed: Vec<String> = self.state.read().await.files.keys().cloned().collect();
        let relationships = self.scan_relationships(&indexed).await;

        let summary = {
            let mut state = self.state.write().await;
            // Files removed while scanning must not regain relationships
            let kept: BTreeMap<String, Vec<Relationship>> = relationships
                .into_iter()
                .filter(|(uri, _)| state.files.contains_key(uri))
                .collect();
            state.relationships = kept;
            IndexSummary {
                file_count: state.files.len(),
                symbol_count: state.symbol_count(),
                relationship_count: state.relationship_count(),
                failed_files: dropped.len(),
                quarantined_symbols: quarantined,
                elapsed_ms: start.elapsed().as_secs_f64() * 1000.0,
            }
        };

        tracing::debug!("Updated {} files in {:.1}ms", uris.len(), summary.elapsed_ms);
        self.events.emit(GraphEvent::SymbolsChanged {
            uris: uris.to_vec(),
            symbol_count: summary.symbol_count,
        });
        self.events.emit(GraphEvent::RelationshipsChanged {
            relationship_count: summary.relationship_count,
        });
        self.events.emit(GraphEvent::IndexUpdated {
            symbol_count: summary.symbol_count,
        });
        Ok(summary)
    }

    /// Empty every per-file map.
    pub async fn clear(&self) {
        let mut state = self.state.write().await;
        *state = IndexState::default();
        self.names.clear();
        tracing::debug!("Index cleared");
    }

    async fn analyze_file(&self, uri: &str) -> GraphResult<FileAnalysis> {
        let raw = self
            .provider
            .document_symbols(uri)
            .await
            .map_err(|e| GraphError::AnalysisFailed {
                uri: uri.to_string(),
                cause: e.to_string(),
            })?;
        let ingested = ingest(uri, &raw);
        Ok(FileAnalysis {
            uri: uri.to_string(),
            symbols: ingested.symbols,
            quarantined: ingested.quarantined.len(),
        })
    }

    async fn scan_relationships(&self, uris: &[String]) -> BTreeMap<String, Vec<Relationship>> {
        let mut out = BTreeMap::new();
        for uri in uris {
            let relationships = match self.provider.document_text(uri).await {
                Ok(text) => extract_relationships(uri, &text),
                Err(e) => {
                    tracing::warn!("No relationships for {}: {}", uri, e);
                    Vec::new()
                }
            };
            out.insert(uri.clone(), relationships);
        }
        out
    }

    fn commit_file(&self, state: &mut IndexState, analysis: FileAnalysis) {
        let FileAnalysis { uri, symbols, .. } = analysis;
        for symbol in &symbols {
            self.names.insert(&symbol.name, symbol.id.clone(), &uri);
        }
        state.files.insert(
            uri.clone(),
            FileEntry {
                last_indexed: Utc::now(),
                symbol_count: symbols.len(),
            },
        );
        state
            .symbols
            .insert(uri, symbols.into_iter().map(IndexedSymbol::new).collect());
    }

    pub async fn is_empty(&self) -> bool {
        self.state.read().await.files.is_empty()
    }

    /// Every indexed symbol whose file is in scope, in file then source order.
    pub async fn symbols_in_scope(&self, scope: &QueryScope) -> Vec<IndexedSymbol> {
        let state = self.state.read().await;
        state
            .symbols
            .iter()
            .filter(|(uri, _)| scope.is_in_scope(uri))
            .flat_map(|(_, symbols)| symbols.iter().cloned())
            .collect()
    }

    /// Every relationship recorded for a file in scope.
    pub async fn relationships_in_scope(&self, scope: &QueryScope) -> Vec<Relationship> {
        let state = self.state.read().await;
        state
            .relationships
            .iter()
            .filter(|(uri, _)| scope.is_in_scope(uri))
            .flat_map(|(_, rels)| rels.iter().cloned())
            .collect()
    }

    pub async fn file_symbols(&self, uri: &str) -> Vec<Symbol> {
        let state = self.state.read().await;
        state
            .symbols
            .get(uri)
            .map(|symbols| symbols.iter().map(|s| s.symbol.clone()).collect())
            .unwrap_or_default()
    }

    pub async fn file_relationships(&self, uri: &str) -> Vec<Relationship> {
        let state = self.state.read().await;
        state.relationships.get(uri).cloned().unwrap_or_default()
    }

    pub async fn file_entry(&self, uri: &str) -> Option<FileEntry> {
        self.state.read().await.files.get(uri).cloned()
    }

    /// Indexed symbols in scope named one of `names`, case-insensitively.
    ///
    /// Resolved through the name table, so only the defining files are
    /// read. Order matches [`symbols_in_scope`](Self::symbols_in_scope).
    pub async fn symbols_named(&self, names: &[&str], scope: &QueryScope) -> Vec<IndexedSymbol> {
        // The name table only changes under the state write lock
        let state = self.state.read().await;
        let mut wanted: BTreeMap<String, HashSet<String>> = BTreeMap::new();
        for name in names {
            for found in self.names.lookup(name) {
                if scope.is_in_scope(&found.uri) {
                    wanted.entry(found.uri).or_default().insert(found.id);
                }
            }
        }
        wanted
            .iter()
            .filter_map(|(uri, ids)| state.symbols.get(uri).map(|symbols| (symbols, ids)))
            .flat_map(|(symbols, ids)| symbols.iter().filter(move |s| ids.contains(&s.symbol.id)))
            .cloned()
            .collect()
    }

    /// Distinct symbol names in index order.
    pub async fn symbol_names(&self) -> Vec<String> {
        let state = self.state.read().await;
        let mut seen = HashSet::new();
        state
            .symbols
            .values()
            .flatten()
            .filter(|s| seen.insert(s.symbol.name.clone()))
            .map(|s| s.symbol.name.clone())
            .collect()
    }

    pub async fn summary(&self) -> IndexSummary {
        let state = self.state.read().await;
        let mut summary = state.last_build.clone().unwrap_or_default();
        summary.file_count = state.files.len();
        summary.symbol_count = state.symbol_count();
        summary.relationship_count = state.relationship_count();
        summary
    }
}
