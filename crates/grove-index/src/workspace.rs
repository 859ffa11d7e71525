//! Filesystem scope resolver
//!
//! Walks a workspace root honouring `.gitignore`, `.ignore` and hidden-file
//! rules, and returns `file://` identifiers for source files.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use grove_core::{Language, QueryScope};
use ignore::WalkBuilder;

use crate::provider::ScopeResolver;

pub struct WorkspaceScopeResolver {
    root: PathBuf,
    languages: Vec<Language>,
}

impl WorkspaceScopeResolver {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        WorkspaceScopeResolver {
            root: root.into(),
            languages: Vec::new(),
        }
    }

    /// Only return files of these languages. Empty keeps every known language.
    pub fn with_languages(mut self, languages: &[Language]) -> Self {
        self.languages = languages.to_vec();
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn walk(root: &Path, languages: &[Language]) -> Vec<String> {
        let mut files = Vec::new();
        let walker = WalkBuilder::new(root).hidden(true).git_ignore(true).require_git(false).build();
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::debug!("Walk error under {}: {}", root.display(), e);
                    continue;
                }
            };
            if !entry.file_type().is_some_and(|t| t.is_file()) {
                continue;
            }
            let language = Language::from_path(entry.path());
            if language == Language::Other || (!languages.is_empty() && !languages.contains(&language)) {
                continue;
            }
            files.push(path_to_uri(entry.path()));
        }
        files.sort();
        files
    }
}

pub fn path_to_uri(path: &Path) -> String {
    format!("file://{}", path.display())
}

#[async_trait::async_trait]
impl ScopeResolver for WorkspaceScopeResolver {
    async fn files_in_scope(&self, scope: &QueryScope) -> Result<Vec<String>> {
        let root = self.root.clone();
        let languages = self.languages.clone();
        let files = tokio::task::spawn_blocking(move || Self::walk(&root, &languages))
            .await
            .context("workspace walk panicked")?;
        let files: Vec<String> = files.into_iter().filter(|uri| scope.is_in_scope(uri)).collect();
        tracing::debug!("Resolved {} files under {}", files.len(), self.root.display());
        Ok(files)
    }
}
