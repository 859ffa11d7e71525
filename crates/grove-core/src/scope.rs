//! Scope filtering for index and query operations

use serde::{Deserialize, Serialize};

use crate::model::Language;

/// Restricts which files participate in an index build or a query.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct QueryScope {
    /// Path substrings; a file matches if it contains any of them. Empty matches everything.
    #[serde(default)]
    pub paths: Vec<String>,
    /// Languages to keep. Empty keeps every language.
    #[serde(default)]
    pub languages: Vec<Language>,
    /// Test files are excluded unless this is set.
    #[serde(default)]
    pub include_tests: bool,
}

impl QueryScope {
    /// The whole workspace, tests excluded.
    pub fn workspace() -> Self {
        Self::default()
    }

    pub fn with_paths(mut self, paths: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.paths = paths.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_languages(mut self, languages: impl IntoIterator<Item = Language>) -> Self {
        self.languages = languages.into_iter().collect();
        self
    }

    pub fn including_tests(mut self) -> Self {
        self.include_tests = true;
        self
    }

    /// Whether a file participates in this scope.
    pub fn is_in_scope(&self, uri: &str) -> bool {
        if !self.paths.is_empty() && !self.paths.iter().any(|p| uri.contains(p.as_str())) {
            return false;
        }
        if !self.languages.is_empty() && !self.languages.contains(&Language::from_uri(uri)) {
            return false;
        }
        if !self.include_tests && is_test_file(uri) {
            return false;
        }
        true
    }

    /// Short human-readable form for logs and error payloads.
    pub fn describe(&self) -> String {
        let paths = if self.paths.is_empty() {
            "*".to_string()
        } else {
            self.paths.join(",")
        };
        let languages = if self.languages.is_empty() {
            "*".to_string()
        } else {
            self.languages
                .iter()
                .map(|l| l.as_str())
                .collect::<Vec<_>>()
                .join(",")
        };
        format!("paths={paths} languages={languages} tests={}", self.include_tests)
    }
}

/// Test-file heuristic: any occurrence of "test" in the path.
pub fn is_test_file(uri: &str) -> bool {
    uri.to_ascii_lowercase().contains("test")
}
