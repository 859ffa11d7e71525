//! Import-statement scanning
//!
//! This is a best-effort text scan, not a resolver. Each import becomes an
//! `imports` relationship from the file's synthetic module id to the raw
//! import path as written. The target is not linked to any indexed symbol.

use std::sync::LazyLock;

use grove_core::model::{EdgeDirection, uri_to_path};
use grove_core::{Language, Relationship, RelationshipType, SymbolKind, symbol_id};
use regex::Regex;

static RUST_USE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*(?:pub(?:\([^)]*\))?\s+)?use\s+([A-Za-z_][A-Za-z0-9_:]*)").unwrap());
static PY_FROM: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?m)^\s*from\s+([\w.]+)\s+import\b").unwrap());
static PY_IMPORT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?m)^\s*import\s+([\w.]+)").unwrap());
static JS_IMPORT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?m)^\s*import\s+(?:[^'"]*?\s+from\s+)?['"]([^'"]+)['"]"#).unwrap());
static JS_REQUIRE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#"require\(\s*['"]([^'"]+)['"]\s*\)"#).unwrap());
static GO_SINGLE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#"(?m)^\s*import\s+(?:\w+\s+)?"([^"]+)""#).unwrap());
static GO_BLOCK: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)import\s*\(([^)]*)\)").unwrap());
static QUOTED: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#""([^"]+)""#).unwrap());
static JAVA_IMPORT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*import\s+(?:static\s+)?([\w.]+(?:\.\*)?)\s*;").unwrap());

/// Synthetic id standing for a whole file as a module.
pub fn file_module_id(uri: &str) -> String {
    let path = uri_to_path(uri);
    let name = path.rsplit('/').next().unwrap_or(path);
    symbol_id(uri, None, name, SymbolKind::File)
}

/// Raw import paths found in `text`, in source order, deduplicated.
pub fn scan_imports(language: Language, text: &str) -> Vec<String> {
    let mut found: Vec<String> = Vec::new();
    let mut push = |path: &str| {
        let path = path.trim().trim_end_matches("::");
        if !path.is_empty() && !found.iter().any(|p| p == path) {
            found.push(path.to_string());
        }
    };

    match language {
        Language::Rust => RUST_USE.captures_iter(text).for_each(|c| push(&c[1])),
        Language::Python => {
            let mut hits: Vec<(usize, String)> = PY_FROM
                .captures_iter(text)
                .chain(PY_IMPORT.captures_iter(text))
                .filter_map(|c| c.get(1).map(|m| (m.start(), m.as_str().to_string())))
                .collect();
            hits.sort();
            hits.iter().for_each(|(_, p)| push(p));
        }
        Language::TypeScript | Language::JavaScript => {
            let mut hits: Vec<(usize, String)> = JS_IMPORT
                .captures_iter(text)
                .chain(JS_REQUIRE.captures_iter(text))
                .filter_map(|c| c.get(1).map(|m| (m.start(), m.as_str().to_string())))
                .collect();
            hits.sort();
            hits.iter().for_each(|(_, p)| push(p));
        }
        Language::Go => {
            GO_SINGLE.captures_iter(text).for_each(|c| push(&c[1]));
            for block in GO_BLOCK.captures_iter(text) {
                QUOTED.captures_iter(&block[1]).for_each(|c| push(&c[1]));
            }
        }
        Language::Java => JAVA_IMPORT.captures_iter(text).for_each(|c| push(&c[1])),
        _ => {}
    }
    found
}

/// Import relationships for one file. May be empty.
pub fn extract_relationships(uri: &str, text: &str) -> Vec<Relationship> {
    let source = file_module_id(uri);
    scan_imports(Language::from_uri(uri), text)
        .into_iter()
        .map(|target| {
            let mut rel = Relationship::new(source.clone(), target, RelationshipType::Imports);
            rel.metadata.direction = Some(EdgeDirection::Forward);
            rel.metadata.labels = vec!["import".to_string()];
            rel
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rust_use_statements() {
        let text = "use std::collections::HashMap;\npub use crate::model::{Symbol, Range};\npub(crate) use super::schema;\nfn f() {}\n";
        let imports = scan_imports(Language::Rust, text);
        assert_eq!(imports, vec!["std::collections::HashMap", "crate::model", "super::schema"]);
    }

    #[test]
    fn test_python_imports_in_source_order() {
        let text = "import os\nfrom pkg.sub import thing\nimport json\n";
        assert_eq!(scan_imports(Language::Python, text), vec!["os", "pkg.sub", "json"]);
    }

    #[test]
    fn test_typescript_imports_and_requires() {
        let text = "import { A } from './a';\nimport './side-effect';\nconst b = require(\"b\");\n";
        assert_eq!(scan_imports(Language::TypeScript, text), vec!["./a", "./side-effect", "b"]);
    }

    #[test]
    fn test_go_import_block() {
        let text = "package main\n\nimport (\n\t\"fmt\"\n\tlog \"github.com/x/log\"\n)\n";
        assert_eq!(scan_imports(Language::Go, text), vec!["fmt", "github.com/x/log"]);
    }

    #[test]
    fn test_java_imports() {
        let text = "import java.util.List;\nimport static org.junit.Assert.*;\n";
        assert_eq!(scan_imports(Language::Java, text), vec!["java.util.List", "org.junit.Assert.*"]);
    }

    #[test]
    fn test_unknown_language_yields_nothing() {
        let rels = extract_relationships("file:///repo/notes.md", "import os");
        assert!(rels.is_empty());
    }

    #[test]
    fn test_relationship_shape() {
        let uri = "file:///repo/src/lib.rs";
        let rels = extract_relationships(uri, "use serde::Serialize;\n");
        assert_eq!(rels.len(), 1);
        assert_eq!(rels[0].source_id, format!("{uri}::lib.rs:file"));
        assert_eq!(rels[0].target_id, "serde::Serialize");
        assert_eq!(rels[0].kind, RelationshipType::Imports);
    }
}
