//! Heuristic natural-language to structured query translation
//!
//! A handful of phrase matchers; anything they do not recognise is used
//! verbatim as a single name pattern.

use std::sync::LazyLock;

use grove_core::{RelationshipType, SymbolKind};
use regex::Regex;

use super::{GraphQuery, QueryFilter, Traversal, TraversalDirection};

static CALLS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\bcall(?:s|ing|ed by)?\s+([A-Za-z_][\w.:]*)").unwrap());
static EXTENDS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(?:extends|extend|inherits from|inherit from|subclasses of)\s+([A-Za-z_][\w.:]*)").unwrap());
static IMPLEMENTS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bimplement(?:s|ing|ations of)?\s+([A-Za-z_][\w.:]*)").unwrap());
static NAMED: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\b(?:named|called|matching)\s+(\S+)").unwrap());
static IN_PATH: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\bin\s+([\w./-]*[/.][\w./-]*)").unwrap());
static KIND: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(function|method|class|interface|struct|enum|variable|constant|module|trait|constructor|propert(?:y|ies)|field)(?:es|s)?\b").unwrap()
});
static EXPORTED: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\b(?:exported|public)\b").unwrap());
static DEPRECATED: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\bdeprecated\b").unwrap());

/// Build a structured query from free text.
pub fn translate(text: &str) -> GraphQuery {
    let text = text.trim();

    // Relationship phrases take precedence: "what calls X"
    if let Some(target) = capture(&CALLS, text) {
        return reverse_lookup(target, [RelationshipType::Calls]);
    }
    if let Some(target) = capture(&EXTENDS, text) {
        return reverse_lookup(target, [RelationshipType::Extends, RelationshipType::Inherits]);
    }
    if let Some(target) = capture(&IMPLEMENTS, text) {
        return reverse_lookup(target, [RelationshipType::Implements]);
    }

    let mut filter = QueryFilter::default();
    let mut recognised = false;

    let path = IN_PATH.captures(text).and_then(|c| c.get(1));
    if let Some(path) = path {
        filter.path = Some(path.as_str().to_string());
        recognised = true;
    }
    // Kind words inside the path must not count as kinds
    let without_path = match path {
        Some(m) => format!("{}{}", &text[..m.start()], &text[m.end()..]),
        None => text.to_string(),
    };

    let kinds: Vec<SymbolKind> = KIND
        .captures_iter(&without_path)
        .filter_map(|c| kind_for(&c[1]))
        .fold(Vec::new(), |mut acc, kind| {
            if !acc.contains(&kind) {
                acc.push(kind);
            }
            acc
        });
    if !kinds.is_empty() {
        filter.kinds = Some(kinds);
        recognised = true;
    }
    if EXPORTED.is_match(&without_path) {
        filter.is_exported = Some(true);
        recognised = true;
    }
    if DEPRECATED.is_match(&without_path) {
        filter.is_deprecated = Some(true);
        recognised = true;
    }

    let pattern = match capture(&NAMED, &without_path) {
        Some(name) => {
            recognised = true;
            name.to_string()
        }
        None => "*".to_string(),
    };

    if !recognised {
        return GraphQuery::symbols([text]);
    }
    let query = GraphQuery::symbols([pattern]);
    if filter.is_empty() { query } else { query.with_filter(filter) }
}

fn capture<'t>(re: &Regex, text: &'t str) -> Option<&'t str> {
    re.captures(text).and_then(|c| c.get(1)).map(|m| m.as_str())
}

/// Symbols reaching `target` over one of `types`.
fn reverse_lookup(target: &str, types: impl IntoIterator<Item = RelationshipType>) -> GraphQuery {
    GraphQuery::symbols([target]).with_traversal(Traversal::new(1, TraversalDirection::Incoming).over(types))
}

fn kind_for(word: &str) -> Option<SymbolKind> {
    let word = word.to_ascii_lowercase();
    let kind = match word.as_str() {
        "function" => SymbolKind::Function,
        "method" => SymbolKind::Method,
        "class" => SymbolKind::Class,
        "interface" => SymbolKind::Interface,
        "struct" => SymbolKind::Struct,
        "enum" => SymbolKind::Enum,
        "variable" => SymbolKind::Variable,
        "constant" => SymbolKind::Constant,
        "module" => SymbolKind::Module,
        "trait" => SymbolKind::Trait,
        "constructor" => SymbolKind::Constructor,
        "field" => SymbolKind::Field,
        w if w.starts_with("propert") => SymbolKind::Property,
        _ => return None,
    };
    Some(kind)
}
