//! Ingestion schema for provider symbol payloads
//!
//! Providers hand back loosely typed, nested symbol trees. [`ingest`]
//! validates every entry into a typed [`Symbol`] and flattens the tree.
//! Entries that fail validation are quarantined: reported back to the
//! caller and logged, never allowed to abort the rest of the file.

use std::collections::HashSet;

use grove_core::{GraphError, Location, Range, Symbol, SymbolKind, SymbolMetadata, Visibility};
use serde::{Deserialize, Serialize};

/// Symbol kind as a provider sends it: a name or an LSP numeric code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawKind {
    Code(u64),
    Name(String),
}

impl From<SymbolKind> for RawKind {
    fn from(kind: SymbolKind) -> Self {
        RawKind::Name(kind.as_str().to_string())
    }
}

impl RawKind {
    fn resolve(&self) -> Result<SymbolKind, String> {
        match self {
            RawKind::Code(code) => SymbolKind::from_lsp_code(*code).ok_or_else(|| format!("unknown symbol kind code {code}")),
            RawKind::Name(name) => name.parse(),
        }
    }
}

/// One node of a provider's symbol tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawSymbol {
    pub name: String,
    pub kind: RawKind,
    pub range: Range,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selection_range: Option<Range>,
    /// Signature or type text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_name: Option<String>,
    /// Free-form modifiers such as `export`, `static`, `abstract`, `private`.
    #[serde(default)]
    pub modifiers: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub documentation: Option<String>,
    #[serde(default)]
    pub children: Vec<RawSymbol>,
}

impl RawSymbol {
    pub fn new(name: impl Into<String>, kind: SymbolKind, range: Range) -> Self {
        RawSymbol {
            name: name.into(),
            kind: kind.into(),
            range,
            selection_range: None,
            detail: None,
            container_name: None,
            modifiers: Vec::new(),
            tags: Vec::new(),
            documentation: None,
            children: Vec::new(),
        }
    }

    pub fn with_children(mut self, children: Vec<RawSymbol>) -> Self {
        self.children = children;
        self
    }

    pub fn with_modifiers(mut self, modifiers: &[&str]) -> Self {
        self.modifiers = modifiers.iter().map(|m| m.to_string()).collect();
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

/// Outcome of ingesting one file's symbol tree.
#[derive(Debug, Default)]
pub struct Ingested {
    /// Valid symbols in pre-order, unique by id.
    pub symbols: Vec<Symbol>,
    pub quarantined: Vec<GraphError>,
}

/// Validate and flatten a provider symbol tree for `uri`.
///
/// Children inherit their parent's name as container unless they carry one.
/// A malformed parent is dropped but its children are still considered.
pub fn ingest(uri: &str, raw: &[RawSymbol]) -> Ingested {
    let mut out = Ingested::default();
    let mut seen = HashSet::new();
    for symbol in raw {
        flatten(uri, symbol, None, &mut seen, &mut out);
    }
    for rejected in &out.quarantined {
        tracing::warn!("Quarantined symbol: {}", rejected);
    }
    out
}

fn flatten(uri: &str, raw: &RawSymbol, parent: Option<&str>, seen: &mut HashSet<String>, out: &mut Ingested) {
    let container = raw.container_name.as_deref().or(parent);
    let child_container = match validate(uri, raw, container) {
        Ok(symbol) => {
            let name = symbol.name.clone();
            if seen.insert(symbol.id.clone()) {
                out.symbols.push(symbol);
            } else {
                tracing::debug!("Duplicate symbol id {} in {}", symbol.id, uri);
            }
            Some(name)
        }
        Err(e) => {
            out.quarantined.push(e);
            container.map(str::to_string)
        }
    };
    for child in &raw.children {
        flatten(uri, child, child_container.as_deref(), seen, out);
    }
}

/// Validate a single raw entry into a [`Symbol`].
pub fn validate(uri: &str, raw: &RawSymbol, container: Option<&str>) -> Result<Symbol, GraphError> {
    let malformed = |reason: String| GraphError::MalformedSymbol {
        uri: uri.to_string(),
        reason,
    };

    let name = raw.name.trim();
    if name.is_empty() {
        return Err(malformed("empty symbol name".into()));
    }
    let kind = raw.kind.resolve().map_err(|e| malformed(format!("{e} for '{name}'")))?;
    if raw.range.start > raw.range.end {
        return Err(malformed(format!("inverted range for '{name}'")));
    }

    let location = Location::new(uri, raw.range);
    let mut symbol = Symbol::new(name, kind, location, container.map(str::to_string));
    symbol.metadata = metadata_from(raw);
    Ok(symbol)
}

fn metadata_from(raw: &RawSymbol) -> SymbolMetadata {
    let mut metadata = SymbolMetadata {
        tags: raw.tags.clone(),
        documentation: raw.documentation.clone(),
        type_info: raw.detail.clone(),
        ..Default::default()
    };
    for modifier in raw.modifiers.iter().chain(raw.tags.iter()) {
        match modifier.to_ascii_lowercase().as_str() {
            "export" | "exported" | "pub" => metadata.is_exported = true,
            "public" => {
                metadata.is_exported = true;
                metadata.visibility = Some(Visibility::Public);
            }
            "private" => metadata.visibility = Some(Visibility::Private),
            "protected" => metadata.visibility = Some(Visibility::Protected),
            "internal" | "pub(crate)" => metadata.visibility = Some(Visibility::Internal),
            "deprecated" => metadata.is_deprecated = true,
            "static" => metadata.is_static = true,
            "abstract" => metadata.is_abstract = true,
            _ => {}
        }
    }
    metadata
}
