//! Tree-sitter backed analysis provider
//!
//! Produces document symbols for Rust, Python and TypeScript/JavaScript
//! straight from the syntax tree. It knows nothing about name resolution,
//! so references, definitions, implementations and type definitions are
//! always empty.

use std::path::PathBuf;

use anyhow::{Context, Result, anyhow, bail};
use grove_core::model::uri_to_path;
use grove_core::{Language, Location, Position, Range, SymbolKind};
use tree_sitter::{Node, Parser};

use crate::provider::AnalysisProvider;
use crate::schema::RawSymbol;

/// Grammar flavour used for a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Grammar {
    Rust,
    Python,
    TypeScript,
    Tsx,
}

impl Grammar {
    fn for_uri(uri: &str) -> Option<Self> {
        let path = uri_to_path(uri);
        match Language::from_uri(uri) {
            Language::Rust => Some(Grammar::Rust),
            Language::Python => Some(Grammar::Python),
            Language::TypeScript if path.ends_with(".tsx") => Some(Grammar::Tsx),
            Language::TypeScript => Some(Grammar::TypeScript),
            // The TSX grammar accepts plain JavaScript and JSX
            Language::JavaScript => Some(Grammar::Tsx),
            _ => None,
        }
    }

    fn language(&self) -> tree_sitter::Language {
        match self {
            Grammar::Rust => tree_sitter_rust::LANGUAGE.into(),
            Grammar::Python => tree_sitter_python::LANGUAGE.into(),
            Grammar::TypeScript => tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
            Grammar::Tsx => tree_sitter_typescript::LANGUAGE_TSX.into(),
        }
    }
}

pub struct TreeSitterProvider {
    max_file_bytes: u64,
}

impl TreeSitterProvider {
    /// Languages this provider can extract symbols from.
    pub const SUPPORTED: [Language; 4] = [Language::Rust, Language::Python, Language::TypeScript, Language::JavaScript];

    pub fn new(max_file_bytes: u64) -> Self {
        TreeSitterProvider { max_file_bytes }
    }

    async fn read(&self, uri: &str) -> Result<String> {
        let path = PathBuf::from(uri_to_path(uri));
        let metadata = tokio::fs::metadata(&path)
            .await
            .with_context(|| format!("cannot stat {}", path.display()))?;
        if metadata.len() > self.max_file_bytes {
            bail!("{} is {} bytes, over the {} byte limit", path.display(), metadata.len(), self.max_file_bytes);
        }
        tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("cannot read {}", path.display()))
    }
}

#[async_trait::async_trait]
impl AnalysisProvider for TreeSitterProvider {
    async fn document_symbols(&self, uri: &str) -> Result<Vec<RawSymbol>> {
        let grammar = Grammar::for_uri(uri).ok_or_else(|| anyhow!("no grammar for {uri}"))?;
        let text = self.read(uri).await?;
        tokio::task::spawn_blocking(move || extract_symbols(grammar, &text))
            .await
            .context("symbol extraction panicked")?
    }

    async fn document_text(&self, uri: &str) -> Result<String> {
        self.read(uri).await
    }

    async fn references(&self, _uri: &str, _position: Position) -> Result<Vec<Location>> {
        Ok(Vec::new())
    }

    async fn definition(&self, _uri: &str, _position: Position) -> Result<Vec<Location>> {
        Ok(Vec::new())
    }

    async fn implementations(&self, _uri: &str, _position: Position) -> Result<Vec<Location>> {
        Ok(Vec::new())
    }

    async fn type_definition(&self, _uri: &str, _position: Position) -> Result<Vec<Location>> {
        Ok(Vec::new())
    }

    async fn word_at(&self, uri: &str, position: Position) -> Result<Option<String>> {
        Ok(word_at(&self.read(uri).await?, position))
    }

    fn name(&self) -> &str {
        "tree-sitter"
    }
}

/// The identifier touching `position`, if any.
pub fn word_at(text: &str, position: Position) -> Option<String> {
    let line = text.lines().nth(position.line as usize)?;
    let chars: Vec<char> = line.chars().collect();
    let is_word = |c: char| c.is_alphanumeric() || c == '_';
    let at = (position.character as usize).min(chars.len());

    let mut start = at;
    while start > 0 && is_word(chars[start - 1]) {
        start -= 1;
    }
    let mut end = at;
    while end < chars.len() && is_word(chars[end]) {
        end += 1;
    }
    (start < end).then(|| chars[start..end].iter().collect())
}

fn extract_symbols(grammar: Grammar, text: &str) -> Result<Vec<RawSymbol>> {
    let mut parser = Parser::new();
    parser
        .set_language(&grammar.language())
        .map_err(|e| anyhow!("failed to set language: {e}"))?;
    let tree = parser.parse(text, None).ok_or_else(|| anyhow!("parse produced no tree"))?;
    let mut symbols = Vec::new();
    collect(tree.root_node(), text.as_bytes(), grammar, None, &mut symbols);
    Ok(symbols)
}

fn range_of(node: Node) -> Range {
    let start = node.start_position();
    let end = node.end_position();
    Range::new(
        Position::new(start.row as u32, start.column as u32),
        Position::new(end.row as u32, end.column as u32),
    )
}

fn text_of<'a>(node: Node, source: &'a [u8]) -> Option<&'a str> {
    node.utf8_text(source).ok()
}

/// Walk `node`'s named children, appending symbols to `out`.
///
/// `parent_kind` is the kind of the nearest enclosing symbol, used to tell
/// methods from free functions.
fn collect(node: Node, source: &[u8], grammar: Grammar, parent_kind: Option<SymbolKind>, out: &mut Vec<RawSymbol>) {
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        if grammar == Grammar::Rust && child.kind() == "impl_item" {
            collect_rust_impl(child, source, out);
            continue;
        }
        match classify(child, source, grammar, parent_kind) {
            Some((kind, name_node)) => {
                let Some(name) = text_of(name_node, source) else { continue };
                let mut symbol = RawSymbol::new(name, kind, range_of(child));
                symbol.selection_range = Some(range_of(name_node));
                symbol.modifiers = modifiers(child, source, grammar, name);
                let mut children = Vec::new();
                collect(child, source, grammar, Some(kind), &mut children);
                symbol.children = children;
                out.push(symbol);
            }
            None => collect(child, source, grammar, parent_kind, out),
        }
    }
}

fn classify<'t>(node: Node<'t>, source: &[u8], grammar: Grammar, parent: Option<SymbolKind>) -> Option<(SymbolKind, Node<'t>)> {
    let in_type = matches!(
        parent,
        Some(SymbolKind::Class | SymbolKind::Trait | SymbolKind::Interface | SymbolKind::Struct)
    );
    let kind = match (grammar, node.kind()) {
        (Grammar::Rust, "function_item") if in_type => SymbolKind::Method,
        (Grammar::Rust, "function_item") => SymbolKind::Function,
        (Grammar::Rust, "function_signature_item") => SymbolKind::Method,
        (Grammar::Rust, "struct_item") => SymbolKind::Struct,
        (Grammar::Rust, "enum_item") => SymbolKind::Enum,
        (Grammar::Rust, "enum_variant") => SymbolKind::EnumMember,
        (Grammar::Rust, "trait_item") => SymbolKind::Trait,
        (Grammar::Rust, "mod_item") => SymbolKind::Module,
        (Grammar::Rust, "const_item") => SymbolKind::Constant,
        (Grammar::Rust, "static_item") => SymbolKind::Variable,
        (Grammar::Rust, "type_item") => SymbolKind::TypeAlias,
        (Grammar::Rust, "field_declaration") => SymbolKind::Field,

        (Grammar::Python, "function_definition") if parent == Some(SymbolKind::Class) => SymbolKind::Method,
        (Grammar::Python, "function_definition") => SymbolKind::Function,
        (Grammar::Python, "class_definition") => SymbolKind::Class,

        (_, "function_declaration") => SymbolKind::Function,
        (_, "class_declaration" | "abstract_class_declaration") => SymbolKind::Class,
        (_, "method_definition") if text_of_field(node, "name", source) == Some("constructor") => SymbolKind::Constructor,
        (_, "method_definition" | "method_signature") => SymbolKind::Method,
        (_, "interface_declaration") => SymbolKind::Interface,
        (_, "enum_declaration") => SymbolKind::Enum,
        (_, "type_alias_declaration") => SymbolKind::TypeAlias,
        (_, "public_field_definition") => SymbolKind::Property,
        (_, "variable_declarator") => {
            let value = node.child_by_field_name("value")?;
            if !matches!(value.kind(), "arrow_function" | "function_expression" | "function") {
                return None;
            }
            SymbolKind::Function
        }
        _ => return None,
    };
    let name = node.child_by_field_name("name")?;
    Some((kind, name))
}

fn text_of_field<'a>(node: Node, field: &str, source: &'a [u8]) -> Option<&'a str> {
    node.child_by_field_name(field).and_then(|n| text_of(n, source))
}

fn modifiers(node: Node, source: &[u8], grammar: Grammar, name: &str) -> Vec<String> {
    let mut out = Vec::new();
    match grammar {
        Grammar::Rust => {
            let mut cursor = node.walk();
            for child in node.children(&mut cursor) {
                if child.kind() == "visibility_modifier" {
                    let text = text_of(child, source).unwrap_or("pub");
                    out.push(if text == "pub" { "pub".to_string() } else { text.replace(' ', "") });
                }
            }
        }
        Grammar::Python => {
            if !name.starts_with('_') {
                out.push("export".to_string());
            }
        }
        Grammar::TypeScript | Grammar::Tsx => {
            let exported = std::iter::successors(node.parent(), |n| n.parent())
                .take(2)
                .any(|n| n.kind() == "export_statement");
            if exported {
                out.push("export".to_string());
            }
            if node.kind() == "abstract_class_declaration" {
                out.push("abstract".to_string());
            }
            let mut cursor = node.walk();
            for child in node.children(&mut cursor) {
                match child.kind() {
                    "accessibility_modifier" => {
                        if let Some(text) = text_of(child, source) {
                            out.push(text.to_string());
                        }
                    }
                    "static" | "abstract" => out.push(child.kind().to_string()),
                    _ => {}
                }
            }
        }
    }
    out
}

/// Methods of an `impl` block, attributed to the implemented type.
fn collect_rust_impl(node: Node, source: &[u8], out: &mut Vec<RawSymbol>) {
    let Some(type_name) = text_of_field(node, "type", source) else { return };
    let container = type_name.split('<').next().unwrap_or(type_name).trim().to_string();
    let Some(body) = node.child_by_field_name("body") else { return };

    let mut cursor = body.walk();
    for item in body.named_children(&mut cursor) {
        let kind = match item.kind() {
            "function_item" => SymbolKind::Method,
            "const_item" => SymbolKind::Constant,
            "type_item" => SymbolKind::TypeAlias,
            _ => continue,
        };
        let Some(name_node) = item.child_by_field_name("name") else { continue };
        let Some(name) = text_of(name_node, source) else { continue };
        let mut symbol = RawSymbol::new(name, kind, range_of(item));
        symbol.selection_range = Some(range_of(name_node));
        symbol.container_name = Some(container.clone());
        symbol.modifiers = modifiers(item, source, Grammar::Rust, name);
        out.push(symbol);
    }
}
