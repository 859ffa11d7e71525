//! Core data structures for the symbol graph

use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Derive the stable id of a symbol.
///
/// The owning file is part of the id, so same-named symbols in different
/// files never collide.
pub fn symbol_id(uri: &str, container: Option<&str>, name: &str, kind: SymbolKind) -> String {
    format!("{}:{}:{}:{}", uri, container.unwrap_or(""), name, kind.as_str())
}

/// Discriminates what kind of code entity a symbol represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SymbolKind {
    // ── Containers ──────────────────────────────────────────
    File,
    Module,
    Namespace,
    Package,

    // ── Types ───────────────────────────────────────────────
    Class,
    Struct,
    Enum,
    Interface,
    Trait,
    TypeAlias,
    TypeParameter,

    // ── Callables ───────────────────────────────────────────
    Function,
    Method,
    Constructor,

    // ── Values ──────────────────────────────────────────────
    Field,
    Property,
    Variable,
    Constant,
    EnumMember,
}

impl SymbolKind {
    pub const ALL: [SymbolKind; 19] = [
        SymbolKind::File,
        SymbolKind::Module,
        SymbolKind::Namespace,
        SymbolKind::Package,
        SymbolKind::Class,
        SymbolKind::Struct,
        SymbolKind::Enum,
        SymbolKind::Interface,
        SymbolKind::Trait,
        SymbolKind::TypeAlias,
        SymbolKind::TypeParameter,
        SymbolKind::Function,
        SymbolKind::Method,
        SymbolKind::Constructor,
        SymbolKind::Field,
        SymbolKind::Property,
        SymbolKind::Variable,
        SymbolKind::Constant,
        SymbolKind::EnumMember,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SymbolKind::File => "file",
            SymbolKind::Module => "module",
            SymbolKind::Namespace => "namespace",
            SymbolKind::Package => "package",
            SymbolKind::Class => "class",
            SymbolKind::Struct => "struct",
            SymbolKind::Enum => "enum",
            SymbolKind::Interface => "interface",
            SymbolKind::Trait => "trait",
            SymbolKind::TypeAlias => "typeAlias",
            SymbolKind::TypeParameter => "typeParameter",
            SymbolKind::Function => "function",
            SymbolKind::Method => "method",
            SymbolKind::Constructor => "constructor",
            SymbolKind::Field => "field",
            SymbolKind::Property => "property",
            SymbolKind::Variable => "variable",
            SymbolKind::Constant => "constant",
            SymbolKind::EnumMember => "enumMember",
        }
    }

    /// Map an LSP `SymbolKind` numeric code.
    pub fn from_lsp_code(code: u64) -> Option<Self> {
        let kind = match code {
            1 => SymbolKind::File,
            2 => SymbolKind::Module,
            3 => SymbolKind::Namespace,
            4 => SymbolKind::Package,
            5 => SymbolKind::Class,
            6 => SymbolKind::Method,
            7 => SymbolKind::Property,
            8 => SymbolKind::Field,
            9 => SymbolKind::Constructor,
            10 => SymbolKind::Enum,
            11 => SymbolKind::Interface,
            12 => SymbolKind::Function,
            13 => SymbolKind::Variable,
            14 => SymbolKind::Constant,
            22 => SymbolKind::EnumMember,
            23 => SymbolKind::Struct,
            26 => SymbolKind::TypeParameter,
            _ => return None,
        };
        Some(kind)
    }

    /// Whether symbols of this kind usually hold other symbols.
    pub fn is_container(&self) -> bool {
        matches!(
            self,
            SymbolKind::File
                | SymbolKind::Module
                | SymbolKind::Namespace
                | SymbolKind::Package
                | SymbolKind::Class
                | SymbolKind::Struct
                | SymbolKind::Enum
                | SymbolKind::Interface
                | SymbolKind::Trait
        )
    }
}

impl fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SymbolKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        if let Ok(code) = lower.parse::<u64>() {
            return SymbolKind::from_lsp_code(code).ok_or_else(|| format!("unknown symbol kind code {code}"));
        }
        let kind = match lower.as_str() {
            "file" => SymbolKind::File,
            "module" | "mod" => SymbolKind::Module,
            "namespace" => SymbolKind::Namespace,
            "package" => SymbolKind::Package,
            "class" => SymbolKind::Class,
            "struct" => SymbolKind::Struct,
            "enum" => SymbolKind::Enum,
            "interface" => SymbolKind::Interface,
            "trait" => SymbolKind::Trait,
            "typealias" | "type" => SymbolKind::TypeAlias,
            "typeparameter" => SymbolKind::TypeParameter,
            "function" | "fn" => SymbolKind::Function,
            "method" => SymbolKind::Method,
            "constructor" => SymbolKind::Constructor,
            "field" => SymbolKind::Field,
            "property" => SymbolKind::Property,
            "variable" | "var" => SymbolKind::Variable,
            "constant" | "const" => SymbolKind::Constant,
            "enummember" => SymbolKind::EnumMember,
            other => return Err(format!("unknown symbol kind '{other}'")),
        };
        Ok(kind)
    }
}

/// Supported languages, detected from the file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Rust,
    TypeScript,
    JavaScript,
    Python,
    Go,
    Java,
    C,
    Cpp,
    CSharp,
    Other,
}

impl Language {
    /// Detect language from file extension.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("rs") => Language::Rust,
            Some("ts") | Some("tsx") | Some("mts") | Some("cts") => Language::TypeScript,
            Some("js") | Some("jsx") | Some("mjs") | Some("cjs") => Language::JavaScript,
            Some("py") | Some("pyi") => Language::Python,
            Some("go") => Language::Go,
            Some("java") => Language::Java,
            Some("c") | Some("h") => Language::C,
            Some("cpp") | Some("cc") | Some("cxx") | Some("hpp") | Some("hh") => Language::Cpp,
            Some("cs") => Language::CSharp,
            _ => Language::Other,
        }
    }

    /// Detect language from a file identifier such as `file:///src/lib.rs`.
    pub fn from_uri(uri: &str) -> Self {
        Self::from_path(Path::new(uri_to_path(uri)))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Rust => "rust",
            Language::TypeScript => "typescript",
            Language::JavaScript => "javascript",
            Language::Python => "python",
            Language::Go => "go",
            Language::Java => "java",
            Language::C => "c",
            Language::Cpp => "cpp",
            Language::CSharp => "csharp",
            Language::Other => "other",
        }
    }
}

impl FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "rust" | "rs" => Ok(Language::Rust),
            "typescript" | "ts" | "tsx" => Ok(Language::TypeScript),
            "javascript" | "js" | "jsx" => Ok(Language::JavaScript),
            "python" | "py" => Ok(Language::Python),
            "go" | "golang" => Ok(Language::Go),
            "java" => Ok(Language::Java),
            "c" => Ok(Language::C),
            "cpp" | "c++" => Ok(Language::Cpp),
            "csharp" | "c#" | "cs" => Ok(Language::CSharp),
            "other" => Ok(Language::Other),
            other => Err(format!("unknown language '{other}'")),
        }
    }
}

/// Strip a `file://` scheme so the identifier can be treated as a path.
pub fn uri_to_path(uri: &str) -> &str {
    uri.strip_prefix("file://").unwrap_or(uri)
}

/// Zero-based line/character position inside a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub struct Position {
    pub line: u32,
    pub character: u32,
}

impl Position {
    pub fn new(line: u32, character: u32) -> Self {
        Position { line, character }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct Range {
    pub start: Position,
    pub end: Position,
}

impl Range {
    pub fn new(start: Position, end: Position) -> Self {
        Range { start, end }
    }

    pub fn contains(&self, position: Position) -> bool {
        self.start <= position && position <= self.end
    }
}

/// Where a symbol lives: file identifier plus span.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Location {
    pub uri: String,
    pub range: Range,
}

impl Location {
    pub fn new(uri: impl Into<String>, range: Range) -> Self {
        Location {
            uri: uri.into(),
            range,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Public,
    Protected,
    Internal,
    Private,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct SymbolMetadata {
    pub is_exported: bool,
    pub is_deprecated: bool,
    pub is_static: bool,
    pub is_abstract: bool,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub documentation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub type_info: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visibility: Option<Visibility>,
}

/// A named code entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Symbol {
    pub id: String,
    pub name: String,
    pub kind: SymbolKind,
    pub location: Location,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_name: Option<String>,
    pub language: Language,
    #[serde(default)]
    pub metadata: SymbolMetadata,
}

impl Symbol {
    /// Build a symbol whose id is derived from its file, container, name and kind.
    pub fn new(
        name: impl Into<String>,
        kind: SymbolKind,
        location: Location,
        container_name: Option<String>,
    ) -> Self {
        let name = name.into();
        let id = symbol_id(&location.uri, container_name.as_deref(), &name, kind);
        let language = Language::from_uri(&location.uri);
        Symbol {
            id,
            name,
            kind,
            location,
            container_name,
            language,
            metadata: SymbolMetadata::default(),
        }
    }

    pub fn uri(&self) -> &str {
        &self.location.uri
    }
}

/// What kind of relationship an edge represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RelationshipType {
    Calls,
    Extends,
    Implements,
    Imports,
    References,
    Defines,
    Uses,
    Inherits,
    Contains,
}

impl RelationshipType {
    pub const ALL: [RelationshipType; 9] = [
        RelationshipType::Calls,
        RelationshipType::Extends,
        RelationshipType::Implements,
        RelationshipType::Imports,
        RelationshipType::References,
        RelationshipType::Defines,
        RelationshipType::Uses,
        RelationshipType::Inherits,
        RelationshipType::Contains,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RelationshipType::Calls => "calls",
            RelationshipType::Extends => "extends",
            RelationshipType::Implements => "implements",
            RelationshipType::Imports => "imports",
            RelationshipType::References => "references",
            RelationshipType::Defines => "defines",
            RelationshipType::Uses => "uses",
            RelationshipType::Inherits => "inherits",
            RelationshipType::Contains => "contains",
        }
    }
}

impl fmt::Display for RelationshipType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RelationshipType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        RelationshipType::ALL
            .into_iter()
            .find(|t| t.as_str() == lower)
            .ok_or_else(|| format!("unknown relationship type '{lower}'"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Cardinality {
    OneToOne,
    OneToMany,
    ManyToOne,
    ManyToMany,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EdgeDirection {
    Forward,
    Backward,
    Bidirectional,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct RelationshipMetadata {
    /// 0.0 - 1.0
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strength: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cardinality: Option<Cardinality>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direction: Option<EdgeDirection>,
    #[serde(default)]
    pub labels: Vec<String>,
}

/// A typed directed edge between two symbol ids.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Relationship {
    pub source_id: String,
    pub target_id: String,
    #[serde(rename = "type")]
    pub kind: RelationshipType,
    #[serde(default)]
    pub metadata: RelationshipMetadata,
}

impl Relationship {
    pub fn new(source_id: impl Into<String>, target_id: impl Into<String>, kind: RelationshipType) -> Self {
        Relationship {
            source_id: source_id.into(),
            target_id: target_id.into(),
            kind,
            metadata: RelationshipMetadata::default(),
        }
    }

    /// Composite "source-target" key used to deduplicate relationships.
    pub fn key(&self) -> String {
        format!("{}-{}", self.source_id, self.target_id)
    }
}

/// A symbol plus the lowercase terms it can be found by.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexedSymbol {
    pub symbol: Symbol,
    pub search_terms: BTreeSet<String>,
}

impl IndexedSymbol {
    pub fn new(symbol: Symbol) -> Self {
        let mut search_terms = BTreeSet::new();
        search_terms.insert(symbol.name.to_lowercase());
        if let Some(container) = &symbol.container_name {
            search_terms.insert(container.to_lowercase());
        }
        search_terms.insert(symbol.kind.as_str().to_lowercase());
        IndexedSymbol {
            symbol,
            search_terms,
        }
    }
}

/// A positioned node of a laid-out graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphNode {
    pub id: String,
    pub symbol: Symbol,
    pub x: f64,
    pub y: f64,
    pub vx: f64,
    pub vy: f64,
    /// Pinned position; a pinned node is never moved by a simulation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fx: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fy: Option<f64>,
    pub size: f64,
    pub color: String,
    pub group: String,
    /// Whether `x`/`y` have been assigned by a layout or the caller.
    #[serde(default)]
    pub positioned: bool,
}

impl GraphNode {
    pub fn new(symbol: Symbol) -> Self {
        let size = if symbol.kind.is_container() { 14.0 } else { 8.0 };
        let color = kind_color(symbol.kind).to_string();
        let group = symbol
            .container_name
            .clone()
            .unwrap_or_else(|| symbol.location.uri.clone());
        GraphNode {
            id: symbol.id.clone(),
            symbol,
            x: 0.0,
            y: 0.0,
            vx: 0.0,
            vy: 0.0,
            fx: None,
            fy: None,
            size,
            color,
            group,
            positioned: false,
        }
    }

    pub fn is_pinned(&self) -> bool {
        self.fx.is_some() && self.fy.is_some()
    }

    /// A node at the origin that was never placed counts as unset.
    pub fn has_position(&self) -> bool {
        self.positioned || self.x != 0.0 || self.y != 0.0
    }

    pub fn set_position(&mut self, x: f64, y: f64) {
        self.x = x;
        self.y = y;
        self.positioned = true;
    }

    pub fn speed(&self) -> f64 {
        (self.vx * self.vx + self.vy * self.vy).sqrt()
    }
}

fn kind_color(kind: SymbolKind) -> &'static str {
    match kind {
        SymbolKind::Class | SymbolKind::Struct => "#4f8cc9",
        SymbolKind::Interface | SymbolKind::Trait => "#8e6cc9",
        SymbolKind::Function | SymbolKind::Method | SymbolKind::Constructor => "#52a66b",
        SymbolKind::Module | SymbolKind::Namespace | SymbolKind::Package | SymbolKind::File => "#c9a04f",
        SymbolKind::Enum | SymbolKind::EnumMember => "#c96c4f",
        _ => "#8a8a8a",
    }
}

/// A graph edge carrying the relationship it was built from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphEdge {
    pub source: String,
    pub target: String,
    pub relationship: Relationship,
    pub strength: f64,
    pub color: String,
    pub width: f64,
}

impl GraphEdge {
    pub fn new(relationship: Relationship) -> Self {
        let strength = relationship.metadata.strength.map(f64::from).unwrap_or(1.0);
        GraphEdge {
            source: relationship.source_id.clone(),
            target: relationship.target_id.clone(),
            strength,
            color: "#999999".to_string(),
            width: 1.0 + strength,
            relationship,
        }
    }
}

/// Nodes and edges ready for layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct GraphData {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

impl GraphData {
    /// Assemble graph data from symbols and relationships.
    ///
    /// Relationships whose endpoints are not both present are dropped, and
    /// duplicate symbol ids keep their first occurrence.
    pub fn from_parts(symbols: &[Symbol], relationships: &[Relationship]) -> Self {
        let mut seen = HashSet::new();
        let nodes: Vec<GraphNode> = symbols
            .iter()
            .filter(|s| seen.insert(s.id.clone()))
            .cloned()
            .map(GraphNode::new)
            .collect();

        let mut edge_keys = HashSet::new();
        let edges = relationships
            .iter()
            .filter(|r| seen.contains(&r.source_id) && seen.contains(&r.target_id))
            .filter(|r| edge_keys.insert((r.key(), r.kind)))
            .cloned()
            .map(GraphEdge::new)
            .collect();

        GraphData { nodes, edges }
    }

    pub fn node(&self, id: &str) -> Option<&GraphNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Position of each node id in `nodes`.
    pub fn index_by_id(&self) -> HashMap<String, usize> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (n.id.clone(), i))
            .collect()
    }

    /// Sorted, deduplicated list of files the nodes come from.
    pub fn files(&self) -> Vec<String> {
        let files: BTreeSet<String> = self.nodes.iter().map(|n| n.symbol.location.uri.clone()).collect();
        files.into_iter().collect()
    }

    /// Subgraph induced by `ids`: those nodes plus edges between them.
    pub fn induced(&self, ids: &HashSet<String>) -> GraphData {
        GraphData {
            nodes: self.nodes.iter().filter(|n| ids.contains(&n.id)).cloned().collect(),
            edges: self
                .edges
                .iter()
                .filter(|e| ids.contains(&e.source) && ids.contains(&e.target))
                .cloned()
                .collect(),
        }
    }
}

/// The six logical stores of the cache manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CacheStore {
    Symbols,
    References,
    Relationships,
    GraphData,
    Layout,
    QueryResult,
}

impl CacheStore {
    pub const ALL: [CacheStore; 6] = [
        CacheStore::Symbols,
        CacheStore::References,
        CacheStore::Relationships,
        CacheStore::GraphData,
        CacheStore::Layout,
        CacheStore::QueryResult,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CacheStore::Symbols => "symbols",
            CacheStore::References => "references",
            CacheStore::Relationships => "relationships",
            CacheStore::GraphData => "graph-data",
            CacheStore::Layout => "layout",
            CacheStore::QueryResult => "query-result",
        }
    }
}

impl fmt::Display for CacheStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CacheStore {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase().replace('_', "-");
        CacheStore::ALL
            .into_iter()
            .find(|store| store.as_str() == lower)
            .ok_or_else(|| format!("unknown cache store '{s}'"))
    }
}

/// Aggregate cache accounting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub total_size: usize,
    pub entry_count: usize,
    pub hit_count: u64,
    pub miss_count: u64,
    pub eviction_count: u64,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let lookups = self.hit_count + self.miss_count;
        if lookups == 0 {
            0.0
        } else {
            self.hit_count as f64 / lookups as f64
        }
    }
}
