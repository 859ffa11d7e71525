//! Name lookup table for indexed symbols

use dashmap::DashMap;

/// One definition of a name: the defining file and the symbol id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolRef {
    pub uri: String,
    pub id: String,
}

/// Maps lowercase symbol names to their definitions. Thread-safe for concurrent access.
pub struct SymbolTable {
    by_name: DashMap<String, Vec<SymbolRef>>,
    /// File identifier -> lowercase names defined in that file
    file_names: DashMap<String, Vec<String>>,
}

impl SymbolTable {
    pub fn new() -> Self {
        SymbolTable {
            by_name: DashMap::new(),
            file_names: DashMap::new(),
        }
    }

    /// Insert a symbol.
    pub fn insert(&self, name: &str, id: String, uri: &str) {
        let key = name.to_lowercase();
        self.by_name.entry(key.clone()).or_default().push(SymbolRef {
            uri: uri.to_string(),
            id,
        });
        self.file_names.entry(uri.to_string()).or_default().push(key);
    }

    /// Every definition of this name, case-insensitively.
    pub fn lookup(&self, name: &str) -> Vec<SymbolRef> {
        self.by_name
            .get(&name.to_lowercase())
            .map(|r| r.value().clone())
            .unwrap_or_default()
    }

    /// Remove all symbols for a file (used before re-indexing it).
    pub fn remove_file(&self, uri: &str) {
        let Some((_, names)) = self.file_names.remove(uri) else {
            return;
        };
        for name in names {
            let now_empty = match self.by_name.get_mut(&name) {
                Some(mut refs) => {
                    refs.retain(|r| r.uri != uri);
                    refs.is_empty()
                }
                None => false,
            };
            if now_empty {
                self.by_name.remove(&name);
            }
        }
    }

    pub fn clear(&self) {
        self.by_name.clear();
        self.file_names.clear();
    }

    /// Number of distinct names.
    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}
