//! Query and symbol-name suggestions

use super::GlobSet;

const MAX_QUERY_SUGGESTIONS: usize = 10;
const MAX_SYMBOL_SUGGESTIONS: usize = 100;

const TEMPLATES: &[&str] = &[
    "all functions",
    "all classes",
    "all methods",
    "all interfaces",
    "all structs",
    "all traits",
    "all modules",
    "exported functions",
    "exported classes",
    "deprecated symbols",
];

/// Suggested query texts for a partially typed query.
///
/// Static templates containing the input come first, then relationship
/// queries for indexed symbols whose names start with the last word.
pub fn query_suggestions(partial: &str, names: &[String]) -> Vec<String> {
    let lower = partial.trim().to_lowercase();
    let mut out: Vec<String> = TEMPLATES
        .iter()
        .filter(|t| lower.is_empty() || t.contains(lower.as_str()))
        .map(|t| t.to_string())
        .collect();

    let word = lower.rsplit(' ').next().unwrap_or("");
    if !word.is_empty() {
        for name in symbol_suggestions(word, names) {
            for suggestion in [format!("calls {name}"), format!("extends {name}"), name] {
                if !out.contains(&suggestion) {
                    out.push(suggestion);
                }
            }
        }
    }
    out.truncate(MAX_QUERY_SUGGESTIONS);
    out
}

/// Indexed symbol names matching the glob `{partial}*`.
///
/// The trailing `*` stays within one word (see [`GlobSet`]), so `get`
/// suggests `getUser` but not `get_user`.
pub fn symbol_suggestions(partial: &str, names: &[String]) -> Vec<String> {
    let globs = GlobSet::new([format!("{}*", partial.trim()).as_str()]);
    let mut out: Vec<String> = Vec::new();
    for name in names {
        if globs.is_match(name) && !out.contains(name) {
            out.push(name.clone());
            if out.len() == MAX_SYMBOL_SUGGESTIONS {
                break;
            }
        }
    }
    out
}
