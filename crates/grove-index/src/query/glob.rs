//! Name glob matching
//!
//! Matching is case-insensitive and anchored. `*` matches any run of
//! characters within one `_`-separated word, so `Foo*` matches `FooBar`
//! but not `foo_bar`; `*_bar` reaches across explicitly. A pattern made
//! only of `*` matches every name.

use regex::{Regex, RegexBuilder};

/// A set of name patterns, matching when any one of them does.
///
/// `*` compiles to `[^_]*`: it never crosses an underscore. So `get*`
/// matches `getUser` and `GETTER` but not `get_user`; write `get_*` (or
/// `get*_*`) to reach into snake_case names. A pattern of only `*`
/// matches every name, underscores included.
///
/// ```
/// use grove_index::query::GlobSet;
///
/// let globs = GlobSet::new(["get*"]);
/// assert!(globs.is_match("getUser"));
/// assert!(!globs.is_match("get_user"));
/// assert!(GlobSet::new(["get_*"]).is_match("get_user"));
/// ```
#[derive(Debug, Clone)]
pub struct GlobSet {
    matchers: Vec<Matcher>,
}

#[derive(Debug, Clone)]
enum Matcher {
    Any,
    Pattern(Regex),
}

impl GlobSet {
    pub fn new<'a>(patterns: impl IntoIterator<Item = &'a str>) -> Self {
        let matchers = patterns.into_iter().filter_map(compile).collect();
        GlobSet { matchers }
    }

    /// True if any pattern matches `name`.
    pub fn is_match(&self, name: &str) -> bool {
        self.matchers.iter().any(|m| match m {
            Matcher::Any => true,
            Matcher::Pattern(re) => re.is_match(name),
        })
    }

    pub fn is_empty(&self) -> bool {
        self.matchers.is_empty()
    }
}

fn compile(pattern: &str) -> Option<Matcher> {
    let pattern = pattern.trim();
    if pattern.is_empty() {
        return None;
    }
    if pattern.chars().all(|c| c == '*') {
        return Some(Matcher::Any);
    }
    let body = pattern
        .split('*')
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join("[^_]*");
    match RegexBuilder::new(&format!("^{body}$")).case_insensitive(true).build() {
        Ok(re) => Some(Matcher::Pattern(re)),
        Err(e) => {
            tracing::warn!("Ignoring unusable pattern '{}': {}", pattern, e);
            None
        }
    }
}
