use serde::{Deserialize, Serialize};
use unicode_normalization::UnicodeNormalization;

use crate::tree::{FolderTree, NodeId};

/// How many exact matches are moved ahead of the substring matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExactMatch {
    #[default]
    First,
    All,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SearchOptions {
    pub partial_match_full_path: bool,
    pub exact_match: ExactMatch,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchResults {
    /// The query was empty; show the default list instead.
    Blank,
    NoResults,
    Matches(Vec<NodeId>),
}

impl SearchResults {
    pub fn nodes(&self) -> &[NodeId] {
        match self {
            SearchResults::Matches(nodes) => nodes,
            _ => &[],
        }
    }

    pub fn is_blank(&self) -> bool {
        matches!(self, SearchResults::Blank)
    }
}

fn is_combining_mark(c: char) -> bool {
    ('\u{0300}'..='\u{036f}').contains(&c)
}

/// True when the decomposed text carries any combining diacritical mark.
pub fn has_diacritics(text: &str) -> bool {
    text.nfd().any(is_combining_mark)
}

/// Lower-cased text with combining diacritical marks removed.
pub fn fold_diacritics(text: &str) -> String {
    text.nfd()
        .filter(|c| !is_combining_mark(*c))
        .collect::<String>()
        .to_lowercase()
}

/// Lower-cased text in composed form.
pub fn compose(text: &str) -> String {
    text.nfc().collect::<String>().to_lowercase()
}

#[derive(Debug, Clone)]
struct IndexEntry {
    node: NodeId,
    plain: String,
    folded: String,
}

/// Comparison strings for a fixed candidate list, computed once.
#[derive(Debug, Clone, Default)]
pub struct SearchIndex {
    entries: Vec<IndexEntry>,
    full_path: bool,
}

impl SearchIndex {
    pub fn build(tree: &FolderTree, nodes: &[NodeId], full_path: bool) -> Self {
        let entries = nodes
            .iter()
            .filter_map(|&id| tree.get(id))
            .map(|node| {
                let text = if full_path {
                    node.full_path()
                } else {
                    node.name().to_string()
                };
                IndexEntry {
                    node: node.id(),
                    plain: compose(&text),
                    folded: fold_diacritics(&text),
                }
            })
            .collect();
        SearchIndex { entries, full_path }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_full_path(&self) -> bool {
        self.full_path
    }

    pub fn search(&self, query: &str, exact_match: ExactMatch) -> SearchResults {
        let query = query.trim();
        if query.is_empty() {
            return SearchResults::Blank;
        }

        // An accented query only matches accented names; a plain one matches both.
        let fold = !has_diacritics(query);
        let needle = if fold {
            fold_diacritics(query)
        } else {
            compose(query)
        };
        let tokens: Vec<&str> = needle.split_whitespace().collect();

        let mut exact = Vec::new();
        let mut rest = Vec::new();
        for entry in &self.entries {
            let haystack = if fold { &entry.folded } else { &entry.plain };
            if !tokens.iter().all(|token| haystack.contains(token)) {
                continue;
            }
            let promote = *haystack == needle
                && (exact_match == ExactMatch::All || exact.is_empty());
            if promote {
                exact.push(entry.node);
            } else {
                rest.push(entry.node);
            }
        }

        if exact.is_empty() && rest.is_empty() {
            return SearchResults::NoResults;
        }
        exact.extend(rest);
        SearchResults::Matches(exact)
    }
}

/// One-off search over `nodes`; sessions keep a [`SearchIndex`] instead.
pub fn search(
    tree: &FolderTree,
    nodes: &[NodeId],
    query: &str,
    options: &SearchOptions,
) -> SearchResults {
    SearchIndex::build(tree, nodes, options.partial_match_full_path).search(query, options.exact_match)
}
