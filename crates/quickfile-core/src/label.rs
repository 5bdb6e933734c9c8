use std::collections::{HashMap, HashSet};

use crate::tree::{FolderTree, NodeId, NodeRef};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LabelOptions {
    pub always_show_full_path: bool,
    pub always_show_mailbox: bool,
}

#[derive(Debug, Clone, Default)]
struct NameUse {
    count: usize,
    accounts: HashSet<String>,
    same_account: bool,
}

/// Which lower-cased folder names occur more than once in a list.
#[derive(Debug, Clone, Default)]
pub struct DuplicateNames {
    names: HashMap<String, NameUse>,
}

impl DuplicateNames {
    pub fn detect(tree: &FolderTree, nodes: &[NodeId]) -> Self {
        let mut names: HashMap<String, NameUse> = HashMap::new();
        for node in nodes.iter().filter_map(|&id| tree.get(id)) {
            let account = node.account_id().unwrap_or_default().to_string();
            let entry = names.entry(node.name().to_lowercase()).or_default();
            entry.count += 1;
            if !entry.accounts.insert(account) {
                entry.same_account = true;
            }
        }
        DuplicateNames { names }
    }

    /// The name appears more than once anywhere in the list.
    pub fn is_repeated(&self, name: &str) -> bool {
        self.names
            .get(&name.to_lowercase())
            .is_some_and(|entry| entry.count > 1)
    }

    /// The name appears more than once within a single account.
    pub fn is_repeated_in_account(&self, name: &str) -> bool {
        self.names
            .get(&name.to_lowercase())
            .is_some_and(|entry| entry.same_account)
    }
}

pub fn folder_label(node: NodeRef<'_>, dupes: &DuplicateNames, options: &LabelOptions) -> String {
    let name = node.name();
    let mut label = if options.always_show_full_path || dupes.is_repeated_in_account(name) {
        node.full_path()
    } else {
        name.to_string()
    };
    if options.always_show_mailbox || dupes.is_repeated(name) {
        if let Some(account) = node.account() {
            label.push_str(" - ");
            label.push_str(account.name());
        }
    }
    label
}

fn pretty_components(node: NodeRef<'_>) -> Vec<&str> {
    node.path()
        .unwrap_or_default()
        .split('/')
        .filter(|part| !part.is_empty() && !part.contains('['))
        .collect()
}

/// Folder path without empty or bracketed provider segments such as `[Gmail]`.
pub fn pretty_path(node: NodeRef<'_>) -> String {
    pretty_components(node).join(" → ")
}

/// Everything in [`pretty_path`] except the folder itself.
pub fn parent_hint(node: NodeRef<'_>) -> String {
    let components = pretty_components(node);
    match components.split_last() {
        Some((_, parents)) => parents.join(" → "),
        None => String::new(),
    }
}
