use std::collections::HashSet;

use anyhow::Result;
use indexmap::IndexSet;

use crate::host::PreferenceStore;
use crate::model::FolderRef;
use crate::tree::{FolderLookup, FolderTree, NodeId, NodeRef};

/// Resolves persisted references against the live tree.
pub fn validate(tree: &FolderTree, persisted: &[FolderRef]) -> FolderLookup {
    tree.from_list(persisted)
}

/// Ordered, duplicate-free set of folders chosen by the user.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FolderSelection {
    folders: IndexSet<FolderRef>,
}

impl FolderSelection {
    pub fn from_refs(refs: impl IntoIterator<Item = FolderRef>) -> Self {
        FolderSelection {
            folders: refs.into_iter().collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.folders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.folders.is_empty()
    }

    pub fn contains(&self, folder: &FolderRef) -> bool {
        self.folders.contains(folder)
    }

    pub fn iter(&self) -> impl Iterator<Item = &FolderRef> {
        self.folders.iter()
    }

    pub fn to_persisted(&self) -> Vec<FolderRef> {
        self.folders.iter().cloned().collect()
    }

    /// Nodes for the selected folders that exist in `tree`, in selection order.
    pub fn nodes(&self, tree: &FolderTree) -> Vec<NodeId> {
        self.folders.iter().filter_map(|folder| tree.find(folder)).collect()
    }
}

/// Returns true when the selection changed.
pub fn add_to_selection(set: &mut FolderSelection, node: NodeRef<'_>) -> bool {
    if !node.is_folder() {
        return false;
    }
    match node.folder_ref() {
        Some(folder) => set.folders.insert(folder),
        None => false,
    }
}

/// Returns true when the selection changed.
pub fn remove_from_selection(set: &mut FolderSelection, node: NodeRef<'_>) -> bool {
    match node.folder_ref() {
        Some(folder) => set.folders.shift_remove(&folder),
        None => false,
    }
}

/// Folders hidden from the picker: the one being viewed plus the user's list.
#[derive(Debug, Clone, Default)]
pub struct ExclusionSet {
    current: Option<FolderRef>,
    excluded: HashSet<FolderRef>,
}

impl ExclusionSet {
    pub fn new(current: Option<FolderRef>, excluded: &FolderSelection) -> Self {
        ExclusionSet {
            current,
            excluded: excluded.iter().cloned().collect(),
        }
    }

    pub fn is_excluded(&self, node: NodeRef<'_>) -> bool {
        match node.folder_ref() {
            Some(folder) => {
                self.current.as_ref() == Some(&folder) || self.excluded.contains(&folder)
            }
            None => false,
        }
    }

    pub fn apply(&self, tree: &FolderTree, nodes: &[NodeId]) -> Vec<NodeId> {
        nodes
            .iter()
            .copied()
            .filter(|&id| tree.get(id).is_some_and(|node| !self.is_excluded(node)))
            .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidatedSelection {
    pub selection: FolderSelection,
    pub missing: Vec<FolderRef>,
}

/// Reads a folder list preference, drops entries missing from `tree` and
/// rewrites the stored list when anything was dropped.
pub async fn load_validated(
    store: &dyn PreferenceStore,
    key: &str,
    tree: &FolderTree,
) -> ValidatedSelection {
    let persisted: Vec<FolderRef> = match store.get_preference(key).await {
        Ok(Some(value)) => serde_json::from_value(value).unwrap_or_else(|err| {
            log::warn!("ignoring malformed {} list: {}", key, err);
            Vec::new()
        }),
        Ok(None) => Vec::new(),
        Err(err) => {
            log::warn!("reading {} failed: {}", key, err);
            Vec::new()
        }
    };

    let lookup = validate(tree, &persisted);
    let selection = FolderSelection::from_refs(
        lookup
            .folder_nodes
            .iter()
            .filter_map(|&id| tree.node(id).folder_ref()),
    );

    if !lookup.missing.is_empty() {
        log::info!(
            "dropping {} missing folders from {}",
            lookup.missing.len(),
            key
        );
        if let Err(err) = persist(store, key, &selection).await {
            log::warn!("rewriting {} failed: {}", key, err);
        }
    }

    ValidatedSelection {
        selection,
        missing: lookup.missing,
    }
}

pub async fn persist(store: &dyn PreferenceStore, key: &str, selection: &FolderSelection) -> Result<()> {
    store
        .set_preference(key, serde_json::to_value(selection.to_persisted())?)
        .await
}
