use std::collections::HashMap;

use indexmap::IndexMap;

use crate::model::{
    AccountItem, AccountType, FolderItem, FolderRef, SpecialUse, TAGS_ACCOUNT_ID,
    UNIFIED_ACCOUNT_ID, folder_key,
};

/// Index of a node inside a [`FolderTree`]. Only valid for the tree state
/// that produced it; a reindex invalidates every id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

const ROOT: NodeId = NodeId(0);

#[derive(Debug, Clone, PartialEq)]
pub struct AccountInfo {
    pub id: String,
    pub name: String,
    pub account_type: AccountType,
}

impl From<&AccountItem> for AccountInfo {
    fn from(account: &AccountItem) -> Self {
        AccountInfo {
            id: account.id.clone(),
            name: account.name.clone(),
            account_type: account.account_type,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Root,
    Account(AccountInfo),
    Folder(FolderItem),
    VirtualFolder(FolderItem),
}

#[derive(Debug, Clone)]
pub struct TreeNode {
    kind: NodeKind,
    parent: Option<NodeId>,
    account: Option<NodeId>,
    children: IndexMap<String, NodeId>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BuildOptions {
    pub skip_archive: bool,
    pub tag_folders: Option<Vec<FolderItem>>,
    pub unified_folders: Option<Vec<FolderItem>>,
}

/// Result of resolving a list of persisted folder references.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FolderLookup {
    pub missing: Vec<FolderRef>,
    pub folder_nodes: Vec<NodeId>,
}

/// Accounts, folders and pseudo-accounts indexed as one tree.
#[derive(Debug, Clone)]
pub struct FolderTree {
    accounts: Vec<AccountItem>,
    options: BuildOptions,
    nodes: Vec<TreeNode>,
    index: HashMap<String, NodeId>,
}

impl FolderTree {
    pub fn build(accounts: Vec<AccountItem>, options: BuildOptions) -> Self {
        let mut tree = FolderTree {
            accounts,
            options,
            nodes: Vec::new(),
            index: HashMap::new(),
        };
        tree.reindex();
        tree
    }

    /// Throws away every node and rebuilds from the stored inputs.
    pub fn reindex(&mut self) {
        self.nodes.clear();
        self.index.clear();
        self.nodes.push(TreeNode {
            kind: NodeKind::Root,
            parent: None,
            account: None,
            children: IndexMap::new(),
        });

        let accounts = std::mem::take(&mut self.accounts);
        for account in &accounts {
            if let Some(node) = self.add_account(AccountInfo::from(account)) {
                self.expand_folders(node, node, &account.folders, false);
            }
        }
        self.accounts = accounts;

        if let Some(tags) = self.options.tag_folders.take() {
            let info = AccountInfo {
                id: TAGS_ACCOUNT_ID.to_string(),
                name: "Tags".to_string(),
                account_type: AccountType::Tags,
            };
            if let Some(node) = self.add_account(info) {
                self.expand_folders(node, node, &tags, true);
            }
            self.options.tag_folders = Some(tags);
        }

        if let Some(unified) = self.options.unified_folders.take() {
            let info = AccountInfo {
                id: UNIFIED_ACCOUNT_ID.to_string(),
                name: "Unified Folders".to_string(),
                account_type: AccountType::Unified,
            };
            if let Some(node) = self.add_account(info) {
                self.expand_folders(node, node, &unified, true);
            }
            self.options.unified_folders = Some(unified);
        }

        log::debug!(
            "folder tree indexed: {} accounts, {} folders",
            self.nodes[ROOT.0].children.len(),
            self.index.len()
        );
    }

    pub fn accounts(&self) -> &[AccountItem] {
        &self.accounts
    }

    pub fn options(&self) -> &BuildOptions {
        &self.options
    }

    pub fn skip_archive(&self) -> bool {
        self.options.skip_archive
    }

    /// Returns true when the policy changed and the tree was rebuilt.
    pub fn set_skip_archive(&mut self, skip_archive: bool) -> bool {
        if self.options.skip_archive == skip_archive {
            return false;
        }
        self.options.skip_archive = skip_archive;
        self.reindex();
        true
    }

    pub fn replace_accounts(&mut self, accounts: Vec<AccountItem>) {
        self.accounts = accounts;
        self.reindex();
    }

    pub fn set_tag_folders(&mut self, tags: Option<Vec<FolderItem>>) {
        self.options.tag_folders = tags;
        self.reindex();
    }

    pub fn set_unified_folders(&mut self, unified: Option<Vec<FolderItem>>) {
        self.options.unified_folders = unified;
        self.reindex();
    }

    fn push_node(&mut self, kind: NodeKind, parent: NodeId, account: Option<NodeId>) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(TreeNode {
            kind,
            parent: Some(parent),
            account,
            children: IndexMap::new(),
        });
        id
    }

    fn add_account(&mut self, info: AccountInfo) -> Option<NodeId> {
        if info.id.is_empty() {
            log::warn!("skipping account {:?} without id", info.name);
            return None;
        }
        if self.nodes[ROOT.0].children.contains_key(&info.id) {
            log::warn!("skipping duplicate account id {}", info.id);
            return None;
        }
        let key = info.id.clone();
        let id = NodeId(self.nodes.len());
        self.nodes.push(TreeNode {
            kind: NodeKind::Account(info),
            parent: Some(ROOT),
            account: Some(id),
            children: IndexMap::new(),
        });
        self.nodes[ROOT.0].children.insert(key, id);
        Some(id)
    }

    fn expand_folders(
        &mut self,
        parent: NodeId,
        account: NodeId,
        folders: &[FolderItem],
        virtual_children: bool,
    ) {
        let account_id = match &self.nodes[account.0].kind {
            NodeKind::Account(info) => info.id.clone(),
            _ => return,
        };

        for folder in folders {
            if self.options.skip_archive && folder.has_special_use(SpecialUse::Archives) {
                continue;
            }
            let Some(segment) = folder.leaf_segment() else {
                log::warn!("skipping folder {:?} with empty path in {}", folder.name, account_id);
                continue;
            };
            if self.nodes[parent.0].children.contains_key(segment) {
                log::warn!("skipping duplicate folder {}://{}", account_id, folder.path);
                continue;
            }

            let key_account = if virtual_children || folder.account_id.is_empty() {
                account_id.as_str()
            } else {
                folder.account_id.as_str()
            };
            let key = folder_key(key_account, &folder.path);
            if self.index.contains_key(&key) {
                log::warn!("skipping folder already indexed as {}", key);
                continue;
            }

            let mut item = folder.detached();
            if item.account_id.is_empty() {
                item.account_id = account_id.clone();
            }
            let kind = if virtual_children {
                NodeKind::VirtualFolder(item)
            } else {
                NodeKind::Folder(item)
            };
            let node = self.push_node(kind, parent, Some(account));
            self.nodes[parent.0].children.insert(segment.to_string(), node);
            self.index.insert(key, node);

            if !folder.sub_folders.is_empty() && !folder.has_special_use(SpecialUse::Trash) {
                self.expand_folders(node, account, &folder.sub_folders, virtual_children);
            }
        }
    }

    pub fn root(&self) -> NodeRef<'_> {
        self.node(ROOT)
    }

    /// Panics when `id` did not come from this tree's current index.
    pub fn node(&self, id: NodeId) -> NodeRef<'_> {
        assert!(id.0 < self.nodes.len(), "node id {:?} out of range", id);
        NodeRef { tree: self, id }
    }

    pub fn get(&self, id: NodeId) -> Option<NodeRef<'_>> {
        (id.0 < self.nodes.len()).then_some(NodeRef { tree: self, id })
    }

    pub fn find_folder(&self, account_id: &str, path: &str) -> Option<NodeId> {
        self.index.get(&folder_key(account_id, path)).copied()
    }

    pub fn find(&self, folder: &FolderRef) -> Option<NodeId> {
        self.find_folder(&folder.account_id, &folder.path)
    }

    pub fn from_list(&self, folders: &[FolderRef]) -> FolderLookup {
        let mut lookup = FolderLookup::default();
        for folder in folders {
            match self.find(folder) {
                Some(node) => lookup.folder_nodes.push(node),
                None => lookup.missing.push(folder.clone()),
            }
        }
        lookup
    }

    /// Pre-order walk over the whole tree, root first.
    pub fn walk(&self) -> Walk<'_> {
        self.walk_from(ROOT)
    }

    pub fn walk_from(&self, start: NodeId) -> Walk<'_> {
        Walk {
            tree: self,
            stack: vec![start],
        }
    }

    pub fn account_nodes(&self) -> Vec<NodeId> {
        self.nodes[ROOT.0].children.values().copied().collect()
    }

    pub fn folder_nodes(&self) -> Vec<NodeId> {
        self.walk()
            .filter(|node| node.is_folder())
            .map(|node| node.id())
            .collect()
    }

    /// Number of indexed folders.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Index keys in sorted order, mostly useful for comparing rebuilds.
    pub fn indexed_keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.index.keys().map(String::as_str).collect();
        keys.sort_unstable();
        keys
    }
}

pub struct Walk<'a> {
    tree: &'a FolderTree,
    stack: Vec<NodeId>,
}

impl<'a> Iterator for Walk<'a> {
    type Item = NodeRef<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.stack.pop()?;
        let node = &self.tree.nodes[id.0];
        self.stack.extend(node.children.values().rev().copied());
        Some(NodeRef {
            tree: self.tree,
            id,
        })
    }
}

/// Borrowed view of one node.
#[derive(Debug, Clone, Copy)]
pub struct NodeRef<'a> {
    tree: &'a FolderTree,
    id: NodeId,
}

impl<'a> NodeRef<'a> {
    fn raw(self) -> &'a TreeNode {
        &self.tree.nodes[self.id.0]
    }

    pub fn id(self) -> NodeId {
        self.id
    }

    pub fn kind(self) -> &'a NodeKind {
        &self.raw().kind
    }

    pub fn is_folder(self) -> bool {
        matches!(self.kind(), NodeKind::Folder(_) | NodeKind::VirtualFolder(_))
    }

    pub fn name(self) -> &'a str {
        match self.kind() {
            NodeKind::Root => "Root",
            NodeKind::Account(info) => &info.name,
            NodeKind::Folder(item) | NodeKind::VirtualFolder(item) => &item.name,
        }
    }

    pub fn item(self) -> Option<&'a FolderItem> {
        match self.kind() {
            NodeKind::Folder(item) | NodeKind::VirtualFolder(item) => Some(item),
            _ => None,
        }
    }

    pub fn account_info(self) -> Option<&'a AccountInfo> {
        match self.kind() {
            NodeKind::Account(info) => Some(info),
            _ => None,
        }
    }

    pub fn account(self) -> Option<NodeRef<'a>> {
        self.raw().account.map(|id| NodeRef {
            tree: self.tree,
            id,
        })
    }

    pub fn parent(self) -> Option<NodeRef<'a>> {
        self.raw().parent.map(|id| NodeRef {
            tree: self.tree,
            id,
        })
    }

    pub fn children(self) -> impl Iterator<Item = NodeRef<'a>> {
        let tree = self.tree;
        self.raw()
            .children
            .values()
            .map(move |&id| NodeRef { tree, id })
    }

    pub fn child(self, segment: &str) -> Option<NodeRef<'a>> {
        self.raw().children.get(segment).map(|&id| NodeRef {
            tree: self.tree,
            id,
        })
    }

    pub fn account_id(self) -> Option<&'a str> {
        match self.kind() {
            NodeKind::Root => None,
            NodeKind::Account(info) => Some(&info.id),
            NodeKind::Folder(item) => Some(&item.account_id),
            NodeKind::VirtualFolder(_) => self
                .account()
                .and_then(|account| account.account_info())
                .map(|info| info.id.as_str()),
        }
    }

    pub fn path(self) -> Option<&'a str> {
        self.item().map(|item| item.path.as_str())
    }

    pub fn folder_ref(self) -> Option<FolderRef> {
        Some(FolderRef::new(self.account_id()?, self.path()?))
    }

    /// Names from just below the enclosing account down to this node.
    pub fn full_name_parts(self) -> Vec<&'a str> {
        let mut parts = Vec::new();
        let mut current = Some(self);
        while let Some(node) = current {
            if !node.is_folder() {
                break;
            }
            parts.push(node.name());
            current = node.parent();
        }
        parts.reverse();
        parts
    }

    pub fn full_path(self) -> String {
        self.full_name_parts().join("/")
    }

    pub fn can_file_messages(self) -> bool {
        match self.kind() {
            NodeKind::Folder(item) => item.is_fileable(),
            _ => false,
        }
    }

    /// Icon-style type label: special use for folders, "tag" for tags,
    /// account type for accounts.
    pub fn type_label(self) -> Option<&'static str> {
        match self.kind() {
            NodeKind::Root => None,
            NodeKind::Account(info) => Some(info.account_type.as_str()),
            NodeKind::Folder(item) | NodeKind::VirtualFolder(item) => {
                if item.is_tag {
                    Some("tag")
                } else {
                    item.special_use.first().map(|flag| flag.as_str())
                }
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::{BTreeMap, HashSet};

    use proptest::prelude::*;
    use serde_json::{Value as JsonValue, json};

    use super::{BuildOptions, FolderTree, NodeKind};
    use crate::model::{
        AccountItem, AccountType, FolderItem, FolderRef, SpecialUse, TagItem, folder_key,
    };

    pub(crate) fn sample_accounts() -> Vec<AccountItem> {
        serde_json::from_value(json!([
            {
                "id": "A", "name": "Work", "type": "imap",
                "folders": [
                    {"id": "A1", "accountId": "A", "name": "Inbox", "path": "/Inbox", "specialUse": ["inbox"],
                     "subFolders": [
                        {"id": "A2", "accountId": "A", "name": "Lists", "path": "/Inbox/Lists"}
                     ]},
                    {"id": "A3", "accountId": "A", "name": "Archives", "path": "/Archives", "specialUse": ["archives"],
                     "subFolders": [
                        {"id": "A4", "accountId": "A", "name": "2023", "path": "/Archives/2023"}
                     ]},
                    {"id": "A5", "accountId": "A", "name": "Trash", "path": "/Trash", "specialUse": ["trash"],
                     "subFolders": [
                        {"id": "A6", "accountId": "A", "name": "Old", "path": "/Trash/Old"}
                     ]}
                ]
            },
            {
                "id": "B", "name": "Home", "type": "pop3",
                "folders": [
                    {"id": "B1", "accountId": "B", "name": "Inbox", "path": "/Inbox", "specialUse": ["inbox"]},
                    {"id": "B2", "accountId": "B", "name": "Café", "path": "/Café"}
                ]
            }
        ]))
        .unwrap()
    }

    #[derive(Debug, Clone)]
    struct FolderShape {
        name: &'static str,
        special: Option<SpecialUse>,
        can_file: bool,
        is_virtual: bool,
        accessed: JsonValue,
        children: Vec<FolderShape>,
    }

    const NAMES: &[&str] = &[
        "Inbox", "Café", "Cafe", "Lists", "Work", "work", "Archives", "Été", "Notes",
    ];

    fn arb_metric() -> impl Strategy<Value = JsonValue> {
        prop_oneof![
            Just(JsonValue::Null),
            (0u32..500).prop_map(|n| json!(n)),
            (0u32..500).prop_map(|n| json!(n.to_string())),
            "[a-z -]{0,4}".prop_map(JsonValue::String),
        ]
    }

    fn arb_shape() -> impl Strategy<Value = FolderShape> {
        let leaf = (
            prop::sample::select(NAMES),
            prop_oneof![
                4 => Just(None),
                1 => Just(Some(SpecialUse::Trash)),
                1 => Just(Some(SpecialUse::Archives)),
                1 => Just(Some(SpecialUse::Inbox)),
            ],
            prop::bool::weighted(0.85),
            prop::bool::weighted(0.1),
            arb_metric(),
        )
            .prop_map(|(name, special, can_file, is_virtual, accessed)| FolderShape {
                name,
                special,
                can_file,
                is_virtual,
                accessed,
                children: Vec::new(),
            });
        leaf.prop_recursive(3, 32, 4, |inner| {
            (inner.clone(), prop::collection::vec(inner, 0..4)).prop_map(|(mut parent, children)| {
                parent.children = children;
                parent
            })
        })
    }

    fn materialize(
        shapes: &[FolderShape],
        account_id: &str,
        parent_path: &str,
        next_id: &mut usize,
    ) -> Vec<FolderItem> {
        let mut used = HashSet::new();
        let mut folders = Vec::new();
        for shape in shapes {
            let mut name = shape.name.to_string();
            let mut suffix = 1;
            while !used.insert(name.clone()) {
                name = format!("{}{}", shape.name, suffix);
                suffix += 1;
            }
            *next_id += 1;
            let id = next_id.to_string();
            let path = format!("{}/{}", parent_path, name);
            let mut metrics = BTreeMap::new();
            if !shape.accessed.is_null() {
                metrics.insert("accessed".to_string(), shape.accessed.clone());
            }
            let sub_folders = materialize(&shape.children, account_id, &path, next_id);
            folders.push(FolderItem {
                id,
                account_id: account_id.to_string(),
                name,
                path,
                can_file_messages: shape.can_file,
                special_use: shape.special.into_iter().collect(),
                is_tag: false,
                is_virtual: shape.is_virtual,
                is_unified: false,
                color: None,
                metrics,
                sub_folders,
            });
        }
        folders
    }

    /// Random folder forests. Sibling names are unique; some accounts leave
    /// `accountId` off their folders.
    pub(crate) fn arb_accounts() -> impl Strategy<Value = Vec<AccountItem>> {
        prop::collection::vec((prop::collection::vec(arb_shape(), 0..5), any::<bool>()), 1..4)
            .prop_map(|accounts| {
                let mut next_id = 0;
                accounts
                    .iter()
                    .enumerate()
                    .map(|(idx, (shapes, with_ids))| {
                        let id = format!("acct{}", idx);
                        let folder_account = if *with_ids { id.as_str() } else { "" };
                        AccountItem {
                            folders: materialize(shapes, folder_account, "", &mut next_id),
                            id: id.clone(),
                            name: format!("Account {}", idx),
                            account_type: AccountType::Imap,
                        }
                    })
                    .collect()
            })
    }

    fn flatten(
        account: &str,
        folders: &[FolderItem],
        skip_archive: bool,
        descend_trash: bool,
        out: &mut Vec<(String, FolderItem)>,
    ) {
        for folder in folders {
            if skip_archive && folder.has_special_use(SpecialUse::Archives) {
                continue;
            }
            out.push((account.to_string(), folder.detached()));
            if descend_trash || !folder.has_special_use(SpecialUse::Trash) {
                flatten(account, &folder.sub_folders, skip_archive, descend_trash, out);
            }
        }
    }

    /// Folders a tree built with `skip_archive` should index, with their account id.
    pub(crate) fn reachable(accounts: &[AccountItem], skip_archive: bool) -> Vec<(String, FolderItem)> {
        let mut out = Vec::new();
        for account in accounts {
            flatten(&account.id, &account.folders, skip_archive, false, &mut out);
        }
        out
    }

    fn owned_keys(tree: &FolderTree) -> Vec<String> {
        tree.indexed_keys().iter().map(|k| k.to_string()).collect()
    }

    proptest! {
        #[test]
        fn find_folder_returns_exactly_the_reachable_folders(
            accounts in arb_accounts(),
            skip_archive in any::<bool>(),
        ) {
            let tree = FolderTree::build(
                accounts.clone(),
                BuildOptions {
                    skip_archive,
                    ..BuildOptions::default()
                },
            );
            let expected: HashSet<String> = reachable(&accounts, skip_archive)
                .iter()
                .map(|(account, folder)| folder_key(account, &folder.path))
                .collect();
            let mut sorted: Vec<String> = expected.iter().cloned().collect();
            sorted.sort();
            prop_assert_eq!(owned_keys(&tree), sorted);

            let mut every = Vec::new();
            for account in &accounts {
                flatten(&account.id, &account.folders, false, true, &mut every);
            }
            for (account, folder) in &every {
                let found = tree.find_folder(account, &folder.path);
                prop_assert_eq!(found.is_some(), expected.contains(&folder_key(account, &folder.path)));
                if let Some(id) = found {
                    let node = tree.node(id);
                    prop_assert_eq!(node.path(), Some(folder.path.as_str()));
                    prop_assert_eq!(node.account_id(), Some(account.as_str()));
                }
                prop_assert!(tree.find_folder("nobody", &folder.path).is_none());
            }
        }

        #[test]
        fn reindex_and_policy_round_trip_are_idempotent(
            accounts in arb_accounts(),
            skip_archive in any::<bool>(),
        ) {
            let mut tree = FolderTree::build(
                accounts,
                BuildOptions {
                    skip_archive,
                    ..BuildOptions::default()
                },
            );
            let keys = owned_keys(&tree);
            let walk: Vec<String> = tree.walk().map(|n| n.name().to_string()).collect();

            tree.reindex();
            prop_assert_eq!(&owned_keys(&tree), &keys);
            prop_assert!(tree.set_skip_archive(!skip_archive));
            prop_assert!(tree.set_skip_archive(skip_archive));
            prop_assert_eq!(&owned_keys(&tree), &keys);
            let again: Vec<String> = tree.walk().map(|n| n.name().to_string()).collect();
            prop_assert_eq!(again, walk);
        }
    }

    #[test]
    fn skip_archive_scenario_drops_archives_from_tree_and_index() {
        let accounts: Vec<AccountItem> = serde_json::from_value(json!([{
            "id": "A", "name": "A", "type": "imap",
            "folders": [
                {"id": "1", "accountId": "A", "name": "Inbox", "path": "Inbox", "specialUse": ["inbox"], "canFileMessages": true},
                {"id": "2", "accountId": "A", "name": "Archives", "path": "Archives", "specialUse": ["archives"]}
            ]
        }]))
        .unwrap();
        let tree = FolderTree::build(
            accounts,
            BuildOptions {
                skip_archive: true,
                ..BuildOptions::default()
            },
        );
        let account = tree.node(tree.account_nodes()[0]);
        let children: Vec<&str> = account.children().map(|c| c.name()).collect();
        assert_eq!(children, vec!["Inbox"]);
        assert!(tree.find_folder("A", "Inbox").is_some());
        assert!(tree.find_folder("A", "Archives").is_none());
        assert_eq!(tree.len(), 1);
    }

    #[test]
    fn trash_is_kept_but_not_expanded() {
        let tree = FolderTree::build(sample_accounts(), BuildOptions::default());
        assert!(tree.find_folder("A", "/Trash").is_some());
        assert!(tree.find_folder("A", "/Trash/Old").is_none());
        assert!(tree.find_folder("A", "/Archives/2023").is_some());
        assert!(tree.find_folder("A", "/Inbox/Lists").is_some());
    }

    #[test]
    fn find_folder_matches_input_pairs_exactly() {
        let tree = FolderTree::build(sample_accounts(), BuildOptions::default());
        for key in ["A:///Inbox", "A:///Inbox/Lists", "B:///Café", "B:///Inbox"] {
            assert!(tree.indexed_keys().contains(&key), "missing {}", key);
        }
        assert!(tree.find_folder("C", "/Inbox").is_none());
        assert!(tree.find_folder("A", "Inbox").is_none());
        assert!(tree.find_folder("", "").is_none());
    }

    #[test]
    fn reindex_is_idempotent_and_discards_old_nodes() {
        let mut tree = FolderTree::build(sample_accounts(), BuildOptions::default());
        let before: Vec<String> = tree.indexed_keys().iter().map(|k| k.to_string()).collect();
        let count = tree.walk().count();
        tree.reindex();
        tree.reindex();
        let after: Vec<String> = tree.indexed_keys().iter().map(|k| k.to_string()).collect();
        assert_eq!(before, after);
        assert_eq!(tree.walk().count(), count);
        for key in &after {
            let (account, path) = key.split_once("://").unwrap();
            let node = tree.node(tree.find_folder(account, path).unwrap());
            assert_eq!(node.path(), Some(path));
        }
    }

    #[test]
    fn setters_replace_inputs_and_discard_old_nodes() {
        let mut tree = FolderTree::build(
            sample_accounts(),
            BuildOptions {
                tag_folders: Some(vec![
                    TagItem {
                        key: "$label1".to_string(),
                        tag: "Important".to_string(),
                        color: None,
                    }
                    .to_folder(),
                ]),
                ..BuildOptions::default()
            },
        );
        assert!(tree.find_folder("##tags", "$label1").is_some());

        tree.set_tag_folders(None);
        assert!(tree.find_folder("##tags", "$label1").is_none());
        assert_eq!(tree.account_nodes().len(), 2);

        let unified: Vec<FolderItem> = serde_json::from_value(json!([
            {"id": "u1", "name": "Inbox", "path": "/Inbox", "isUnified": true}
        ]))
        .unwrap();
        tree.set_unified_folders(Some(unified));
        assert!(tree.find_folder("##unified", "/Inbox").is_some());

        let fresh: Vec<AccountItem> = serde_json::from_value(json!([
            {"id": "C", "name": "Fresh", "folders": [{"id": "c1", "name": "Notes", "path": "/Notes"}]}
        ]))
        .unwrap();
        tree.replace_accounts(fresh);
        assert!(tree.find_folder("A", "/Inbox").is_none());
        assert!(tree.find_folder("B", "/Café").is_none());
        assert_eq!(tree.indexed_keys(), vec!["##unified:///Inbox", "C:///Notes"]);
        let names: Vec<&str> = tree.walk().map(|n| n.name()).collect();
        assert_eq!(names, vec!["Root", "Fresh", "Notes", "Unified Folders", "Inbox"]);
    }

    #[test]
    fn toggling_skip_archive_rebuilds() {
        let mut tree = FolderTree::build(sample_accounts(), BuildOptions::default());
        assert!(tree.find_folder("A", "/Archives").is_some());
        assert!(tree.set_skip_archive(true));
        assert!(tree.find_folder("A", "/Archives").is_none());
        assert!(tree.find_folder("A", "/Archives/2023").is_none());
        assert!(!tree.set_skip_archive(true));
        assert!(tree.set_skip_archive(false));
        assert!(tree.find_folder("A", "/Archives/2023").is_some());
    }

    #[test]
    fn walk_is_preorder_and_restartable() {
        let tree = FolderTree::build(sample_accounts(), BuildOptions::default());
        let names: Vec<&str> = tree.walk().map(|n| n.name()).collect();
        assert_eq!(
            names,
            vec![
                "Root", "Work", "Inbox", "Lists", "Archives", "2023", "Trash", "Home", "Inbox",
                "Café"
            ]
        );
        let again: Vec<&str> = tree.walk().map(|n| n.name()).collect();
        assert_eq!(names, again);
    }

    #[test]
    fn full_path_stops_at_account() {
        let tree = FolderTree::build(sample_accounts(), BuildOptions::default());
        let lists = tree.node(tree.find_folder("A", "/Inbox/Lists").unwrap());
        assert_eq!(lists.full_name_parts(), vec!["Inbox", "Lists"]);
        assert_eq!(lists.full_path(), "Inbox/Lists");
        assert_eq!(lists.account().map(|a| a.name()), Some("Work"));
        assert_eq!(lists.parent().map(|p| p.name()), Some("Inbox"));
        assert_eq!(tree.root().full_path(), "");
    }

    #[test]
    fn pseudo_accounts_hold_virtual_nodes() {
        let tags = vec![
            TagItem {
                key: "$label1".to_string(),
                tag: "Important".to_string(),
                color: Some("#ff0000".to_string()),
            }
            .to_folder(),
        ];
        let unified: Vec<FolderItem> = serde_json::from_value(json!([
            {"id": "u1", "accountId": "", "name": "Inbox", "path": "/Inbox", "isUnified": true}
        ]))
        .unwrap();
        let tree = FolderTree::build(
            sample_accounts(),
            BuildOptions {
                skip_archive: false,
                tag_folders: Some(tags),
                unified_folders: Some(unified),
            },
        );
        let accounts: Vec<&str> = tree
            .account_nodes()
            .into_iter()
            .map(|id| tree.node(id).name())
            .collect();
        assert_eq!(accounts, vec!["Work", "Home", "Tags", "Unified Folders"]);

        let tag = tree.node(tree.find_folder("##tags", "$label1").unwrap());
        assert!(matches!(tag.kind(), NodeKind::VirtualFolder(_)));
        assert_eq!(tag.type_label(), Some("tag"));
        assert!(!tag.can_file_messages());
        assert_eq!(tag.account_id(), Some("##tags"));

        let unified = tree.node(tree.find_folder("##unified", "/Inbox").unwrap());
        assert!(!unified.can_file_messages());
        assert_eq!(unified.folder_ref(), Some(FolderRef::new("##unified", "/Inbox")));
    }

    #[test]
    fn from_list_splits_found_and_missing() {
        let tree = FolderTree::build(sample_accounts(), BuildOptions::default());
        let lookup = tree.from_list(&[
            FolderRef::new("A", "/Inbox"),
            FolderRef::new("A", "/Deleted"),
            FolderRef::new("Z", "/Inbox"),
        ]);
        assert_eq!(lookup.folder_nodes.len(), 1);
        assert_eq!(
            lookup.missing,
            vec![FolderRef::new("A", "/Deleted"), FolderRef::new("Z", "/Inbox")]
        );
    }

    #[test]
    fn malformed_input_is_skipped_not_fatal() {
        let accounts: Vec<AccountItem> = serde_json::from_value(json!([
            {"id": "", "name": "Nameless", "folders": [{"id": "x", "name": "x", "path": "/x"}]},
            {"id": "A", "name": "A", "folders": [
                {"id": "1", "name": "Empty", "path": ""},
                {"id": "2", "name": "Inbox", "path": "/Inbox"},
                {"id": "3", "name": "Inbox again", "path": "/Inbox"}
            ]},
            {"id": "A", "name": "Duplicate", "folders": []}
        ]))
        .unwrap();
        let tree = FolderTree::build(accounts, BuildOptions::default());
        assert_eq!(tree.account_nodes().len(), 1);
        assert_eq!(tree.len(), 1);
        let inbox = tree.node(tree.find_folder("A", "/Inbox").unwrap());
        assert_eq!(inbox.name(), "Inbox");
        assert_eq!(inbox.account_id(), Some("A"));
    }
}
