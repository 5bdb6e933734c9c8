use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::debounce::{DEFAULT_DEBOUNCE, SearchDebouncer};
use crate::host::{MailHost, PreferenceStore, TagOp, TransferMode};
use crate::label::{DuplicateNames, folder_label};
use crate::model::{AccountItem, FolderItem, FolderRef, MessageId};
use crate::prefs::{
    DEFAULT_FOLDERS, DefaultFolderSetting, EXCLUDED_FOLDERS, NOTIFY_ON_ACTION, Preferences,
    SKIP_ARCHIVE,
};
use crate::recent::load_recent;
use crate::search::{SearchIndex, SearchResults};
use crate::selection::{
    ExclusionSet, FolderSelection, add_to_selection, load_validated, persist,
    remove_from_selection,
};
use crate::tree::{BuildOptions, FolderTree, NodeId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Move,
    Copy,
    Goto,
    Tag,
}

impl Operation {
    pub const ALL: [Operation; 4] = [
        Operation::Move,
        Operation::Copy,
        Operation::Goto,
        Operation::Tag,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Move => "move",
            Operation::Copy => "copy",
            Operation::Goto => "goto",
            Operation::Tag => "tag",
        }
    }

    fn transfer_mode(&self) -> Option<TransferMode> {
        match self {
            Operation::Move => Some(TransferMode::Move),
            Operation::Copy => Some(TransferMode::Copy),
            Operation::Goto | Operation::Tag => None,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operation {
    type Err = anyhow::Error;

    fn from_str(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "move" => Ok(Operation::Move),
            "copy" => Ok(Operation::Copy),
            "goto" => Ok(Operation::Goto),
            "tag" => Ok(Operation::Tag),
            other => Err(anyhow!("unknown operation: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OpenRequest {
    pub operation: Operation,
    /// Operations the picker may switch between; empty means all of them.
    pub allowed: Vec<Operation>,
    pub current_folder: Option<FolderRef>,
    pub debounce: Duration,
}

impl Default for OpenRequest {
    fn default() -> Self {
        OpenRequest {
            operation: Operation::Move,
            allowed: Operation::ALL.to_vec(),
            current_folder: None,
            debounce: DEFAULT_DEBOUNCE,
        }
    }
}

/// What the picker list currently shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PickerView {
    Default(Vec<NodeId>),
    Results(Vec<NodeId>),
    NoResults,
}

impl PickerView {
    pub fn entries(&self) -> &[NodeId] {
        match self {
            PickerView::Default(nodes) | PickerView::Results(nodes) => nodes,
            PickerView::NoResults => &[],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum CommitOutcome {
    Closed,
    NothingSelected,
    NoMessages,
    #[serde(rename_all = "camelCase")]
    Done {
        operation: Operation,
        folder: FolderRef,
        messages: Vec<MessageId>,
    },
}

/// One picker invocation: owns the tree, recent list, selections and search state.
pub struct PickerSession<'a> {
    host: &'a dyn MailHost,
    store: &'a dyn PreferenceStore,
    prefs: Preferences,
    operation: Operation,
    allowed: Vec<Operation>,
    current_folder: Option<FolderRef>,
    tree: FolderTree,
    recent: Vec<FolderItem>,
    defaults: FolderSelection,
    excluded: FolderSelection,
    candidates: Vec<NodeId>,
    index: SearchIndex,
    debouncer: SearchDebouncer,
    query: String,
    results: SearchResults,
    closed: bool,
}

async fn fetch_folders(host: &dyn MailHost) -> (Vec<AccountItem>, BuildOptions) {
    let accounts = host.list_accounts().await.unwrap_or_else(|err| {
        log::warn!("listing accounts failed: {}", err);
        Vec::new()
    });
    let tags = host.list_tags().await.unwrap_or_else(|err| {
        log::warn!("listing tags failed: {}", err);
        Vec::new()
    });
    let unified = host.list_unified_folders().await.unwrap_or_else(|err| {
        log::warn!("listing unified folders failed: {}", err);
        Vec::new()
    });
    let options = BuildOptions {
        skip_archive: false,
        tag_folders: (!tags.is_empty()).then(|| tags.iter().map(|tag| tag.to_folder()).collect()),
        unified_folders: (!unified.is_empty()).then_some(unified),
    };
    (accounts, options)
}

impl<'a> PickerSession<'a> {
    pub async fn open(
        host: &'a dyn MailHost,
        store: &'a dyn PreferenceStore,
        request: OpenRequest,
    ) -> Result<Self> {
        let allowed = if request.allowed.is_empty() {
            Operation::ALL.to_vec()
        } else {
            request.allowed
        };
        if !allowed.contains(&request.operation) {
            return Err(anyhow!(
                "operation {} is not among the allowed operations",
                request.operation
            ));
        }

        let prefs = Preferences::load(store).await;
        let (accounts, mut options) = fetch_folders(host).await;
        let recent = load_recent(host, &accounts, &prefs.recent_options()).await;
        options.skip_archive = prefs.skip_archive;
        let tree = FolderTree::build(accounts, options);
        let defaults = load_validated(store, DEFAULT_FOLDERS, &tree).await.selection;
        let excluded = load_validated(store, EXCLUDED_FOLDERS, &tree).await.selection;

        let mut session = PickerSession {
            host,
            store,
            prefs,
            operation: request.operation,
            allowed,
            current_folder: request.current_folder,
            tree,
            recent,
            defaults,
            excluded,
            candidates: Vec::new(),
            index: SearchIndex::default(),
            debouncer: SearchDebouncer::new(request.debounce),
            query: String::new(),
            results: SearchResults::Blank,
            closed: false,
        };
        session.prefs.default_folders = session.defaults.to_persisted();
        session.prefs.excluded_folders = session.excluded.to_persisted();
        session.rebuild_candidates();
        Ok(session)
    }

    pub fn tree(&self) -> &FolderTree {
        &self.tree
    }

    pub fn preferences(&self) -> &Preferences {
        &self.prefs
    }

    pub fn operation(&self) -> Operation {
        self.operation
    }

    pub fn allowed(&self) -> &[Operation] {
        &self.allowed
    }

    pub fn recent(&self) -> &[FolderItem] {
        &self.recent
    }

    pub fn defaults(&self) -> &FolderSelection {
        &self.defaults
    }

    pub fn excluded(&self) -> &FolderSelection {
        &self.excluded
    }

    pub fn candidates(&self) -> &[NodeId] {
        &self.candidates
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn results(&self) -> &SearchResults {
        &self.results
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn rebuild_candidates(&mut self) {
        let operation = self.operation;
        let nodes: Vec<NodeId> = self
            .tree
            .walk()
            .filter(|node| {
                let is_tag = node.item().is_some_and(|item| item.is_tag);
                match operation {
                    Operation::Move | Operation::Copy => node.can_file_messages(),
                    Operation::Goto => node.is_folder() && !is_tag,
                    Operation::Tag => is_tag,
                }
            })
            .map(|node| node.id())
            .collect();

        let current = match operation {
            Operation::Move | Operation::Copy => self.current_folder.clone(),
            Operation::Goto | Operation::Tag => None,
        };
        self.candidates = ExclusionSet::new(current, &self.excluded).apply(&self.tree, &nodes);
        self.index = SearchIndex::build(
            &self.tree,
            &self.candidates,
            self.prefs.partial_match_full_path,
        );
        self.rerun_query();
    }

    fn rerun_query(&mut self) {
        self.results = self
            .index
            .search(&self.query, self.prefs.search_options().exact_match);
    }

    /// Entries shown before anything is typed.
    pub fn default_items(&self) -> Vec<NodeId> {
        if self.operation == Operation::Tag {
            return self.candidates.clone();
        }
        let allowed: HashSet<NodeId> = self.candidates.iter().copied().collect();
        let nodes: Vec<NodeId> = match self.prefs.default_folder_setting {
            DefaultFolderSetting::Default => self.defaults.nodes(&self.tree),
            DefaultFolderSetting::Recent => self
                .recent
                .iter()
                .filter_map(|folder| self.tree.find(&folder.folder_ref()))
                .collect(),
        };
        nodes.into_iter().filter(|id| allowed.contains(id)).collect()
    }

    pub fn input(&mut self, query: impl Into<String>) {
        if self.closed {
            return;
        }
        self.debouncer.input(query);
    }

    /// Waits for typing to pause and applies the query. Returns false when
    /// nothing was pending.
    pub async fn settle(&mut self) -> bool {
        match self.debouncer.settle().await {
            Some(query) => {
                self.query = query;
                self.rerun_query();
                true
            }
            None => false,
        }
    }

    pub fn is_searching(&self) -> bool {
        self.debouncer.is_pending()
    }

    pub fn view(&self) -> PickerView {
        match &self.results {
            SearchResults::Blank => PickerView::Default(self.default_items()),
            SearchResults::NoResults => PickerView::NoResults,
            SearchResults::Matches(nodes) => PickerView::Results(nodes.clone()),
        }
    }

    /// Runs the operation on `selected`, or on the first entry when
    /// `selected` is not in the current view.
    pub async fn commit(&mut self, selected: Option<NodeId>) -> Result<CommitOutcome> {
        if self.closed {
            return Ok(CommitOutcome::Closed);
        }
        if let Some(query) = self.debouncer.commit().await {
            self.query = query;
            self.rerun_query();
        }
        let outcome = self.execute(selected).await;
        self.debouncer.finish_commit();
        outcome
    }

    async fn execute(&mut self, selected: Option<NodeId>) -> Result<CommitOutcome> {
        let view = self.view();
        let entries = view.entries();
        let Some(target) = selected
            .filter(|id| entries.contains(id))
            .or_else(|| entries.first().copied())
        else {
            return Ok(CommitOutcome::NothingSelected);
        };

        let node = self.tree.node(target);
        let folder = node
            .folder_ref()
            .ok_or_else(|| anyhow!("selected entry is not a folder"))?;
        let name = node.name().to_string();
        let operation = self.operation;

        let messages = match operation {
            Operation::Goto => {
                self.host.navigate_to_folder(&folder).await?;
                Vec::new()
            }
            Operation::Move | Operation::Copy | Operation::Tag => {
                let ids = self.host.selected_messages().await?;
                if ids.is_empty() {
                    return Ok(CommitOutcome::NoMessages);
                }
                ids
            }
        };

        if let Some(mode) = operation.transfer_mode() {
            if self.prefs.mark_as_read {
                self.host.mark_read(&messages).await?;
            }
            self.host
                .move_or_copy_messages(&messages, &folder, mode)
                .await?;
            if let Err(err) = self.host.set_last_transfer_target(&folder, mode).await {
                log::warn!("remembering last target failed: {}", err);
            }
        } else if operation == Operation::Tag {
            self.host
                .tag_messages(&messages, &folder.path, TagOp::Add)
                .await?;
        }

        self.notify(operation, &name, messages.len()).await;
        Ok(CommitOutcome::Done {
            operation,
            folder,
            messages,
        })
    }

    async fn notify(&mut self, operation: Operation, name: &str, count: usize) {
        if !self.prefs.notify_on_action {
            return;
        }
        let plural = if count == 1 { "" } else { "s" };
        let message = match operation {
            Operation::Move => format!("Moved {} message{} to {}", count, plural, name),
            Operation::Copy => format!("Copied {} message{} to {}", count, plural, name),
            Operation::Goto => format!("Opened {}", name),
            Operation::Tag => format!("Tagged {} message{} with {}", count, plural, name),
        };
        if let Err(err) = self.host.notify("Quick Folder", &message).await {
            log::warn!("notifications unavailable, turning them off: {}", err);
            self.prefs.notify_on_action = false;
            if let Err(err) = self
                .store
                .set_preference(NOTIFY_ON_ACTION, JsonValue::Bool(false))
                .await
            {
                log::warn!("saving {} failed: {}", NOTIFY_ON_ACTION, err);
            }
        }
    }

    /// Cancels pending input; later commits do nothing.
    pub fn close(&mut self) {
        self.debouncer.cancel();
        self.closed = true;
    }

    /// Reloads accounts, tags and unified folders from the host.
    pub async fn refresh_accounts(&mut self) {
        let (accounts, options) = fetch_folders(self.host).await;
        self.recent = load_recent(self.host, &accounts, &self.prefs.recent_options()).await;
        self.tree.set_tag_folders(options.tag_folders);
        self.tree.set_unified_folders(options.unified_folders);
        self.tree.replace_accounts(accounts);
        self.rebuild_candidates();
    }

    /// Returns true when the policy changed.
    pub async fn set_skip_archive(&mut self, skip_archive: bool) -> bool {
        if !self.tree.set_skip_archive(skip_archive) {
            return false;
        }
        self.prefs.skip_archive = skip_archive;
        if let Err(err) = self
            .store
            .set_preference(SKIP_ARCHIVE, JsonValue::Bool(skip_archive))
            .await
        {
            log::warn!("saving {} failed: {}", SKIP_ARCHIVE, err);
        }
        self.recent = load_recent(
            self.host,
            self.tree.accounts(),
            &self.prefs.recent_options(),
        )
        .await;
        self.rebuild_candidates();
        true
    }

    async fn save_selection(&mut self, key: &str) {
        let selection = if key == DEFAULT_FOLDERS {
            self.prefs.default_folders = self.defaults.to_persisted();
            &self.defaults
        } else {
            self.prefs.excluded_folders = self.excluded.to_persisted();
            &self.excluded
        };
        if let Err(err) = persist(self.store, key, selection).await {
            log::warn!("saving {} failed: {}", key, err);
        }
    }

    pub async fn add_default(&mut self, node: NodeId) -> bool {
        let Some(node) = self.tree.get(node) else {
            return false;
        };
        let changed = add_to_selection(&mut self.defaults, node);
        if changed {
            self.save_selection(DEFAULT_FOLDERS).await;
        }
        changed
    }

    pub async fn remove_default(&mut self, node: NodeId) -> bool {
        let Some(node) = self.tree.get(node) else {
            return false;
        };
        let changed = remove_from_selection(&mut self.defaults, node);
        if changed {
            self.save_selection(DEFAULT_FOLDERS).await;
        }
        changed
    }

    pub async fn add_excluded(&mut self, node: NodeId) -> bool {
        let Some(node) = self.tree.get(node) else {
            return false;
        };
        let changed = add_to_selection(&mut self.excluded, node);
        if changed {
            self.save_selection(EXCLUDED_FOLDERS).await;
            self.rebuild_candidates();
        }
        changed
    }

    pub async fn remove_excluded(&mut self, node: NodeId) -> bool {
        let Some(node) = self.tree.get(node) else {
            return false;
        };
        let changed = remove_from_selection(&mut self.excluded, node);
        if changed {
            self.save_selection(EXCLUDED_FOLDERS).await;
            self.rebuild_candidates();
        }
        changed
    }

    pub fn set_operation(&mut self, operation: Operation) -> Result<()> {
        if !self.allowed.contains(&operation) {
            return Err(anyhow!("operation {} is not allowed here", operation));
        }
        if self.operation != operation {
            self.operation = operation;
            self.rebuild_candidates();
        }
        Ok(())
    }

    /// Steps to the next (or previous) allowed operation, stopping at
    /// either end of the list.
    pub fn cycle_operation(&mut self, forward: bool) -> Operation {
        let last = self.allowed.len().saturating_sub(1);
        let pos = self
            .allowed
            .iter()
            .position(|op| *op == self.operation)
            .unwrap_or(0);
        let next = if forward {
            (pos + 1).min(last)
        } else {
            pos.saturating_sub(1)
        };
        let operation = self.allowed[next];
        if operation != self.operation {
            self.operation = operation;
            self.rebuild_candidates();
        }
        operation
    }

    /// Display labels for `nodes`, disambiguated against each other.
    pub fn labels(&self, nodes: &[NodeId]) -> Vec<String> {
        let dupes = DuplicateNames::detect(&self.tree, nodes);
        let options = self.prefs.label_options();
        nodes
            .iter()
            .filter_map(|&id| self.tree.get(id))
            .map(|node| folder_label(node, &dupes, &options))
            .collect()
    }
}
