use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::host::{MailHost, PreferenceStore, RecentQuery, TagOp, TransferMode};
use crate::model::{AccountItem, FolderItem, FolderRef, MessageId, RecencyMetric, TagItem};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageState {
    pub folder: FolderRef,
    #[serde(default)]
    pub read: bool,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum HostAction {
    MarkRead {
        ids: Vec<MessageId>,
    },
    Transfer {
        ids: Vec<MessageId>,
        folder: FolderRef,
        mode: TransferMode,
        at: String,
    },
    Tag {
        ids: Vec<MessageId>,
        tag: String,
        op: TagOp,
    },
    Navigate {
        folder: FolderRef,
    },
    Notify {
        title: String,
        message: String,
    },
}

/// Everything a [`MemoryHost`] knows, in a form that can be saved to disk.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HostSnapshot {
    pub accounts: Vec<AccountItem>,
    pub tags: Vec<TagItem>,
    pub unified_folders: Vec<FolderItem>,
    pub messages: BTreeMap<MessageId, MessageState>,
    pub selected_messages: Vec<MessageId>,
    pub preferences: BTreeMap<String, JsonValue>,
    pub displayed_folder: Option<FolderRef>,
    pub last_transfer_target: Option<FolderRef>,
    pub notifications_unavailable: bool,
    pub actions: Vec<HostAction>,
}

/// Host implementation backed by a [`HostSnapshot`] held in memory.
#[derive(Debug, Default)]
pub struct MemoryHost {
    state: Mutex<HostSnapshot>,
    recent_answer: Mutex<Option<Vec<FolderItem>>>,
}

impl MemoryHost {
    pub fn new(snapshot: HostSnapshot) -> Self {
        MemoryHost {
            state: Mutex::new(snapshot),
            recent_answer: Mutex::new(None),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, HostSnapshot>> {
        self.state
            .lock()
            .map_err(|_| anyhow!("host state lock poisoned"))
    }

    pub fn snapshot(&self) -> Result<HostSnapshot> {
        Ok(self.lock()?.clone())
    }

    pub fn actions(&self) -> Result<Vec<HostAction>> {
        Ok(self.lock()?.actions.clone())
    }

    pub fn set_selected_messages(&self, ids: Vec<MessageId>) -> Result<()> {
        self.lock()?.selected_messages = ids;
        Ok(())
    }

    pub fn set_accounts(&self, accounts: Vec<AccountItem>) -> Result<()> {
        self.lock()?.accounts = accounts;
        Ok(())
    }

    /// Makes the host answer recent-folder queries itself.
    pub fn set_recent_answer(&self, answer: Option<Vec<FolderItem>>) -> Result<()> {
        *self
            .recent_answer
            .lock()
            .map_err(|_| anyhow!("host state lock poisoned"))? = answer;
        Ok(())
    }
}

fn find_folder_mut<'a>(folders: &'a mut [FolderItem], path: &str) -> Option<&'a mut FolderItem> {
    for folder in folders {
        if folder.path == path {
            return Some(folder);
        }
        if let Some(found) = find_folder_mut(&mut folder.sub_folders, path) {
            return Some(found);
        }
    }
    None
}

fn folder_exists(state: &mut HostSnapshot, folder: &FolderRef) -> bool {
    state
        .accounts
        .iter_mut()
        .filter(|account| account.id == folder.account_id)
        .any(|account| find_folder_mut(&mut account.folders, &folder.path).is_some())
}

#[async_trait]
impl MailHost for MemoryHost {
    async fn list_accounts(&self) -> Result<Vec<AccountItem>> {
        Ok(self.lock()?.accounts.clone())
    }

    async fn list_tags(&self) -> Result<Vec<TagItem>> {
        Ok(self.lock()?.tags.clone())
    }

    async fn list_unified_folders(&self) -> Result<Vec<FolderItem>> {
        Ok(self.lock()?.unified_folders.clone())
    }

    async fn query_recent_folders(&self, _query: &RecentQuery) -> Result<Option<Vec<FolderItem>>> {
        Ok(self
            .recent_answer
            .lock()
            .map_err(|_| anyhow!("host state lock poisoned"))?
            .clone())
    }

    async fn selected_messages(&self) -> Result<Vec<MessageId>> {
        Ok(self.lock()?.selected_messages.clone())
    }

    async fn mark_read(&self, ids: &[MessageId]) -> Result<()> {
        let mut state = self.lock()?;
        for id in ids {
            if let Some(message) = state.messages.get_mut(id) {
                message.read = true;
            }
        }
        state.actions.push(HostAction::MarkRead { ids: ids.to_vec() });
        Ok(())
    }

    async fn move_or_copy_messages(
        &self,
        ids: &[MessageId],
        folder: &FolderRef,
        mode: TransferMode,
    ) -> Result<()> {
        let mut state = self.lock()?;
        if !folder_exists(&mut state, folder) {
            return Err(anyhow!("Folder not found: {}", folder));
        }

        let now = Utc::now();
        for id in ids {
            let Some(message) = state.messages.get(id).cloned() else {
                log::warn!("unknown message id {} in {:?}", id, mode);
                continue;
            };
            match mode {
                TransferMode::Move => {
                    if let Some(existing) = state.messages.get_mut(id) {
                        existing.folder = folder.clone();
                    }
                }
                TransferMode::Copy => {
                    let next = state.messages.keys().next_back().map_or(1, |last| last + 1);
                    state.messages.insert(
                        next,
                        MessageState {
                            folder: folder.clone(),
                            ..message
                        },
                    );
                }
            }
        }

        if let Some(account) = state
            .accounts
            .iter_mut()
            .find(|account| account.id == folder.account_id)
        {
            if let Some(target) = find_folder_mut(&mut account.folders, &folder.path) {
                target.metrics.insert(
                    RecencyMetric::Accessed.key().to_string(),
                    JsonValue::from(now.timestamp()),
                );
            }
        }

        state.actions.push(HostAction::Transfer {
            ids: ids.to_vec(),
            folder: folder.clone(),
            mode,
            at: now.to_rfc3339(),
        });
        Ok(())
    }

    async fn tag_messages(&self, ids: &[MessageId], tag_key: &str, op: TagOp) -> Result<()> {
        let mut state = self.lock()?;
        if !state.tags.iter().any(|tag| tag.key == tag_key) {
            return Err(anyhow!("Tag not found: {}", tag_key));
        }
        for id in ids {
            if let Some(message) = state.messages.get_mut(id) {
                match op {
                    TagOp::Add => {
                        if !message.tags.iter().any(|t| t == tag_key) {
                            message.tags.push(tag_key.to_string());
                        }
                    }
                    TagOp::Remove => message.tags.retain(|t| t != tag_key),
                }
            }
        }
        state.actions.push(HostAction::Tag {
            ids: ids.to_vec(),
            tag: tag_key.to_string(),
            op,
        });
        Ok(())
    }

    async fn navigate_to_folder(&self, folder: &FolderRef) -> Result<()> {
        let mut state = self.lock()?;
        let unified = state
            .unified_folders
            .iter()
            .any(|item| folder.account_id == crate::model::UNIFIED_ACCOUNT_ID && item.path == folder.path);
        if !unified && !folder_exists(&mut state, folder) {
            return Err(anyhow!("Folder not found: {}", folder));
        }
        state.displayed_folder = Some(folder.clone());
        state.actions.push(HostAction::Navigate {
            folder: folder.clone(),
        });
        Ok(())
    }

    async fn set_last_transfer_target(&self, folder: &FolderRef, _mode: TransferMode) -> Result<()> {
        self.lock()?.last_transfer_target = Some(folder.clone());
        Ok(())
    }

    async fn notify(&self, title: &str, message: &str) -> Result<()> {
        let mut state = self.lock()?;
        if state.notifications_unavailable {
            return Err(anyhow!("notifications permission not granted"));
        }
        state.actions.push(HostAction::Notify {
            title: title.to_string(),
            message: message.to_string(),
        });
        Ok(())
    }
}

#[async_trait]
impl PreferenceStore for MemoryHost {
    async fn get_preference(&self, name: &str) -> Result<Option<JsonValue>> {
        Ok(self.lock()?.preferences.get(name).cloned())
    }

    async fn set_preference(&self, name: &str, value: JsonValue) -> Result<()> {
        self.lock()?.preferences.insert(name.to_string(), value);
        Ok(())
    }
}
