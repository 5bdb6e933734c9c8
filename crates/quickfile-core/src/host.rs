use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::model::{AccountItem, FolderItem, FolderRef, MessageId, RecencyMetric, TagItem};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferMode {
    Move,
    Copy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TagOp {
    Add,
    Remove,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentQuery {
    pub metric: RecencyMetric,
    pub limit: usize,
    pub can_file_messages: bool,
}

/// Account, folder and message operations offered by the mail application.
#[async_trait]
pub trait MailHost: Send + Sync {
    async fn list_accounts(&self) -> Result<Vec<AccountItem>>;

    async fn list_tags(&self) -> Result<Vec<TagItem>> {
        Ok(Vec::new())
    }

    async fn list_unified_folders(&self) -> Result<Vec<FolderItem>> {
        Ok(Vec::new())
    }

    /// `Ok(None)` means the host has no recent-folder query of its own.
    async fn query_recent_folders(&self, _query: &RecentQuery) -> Result<Option<Vec<FolderItem>>> {
        Ok(None)
    }

    async fn selected_messages(&self) -> Result<Vec<MessageId>>;

    async fn mark_read(&self, ids: &[MessageId]) -> Result<()>;

    async fn move_or_copy_messages(
        &self,
        ids: &[MessageId],
        folder: &FolderRef,
        mode: TransferMode,
    ) -> Result<()>;

    async fn tag_messages(&self, ids: &[MessageId], tag_key: &str, op: TagOp) -> Result<()>;

    async fn navigate_to_folder(&self, folder: &FolderRef) -> Result<()>;

    async fn set_last_transfer_target(&self, _folder: &FolderRef, _mode: TransferMode) -> Result<()> {
        Ok(())
    }

    async fn notify(&self, _title: &str, _message: &str) -> Result<()> {
        Ok(())
    }
}

/// Key-value preference storage.
#[async_trait]
pub trait PreferenceStore: Send + Sync {
    async fn get_preference(&self, name: &str) -> Result<Option<JsonValue>>;
    async fn set_preference(&self, name: &str, value: JsonValue) -> Result<()>;
}
