use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

pub const TAGS_ACCOUNT_ID: &str = "##tags";
pub const UNIFIED_ACCOUNT_ID: &str = "##unified";

pub type MessageId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpecialUse {
    Inbox,
    Sent,
    Drafts,
    Trash,
    Templates,
    Archives,
    Junk,
    Outbox,
}

impl SpecialUse {
    pub fn as_str(&self) -> &'static str {
        match self {
            SpecialUse::Inbox => "inbox",
            SpecialUse::Sent => "sent",
            SpecialUse::Drafts => "drafts",
            SpecialUse::Trash => "trash",
            SpecialUse::Templates => "templates",
            SpecialUse::Archives => "archives",
            SpecialUse::Junk => "junk",
            SpecialUse::Outbox => "outbox",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountType {
    Imap,
    Pop3,
    Nntp,
    Rss,
    #[default]
    None,
    Virtual,
    Tags,
    Unified,
}

impl AccountType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountType::Imap => "imap",
            AccountType::Pop3 => "pop3",
            AccountType::Nntp => "nntp",
            AccountType::Rss => "rss",
            AccountType::None => "none",
            AccountType::Virtual => "virtual",
            AccountType::Tags => "tags",
            AccountType::Unified => "unified",
        }
    }
}

/// Which recency value the host keeps per folder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecencyMetric {
    #[default]
    Accessed,
    Modified,
}

impl RecencyMetric {
    pub fn key(&self) -> &'static str {
        match self {
            RecencyMetric::Accessed => "accessed",
            RecencyMetric::Modified => "modified",
        }
    }
}

/// A mail folder as reported by the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FolderItem {
    pub id: String,
    #[serde(default)]
    pub account_id: String,
    pub name: String,
    pub path: String,
    #[serde(default = "default_can_file")]
    pub can_file_messages: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub special_use: Vec<SpecialUse>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_tag: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_virtual: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_unified: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metrics: BTreeMap<String, JsonValue>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sub_folders: Vec<FolderItem>,
}

fn default_can_file() -> bool {
    true
}

fn is_false(value: &bool) -> bool {
    !*value
}

impl FolderItem {
    pub fn has_special_use(&self, flag: SpecialUse) -> bool {
        self.special_use.contains(&flag)
    }

    pub fn is_fileable(&self) -> bool {
        self.can_file_messages && !self.is_tag && !self.is_virtual && !self.is_unified
    }

    /// Last non-empty segment of the path, used as the child key in the tree.
    pub fn leaf_segment(&self) -> Option<&str> {
        self.path
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .filter(|segment| !segment.is_empty())
    }

    /// Numeric value of a recency metric. Anything missing or non-numeric is 0.
    pub fn metric(&self, metric: RecencyMetric) -> f64 {
        let value = match self.metrics.get(metric.key()) {
            Some(JsonValue::Number(n)) => n.as_f64().unwrap_or(0.0),
            Some(JsonValue::String(s)) => s.trim().parse::<f64>().unwrap_or(0.0),
            _ => 0.0,
        };
        if value.is_finite() { value } else { 0.0 }
    }

    pub fn folder_ref(&self) -> FolderRef {
        FolderRef::new(&self.account_id, &self.path)
    }

    /// Copy of this folder without its subfolder listing.
    pub fn detached(&self) -> FolderItem {
        FolderItem {
            id: self.id.clone(),
            account_id: self.account_id.clone(),
            name: self.name.clone(),
            path: self.path.clone(),
            can_file_messages: self.can_file_messages,
            special_use: self.special_use.clone(),
            is_tag: self.is_tag,
            is_virtual: self.is_virtual,
            is_unified: self.is_unified,
            color: self.color.clone(),
            metrics: self.metrics.clone(),
            sub_folders: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountItem {
    pub id: String,
    pub name: String,
    #[serde(rename = "type", default)]
    pub account_type: AccountType,
    #[serde(default)]
    pub folders: Vec<FolderItem>,
}

/// A host message tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagItem {
    pub key: String,
    pub tag: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

impl TagItem {
    pub fn to_folder(&self) -> FolderItem {
        FolderItem {
            id: self.key.clone(),
            account_id: TAGS_ACCOUNT_ID.to_string(),
            name: self.tag.clone(),
            path: self.key.clone(),
            can_file_messages: false,
            special_use: Vec::new(),
            is_tag: true,
            is_virtual: false,
            is_unified: false,
            color: self.color.clone(),
            metrics: BTreeMap::new(),
            sub_folders: Vec::new(),
        }
    }
}

/// Persisted `{accountId, path}` pointer to a folder.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FolderRef {
    pub account_id: String,
    pub path: String,
}

impl FolderRef {
    pub fn new(account_id: impl Into<String>, path: impl Into<String>) -> Self {
        FolderRef {
            account_id: account_id.into(),
            path: path.into(),
        }
    }

    pub fn key(&self) -> String {
        folder_key(&self.account_id, &self.path)
    }

    /// Parses the `account://path` form used on the command line.
    pub fn parse(raw: &str) -> Option<Self> {
        let (account_id, path) = raw.split_once("://")?;
        if account_id.is_empty() || path.is_empty() {
            return None;
        }
        Some(FolderRef::new(account_id, path))
    }
}

impl fmt::Display for FolderRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}", self.account_id, self.path)
    }
}

impl From<&FolderItem> for FolderRef {
    fn from(item: &FolderItem) -> Self {
        item.folder_ref()
    }
}

pub fn folder_key(account_id: &str, path: &str) -> String {
    format!("{}://{}", account_id, path)
}
