use anyhow::{Result, anyhow};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::host::PreferenceStore;
use crate::label::LabelOptions;
use crate::model::{FolderRef, RecencyMetric};
use crate::recent::{DEFAULT_MAX_RECENT, RecentOptions};
use crate::search::SearchOptions;

pub const MARK_AS_READ: &str = "markAsRead";
pub const MAX_RECENT_FOLDERS: &str = "maxRecentFolders";
pub const SHOW_FOLDER_PATH: &str = "showFolderPath";
pub const SKIP_ARCHIVE: &str = "skipArchive";
pub const DEFAULT_FOLDER_SETTING: &str = "defaultFolderSetting";
pub const PARTIAL_MATCH_FULL_PATH: &str = "partialMatchFullPath";
pub const ALWAYS_SHOW_FULL_PATH: &str = "alwaysShowFullPath";
pub const ALWAYS_SHOW_MAILBOX: &str = "alwaysShowMailbox";
pub const NOTIFY_ON_ACTION: &str = "notifyOnAction";
pub const RECENT_METRIC: &str = "recentMetric";
pub const DEFAULT_FOLDERS: &str = "defaultFolders";
pub const EXCLUDED_FOLDERS: &str = "excludedFolders";

pub const KEYS: [&str; 12] = [
    MARK_AS_READ,
    MAX_RECENT_FOLDERS,
    SHOW_FOLDER_PATH,
    SKIP_ARCHIVE,
    DEFAULT_FOLDER_SETTING,
    PARTIAL_MATCH_FULL_PATH,
    ALWAYS_SHOW_FULL_PATH,
    ALWAYS_SHOW_MAILBOX,
    NOTIFY_ON_ACTION,
    RECENT_METRIC,
    DEFAULT_FOLDERS,
    EXCLUDED_FOLDERS,
];

/// Where the picker's initial list comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DefaultFolderSetting {
    #[default]
    Recent,
    Default,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Preferences {
    pub mark_as_read: bool,
    pub max_recent_folders: usize,
    pub show_folder_path: bool,
    pub skip_archive: bool,
    pub default_folder_setting: DefaultFolderSetting,
    pub partial_match_full_path: bool,
    pub always_show_full_path: bool,
    pub always_show_mailbox: bool,
    pub notify_on_action: bool,
    pub recent_metric: RecencyMetric,
    pub default_folders: Vec<FolderRef>,
    pub excluded_folders: Vec<FolderRef>,
}

impl Default for Preferences {
    fn default() -> Self {
        Preferences {
            mark_as_read: true,
            max_recent_folders: DEFAULT_MAX_RECENT,
            show_folder_path: false,
            skip_archive: true,
            default_folder_setting: DefaultFolderSetting::Recent,
            partial_match_full_path: false,
            always_show_full_path: false,
            always_show_mailbox: false,
            notify_on_action: false,
            recent_metric: RecencyMetric::Accessed,
            default_folders: Vec::new(),
            excluded_folders: Vec::new(),
        }
    }
}

/// Accepts the value as stored, or a string holding its JSON form.
fn parse_value<T: DeserializeOwned>(value: JsonValue) -> Result<T> {
    match serde_json::from_value::<T>(value.clone()) {
        Ok(parsed) => Ok(parsed),
        Err(err) => match value {
            JsonValue::String(text) => {
                serde_json::from_str(&text).map_err(|_| anyhow::Error::from(err))
            }
            _ => Err(err.into()),
        },
    }
}

impl Preferences {
    /// Reads every key, keeping the default for any key that is missing or
    /// cannot be parsed.
    pub async fn load(store: &dyn PreferenceStore) -> Self {
        let mut prefs = Preferences::default();
        for key in KEYS {
            match store.get_preference(key).await {
                Ok(Some(value)) => {
                    if let Err(err) = prefs.apply(key, value) {
                        log::warn!("ignoring stored preference {}: {}", key, err);
                    }
                }
                Ok(None) => {}
                Err(err) => log::warn!("reading preference {} failed: {}", key, err),
            }
        }
        prefs
    }

    pub fn apply(&mut self, key: &str, value: JsonValue) -> Result<()> {
        match key {
            MARK_AS_READ => self.mark_as_read = parse_value(value)?,
            MAX_RECENT_FOLDERS => self.max_recent_folders = parse_value(value)?,
            SHOW_FOLDER_PATH => self.show_folder_path = parse_value(value)?,
            SKIP_ARCHIVE => self.skip_archive = parse_value(value)?,
            DEFAULT_FOLDER_SETTING => self.default_folder_setting = parse_value(value)?,
            PARTIAL_MATCH_FULL_PATH => self.partial_match_full_path = parse_value(value)?,
            ALWAYS_SHOW_FULL_PATH => self.always_show_full_path = parse_value(value)?,
            ALWAYS_SHOW_MAILBOX => self.always_show_mailbox = parse_value(value)?,
            NOTIFY_ON_ACTION => self.notify_on_action = parse_value(value)?,
            RECENT_METRIC => self.recent_metric = parse_value(value)?,
            DEFAULT_FOLDERS => self.default_folders = parse_value(value)?,
            EXCLUDED_FOLDERS => self.excluded_folders = parse_value(value)?,
            _ => return Err(anyhow!("unknown preference {}", key)),
        }
        Ok(())
    }

    /// Current value of one key in its stored form.
    pub fn get(&self, key: &str) -> Result<JsonValue> {
        let all = serde_json::to_value(self)?;
        all.get(key)
            .cloned()
            .ok_or_else(|| anyhow!("unknown preference {}", key))
    }

    /// Validates `value` for `key` and writes it to the store in canonical form.
    pub async fn store(store: &dyn PreferenceStore, key: &str, value: JsonValue) -> Result<()> {
        let mut prefs = Preferences::default();
        prefs.apply(key, value)?;
        store.set_preference(key, prefs.get(key)?).await
    }

    pub fn recent_options(&self) -> RecentOptions {
        RecentOptions {
            max_recent: self.max_recent_folders,
            skip_archive: self.skip_archive,
            metric: self.recent_metric,
        }
    }

    pub fn search_options(&self) -> SearchOptions {
        SearchOptions {
            partial_match_full_path: self.partial_match_full_path,
            ..SearchOptions::default()
        }
    }

    pub fn label_options(&self) -> LabelOptions {
        LabelOptions {
            always_show_full_path: self.always_show_full_path,
            always_show_mailbox: self.always_show_mailbox,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{DefaultFolderSetting, KEYS, Preferences};
    use crate::host::PreferenceStore;
    use crate::memory_host::{HostSnapshot, MemoryHost};
    use crate::model::{FolderRef, RecencyMetric};

    #[tokio::test]
    async fn empty_store_gives_defaults() -> anyhow::Result<()> {
        let host = MemoryHost::default();
        let prefs = Preferences::load(&host).await;
        assert_eq!(prefs, Preferences::default());
        assert!(prefs.mark_as_read);
        assert!(prefs.skip_archive);
        assert_eq!(prefs.max_recent_folders, 15);
        assert_eq!(prefs.default_folder_setting, DefaultFolderSetting::Recent);
        Ok(())
    }

    #[tokio::test]
    async fn malformed_values_fall_back_per_key() -> anyhow::Result<()> {
        let mut snapshot = HostSnapshot::default();
        snapshot.preferences.insert("maxRecentFolders".into(), json!(-3));
        snapshot.preferences.insert("skipArchive".into(), json!("false"));
        snapshot.preferences.insert("recentMetric".into(), json!("modified"));
        snapshot.preferences.insert("markAsRead".into(), json!({"nope": 1}));
        snapshot.preferences.insert(
            "defaultFolders".into(),
            json!([{"accountId": "A", "path": "/Inbox"}]),
        );
        let host = MemoryHost::new(snapshot);

        let prefs = Preferences::load(&host).await;
        assert_eq!(prefs.max_recent_folders, 15);
        assert!(!prefs.skip_archive);
        assert_eq!(prefs.recent_metric, RecencyMetric::Modified);
        assert!(prefs.mark_as_read);
        assert_eq!(prefs.default_folders, vec![FolderRef::new("A", "/Inbox")]);
        Ok(())
    }

    #[tokio::test]
    async fn store_validates_and_canonicalises() -> anyhow::Result<()> {
        let host = MemoryHost::default();
        Preferences::store(&host, "maxRecentFolders", json!("5")).await?;
        assert_eq!(host.get_preference("maxRecentFolders").await?, Some(json!(5)));
        assert!(Preferences::store(&host, "maxRecentFolders", json!("many")).await.is_err());
        assert!(Preferences::store(&host, "layout", json!("wide")).await.is_err());
        Ok(())
    }

    #[test]
    fn every_key_is_readable() -> anyhow::Result<()> {
        let prefs = Preferences::default();
        for key in KEYS {
            prefs.get(key)?;
        }
        assert_eq!(prefs.get("notifyOnAction")?, json!(false));
        Ok(())
    }
}
