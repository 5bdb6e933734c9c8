use crate::host::{MailHost, RecentQuery};
use crate::model::{AccountItem, FolderItem, RecencyMetric, SpecialUse};

pub const DEFAULT_MAX_RECENT: usize = 15;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RecentOptions {
    pub max_recent: usize,
    pub skip_archive: bool,
    pub metric: RecencyMetric,
}

impl Default for RecentOptions {
    fn default() -> Self {
        RecentOptions {
            max_recent: DEFAULT_MAX_RECENT,
            skip_archive: false,
            metric: RecencyMetric::Accessed,
        }
    }
}

/// Bounded working set that only re-examines its minimum when full.
#[derive(Debug, Clone)]
pub struct RecentTracker {
    max: usize,
    entries: Vec<(f64, FolderItem)>,
    oldest: f64,
}

impl RecentTracker {
    pub fn new(max: usize) -> Self {
        RecentTracker {
            max,
            entries: Vec::with_capacity(max),
            oldest: 0.0,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn is_full(&self) -> bool {
        self.entries.len() >= self.max
    }

    /// Offers a folder; returns whether it was kept.
    pub fn offer(&mut self, folder: &FolderItem, metric: f64) -> bool {
        self.offer_in(&folder.account_id, folder, metric)
    }

    /// Like [`RecentTracker::offer`], filling in `account_id` when the
    /// folder does not carry one.
    pub fn offer_in(&mut self, account_id: &str, folder: &FolderItem, metric: f64) -> bool {
        if self.max == 0 || !folder.is_fileable() {
            return false;
        }
        if self.is_full() {
            if metric <= self.oldest {
                return false;
            }
            if let Some(idx) = self.min_index() {
                self.entries.remove(idx);
            }
        }
        let mut item = folder.detached();
        if item.account_id.is_empty() {
            item.account_id = account_id.to_string();
        }
        self.entries.push((metric, item));
        if self.is_full() {
            self.oldest = self
                .entries
                .iter()
                .map(|(value, _)| *value)
                .fold(f64::INFINITY, f64::min);
        }
        true
    }

    fn min_index(&self) -> Option<usize> {
        let mut best: Option<(usize, f64)> = None;
        for (idx, (value, _)) in self.entries.iter().enumerate() {
            // Among equal minimums evict the one that arrived last.
            if best.is_none_or(|(_, current)| *value <= current) {
                best = Some((idx, *value));
            }
        }
        best.map(|(idx, _)| idx)
    }

    pub fn into_sorted(mut self) -> Vec<FolderItem> {
        self.entries.sort_by(|a, b| b.0.total_cmp(&a.0));
        self.entries.into_iter().map(|(_, folder)| folder).collect()
    }
}

pub fn compute_recent(accounts: &[AccountItem], options: &RecentOptions) -> Vec<FolderItem> {
    let mut tracker = RecentTracker::new(options.max_recent);
    let mut stack: Vec<(&str, &FolderItem)> = accounts
        .iter()
        .rev()
        .flat_map(|account| {
            account
                .folders
                .iter()
                .rev()
                .map(move |folder| (account.id.as_str(), folder))
        })
        .collect();

    while let Some((account_id, folder)) = stack.pop() {
        if options.skip_archive && folder.has_special_use(SpecialUse::Archives) {
            continue;
        }
        tracker.offer_in(account_id, folder, folder.metric(options.metric));
        if !folder.has_special_use(SpecialUse::Trash) {
            stack.extend(folder.sub_folders.iter().rev().map(|sub| (account_id, sub)));
        }
    }

    tracker.into_sorted()
}

/// Brings a host answer to the same contract as [`compute_recent`].
pub fn normalize_recent(folders: Vec<FolderItem>, options: &RecentOptions) -> Vec<FolderItem> {
    let mut kept: Vec<FolderItem> = folders
        .into_iter()
        .filter(|folder| folder.is_fileable())
        .filter(|folder| !(options.skip_archive && folder.has_special_use(SpecialUse::Archives)))
        .map(|folder| folder.detached())
        .collect();
    kept.sort_by(|a, b| b.metric(options.metric).total_cmp(&a.metric(options.metric)));
    kept.truncate(options.max_recent);
    kept
}

/// Asks the host first and walks the account list when it cannot answer.
pub async fn load_recent(
    host: &dyn MailHost,
    accounts: &[AccountItem],
    options: &RecentOptions,
) -> Vec<FolderItem> {
    let query = RecentQuery {
        metric: options.metric,
        limit: options.max_recent,
        can_file_messages: true,
    };
    match host.query_recent_folders(&query).await {
        Ok(Some(folders)) => normalize_recent(folders, options),
        Ok(None) => compute_recent(accounts, options),
        Err(err) => {
            log::warn!("recent folder query failed, walking folders instead: {}", err);
            compute_recent(accounts, options)
        }
    }
}
