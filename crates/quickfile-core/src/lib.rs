//! Folder and tag indexing, recency tracking and incremental search for a
//! quick "file this message" picker.

pub mod debounce;
pub mod host;
pub mod label;
pub mod memory_host;
pub mod model;
pub mod prefs;
pub mod recent;
pub mod search;
pub mod selection;
pub mod session;
pub mod tree;

pub use host::{MailHost, PreferenceStore, RecentQuery, TagOp, TransferMode};
pub use memory_host::{HostAction, HostSnapshot, MemoryHost};
pub use model::{AccountItem, AccountType, FolderItem, FolderRef, MessageId, RecencyMetric, SpecialUse, TagItem};
pub use prefs::Preferences;
pub use search::{ExactMatch, SearchOptions, SearchResults};
pub use session::{CommitOutcome, OpenRequest, Operation, PickerSession, PickerView};
pub use tree::{BuildOptions, FolderTree, NodeId, NodeKind, NodeRef};
