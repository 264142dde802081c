//! Data models for SyncReads

mod entry;
mod settings;
mod sync;
mod sync_log;
mod user;

pub use entry::{Entry, EntryKind, RootPointer, TreeEntry, TreeEntryKind, TRASH};
pub use settings::{SyncSettings, MAX_FOLDER_NAME_LEN};
pub use sync::{OutcomeStatus, SyncId, SyncJob, SyncOutcome, SyncStatus, SyncTrigger};
pub use sync_log::{LogLevel, LogLine};
pub use user::{Device, User, UserId};
