mod merger;
mod set;
mod timestamp;

pub use merger::{ChangeSetMerger, SubItemMergeStats};
pub use set::{ChangeEntry, ChangeSet, ItemId, Promotion, DEFAULT_CONTENT_TYPE};
pub use timestamp::{timestamps_match, ChangeTimestamp};
