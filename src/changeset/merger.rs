use tracing::{debug, info, warn};
use crate::error::{AipDriftError, Result};
use crate::source::{ChangeFeed, ChangeFeedReader, FeedPage, RawEntry, ResourceKind};
use super::set::{ChangeSet, ItemId, Promotion};
use super::timestamp::ChangeTimestamp;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SubItemMergeStats {
    pub inserted: usize,
    pub advanced: usize,
    pub kept: usize,
    pub skipped: usize,
}

/// Builds the set of items that need a new package.
///
/// Sub-item changes do not update their parent's own timestamp upstream, so
/// the parent's effective timestamp is the later of the two.
pub struct ChangeSetMerger;

impl ChangeSetMerger {
    /// Insert every primary entry; for repeated ids the last entry wins.
    pub fn merge_from_primary(pages: &[FeedPage]) -> Result<ChangeSet> {
        let mut set = ChangeSet::new();

        for entry in pages.iter().flatten() {
            let (Some(id), Some(changed)) = (entry.id(), entry.changed()) else {
                warn!(?entry, "primary entry without id or changed value; skipping");
                continue;
            };

            let changed = ChangeTimestamp::parse(changed)
                .map_err(|e| AipDriftError::Feed(format!("node {}: {}", id, e)))?;
            set.insert(id.clone(), changed);
        }

        Ok(set)
    }

    /// Fold sub-item entries into `set`, surfacing parents that only changed
    /// through their sub-items and promoting later sub-item timestamps.
    pub fn merge_from_sub_items(pages: &[FeedPage], set: &mut ChangeSet) -> SubItemMergeStats {
        Self::merge_entries(pages.iter().flatten(), set, |_| true)
    }

    /// Resolve one explicitly requested id, ignoring any checkpoint.
    /// An id the source does not know is an error, never an empty set.
    pub async fn resolve_single<F: ChangeFeed + ?Sized>(feed: &F, id: &ItemId) -> Result<ChangeSet> {
        let entry = feed.fetch_item(id).await?;
        let mut set = Self::merge_from_primary(&[vec![entry]])?;
        if set.is_empty() {
            return Err(AipDriftError::ItemNotFound(id.to_string()));
        }
        info!(id = %id, changes = ?set, "single item before sub-item inclusion");

        let resolved_id = set.ids().next().cloned().unwrap_or_else(|| id.clone());
        let sub_items = feed.fetch_item_sub_items(&resolved_id).await?;
        let stats = Self::merge_entries(sub_items.iter(), &mut set, |parent| parent == &resolved_id);
        debug!(id = %resolved_id, ?stats, "single item sub-item merge");

        Ok(set)
    }

    /// Full discovery: primary feed, then the sub-item feed folded in.
    pub async fn discover<F: ChangeFeed + ?Sized>(feed: &F, changed_since: Option<&str>) -> Result<ChangeSet> {
        let reader = ChangeFeedReader::new(feed).changed_since(changed_since);

        let primary = reader.read_all(ResourceKind::Primary).await?;
        let mut set = Self::merge_from_primary(&primary)?;
        info!(items = set.len(), "change set before sub-item inclusion");

        let sub_items = reader.read_all(ResourceKind::SubItem).await?;
        let stats = Self::merge_from_sub_items(&sub_items, &mut set);
        info!(
            items = set.len(),
            inserted = stats.inserted,
            advanced = stats.advanced,
            skipped = stats.skipped,
            "change set with sub-item changes"
        );

        Ok(set)
    }

    fn merge_entries<'e>(
        entries: impl Iterator<Item = &'e RawEntry>,
        set: &mut ChangeSet,
        in_scope: impl Fn(&ItemId) -> bool,
    ) -> SubItemMergeStats {
        let mut stats = SubItemMergeStats::default();

        for entry in entries {
            let (Some(parent), Some(changed)) = (entry.parent_id(), entry.changed()) else {
                stats.skipped += 1;
                continue;
            };

            if !in_scope(parent) {
                stats.skipped += 1;
                continue;
            }

            let changed = match ChangeTimestamp::parse(changed) {
                Ok(ts) => ts,
                Err(e) => {
                    warn!(parent = %parent, error = %e, "sub-item with unreadable changed value; skipping");
                    stats.skipped += 1;
                    continue;
                }
            };

            match set.promote(parent.clone(), changed) {
                Promotion::Inserted => stats.inserted += 1,
                Promotion::Advanced => stats.advanced += 1,
                Promotion::Kept => stats.kept += 1,
            }
        }

        stats
    }
}
