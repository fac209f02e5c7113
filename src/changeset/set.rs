use serde::{Deserialize, Deserializer, Serialize};
use std::collections::btree_map::{self, BTreeMap};
use std::fmt;
use super::timestamp::ChangeTimestamp;

pub const DEFAULT_CONTENT_TYPE: &str = "application/zip";

/// Source item identifier. The feed sends ids as JSON numbers or strings;
/// both spellings of the same id map to the same key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ItemId(String);

impl ItemId {
    /// Surrounding whitespace is not part of an id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into().trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<u64> for ItemId {
    fn from(id: u64) -> Self {
        Self(id.to_string())
    }
}

impl From<&str> for ItemId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl<'de> Deserialize<'de> for ItemId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawId {
            Unsigned(u64),
            Signed(i64),
            Text(String),
        }

        Ok(match RawId::deserialize(deserializer)? {
            RawId::Unsigned(n) => ItemId(n.to_string()),
            RawId::Signed(n) => ItemId(n.to_string()),
            RawId::Text(s) => ItemId::new(s),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChangeEntry {
    pub changed: ChangeTimestamp,
    pub content_type: String,
}

impl ChangeEntry {
    pub fn new(changed: ChangeTimestamp) -> Self {
        Self {
            changed,
            content_type: DEFAULT_CONTENT_TYPE.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Promotion {
    Inserted,
    Advanced,
    Kept,
}

/// Items needing a new package, keyed by id.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ChangeSet {
    entries: BTreeMap<ItemId, ChangeEntry>,
}

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, id: &ItemId) -> Option<&ChangeEntry> {
        self.entries.get(id)
    }

    pub fn contains(&self, id: &ItemId) -> bool {
        self.entries.contains_key(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &ItemId> {
        self.entries.keys()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, ItemId, ChangeEntry> {
        self.entries.iter()
    }

    /// Unconditional insert; the last write for an id wins.
    pub fn insert(&mut self, id: ItemId, changed: ChangeTimestamp) {
        self.entries.insert(id, ChangeEntry::new(changed));
    }

    /// Insert `id` if absent, otherwise move its timestamp forward when
    /// `changed` is later. Never moves a timestamp backward.
    pub fn promote(&mut self, id: ItemId, changed: ChangeTimestamp) -> Promotion {
        match self.entries.entry(id) {
            btree_map::Entry::Vacant(slot) => {
                slot.insert(ChangeEntry::new(changed));
                Promotion::Inserted
            }
            btree_map::Entry::Occupied(mut slot) => {
                if changed.is_after(&slot.get().changed) {
                    slot.get_mut().changed = changed;
                    Promotion::Advanced
                } else {
                    Promotion::Kept
                }
            }
        }
    }

    /// Split into at most `parts` disjoint sets by key, for callers that
    /// process items in parallel.
    pub fn partition(&self, parts: usize) -> Vec<ChangeSet> {
        let parts = parts.max(1);
        let mut out: Vec<ChangeSet> = (0..parts).map(|_| ChangeSet::new()).collect();
        for (i, (id, entry)) in self.entries.iter().enumerate() {
            out[i % parts].entries.insert(id.clone(), entry.clone());
        }
        out.retain(|s| !s.is_empty());
        out
    }
}

impl<'a> IntoIterator for &'a ChangeSet {
    type Item = (&'a ItemId, &'a ChangeEntry);
    type IntoIter = btree_map::Iter<'a, ItemId, ChangeEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
