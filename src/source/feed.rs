use async_trait::async_trait;
use serde::Deserialize;
use crate::changeset::ItemId;
use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    /// Top-level nodes that get packaged.
    Primary,
    /// Media attached to a node.
    SubItem,
}

impl ResourceKind {
    pub fn view_path(&self) -> &'static str {
        match self {
            ResourceKind::Primary => "views/preservation_show_node_timestamps",
            ResourceKind::SubItem => "views/preservation_show_media_timestamps",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Primary => "node",
            ResourceKind::SubItem => "media",
        }
    }
}

/// One `{"value": ...}` element of a field array.
#[derive(Debug, Clone, Deserialize)]
pub struct FieldValue<T> {
    pub value: Option<T>,
}

/// One `{"target_id": ...}` element of a reference field array.
#[derive(Debug, Clone, Deserialize)]
pub struct TargetRef {
    #[serde(default)]
    pub target_id: Option<ItemId>,
}

/// A raw change entry as served by the source. Fields keep the upstream
/// `field[0].value` nesting; accessors below unwrap it.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawEntry {
    #[serde(default)]
    pub nid: Vec<FieldValue<ItemId>>,
    #[serde(default)]
    pub changed: Vec<FieldValue<String>>,
    #[serde(default)]
    pub field_media_of: Vec<TargetRef>,
}

impl RawEntry {
    pub fn id(&self) -> Option<&ItemId> {
        self.nid.first().and_then(|f| f.value.as_ref())
    }

    pub fn changed(&self) -> Option<&str> {
        self.changed.first().and_then(|f| f.value.as_deref())
    }

    pub fn parent_id(&self) -> Option<&ItemId> {
        self.field_media_of.first().and_then(|r| r.target_id.as_ref())
    }
}

pub type FeedPage = Vec<RawEntry>;

pub fn parse_page(body: &str) -> Result<FeedPage> {
    Ok(serde_json::from_str(body)?)
}

/// Read access to the source system's change feeds.
#[async_trait]
pub trait ChangeFeed: Send + Sync {
    /// Fetch one 0-indexed page. An empty page means there are no more.
    async fn fetch_page(
        &self,
        kind: ResourceKind,
        page: u32,
        changed_since: Option<&str>,
    ) -> Result<FeedPage>;

    /// Fetch a single primary item by id.
    async fn fetch_item(&self, id: &ItemId) -> Result<RawEntry>;

    /// Fetch the sub-items attached to one primary item (unpaginated).
    async fn fetch_item_sub_items(&self, id: &ItemId) -> Result<FeedPage>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_primary_entry() {
        let page = parse_page(r#"[ { "nid" : [{"value": 1}], "changed" : [{"value": "2024-01-01"}] } ]"#).unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].id(), Some(&ItemId::from(1)));
        assert_eq!(page[0].changed(), Some("2024-01-01"));
        assert_eq!(page[0].parent_id(), None);
    }

    #[test]
    fn test_parse_sub_item_entry() {
        let page = parse_page(r#"[ { "changed": [{"value": "2025-01-01"}], "field_media_of": [{"target_id": 1}] } ]"#).unwrap();
        assert_eq!(page[0].parent_id(), Some(&ItemId::from(1)));
        assert_eq!(page[0].changed(), Some("2025-01-01"));
        assert_eq!(page[0].id(), None);
    }

    #[test]
    fn test_parse_tolerates_missing_and_empty_fields() {
        let page = parse_page(r#"[
            { "changed": [] },
            { "field_media_of": [{}] },
            { "field_media_of": [], "changed": [{"value": null}] },
            { "mid": [{"value": 5}], "name": [{"value": "x"}] }
        ]"#).unwrap();
        assert_eq!(page.len(), 4);
        for entry in &page {
            assert!(entry.parent_id().is_none());
            assert!(entry.changed().is_none());
        }
    }

    #[test]
    fn test_parse_empty_page() {
        assert!(parse_page("[]").unwrap().is_empty());
    }

    #[test]
    fn test_parse_rejects_non_array() {
        assert!(parse_page(r#"{"message": "denied"}"#).is_err());
    }

    #[test]
    fn test_resource_kind_paths() {
        assert!(ResourceKind::Primary.view_path().ends_with("node_timestamps"));
        assert!(ResourceKind::SubItem.view_path().ends_with("media_timestamps"));
    }
}
