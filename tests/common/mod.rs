#![allow(dead_code)]

use aipdrift::error::{AipDriftError, Result};
use aipdrift::package::md5_hex;
use aipdrift::source::parse_page;
use aipdrift::store::{collect_headers, headers, Headers};
use aipdrift::{BuildOutcome, ChangeFeed, FeedPage, ItemId, ObjectStat, ObjectStore, PackageBuilder, RawEntry, ResourceKind};
use aipdrift::{UploadAction, UploadEvent, UploadObject};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::Mutex;

pub const LAST_MODIFIED: &str = "Wed, 29 May 2024 22:29:37 GMT";

/// Feed serving fixed JSON pages; any page past the list is empty.
#[derive(Default)]
pub struct StaticFeed {
    pub primary: Vec<&'static str>,
    pub sub_items: Vec<&'static str>,
    pub items: HashMap<String, &'static str>,
    pub item_sub_items: HashMap<String, &'static str>,
}

#[async_trait]
impl ChangeFeed for StaticFeed {
    async fn fetch_page(&self, kind: ResourceKind, page: u32, _changed_since: Option<&str>) -> Result<FeedPage> {
        let pages = match kind {
            ResourceKind::Primary => &self.primary,
            ResourceKind::SubItem => &self.sub_items,
        };
        match pages.get(page as usize) {
            Some(body) => parse_page(body),
            None => Ok(Vec::new()),
        }
    }

    async fn fetch_item(&self, id: &ItemId) -> Result<RawEntry> {
        let body = self
            .items
            .get(id.as_str())
            .ok_or_else(|| AipDriftError::ItemNotFound(id.to_string()))?;
        Ok(serde_json::from_str(body)?)
    }

    async fn fetch_item_sub_items(&self, id: &ItemId) -> Result<FeedPage> {
        match self.item_sub_items.get(id.as_str()) {
            Some(body) => parse_page(body),
            None => Ok(Vec::new()),
        }
    }
}

/// Writes `aip_{id}.zip` into `dir`, except for ids listed in `fail`.
pub struct FileBuilder {
    pub dir: PathBuf,
    pub fail: Vec<ItemId>,
}

pub fn package_bytes(id: &ItemId) -> Vec<u8> {
    format!("bag for node {}", id).into_bytes()
}

#[async_trait]
impl PackageBuilder for FileBuilder {
    async fn build(&self, id: &ItemId) -> BuildOutcome {
        if self.fail.contains(id) {
            return BuildOutcome::Failure("exit status: 1".to_string());
        }
        match std::fs::write(self.dir.join(format!("aip_{}.zip", id)), package_bytes(id)) {
            Ok(()) => BuildOutcome::Success,
            Err(e) => BuildOutcome::Failure(e.to_string()),
        }
    }
}

/// Object store kept in memory. The ETag is the MD5 of the stored bytes.
#[derive(Default)]
pub struct MemoryStore {
    pub objects: Mutex<BTreeMap<String, (Vec<u8>, Headers)>>,
    pub corrupt_etags: bool,
}

impl MemoryStore {
    pub fn set_header(&self, object: &str, name: &str, value: &str) {
        if let Some((_, headers)) = self.objects.lock().unwrap().get_mut(object) {
            headers.insert(name.to_string(), value.to_string());
        }
    }

    pub fn remove(&self, object: &str) {
        self.objects.lock().unwrap().remove(object);
    }

    pub fn len(&self) -> usize {
        self.objects.lock().unwrap().len()
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn upload(&self, _container: &str, objects: Vec<UploadObject>) -> Result<Vec<UploadEvent>> {
        let mut events = Vec::new();
        for item in objects {
            let bytes = std::fs::read(&item.path)?;
            let etag = if self.corrupt_etags { md5_hex(b"corrupted") } else { md5_hex(&bytes) };

            let mut stored = item.headers.clone();
            stored.insert(headers::ETAG.to_string(), etag.clone());
            stored.insert(headers::LAST_MODIFIED.to_string(), LAST_MODIFIED.to_string());
            stored.insert(headers::CONTENT_LENGTH.to_string(), bytes.len().to_string());
            self.objects.lock().unwrap().insert(item.object_name.clone(), (bytes, stored));

            events.push(UploadEvent {
                action: UploadAction::UploadObject { segmented: false },
                success: true,
                error: None,
                object: item.object_name,
                path: Some(item.path),
                headers: collect_headers([
                    ("ETag", format!("\"{}\"", etag).as_str()),
                    ("Last-Modified", LAST_MODIFIED),
                ]),
            });
        }
        Ok(events)
    }

    async fn stat(&self, _container: &str, names: &[String]) -> Result<Vec<ObjectStat>> {
        let objects = self.objects.lock().unwrap();
        Ok(names
            .iter()
            .map(|name| match objects.get(name) {
                Some((_, headers)) => ObjectStat::found(name.clone(), headers.clone()),
                None => ObjectStat::failed(name.clone(), "Object not found"),
            })
            .collect())
    }
}
