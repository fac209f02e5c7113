use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use std::collections::BTreeMap;
use std::path::PathBuf;
use crate::error::Result;

pub mod headers {
    pub const PROJECT_ID: &str = "x-object-meta-project-id";
    pub const AIP_VERSION: &str = "x-object-meta-aip-version";
    pub const PROJECT: &str = "x-object-meta-project";
    pub const PROMISE: &str = "x-object-meta-promise";
    pub const LAST_MOD_TIMESTAMP: &str = "x-object-meta-last-mod-timestamp";
    pub const SHA256SUM: &str = "x-object-meta-sha256sum";
    pub const CONTENT_TYPE: &str = "content-type";
    pub const CONTENT_LENGTH: &str = "content-length";
    pub const ETAG: &str = "etag";
    pub const LAST_MODIFIED: &str = "last-modified";
    pub const OBJECT_MANIFEST: &str = "x-object-manifest";
}

/// Header map with lowercase names.
pub type Headers = BTreeMap<String, String>;

#[derive(Debug, Clone, PartialEq)]
pub struct UploadObject {
    pub path: PathBuf,
    pub object_name: String,
    pub headers: Headers,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadAction {
    CreateContainer,
    UploadSegment { index: u32, for_object: String },
    UploadObject { segmented: bool },
}

/// Outcome of one step of a batch upload.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadEvent {
    pub action: UploadAction,
    pub success: bool,
    pub error: Option<String>,
    pub object: String,
    pub path: Option<PathBuf>,
    /// Response headers reported by the store for this step.
    pub headers: Headers,
}

impl UploadEvent {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(|s| s.as_str())
    }

    /// ETag without the quotes some stores wrap it in.
    pub fn etag(&self) -> Option<&str> {
        self.header(headers::ETAG).map(|e| e.trim_matches('"'))
    }
}

/// Per-object result of a `stat` call.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectStat {
    pub object: String,
    pub success: bool,
    pub error: Option<String>,
    pub headers: Headers,
}

impl ObjectStat {
    pub fn found(object: impl Into<String>, headers: Headers) -> Self {
        Self {
            object: object.into(),
            success: true,
            error: None,
            headers,
        }
    }

    pub fn failed(object: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            object: object.into(),
            success: false,
            error: Some(error.into()),
            headers: Headers::new(),
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(|s| s.as_str())
    }
}

/// Remote store receiving packages.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Transfer a batch of files; one event per container, segment, and object step.
    async fn upload(&self, container: &str, objects: Vec<UploadObject>) -> Result<Vec<UploadEvent>>;

    /// Look up object metadata. An empty result means the lookup returned nothing.
    async fn stat(&self, container: &str, names: &[String]) -> Result<Vec<ObjectStat>>;
}

/// `Wed, 29 May 2024 22:29:37 GMT` -> `2024-05-29T22:29:37+00:00`.
pub fn http_date_to_iso8601(value: &str) -> Option<String> {
    DateTime::parse_from_rfc2822(value.trim())
        .ok()
        .map(|dt| dt.with_timezone(&Utc).to_rfc3339_opts(SecondsFormat::Secs, false))
}

/// Lowercase-keyed copy of a header list.
pub fn collect_headers<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Headers {
    pairs
        .into_iter()
        .map(|(k, v)| (k.to_ascii_lowercase(), v.to_string()))
        .collect()
}
