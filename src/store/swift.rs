use async_trait::async_trait;
use md5::{Digest, Md5};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_LENGTH};
use reqwest::{Body, StatusCode};
use serde::Deserialize;
use std::io::SeekFrom;
use std::path::Path;
use std::time::Duration;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio_util::io::ReaderStream;
use tracing::{debug, info, warn};
use url::Url;
use crate::config::StoreCredentials;
use crate::error::{parse_store_status, AipDriftError, ErrorContext, Result, StoreError};
use crate::package::CHUNK_SIZE;
use super::types::{
    collect_headers, headers, Headers, ObjectStat, ObjectStore, UploadAction, UploadEvent, UploadObject,
};

const SEGMENT_CONTAINER_SUFFIX: &str = "_segments";

/// Swift's default cap on names returned by one container listing.
const LISTING_LIMIT: usize = 10_000;

#[derive(Debug, Deserialize)]
struct ListedObject {
    name: String,
}

/// OpenStack Swift over its REST API.
#[derive(Clone)]
pub struct SwiftStore {
    http: reqwest::Client,
    storage_url: Url,
    token: String,
    segment_size: Option<u64>,
}

impl SwiftStore {
    pub fn new(storage_url: &str, token: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("aipdrift/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            http,
            storage_url: Url::parse(storage_url.trim_end_matches('/'))?,
            token: token.into(),
            segment_size: None,
        })
    }

    pub async fn connect(credentials: &StoreCredentials) -> Result<Self> {
        match credentials {
            StoreCredentials::Token { storage_url, token } => Self::new(storage_url, token.clone()),
            StoreCredentials::Password { auth_url, username, password } => {
                Self::authenticate(auth_url, username, password).await
            }
        }
    }

    /// TempAuth / v1 authentication: trade user and key for a token and the
    /// account's storage URL.
    pub async fn authenticate(auth_url: &str, username: &str, password: &str) -> Result<Self> {
        let resp = reqwest::Client::new()
            .get(auth_url)
            .header("X-Auth-User", username)
            .header("X-Auth-Key", password)
            .send()
            .await
            .map_err(|e| StoreError::ConnectionFailed { reason: e.to_string() })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let ctx = ErrorContext::new().with_operation("authenticate");
            return Err(match status {
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                    StoreError::AuthenticationFailed { reason: format!("{} for user {}", status, username) }
                }
                _ => parse_store_status(status.as_u16(), &body, ctx),
            }
            .into());
        }

        let storage_url = header_str(resp.headers(), "x-storage-url");
        let token = header_str(resp.headers(), "x-auth-token");
        match (storage_url, token) {
            (Some(url), Some(token)) => Self::new(&url, token),
            _ => Err(StoreError::AuthenticationFailed {
                reason: "auth response lacked X-Storage-Url or X-Auth-Token".to_string(),
            }
            .into()),
        }
    }

    /// Files larger than `size` bytes are uploaded as segments plus a manifest.
    pub fn with_segment_size(mut self, size: Option<u64>) -> Self {
        self.segment_size = size.filter(|s| *s > 0);
        self
    }

    pub fn object_url(&self, container: &str, object: Option<&str>) -> Result<Url> {
        let mut url = self.storage_url.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| AipDriftError::Config(format!("storage URL cannot be a base: {}", self.storage_url)))?;
            segments.pop_if_empty().push(container);
            if let Some(object) = object {
                segments.extend(object.split('/'));
            }
        }
        Ok(url)
    }

    fn segment_name(object: &str, index: u32) -> String {
        format!("{}/{:08}", object, index)
    }

    fn segment_index(object: &str, name: &str) -> Option<u64> {
        name.strip_prefix(object)?.strip_prefix('/')?.parse().ok()
    }

    /// Names under `{object}/` in the segment container. A missing container
    /// lists as empty.
    async fn list_segments(&self, segment_container: &str, object: &str) -> Result<Vec<String>> {
        let prefix = format!("{}/", object);
        let mut names = Vec::new();
        let mut marker: Option<String> = None;

        loop {
            let mut url = self.object_url(segment_container, None)?;
            {
                let mut query = url.query_pairs_mut();
                query
                    .append_pair("format", "json")
                    .append_pair("prefix", &prefix)
                    .append_pair("limit", &LISTING_LIMIT.to_string());
                if let Some(marker) = &marker {
                    query.append_pair("marker", marker);
                }
            }

            let resp = self
                .http
                .get(url)
                .header("X-Auth-Token", &self.token)
                .send()
                .await
                .map_err(|e| StoreError::ConnectionFailed { reason: e.to_string() })?;

            let status = resp.status();
            if status == StatusCode::NOT_FOUND {
                return Ok(names);
            }
            if !status.is_success() {
                let body = resp.text().await.unwrap_or_default();
                let ctx = ErrorContext::new().with_operation("list_segments").with_container(segment_container);
                return Err(parse_store_status(status.as_u16(), &body, ctx).into());
            }

            // 204 carries no body
            let body = resp.text().await?;
            let page: Vec<ListedObject> = if body.trim().is_empty() {
                Vec::new()
            } else {
                serde_json::from_str(&body)?
            };
            let full = page.len() >= LISTING_LIMIT;
            marker = page.last().map(|o| o.name.clone());
            names.extend(page.into_iter().map(|o| o.name));
            if !full {
                return Ok(names);
            }
        }
    }

    async fn delete_object(&self, container: &str, object: &str) -> Result<()> {
        let url = self.object_url(container, Some(object))?;
        let resp = self
            .http
            .delete(url)
            .header("X-Auth-Token", &self.token)
            .send()
            .await
            .map_err(|e| StoreError::ConnectionFailed { reason: e.to_string() })?;

        match resp.status() {
            s if s.is_success() || s == StatusCode::NOT_FOUND => Ok(()),
            s => {
                let body = resp.text().await.unwrap_or_default();
                let ctx = ErrorContext::new().with_operation("delete_object").with_object(container, object);
                Err(parse_store_status(s.as_u16(), &body, ctx).into())
            }
        }
    }

    /// Deletes segments of `object` numbered `keep` and above, left over from
    /// an earlier, longer upload. The manifest serves everything under the
    /// prefix, so a stale tail would be appended to the new content.
    async fn prune_segments(&self, segment_container: &str, object: &str, keep: u64) -> Result<usize> {
        let mut removed = 0;
        for name in self.list_segments(segment_container, object).await? {
            match Self::segment_index(object, &name) {
                Some(index) if index >= keep => {
                    debug!(container = segment_container, segment = %name, "deleting stale segment");
                    self.delete_object(segment_container, &name).await?;
                    removed += 1;
                }
                _ => {}
            }
        }
        if removed > 0 {
            info!(object, removed, "removed stale segments");
        }
        Ok(removed)
    }

    fn segment_container(container: &str) -> String {
        format!("{}{}", container, SEGMENT_CONTAINER_SUFFIX)
    }

    async fn container_exists(&self, container: &str) -> Result<bool> {
        let url = self.object_url(container, None)?;
        let resp = self
            .http
            .head(url)
            .header("X-Auth-Token", &self.token)
            .send()
            .await
            .map_err(|e| StoreError::ConnectionFailed { reason: e.to_string() })?;

        match resp.status() {
            s if s.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            s => {
                let ctx = ErrorContext::new().with_operation("head_container").with_container(container);
                Err(parse_store_status(s.as_u16(), "", ctx).into())
            }
        }
    }

    async fn ensure_container(&self, container: &str, events: &mut Vec<UploadEvent>) -> Result<()> {
        if self.container_exists(container).await? {
            return Ok(());
        }

        info!(container, "creating container");
        let url = self.object_url(container, None)?;
        let result = self
            .http
            .put(url)
            .header("X-Auth-Token", &self.token)
            .header(CONTENT_LENGTH, 0)
            .send()
            .await;

        events.push(match result {
            Ok(resp) if resp.status().is_success() => UploadEvent {
                action: UploadAction::CreateContainer,
                success: true,
                error: None,
                object: container.to_string(),
                path: None,
                headers: response_headers(resp.headers()),
            },
            Ok(resp) => {
                let status = resp.status().as_u16();
                let body = resp.text().await.unwrap_or_default();
                let ctx = ErrorContext::new().with_operation("create_container").with_container(container);
                failed_event(UploadAction::CreateContainer, container, None, parse_store_status(status, &body, ctx).to_string())
            }
            Err(e) => failed_event(UploadAction::CreateContainer, container, None, e.to_string()),
        });
        Ok(())
    }

    async fn put(
        &self,
        container: &str,
        object: &str,
        extra: &Headers,
        body: Body,
        length: u64,
    ) -> std::result::Result<Headers, String> {
        let url = self.object_url(container, Some(object)).map_err(|e| e.to_string())?;
        let resp = self
            .http
            .put(url)
            .header("X-Auth-Token", &self.token)
            .headers(to_header_map(extra)?)
            .header(CONTENT_LENGTH, length)
            .body(body)
            .send()
            .await
            .map_err(|e| StoreError::ConnectionFailed { reason: e.to_string() }.to_string())?;

        let status = resp.status();
        if status.is_success() {
            Ok(response_headers(resp.headers()))
        } else {
            let body = resp.text().await.unwrap_or_default();
            let ctx = ErrorContext::new().with_operation("put_object").with_object(container, object);
            Err(parse_store_status(status.as_u16(), &body, ctx).to_string())
        }
    }

    async fn head(&self, container: &str, object: &str) -> ObjectStat {
        let url = match self.object_url(container, Some(object)) {
            Ok(url) => url,
            Err(e) => return ObjectStat::failed(object, e.to_string()),
        };

        let resp = match self.http.head(url).header("X-Auth-Token", &self.token).send().await {
            Ok(resp) => resp,
            Err(e) => {
                return ObjectStat::failed(object, StoreError::ConnectionFailed { reason: e.to_string() }.to_string());
            }
        };

        if resp.status().is_success() {
            ObjectStat::found(object, response_headers(resp.headers()))
        } else {
            let ctx = ErrorContext::new().with_operation("stat").with_object(container, object);
            ObjectStat::failed(object, parse_store_status(resp.status().as_u16(), "", ctx).to_string())
        }
    }

    async fn upload_whole(&self, container: &str, item: &UploadObject, size: u64) -> UploadEvent {
        let action = UploadAction::UploadObject { segmented: false };
        let file = match File::open(&item.path).await {
            Ok(f) => f,
            Err(e) => return failed_event(action, &item.object_name, Some(&item.path), e.to_string()),
        };

        match self.put(container, &item.object_name, &item.headers, Body::from(file), size).await {
            Ok(headers) => {
                // A whole object replaces any earlier manifest, so all its segments are stale
                let segment_container = Self::segment_container(container);
                if let Err(e) = self.prune_segments(&segment_container, &item.object_name, 0).await {
                    warn!(object = %item.object_name, error = %e, "could not remove old segments");
                }
                success_event(action, &item.object_name, &item.path, headers)
            }
            Err(e) => failed_event(action, &item.object_name, Some(&item.path), e),
        }
    }

    async fn upload_segmented(
        &self,
        container: &str,
        item: &UploadObject,
        size: u64,
        segment_size: u64,
        events: &mut Vec<UploadEvent>,
    ) -> Result<()> {
        let segment_container = Self::segment_container(container);
        self.ensure_container(&segment_container, events).await?;

        let count = size.div_ceil(segment_size);
        if let Err(e) = self.prune_segments(&segment_container, &item.object_name, count).await {
            let action = UploadAction::UploadObject { segmented: true };
            events.push(failed_event(action, &item.object_name, Some(&item.path), e.to_string()));
            return Ok(());
        }

        for index in 0..count as u32 {
            let offset = index as u64 * segment_size;
            let len = segment_size.min(size - offset);
            let action = UploadAction::UploadSegment {
                index,
                for_object: item.object_name.clone(),
            };
            let name = Self::segment_name(&item.object_name, index);

            let (etag, body) = match segment_md5(&item.path, offset, len).await {
                Ok(etag) => match segment_body(&item.path, offset, len).await {
                    Ok(body) => (etag, body),
                    Err(e) => {
                        events.push(failed_event(action, &name, Some(&item.path), e.to_string()));
                        return Ok(());
                    }
                },
                Err(e) => {
                    events.push(failed_event(action, &name, Some(&item.path), e.to_string()));
                    return Ok(());
                }
            };

            // Swift rejects the segment with 422 if the body does not match
            let mut segment_headers = Headers::new();
            segment_headers.insert(headers::ETAG.to_string(), etag);

            debug!(object = %item.object_name, index, len, "uploading segment");
            match self.put(&segment_container, &name, &segment_headers, body, len).await {
                Ok(headers) => events.push(success_event(action, &name, &item.path, headers)),
                Err(e) => {
                    events.push(failed_event(action, &name, Some(&item.path), e));
                    return Ok(());
                }
            }
        }

        let mut manifest_headers = item.headers.clone();
        manifest_headers.insert(
            headers::OBJECT_MANIFEST.to_string(),
            format!("{}/{}/", segment_container, item.object_name),
        );

        let action = UploadAction::UploadObject { segmented: true };
        match self.put(container, &item.object_name, &manifest_headers, Body::from(Vec::new()), 0).await {
            Ok(_) => {
                // The manifest PUT reports the ETag of its empty body; the
                // object's own ETag only shows on a HEAD.
                let stat = self.head(container, &item.object_name).await;
                if stat.success {
                    events.push(success_event(action, &item.object_name, &item.path, stat.headers));
                } else {
                    let error = stat.error.unwrap_or_default();
                    events.push(failed_event(action, &item.object_name, Some(&item.path), error));
                }
            }
            Err(e) => events.push(failed_event(action, &item.object_name, Some(&item.path), e)),
        }
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for SwiftStore {
    async fn upload(&self, container: &str, objects: Vec<UploadObject>) -> Result<Vec<UploadEvent>> {
        let mut events = Vec::new();
        self.ensure_container(container, &mut events).await?;

        for item in &objects {
            let size = match tokio::fs::metadata(&item.path).await {
                Ok(meta) => meta.len(),
                Err(e) => {
                    events.push(failed_event(
                        UploadAction::UploadObject { segmented: false },
                        &item.object_name,
                        Some(&item.path),
                        e.to_string(),
                    ));
                    continue;
                }
            };

            match self.segment_size {
                Some(segment_size) if size > segment_size => {
                    self.upload_segmented(container, item, size, segment_size, &mut events).await?;
                }
                _ => events.push(self.upload_whole(container, item, size).await),
            }
        }

        Ok(events)
    }

    async fn stat(&self, container: &str, names: &[String]) -> Result<Vec<ObjectStat>> {
        let mut stats = Vec::with_capacity(names.len());
        for name in names {
            stats.push(self.head(container, name).await);
        }
        Ok(stats)
    }
}

/// MD5 of `len` bytes at `offset`, read in chunks.
async fn segment_md5(path: &Path, offset: u64, len: u64) -> std::io::Result<String> {
    let mut file = File::open(path).await?;
    file.seek(SeekFrom::Start(offset)).await?;
    let mut reader = file.take(len);
    let mut md5 = Md5::new();
    let mut buf = vec![0u8; CHUNK_SIZE];
    let mut read = 0u64;

    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        md5.update(&buf[..n]);
        read += n as u64;
    }

    if read < len {
        return Err(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            format!("segment at offset {} ended after {} of {} bytes", offset, read, len),
        ));
    }
    Ok(format!("{:x}", md5.finalize()))
}

/// Streaming request body over `len` bytes at `offset`.
async fn segment_body(path: &Path, offset: u64, len: u64) -> std::io::Result<Body> {
    let mut file = File::open(path).await?;
    file.seek(SeekFrom::Start(offset)).await?;
    Ok(Body::wrap_stream(ReaderStream::with_capacity(file.take(len), CHUNK_SIZE)))
}

fn success_event(action: UploadAction, object: &str, path: &Path, headers: Headers) -> UploadEvent {
    UploadEvent {
        action,
        success: true,
        error: None,
        object: object.to_string(),
        path: Some(path.to_path_buf()),
        headers,
    }
}

fn failed_event(action: UploadAction, object: &str, path: Option<&Path>, error: String) -> UploadEvent {
    UploadEvent {
        action,
        success: false,
        error: Some(error),
        object: object.to_string(),
        path: path.map(Path::to_path_buf),
        headers: Headers::new(),
    }
}

fn header_str(map: &HeaderMap, name: &str) -> Option<String> {
    map.get(name).and_then(|v| v.to_str().ok()).map(String::from)
}

fn response_headers(map: &HeaderMap) -> Headers {
    collect_headers(
        map.iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.as_str(), v))),
    )
}

fn to_header_map(headers: &Headers) -> std::result::Result<HeaderMap, String> {
    let mut map = HeaderMap::new();
    for (name, value) in headers {
        let name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| format!("header {}: {}", name, e))?;
        let value = HeaderValue::from_str(value).map_err(|e| format!("header {}: {}", name, e))?;
        map.insert(name, value);
    }
    Ok(map)
}
