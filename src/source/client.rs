use async_trait::async_trait;
use serde_json::json;
use std::time::Duration;
use tracing::debug;
use url::Url;
use crate::changeset::ItemId;
use crate::config::SourceCredentials;
use crate::error::{AipDriftError, Result};
use super::feed::{parse_page, ChangeFeed, FeedPage, RawEntry, ResourceKind};
use super::http::check_response;

const LOGIN_PATH: &str = "user/login?_format=json";

/// An authenticated session against the source system. Passed by reference
/// to everything that reads from the source; there is no global client.
#[derive(Clone)]
pub struct SourceSession {
    http: reqwest::Client,
    server: Url,
}

impl SourceSession {
    pub fn new(server: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("aipdrift/", env!("CARGO_PKG_VERSION")))
            .cookie_store(true)
            .connect_timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            http,
            server: normalize_server(server)?,
        })
    }

    /// Open a session and log in; the session cookie is kept for later calls.
    pub async fn login(server: &str, credentials: &SourceCredentials) -> Result<Self> {
        let session = Self::new(server)?;
        let url = session.server.join(LOGIN_PATH)?;

        debug!(url = %url, user = %credentials.username, "source login");
        let resp = session
            .http
            .post(url)
            .json(&json!({ "name": credentials.username, "pass": credentials.password }))
            .send()
            .await?;
        check_response(resp).await?;

        Ok(session)
    }

    pub fn server(&self) -> &Url {
        &self.server
    }

    pub fn page_url(&self, kind: ResourceKind, page: u32, changed_since: Option<&str>) -> Result<Url> {
        let mut url = self.server.join(kind.view_path())?;
        url.query_pairs_mut()
            .append_pair("page", &page.to_string())
            .append_pair("changed", changed_since.unwrap_or(""));
        Ok(url)
    }

    pub fn item_url(&self, id: &ItemId) -> Result<Url> {
        Ok(self.server.join(&format!("node/{}?_format=json", id))?)
    }

    pub fn item_sub_items_url(&self, id: &ItemId) -> Result<Url> {
        Ok(self.server.join(&format!("node/{}/media?_format=json", id))?)
    }

    async fn get_text(&self, url: Url) -> Result<String> {
        debug!(url = %url, "source GET");
        let resp = check_response(self.http.get(url).send().await?).await?;
        Ok(resp.text().await?)
    }
}

/// A server given as `https://host/drupal` must keep its last segment when
/// endpoints are joined onto it.
fn normalize_server(server: &str) -> Result<Url> {
    let trimmed = server.trim();
    if trimmed.is_empty() {
        return Err(AipDriftError::Config("source server URL is empty".to_string()));
    }
    if trimmed.ends_with('/') {
        Ok(Url::parse(trimmed)?)
    } else {
        Ok(Url::parse(&format!("{}/", trimmed))?)
    }
}

#[async_trait]
impl ChangeFeed for SourceSession {
    async fn fetch_page(
        &self,
        kind: ResourceKind,
        page: u32,
        changed_since: Option<&str>,
    ) -> Result<FeedPage> {
        let url = self.page_url(kind, page, changed_since)?;
        let body = self.get_text(url).await?;
        parse_page(&body).map_err(|e| {
            AipDriftError::Feed(format!("{} page {}: {}", kind.as_str(), page, e))
        })
    }

    async fn fetch_item(&self, id: &ItemId) -> Result<RawEntry> {
        let url = self.item_url(id)?;
        let body = match self.get_text(url).await {
            Ok(body) => body,
            Err(AipDriftError::Api { status: 404, .. }) => {
                return Err(AipDriftError::ItemNotFound(id.to_string()));
            }
            Err(e) => return Err(e),
        };

        if body.trim().is_empty() {
            return Err(AipDriftError::ItemNotFound(id.to_string()));
        }

        let entry: RawEntry = serde_json::from_str(&body)
            .map_err(|e| AipDriftError::Feed(format!("node {}: {}", id, e)))?;
        if entry.id().is_none() {
            return Err(AipDriftError::ItemNotFound(id.to_string()));
        }
        Ok(entry)
    }

    async fn fetch_item_sub_items(&self, id: &ItemId) -> Result<FeedPage> {
        let url = self.item_sub_items_url(id)?;
        let body = self.get_text(url).await?;
        parse_page(&body).map_err(|e| AipDriftError::Feed(format!("node {} media: {}", id, e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_url_with_filter() {
        let session = SourceSession::new("http://example.com").unwrap();
        let url = session.page_url(ResourceKind::Primary, 0, Some("2023-01-01")).unwrap();
        assert_eq!(
            url.as_str(),
            "http://example.com/views/preservation_show_node_timestamps?page=0&changed=2023-01-01"
        );
    }

    #[test]
    fn test_page_url_without_filter_keeps_empty_param() {
        let session = SourceSession::new("http://example.com/").unwrap();
        let url = session.page_url(ResourceKind::SubItem, 3, None).unwrap();
        assert_eq!(
            url.as_str(),
            "http://example.com/views/preservation_show_media_timestamps?page=3&changed="
        );
    }

    #[test]
    fn test_server_subpath_is_preserved() {
        let session = SourceSession::new("https://example.com/drupal").unwrap();
        let url = session.item_url(&ItemId::from(9999)).unwrap();
        assert_eq!(url.as_str(), "https://example.com/drupal/node/9999?_format=json");
    }

    #[test]
    fn test_item_sub_items_url() {
        let session = SourceSession::new("https://example.com").unwrap();
        let url = session.item_sub_items_url(&ItemId::from(12)).unwrap();
        assert_eq!(url.as_str(), "https://example.com/node/12/media?_format=json");
    }

    #[test]
    fn test_filter_with_offset_is_encoded() {
        let session = SourceSession::new("http://example.com").unwrap();
        let url = session.page_url(ResourceKind::Primary, 0, Some("2024-05-16T16:51:52+00:00")).unwrap();
        assert!(url.as_str().ends_with("changed=2024-05-16T16%3A51%3A52%2B00%3A00"));
    }

    #[test]
    fn test_empty_server_is_config_error() {
        assert!(matches!(SourceSession::new("  "), Err(AipDriftError::Config(_))));
    }
}
