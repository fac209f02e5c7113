use tracing::{debug, info};
use crate::error::Result;
use super::feed::{ChangeFeed, FeedPage, ResourceKind};

/// Walks a change feed page by page until the first empty page.
pub struct ChangeFeedReader<'a, F: ChangeFeed + ?Sized> {
    feed: &'a F,
    changed_since: Option<String>,
}

impl<'a, F: ChangeFeed + ?Sized> ChangeFeedReader<'a, F> {
    pub fn new(feed: &'a F) -> Self {
        Self {
            feed,
            changed_since: None,
        }
    }

    pub fn changed_since(mut self, filter: Option<impl Into<String>>) -> Self {
        self.changed_since = filter.map(Into::into).filter(|s: &String| !s.is_empty());
        self
    }

    /// Fetch every non-empty page for `kind`. Any page failure aborts the
    /// whole read; there is no partial result.
    pub async fn read_all(&self, kind: ResourceKind) -> Result<Vec<FeedPage>> {
        let mut pages = Vec::new();
        let mut page = 0u32;

        loop {
            let entries = self
                .feed
                .fetch_page(kind, page, self.changed_since.as_deref())
                .await?;

            if entries.is_empty() {
                break;
            }

            debug!(kind = kind.as_str(), page, entries = entries.len(), "feed page");
            pages.push(entries);
            page += 1;
        }

        info!(
            kind = kind.as_str(),
            pages = pages.len(),
            entries = pages.iter().map(|p| p.len()).sum::<usize>(),
            "feed read complete"
        );
        Ok(pages)
    }
}
