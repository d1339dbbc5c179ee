//! RSS/Atom feed source.
//!
//! Fetches a syndication document over HTTP and maps its items to [`Entry`]
//! values.  RSS 2.0 is read with the `rss` crate; anything it rejects gets a
//! second chance through `feed-rs`, which understands Atom.  The HTTP client comes from the caller, already configured with a
//! timeout and a browser-like `User-Agent`; some classifieds sites reject the
//! default client identifier outright.

use async_trait::async_trait;
use reqwest::Client;

use super::{Entry, FeedSource};
use crate::error::FeedError;

/// A feed polled over HTTP.
pub struct RssFeed {
    client: Client,
    url: String,
}

impl RssFeed {
    pub fn new(client: Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }

    /// Map an already-parsed [`rss::Channel`] to entries, in feed order.
    ///
    /// Pure function so that tests can exercise the mapping without I/O.
    pub fn parse_channel(channel: &rss::Channel) -> Vec<Entry> {
        channel
            .items()
            .iter()
            .map(|item| {
                let id = Entry::derive_id(
                    item.link(),
                    item.guid().map(|g| g.value()),
                    item.title(),
                );

                Entry {
                    id,
                    title: item.title().unwrap_or("(untitled)").trim().to_string(),
                    link: item.link().unwrap_or_default().trim().to_string(),
                }
            })
            .collect()
    }

    /// Map an Atom (or any `feed-rs` parsed) feed to entries, in feed order.
    ///
    /// The entry's alternate link wins over its `<id>`, like the RSS mapping
    /// prefers `<link>` over `<guid>`.
    pub fn parse_atom(feed: &feed_rs::model::Feed) -> Vec<Entry> {
        feed.entries
            .iter()
            .map(|item| {
                let link = item
                    .links
                    .iter()
                    .find(|l| l.rel.as_deref().map_or(true, |rel| rel == "alternate"))
                    .or_else(|| item.links.first())
                    .map(|l| l.href.as_str());
                let title = item.title.as_ref().map(|t| t.content.as_str());

                Entry {
                    id: Entry::derive_id(link, Some(item.id.as_str()), title),
                    title: title.unwrap_or("(untitled)").trim().to_string(),
                    link: link.unwrap_or_default().trim().to_string(),
                }
            })
            .collect()
    }

    fn parse_body(body: &[u8]) -> Result<Vec<Entry>, FeedError> {
        match rss::Channel::read_from(body) {
            Ok(channel) => Ok(Self::parse_channel(&channel)),
            Err(e) => {
                tracing::debug!(error = %e, "not RSS 2.0, trying Atom");
                let feed = feed_rs::parser::parse(body)?;
                Ok(Self::parse_atom(&feed))
            }
        }
    }
}

#[async_trait]
impl FeedSource for RssFeed {
    fn name(&self) -> &str {
        &self.url
    }

    async fn fetch(&self) -> Result<Vec<Entry>, FeedError> {
        let response = self.client.get(&self.url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FeedError::Status(status));
        }

        let body = response.bytes().await?;
        let entries = Self::parse_body(&body)?;
        tracing::debug!(url = %self.url, count = entries.len(), "feed fetched");
        Ok(entries)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
