//! Feed source abstraction.
//!
//! This module defines the [`FeedSource`] trait and the [`Entry`] type it
//! yields.  The only concrete source is [`RssFeed`]; tests plug in their own
//! implementations to drive the delivery loop without a network.
//!
//! ## Adding a new source
//!
//! 1. Create a new file in this directory (e.g. `json_feed.rs`).
//! 2. Implement [`FeedSource`] for a struct holding its URL and client.
//! 3. Add the `mod` line below and re-export the struct.
//! 4. Construct it in `main.rs` instead of (or next to) [`RssFeed`].

mod entry;
mod rss;

pub use entry::Entry;
pub use rss::RssFeed;

use async_trait::async_trait;

use crate::error::FeedError;

/// Something the delivery loop can pull candidate entries from.
///
/// [`fetch()`](FeedSource::fetch) must return entries in feed order, which
/// for syndication feeds means newest first.  The loop reverses the batch
/// itself.
#[async_trait]
pub trait FeedSource: Send + Sync {
    /// Label used in log lines.
    fn name(&self) -> &str;

    /// Fetch the current batch of entries.
    async fn fetch(&self) -> Result<Vec<Entry>, FeedError>;
}
