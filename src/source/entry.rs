//! The listing type produced by every feed source.
//!
//! An [`Entry`] only lives for the duration of a tick.  The one part that
//! survives is its [`id`](Entry::id), which goes into the seen set once the
//! entry has been processed.

/// A single feed item, reduced to what the relay needs.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Entry {
    /// Key used for de-duplication.
    ///
    /// See [`Entry::derive_id`] for how it is chosen.  May be empty when the
    /// feed item carries no link, guid or title; such entries are never
    /// delivered.
    pub id: String,

    /// Human-readable headline.
    pub title: String,

    /// URL of the listing.  Empty when the feed item has none.
    pub link: String,
}

impl Entry {
    pub fn new(id: impl Into<String>, title: impl Into<String>, link: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            link: link.into(),
        }
    }

    /// Pick the de-duplication key: the first non-empty of link, feed id,
    /// title.
    ///
    /// Link comes first because classifieds feeds tend to regenerate guids
    /// while the listing URL stays put.
    pub fn derive_id(link: Option<&str>, feed_id: Option<&str>, title: Option<&str>) -> String {
        [link, feed_id, title]
            .into_iter()
            .flatten()
            .map(str::trim)
            .find(|s| !s.is_empty())
            .unwrap_or_default()
            .to_string()
    }

    /// Text of the chat message announcing this entry.
    pub fn message(&self) -> String {
        format!("{}\n{}", self.title, self.link)
    }
}
