use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An entry as delivered by the feed fetcher, before any normalization.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeedEntry {
    pub entry_id: Option<String>,
    pub id: Option<String>,
    pub link: Option<String>,
    pub title: Option<String>,
    pub content: Option<String>,
    pub summary: Option<String>,
    pub comments: Option<String>,
    pub lang: Option<String>,
    pub published: Option<DateTime<Utc>>,
    pub updated: Option<DateTime<Utc>>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl FeedEntry {
    /// Converts an entry parsed by `feed-rs`. `feed_lang` is the language
    /// declared by the enclosing feed, entries rarely carry their own.
    pub fn from_feed_rs(entry: &feed_rs::model::Entry, feed_lang: Option<&str>) -> Self {
        FeedEntry {
            entry_id: None,
            id: Some(entry.id.clone()).filter(|id| !id.trim().is_empty()),
            link: entry.links.first().map(|link| link.href.clone()),
            title: entry.title.as_ref().map(|title| title.content.clone()),
            content: entry.content.as_ref().and_then(|content| content.body.clone()),
            summary: entry.summary.as_ref().map(|summary| summary.content.clone()),
            comments: None,
            lang: feed_lang.map(str::to_string),
            published: entry.published,
            updated: entry.updated,
            tags: entry
                .categories
                .iter()
                .map(|category| category.term.clone())
                .collect(),
        }
    }
}
