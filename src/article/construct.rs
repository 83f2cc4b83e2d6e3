use chrono::{DateTime, Utc};
use std::collections::BTreeSet;

use super::entry::FeedEntry;
use super::types::NewArticle;
use crate::feed::Feed;
use crate::filters::{FilterAction, FilterCandidate, FilterSet};
use crate::ingest::IngestError;
use crate::tokens::{decode_entities, extract_valuable_tokens, TokenSource};

fn non_empty(value: Option<&String>) -> Option<String> {
    value
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

/// Identifies an entry among the others of its feed.
fn extract_entry_id(entry: &FeedEntry) -> Option<String> {
    non_empty(entry.entry_id.as_ref())
        .or_else(|| non_empty(entry.id.as_ref()))
        .or_else(|| non_empty(entry.link.as_ref()))
}

/// Feeds often entity-encode titles; filters and tokens see the text.
fn normalize_title(title: Option<&String>) -> Option<String> {
    title.map(|title| decode_entities(title.trim()).trim().to_string())
}

fn normalize_tags(tags: &[String]) -> Vec<String> {
    tags.iter()
        .map(|tag| tag.trim().to_lowercase())
        .filter(|tag| !tag.is_empty())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Turns a raw feed entry into the attributes of an article owned by `feed`.
pub fn construct_article(
    entry: &FeedEntry,
    feed: &Feed,
    retrieved_at: DateTime<Utc>,
) -> Result<NewArticle, IngestError> {
    let entry_id = extract_entry_id(entry).ok_or(IngestError::MissingEntryId { feed_id: feed.id })?;

    let content = non_empty(entry.content.as_ref()).or_else(|| non_empty(entry.summary.as_ref()));
    let title = normalize_title(entry.title.as_ref());
    let lang = non_empty(entry.lang.as_ref());
    let tags = normalize_tags(&entry.tags);

    let valuable_tokens = extract_valuable_tokens(&TokenSource {
        title: title.as_deref(),
        content: content.as_deref(),
        tags: &tags,
        lang: lang.as_deref(),
    });

    Ok(NewArticle {
        feed_id: Some(feed.id),
        user_id: Some(feed.user_id),
        category_id: feed.category_id,
        entry_id,
        link: non_empty(entry.link.as_ref()),
        title,
        content,
        comments: non_empty(entry.comments.as_ref()),
        lang,
        date: entry.published.or(entry.updated).unwrap_or(retrieved_at),
        retrieved_date: retrieved_at,
        readability_parsed: false,
        tags,
        valuable_tokens,
    })
}

/// Cheap pre-check running only the feed's `skip` rules against title and
/// tags, before anything else is done with the entry.
pub fn should_skip(entry: &FeedEntry, feed: &Feed) -> bool {
    should_skip_with(entry, &FilterSet::parse(&feed.filters))
}

/// [`should_skip`] with rules parsed beforehand.
pub fn should_skip_with(entry: &FeedEntry, filters: &FilterSet) -> bool {
    let title = normalize_title(entry.title.as_ref());
    let tags = normalize_tags(&entry.tags);
    let candidate = FilterCandidate {
        title: title.as_deref(),
        tags: (!tags.is_empty()).then_some(tags.as_slice()),
        link: entry.link.as_deref(),
    };
    filters.evaluate(&candidate, &[FilterAction::Skip]).skipped
}
