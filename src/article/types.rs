use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::clustering::ClusterReason;
use crate::filters::FilterCandidate;
use crate::tokens::ValuableTokens;

/// Read/liked flags requested by the filter pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ArticleFlags {
    pub read: Option<bool>,
    pub liked: bool,
}

impl ArticleFlags {
    pub fn is_empty(&self) -> bool {
        self.read.is_none() && !self.liked
    }
}

/// Cluster membership of an article, as persisted on the article row.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClusterLink {
    pub cluster_id: Option<i64>,
    pub cluster_reason: Option<ClusterReason>,
    pub cluster_score: Option<f64>,
    pub cluster_tfidf_with: Option<i64>,
    pub cluster_tfidf_neighbor_size: Option<i64>,
}

impl ClusterLink {
    pub fn new(cluster_id: i64, reason: ClusterReason) -> Self {
        ClusterLink {
            cluster_id: Some(cluster_id),
            cluster_reason: Some(reason),
            ..Default::default()
        }
    }
}

/// Attributes of an article about to be created.
#[derive(Debug, Clone, PartialEq)]
pub struct NewArticle {
    pub feed_id: Option<i64>,
    pub user_id: Option<i64>,
    pub category_id: Option<i64>,
    pub entry_id: String,
    pub link: Option<String>,
    pub title: Option<String>,
    pub content: Option<String>,
    pub comments: Option<String>,
    pub lang: Option<String>,
    pub date: DateTime<Utc>,
    pub retrieved_date: DateTime<Utc>,
    pub readability_parsed: bool,
    pub tags: Vec<String>,
    pub valuable_tokens: ValuableTokens,
}

impl NewArticle {
    /// Empty tag lists count as absent tags.
    pub fn filter_candidate(&self) -> FilterCandidate<'_> {
        FilterCandidate {
            title: self.title.as_deref(),
            tags: (!self.tags.is_empty()).then_some(self.tags.as_slice()),
            link: self.link.as_deref(),
        }
    }
}

/// A stored article.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    pub id: i64,
    pub user_id: i64,
    pub feed_id: i64,
    pub category_id: Option<i64>,
    pub entry_id: String,
    pub link: Option<String>,
    pub title: Option<String>,
    pub content: Option<String>,
    pub comments: Option<String>,
    pub lang: Option<String>,
    pub date: DateTime<Utc>,
    pub retrieved_date: DateTime<Utc>,
    pub readability_parsed: bool,
    pub tags: Vec<String>,
    pub valuable_tokens: ValuableTokens,
    pub read: bool,
    pub liked: bool,
    #[serde(flatten)]
    pub cluster: ClusterLink,
}

impl Article {
    /// Builds the stored form of `new`; ownership must already be resolved.
    pub fn from_new(id: i64, user_id: i64, feed_id: i64, new: NewArticle) -> Self {
        Article {
            id,
            user_id,
            feed_id,
            category_id: new.category_id,
            entry_id: new.entry_id,
            link: new.link,
            title: new.title,
            content: new.content,
            comments: new.comments,
            lang: new.lang,
            date: new.date,
            retrieved_date: new.retrieved_date,
            readability_parsed: new.readability_parsed,
            tags: new.tags,
            valuable_tokens: new.valuable_tokens,
            read: false,
            liked: false,
            cluster: ClusterLink::default(),
        }
    }

    pub fn cluster_id(&self) -> Option<i64> {
        self.cluster.cluster_id
    }

    pub fn has_content(&self) -> bool {
        self.content
            .as_deref()
            .map_or(false, |content| !content.trim().is_empty())
    }

    pub fn has_title(&self) -> bool {
        self.title
            .as_deref()
            .map_or(false, |title| !title.trim().is_empty())
    }
}
