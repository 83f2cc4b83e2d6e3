use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use thiserror::Error;

use crate::article::Article;
use crate::feed::Feed;
use crate::repository::RepositoryError;

/// Why an article joined (or started) its cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClusterReason {
    #[serde(rename = "original")]
    Original,
    #[serde(rename = "link")]
    Link,
    #[serde(rename = "entry-id")]
    EntryId,
    #[serde(rename = "title")]
    Title,
    #[serde(rename = "tf-idf")]
    TfIdf,
}

impl ClusterReason {
    pub fn as_str(self) -> &'static str {
        match self {
            ClusterReason::Original => "original",
            ClusterReason::Link => "link",
            ClusterReason::EntryId => "entry-id",
            ClusterReason::Title => "title",
            ClusterReason::TfIdf => "tf-idf",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "original" => Some(ClusterReason::Original),
            "link" => Some(ClusterReason::Link),
            "entry-id" => Some(ClusterReason::EntryId),
            "title" => Some(ClusterReason::Title),
            "tf-idf" => Some(ClusterReason::TfIdf),
            _ => None,
        }
    }

    /// Exact-dedup reasons, accepted without any similarity computation.
    pub fn is_fast_path(self) -> bool {
        matches!(self, ClusterReason::Link | ClusterReason::EntryId)
    }
}

impl fmt::Display for ClusterReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A set of articles believed to tell the same story.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cluster {
    pub id: i64,
    pub user_id: i64,
    pub main_article_id: Option<i64>,
    pub main_title: Option<String>,
    pub main_link: Option<String>,
    pub main_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Cluster {
    /// Points the cluster at `article` and refreshes the display fields.
    pub fn set_main_article(&mut self, article: &Article) {
        self.main_article_id = Some(article.id);
        self.main_title = article.title.clone();
        self.main_link = article.link.clone();
        self.main_date = article.date;
    }
}

/// Attributes of a cluster about to be created around its first article.
#[derive(Debug, Clone, PartialEq)]
pub struct NewCluster {
    pub user_id: i64,
    pub main_article_id: i64,
    pub main_title: Option<String>,
    pub main_link: Option<String>,
    pub main_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl NewCluster {
    pub fn from_article(article: &Article) -> Self {
        NewCluster {
            user_id: article.user_id,
            main_article_id: article.id,
            main_title: article.title.clone(),
            main_link: article.link.clone(),
            main_date: article.date,
            created_at: Utc::now(),
        }
    }
}

/// The set of articles an incoming article may be clustered with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClusterScope {
    pub user_id: i64,
    /// Set when the feed's category clusters on title.
    pub category_id: Option<i64>,
    pub match_titles: bool,
}

impl ClusterScope {
    pub fn for_feed(feed: &Feed) -> Self {
        let category_scoped = feed.cluster_on_title && feed.category_id.is_some();
        ClusterScope {
            user_id: feed.user_id,
            category_id: if category_scoped { feed.category_id } else { None },
            match_titles: category_scoped,
        }
    }

    /// The whole of a user's articles.
    pub fn user(user_id: i64) -> Self {
        ClusterScope {
            user_id,
            category_id: None,
            match_titles: false,
        }
    }

    pub fn contains(&self, article: &Article) -> bool {
        article.user_id == self.user_id
            && self
                .category_id
                .map_or(true, |category_id| article.category_id == Some(category_id))
    }
}

/// Aggregates derived from the members of a cluster. Nothing here is stored.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClusterView {
    pub cluster: Cluster,
    pub article_ids: Vec<i64>,
    pub feed_ids: BTreeSet<i64>,
    pub category_ids: BTreeSet<i64>,
    /// Every member is read.
    pub read: bool,
    /// At least one member is liked.
    pub liked: bool,
}

impl ClusterView {
    pub fn new(cluster: Cluster, members: &[Article]) -> Self {
        ClusterView {
            article_ids: members.iter().map(|article| article.id).collect(),
            feed_ids: members.iter().map(|article| article.feed_id).collect(),
            category_ids: members.iter().filter_map(|article| article.category_id).collect(),
            read: !members.is_empty() && members.iter().all(|article| article.read),
            liked: members.iter().any(|article| article.liked),
            cluster,
        }
    }
}

#[derive(Debug, Error)]
pub enum ClusterError {
    #[error("cluster {cluster_id} has main article {article_id} which is not one of its members")]
    MainArticleNotMember { cluster_id: i64, article_id: i64 },
    #[error("cluster {0} not found")]
    ClusterNotFound(i64),
    #[error("article {article_id} already belongs to cluster {cluster_id}")]
    AlreadyClustered { article_id: i64, cluster_id: i64 },
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(category_id: Option<i64>, cluster_on_title: bool) -> Feed {
        Feed {
            id: 1,
            user_id: 9,
            category_id,
            title: "feed".to_string(),
            filters: vec![],
            cluster_on_title,
        }
    }

    #[test]
    fn test_scope_for_feed() {
        assert_eq!(ClusterScope::for_feed(&feed(Some(4), false)), ClusterScope::user(9));
        let scoped = ClusterScope::for_feed(&feed(Some(4), true));
        assert_eq!(scoped.category_id, Some(4));
        assert!(scoped.match_titles);
        // no category to scope to
        assert_eq!(ClusterScope::for_feed(&feed(None, true)), ClusterScope::user(9));
    }

    #[test]
    fn test_reason_names() {
        for reason in [
            ClusterReason::Original,
            ClusterReason::Link,
            ClusterReason::EntryId,
            ClusterReason::Title,
            ClusterReason::TfIdf,
        ] {
            assert_eq!(ClusterReason::from_name(reason.as_str()), Some(reason));
        }
        assert_eq!(
            serde_json::to_string(&ClusterReason::TfIdf).unwrap(),
            "\"tf-idf\""
        );
    }
}
