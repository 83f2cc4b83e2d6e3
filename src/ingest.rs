//! Article ingestion: filters an incoming entry, stores it and clusters it.

use chrono::Utc;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::article::{construct_article, should_skip_with, Article, ArticleFlags, FeedEntry, NewArticle};
use crate::clustering::{ClusterConfig, ClusterEngine, ClusterError, ClusterScope, ScopeLocks};
use crate::feed::Feed;
use crate::filters::{FilterAction, FilterError, FilterSet};
use crate::repository::{Repository, RepositoryError, Store};
use crate::TARGET_INGEST;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("article has no feed")]
    MissingFeedId,
    #[error("feed {feed_id} belongs to user {feed_user_id}, not user {user_id}")]
    FeedOwnership {
        feed_id: i64,
        feed_user_id: i64,
        user_id: i64,
    },
    #[error("entry of feed {feed_id} has neither an entry id, an id nor a link")]
    MissingEntryId { feed_id: i64 },
    #[error("feed {0} not found")]
    FeedNotFound(i64),
    #[error("feed has {} malformed filter rule(s): {}", .0.len(), join_errors(.0))]
    Configuration(Vec<FilterError>),
    #[error(transparent)]
    Cluster(#[from] ClusterError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

fn join_errors(errors: &[FilterError]) -> String {
    errors
        .iter()
        .map(|err| err.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

impl IngestError {
    /// Whether the error concerns the entry itself rather than the storage.
    /// Such entries are rejected and the batch goes on.
    pub fn is_rejection(&self) -> bool {
        match self {
            IngestError::Repository(_) => false,
            IngestError::Cluster(ClusterError::Repository(_)) => false,
            _ => true,
        }
    }
}

/// Counts of a batch ingestion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub created: usize,
    pub skipped: usize,
    pub rejected: usize,
}

/// Creates an article from resolved attributes, checking that it belongs to
/// an existing feed of the same user. The category is always the feed's.
pub async fn create_article<R: Repository>(repo: &mut R, mut draft: NewArticle) -> Result<Article, IngestError> {
    let feed_id = draft.feed_id.ok_or(IngestError::MissingFeedId)?;
    let feed = repo
        .get_feed(feed_id)
        .await?
        .ok_or(IngestError::FeedNotFound(feed_id))?;

    let user_id = draft.user_id.unwrap_or(feed.user_id);
    if user_id != feed.user_id {
        return Err(IngestError::FeedOwnership {
            feed_id,
            feed_user_id: feed.user_id,
            user_id,
        });
    }
    draft.user_id = Some(user_id);
    draft.category_id = feed.category_id;

    Ok(repo.create_article(user_id, feed_id, draft).await?)
}

pub struct Ingestor<S: Store> {
    store: S,
    engine: ClusterEngine,
    locks: ScopeLocks,
}

impl<S: Store> Ingestor<S> {
    pub fn new(store: S, config: ClusterConfig) -> Self {
        Ingestor {
            store,
            engine: ClusterEngine::new(config),
            locks: ScopeLocks::new(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn engine(&self) -> &ClusterEngine {
        &self.engine
    }

    /// Runs the feed's filters on `entry` and, unless they skip it, stores
    /// and clusters the resulting article. Returns `None` for skipped entries.
    ///
    /// Only the id of `feed` is trusted: rules, category and title clustering
    /// are those stored for the feed.
    #[instrument(target = "ingest", level = "debug", skip_all, fields(feed_id = feed.id))]
    pub async fn filter_and_cluster(&self, entry: &FeedEntry, feed: &Feed) -> Result<Option<Article>, IngestError> {
        let feed = self.stored_feed(feed.id).await?;
        let filters = FilterSet::parse(&feed.filters);
        self.ingest_one(entry, &feed, &filters).await
    }

    /// Ingests a batch of entries of one feed. Entries failing on their own
    /// account are logged and counted; storage failures abort the batch.
    #[instrument(target = "ingest", level = "info", skip(self, entries), fields(entries = entries.len()))]
    pub async fn ingest_entries(&self, feed_id: i64, entries: &[FeedEntry]) -> Result<IngestReport, IngestError> {
        let feed = self.stored_feed(feed_id).await?;
        let filters = FilterSet::parse(&feed.filters);

        let mut report = IngestReport::default();
        for entry in entries {
            match self.ingest_one(entry, &feed, &filters).await {
                Ok(Some(_)) => report.created += 1,
                Ok(None) => report.skipped += 1,
                Err(err) if err.is_rejection() => {
                    warn!(
                        target: TARGET_INGEST,
                        "Rejected entry {:?} of feed {}: {}",
                        entry.link.as_deref().or(entry.id.as_deref()),
                        feed_id,
                        err
                    );
                    report.rejected += 1;
                }
                Err(err) => return Err(err),
            }
        }

        info!(
            target: TARGET_INGEST,
            "Feed {}: {} created, {} skipped, {} rejected",
            feed_id, report.created, report.skipped, report.rejected
        );
        Ok(report)
    }

    /// The transaction ends before any scope lock is taken.
    async fn stored_feed(&self, feed_id: i64) -> Result<Feed, IngestError> {
        let mut tx = self.store.begin().await?;
        tx.get_feed(feed_id)
            .await?
            .ok_or(IngestError::FeedNotFound(feed_id))
    }

    async fn ingest_one(&self, entry: &FeedEntry, feed: &Feed, filters: &FilterSet) -> Result<Option<Article>, IngestError> {
        if filters.has_errors() {
            return Err(IngestError::Configuration(filters.errors().to_vec()));
        }
        if should_skip_with(entry, filters) {
            debug!(
                target: TARGET_INGEST,
                "Skipped entry {:?} of feed {} before construction",
                entry.link.as_deref().or(entry.id.as_deref()),
                feed.id
            );
            return Ok(None);
        }

        let draft = construct_article(entry, feed, Utc::now())?;
        let outcome = filters.evaluate(&draft.filter_candidate(), &FilterAction::ALL);
        if outcome.skipped {
            info!(
                target: TARGET_INGEST,
                "Skipped entry {} of feed {}", draft.entry_id, feed.id
            );
            return Ok(None);
        }
        let flags = ArticleFlags {
            read: outcome.read,
            liked: outcome.liked,
        };

        let scope = ClusterScope::for_feed(feed);
        let _guard = self.locks.acquire(&scope).await;

        let mut tx = self.store.begin().await?;
        let article = create_article(&mut tx, draft).await?;
        let article = self.engine.clusterize(&mut tx, &article, &scope, flags).await?;
        tx.commit().await?;

        debug!(
            target: TARGET_INGEST,
            "Stored article {} in cluster {:?}", article.id, article.cluster_id()
        );
        Ok(Some(article))
    }

    /// Removes an article from its cluster. Returns false if the article
    /// does not exist.
    pub async fn detach_article(&self, article_id: i64) -> Result<bool, IngestError> {
        self.with_article(article_id, false).await
    }

    /// Detaches then deletes an article, in one transaction. Returns false if
    /// the article does not exist.
    pub async fn delete_article(&self, article_id: i64) -> Result<bool, IngestError> {
        self.with_article(article_id, true).await
    }

    async fn with_article(&self, article_id: i64, delete: bool) -> Result<bool, IngestError> {
        let user_id = {
            let mut tx = self.store.begin().await?;
            match tx.get_article(article_id).await? {
                Some(article) => article.user_id,
                None => return Ok(false),
            }
        };

        let _guard = self.locks.acquire(&ClusterScope::user(user_id)).await;
        let mut tx = self.store.begin().await?;
        // reloaded under the lock, it may have moved meanwhile
        let Some(article) = tx.get_article(article_id).await? else {
            return Ok(false);
        };
        self.engine.detach(&mut tx, &article).await?;
        if delete {
            tx.delete_article(article.id).await?;
            info!(target: TARGET_INGEST, "Deleted article {}", article.id);
        }
        tx.commit().await?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clustering::ClusterReason;
    use crate::db::Database;
    use crate::feed::Category;
    use crate::filters::{FilterKind, FilterTrigger, RawFilterRule};
    use crate::repository::MemoryStore;
    use std::sync::Arc;

    fn feed(id: i64, category_id: Option<i64>, filters: Vec<RawFilterRule>) -> Feed {
        Feed {
            id,
            user_id: 1,
            category_id,
            title: format!("Feed {}", id),
            filters,
            cluster_on_title: false,
        }
    }

    fn entry(id: &str, title: &str, tags: &[&str]) -> FeedEntry {
        FeedEntry {
            id: Some(id.to_string()),
            link: Some(format!("https://example.com/{}", id)),
            title: Some(title.to_string()),
            content: Some(format!("<p>{}</p>", title)),
            tags: tags.iter().map(|tag| tag.to_string()).collect(),
            ..Default::default()
        }
    }

    async fn ingestor(feeds: Vec<Feed>) -> Ingestor<MemoryStore> {
        let store = MemoryStore::new();
        for feed in feeds {
            store.insert_feed(feed).await;
        }
        Ingestor::new(store, ClusterConfig::default())
    }

    #[tokio::test]
    async fn test_skip_creates_nothing() {
        let rules = vec![RawFilterRule::new(
            FilterAction::Skip,
            FilterTrigger::OnMatch,
            FilterKind::TagExactMatch,
            "sponsored",
        )];
        let feed = feed(1, None, rules);
        let ingestor = ingestor(vec![feed.clone()]).await;

        let skipped = ingestor
            .filter_and_cluster(&entry("a", "Buy now", &["Sponsored"]), &feed)
            .await
            .unwrap();
        assert!(skipped.is_none());

        let kept = ingestor
            .filter_and_cluster(&entry("b", "Launch delayed", &["space"]), &feed)
            .await
            .unwrap();
        assert!(kept.is_some());

        let state = ingestor.store().snapshot().await;
        assert_eq!(state.articles.len(), 1);
        assert_eq!(state.clusters.len(), 1);
    }

    #[tokio::test]
    async fn test_filters_mark_article() {
        let rules = vec![
            RawFilterRule::new(FilterAction::MarkRead, FilterTrigger::OnMatch, FilterKind::SubstringMatch, "recap"),
            RawFilterRule::new(FilterAction::MarkLiked, FilterTrigger::OnNoMatch, FilterKind::Regex, "ad:"),
        ];
        let feed = feed(1, None, rules);
        let ingestor = ingestor(vec![feed.clone()]).await;

        let article = ingestor
            .filter_and_cluster(&entry("a", "Weekly Recap", &[]), &feed)
            .await
            .unwrap()
            .unwrap();
        assert!(article.read);
        assert!(article.liked);
        assert_eq!(ingestor.store().snapshot().await.articles[&article.id], article);
    }

    #[tokio::test]
    async fn test_malformed_rule_rejects_entry() {
        let mut broken = RawFilterRule::new(
            FilterAction::Skip,
            FilterTrigger::OnMatch,
            FilterKind::ExactMatch,
            "x",
        );
        broken.kind = "fuzzy".to_string();
        let feed = feed(1, None, vec![broken]);
        let ingestor = ingestor(vec![feed.clone()]).await;

        let result = ingestor.filter_and_cluster(&entry("a", "Title", &[]), &feed).await;
        match result {
            Err(IngestError::Configuration(errors)) => {
                assert_eq!(errors, vec![FilterError::UnknownKind { index: 0, value: "fuzzy".to_string() }])
            }
            other => panic!("unexpected result {:?}", other),
        }
        assert!(ingestor.store().snapshot().await.articles.is_empty());
    }

    #[tokio::test]
    async fn test_create_article_preconditions() {
        let ingestor = ingestor(vec![feed(1, Some(4), vec![])]).await;
        let draft = construct_article(&entry("a", "Title", &[]), &feed(1, Some(4), vec![]), Utc::now()).unwrap();
        let mut tx = ingestor.store().begin().await.unwrap();

        let mut orphan = draft.clone();
        orphan.feed_id = None;
        assert!(matches!(
            create_article(&mut tx, orphan).await,
            Err(IngestError::MissingFeedId)
        ));

        let mut foreign = draft.clone();
        foreign.user_id = Some(2);
        assert!(matches!(
            create_article(&mut tx, foreign).await,
            Err(IngestError::FeedOwnership { feed_user_id: 1, user_id: 2, .. })
        ));

        let mut unknown = draft.clone();
        unknown.feed_id = Some(99);
        assert!(matches!(
            create_article(&mut tx, unknown).await,
            Err(IngestError::FeedNotFound(99))
        ));

        // the category always follows the feed
        let mut moved = draft;
        moved.category_id = Some(5);
        let article = create_article(&mut tx, moved).await.unwrap();
        assert_eq!(article.category_id, Some(4));
    }

    #[tokio::test]
    async fn test_same_link_across_feeds_shares_cluster() {
        let first_feed = feed(1, None, vec![]);
        let second_feed = feed(2, None, vec![]);
        let ingestor = ingestor(vec![first_feed.clone(), second_feed.clone()]).await;

        let first = ingestor
            .filter_and_cluster(&entry("a", "Rocket launch", &[]), &first_feed)
            .await
            .unwrap()
            .unwrap();
        let mut mirrored = entry("b", "Rocket launches today", &[]);
        mirrored.link = first.link.clone();
        let second = ingestor
            .filter_and_cluster(&mirrored, &second_feed)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(second.cluster_id(), first.cluster_id());
        assert_eq!(second.cluster.cluster_reason, Some(ClusterReason::Link));
    }

    #[tokio::test]
    async fn test_ingest_entries_report() {
        let rules = vec![RawFilterRule::new(
            FilterAction::Skip,
            FilterTrigger::OnMatch,
            FilterKind::TagSubstringMatch,
            "promo",
        )];
        let ingestor = ingestor(vec![feed(1, Some(3), rules)]).await;
        ingestor
            .store()
            .insert_category(Category {
                id: 3,
                user_id: 1,
                name: "news".to_string(),
                cluster_on_title: true,
            })
            .await;

        let entries = vec![
            entry("a", "Election results", &[]),
            entry("b", "Election results", &[]),
            entry("c", "Spring sale", &["promotion"]),
            FeedEntry::default(),
        ];
        let report = ingestor.ingest_entries(1, &entries).await.unwrap();
        assert_eq!(
            report,
            IngestReport {
                created: 2,
                skipped: 1,
                rejected: 1,
            }
        );

        // category-scoped feed: identical titles share a cluster
        let state = ingestor.store().snapshot().await;
        assert_eq!(state.clusters.len(), 1);
        state.check_invariants().unwrap();

        assert!(matches!(
            ingestor.ingest_entries(42, &entries).await,
            Err(IngestError::FeedNotFound(42))
        ));
    }

    #[tokio::test]
    async fn test_delete_and_detach() {
        let feed = feed(1, None, vec![]);
        let ingestor = ingestor(vec![feed.clone()]).await;
        let first = ingestor
            .filter_and_cluster(&entry("a", "Storm", &[]), &feed)
            .await
            .unwrap()
            .unwrap();
        let mut copy = entry("b", "Storm warning", &[]);
        copy.link = first.link.clone();
        let second = ingestor.filter_and_cluster(&copy, &feed).await.unwrap().unwrap();
        let cluster_id = first.cluster_id().unwrap();

        assert!(ingestor.delete_article(first.id).await.unwrap());
        let state = ingestor.store().snapshot().await;
        assert!(!state.articles.contains_key(&first.id));
        assert_eq!(state.clusters[&cluster_id].main_article_id, Some(second.id));
        state.check_invariants().unwrap();

        assert!(ingestor.detach_article(second.id).await.unwrap());
        let state = ingestor.store().snapshot().await;
        assert!(state.clusters.is_empty());
        assert_eq!(state.articles[&second.id].cluster_id(), None);

        assert!(!ingestor.delete_article(first.id).await.unwrap());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_ingestion_builds_one_cluster() {
        let feeds: Vec<Feed> = (1..=4).map(|id| feed(id, None, vec![])).collect();
        let ingestor = Arc::new(ingestor(feeds.clone()).await);

        let mut handles = Vec::new();
        for (index, feed) in feeds.into_iter().enumerate() {
            let ingestor = ingestor.clone();
            handles.push(tokio::spawn(async move {
                let mut shared = entry(&format!("copy-{}", index), "Summit ends", &[]);
                shared.link = Some("https://example.com/summit".to_string());
                ingestor.filter_and_cluster(&shared, &feed).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap().unwrap();
        }

        let state = ingestor.store().snapshot().await;
        assert_eq!(state.articles.len(), 4);
        assert_eq!(state.clusters.len(), 1);
        state.check_invariants().unwrap();
    }

    #[tokio::test]
    async fn test_misconfigured_feed_rejects_whole_batch() {
        let mut broken = RawFilterRule::new(
            FilterAction::MarkRead,
            FilterTrigger::OnMatch,
            FilterKind::ExactMatch,
            "x",
        );
        broken.action = "archive".to_string();
        let promo = RawFilterRule::new(
            FilterAction::Skip,
            FilterTrigger::OnMatch,
            FilterKind::TagSubstringMatch,
            "promo",
        );
        let ingestor = ingestor(vec![feed(1, None, vec![broken, promo])]).await;

        let entries = vec![
            entry("a", "Election results", &[]),
            entry("b", "Spring sale", &["promotion"]),
        ];
        let report = ingestor.ingest_entries(1, &entries).await.unwrap();
        assert_eq!(
            report,
            IngestReport {
                created: 0,
                skipped: 0,
                rejected: 2,
            }
        );
        assert!(ingestor.store().snapshot().await.articles.is_empty());
    }

    #[tokio::test]
    async fn test_stored_feed_settings_win() {
        let rules = vec![RawFilterRule::new(
            FilterAction::Skip,
            FilterTrigger::OnMatch,
            FilterKind::SubstringMatch,
            "sale",
        )];
        let ingestor = ingestor(vec![feed(1, None, rules)]).await;

        // a caller holding an outdated copy of the feed
        let outdated = feed(1, None, vec![]);
        let skipped = ingestor
            .filter_and_cluster(&entry("a", "Spring sale", &[]), &outdated)
            .await
            .unwrap();
        assert!(skipped.is_none());

        assert!(matches!(
            ingestor.filter_and_cluster(&entry("b", "Storm", &[]), &feed(9, None, vec![])).await,
            Err(IngestError::FeedNotFound(9))
        ));
    }

    #[tokio::test]
    async fn test_category_title_clustering_through_database() {
        let db = Database::in_memory().await.unwrap();
        let category = db.add_category(1, "news", true).await.unwrap();
        let feed = db.add_feed(1, Some(category.id), "Wire", vec![]).await.unwrap();
        assert!(feed.cluster_on_title);
        let ingestor = Ingestor::new(db, ClusterConfig::default());

        let mut first = entry("a", "Election results", &[]);
        first.content = Some("<p>Turnout reached a record high in the northern provinces.</p>".to_string());
        let mut second = entry("b", "Election results", &[]);
        second.content = Some("<p>Counting continues overnight after polling stations closed.</p>".to_string());

        let first = ingestor.filter_and_cluster(&first, &feed).await.unwrap().unwrap();
        let second = ingestor.filter_and_cluster(&second, &feed).await.unwrap().unwrap();
        assert_eq!(second.cluster_id(), first.cluster_id());
        assert_eq!(second.cluster.cluster_reason, Some(ClusterReason::Title));
        assert_eq!(second.category_id, Some(category.id));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_users_write_concurrently_to_database_file() {
        let path = std::env::temp_dir().join(format!("feedfold-ingest-{}.db", std::process::id()));
        let path = path.to_string_lossy().into_owned();
        let remove_files = || {
            for suffix in ["", "-wal", "-shm"] {
                let _ = std::fs::remove_file(format!("{}{}", path, suffix));
            }
        };
        remove_files();

        let db = Database::new(&path).await.unwrap();
        let mut feeds = Vec::new();
        for user_id in 1..=4 {
            feeds.push(db.add_feed(user_id, None, "Wire", vec![]).await.unwrap());
        }
        let ingestor = Arc::new(Ingestor::new(db.clone(), ClusterConfig::default()));

        let mut handles = Vec::new();
        for feed in &feeds {
            for index in 0..5 {
                let ingestor = ingestor.clone();
                let feed = feed.clone();
                handles.push(tokio::spawn(async move {
                    let story = entry(
                        &format!("{}-{}", feed.user_id, index),
                        &format!("Story {} of user {}", index, feed.user_id),
                        &[],
                    );
                    ingestor.filter_and_cluster(&story, &feed).await
                }));
            }
        }
        for handle in handles {
            assert!(handle.await.unwrap().unwrap().is_some());
        }

        for feed in &feeds {
            assert_eq!(db.recent_articles(feed.user_id, 100).await.unwrap().len(), 5);
        }
        db.pool().close().await;
        remove_files();
    }
}
