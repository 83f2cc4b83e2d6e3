use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::{Repository, RepositoryError, Store};
use crate::article::{Article, ArticleFlags, ClusterLink, NewArticle};
use crate::clustering::{Cluster, ClusterScope, NewCluster};
use crate::feed::{Category, Feed};

/// Arena of entities indexed by id.
#[derive(Debug, Clone, Default)]
pub struct MemoryState {
    pub categories: BTreeMap<i64, Category>,
    pub feeds: BTreeMap<i64, Feed>,
    pub articles: BTreeMap<i64, Article>,
    pub clusters: BTreeMap<i64, Cluster>,
    next_article_id: i64,
    next_cluster_id: i64,
}

impl MemoryState {
    pub fn members_of(&self, cluster_id: i64) -> Vec<&Article> {
        self.articles
            .values()
            .filter(|article| article.cluster_id() == Some(cluster_id))
            .collect()
    }

    /// Checks the cluster bookkeeping invariants, describing the first
    /// violation found.
    pub fn check_invariants(&self) -> Result<(), String> {
        for article in self.articles.values() {
            if let Some(cluster_id) = article.cluster_id() {
                if !self.clusters.contains_key(&cluster_id) {
                    return Err(format!(
                        "article {} points to missing cluster {}",
                        article.id, cluster_id
                    ));
                }
            }
        }
        for cluster in self.clusters.values() {
            let members = self.members_of(cluster.id);
            if members.is_empty() {
                return Err(format!("cluster {} has no members", cluster.id));
            }
            if let Some(main) = cluster.main_article_id {
                if !members.iter().any(|article| article.id == main) {
                    return Err(format!(
                        "cluster {} has non-member main article {}",
                        cluster.id, main
                    ));
                }
            }
        }
        Ok(())
    }

    fn most_recent_clustered<F>(&self, scope: &ClusterScope, exclude_id: i64, predicate: F) -> Option<Article>
    where
        F: Fn(&Article) -> bool,
    {
        self.articles
            .values()
            .filter(|article| {
                article.id != exclude_id
                    && article.cluster_id().is_some()
                    && scope.contains(article)
                    && predicate(article)
            })
            .max_by_key(|article| (article.retrieved_date, article.id))
            .cloned()
    }
}

/// In-process store. Transactions are serialized and roll back on drop.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_category(&self, category: Category) {
        self.state.lock().await.categories.insert(category.id, category);
    }

    pub async fn insert_feed(&self, feed: Feed) {
        self.state.lock().await.feeds.insert(feed.id, feed);
    }

    /// A copy of the committed state.
    pub async fn snapshot(&self) -> MemoryState {
        self.state.lock().await.clone()
    }
}

impl Store for MemoryStore {
    type Tx = MemoryTx;

    async fn begin(&self) -> Result<MemoryTx, RepositoryError> {
        let guard = self.state.clone().lock_owned().await;
        let backup = Some(guard.clone());
        Ok(MemoryTx { guard, backup })
    }
}

/// A transaction over a [`MemoryStore`].
pub struct MemoryTx {
    guard: OwnedMutexGuard<MemoryState>,
    backup: Option<MemoryState>,
}

impl Drop for MemoryTx {
    fn drop(&mut self) {
        if let Some(backup) = self.backup.take() {
            *self.guard = backup;
        }
    }
}

impl Repository for MemoryTx {
    async fn get_feed(&mut self, feed_id: i64) -> Result<Option<Feed>, RepositoryError> {
        let state = &*self.guard;
        Ok(state.feeds.get(&feed_id).map(|feed| {
            let mut feed = feed.clone();
            let category_clusters_on_title = feed
                .category_id
                .and_then(|id| state.categories.get(&id))
                .map_or(false, |category| category.cluster_on_title);
            feed.cluster_on_title |= category_clusters_on_title;
            feed
        }))
    }

    async fn get_article(&mut self, article_id: i64) -> Result<Option<Article>, RepositoryError> {
        Ok(self.guard.articles.get(&article_id).cloned())
    }

    async fn find_candidate_articles(
        &mut self,
        user_id: i64,
        category_id: Option<i64>,
        limit: usize,
    ) -> Result<Vec<Article>, RepositoryError> {
        let mut candidates: Vec<Article> = self
            .guard
            .articles
            .values()
            .filter(|article| {
                article.user_id == user_id
                    && category_id.map_or(true, |id| article.category_id == Some(id))
            })
            .cloned()
            .collect();
        candidates.sort_by(|a, b| (b.retrieved_date, b.id).cmp(&(a.retrieved_date, a.id)));
        candidates.truncate(limit);
        Ok(candidates)
    }

    async fn find_clustered_by_link(
        &mut self,
        scope: &ClusterScope,
        link: &str,
        exclude_id: i64,
    ) -> Result<Option<Article>, RepositoryError> {
        Ok(self
            .guard
            .most_recent_clustered(scope, exclude_id, |article| article.link.as_deref() == Some(link)))
    }

    async fn find_clustered_by_entry_id(
        &mut self,
        scope: &ClusterScope,
        entry_id: &str,
        exclude_id: i64,
    ) -> Result<Option<Article>, RepositoryError> {
        Ok(self
            .guard
            .most_recent_clustered(scope, exclude_id, |article| article.entry_id == entry_id))
    }

    async fn find_clustered_by_title(
        &mut self,
        scope: &ClusterScope,
        title: &str,
        exclude_id: i64,
    ) -> Result<Option<Article>, RepositoryError> {
        Ok(self
            .guard
            .most_recent_clustered(scope, exclude_id, |article| article.title.as_deref() == Some(title)))
    }

    async fn create_article(
        &mut self,
        user_id: i64,
        feed_id: i64,
        article: NewArticle,
    ) -> Result<Article, RepositoryError> {
        self.guard.next_article_id += 1;
        let article = Article::from_new(self.guard.next_article_id, user_id, feed_id, article);
        self.guard.articles.insert(article.id, article.clone());
        Ok(article)
    }

    async fn update_article_cluster(&mut self, article_id: i64, link: &ClusterLink) -> Result<(), RepositoryError> {
        let article = self
            .guard
            .articles
            .get_mut(&article_id)
            .ok_or(RepositoryError::NotFound {
                entity: "article",
                id: article_id,
            })?;
        article.cluster = link.clone();
        Ok(())
    }

    async fn update_article_flags(&mut self, article_id: i64, flags: ArticleFlags) -> Result<(), RepositoryError> {
        let article = self
            .guard
            .articles
            .get_mut(&article_id)
            .ok_or(RepositoryError::NotFound {
                entity: "article",
                id: article_id,
            })?;
        if let Some(read) = flags.read {
            article.read = read;
        }
        article.liked |= flags.liked;
        Ok(())
    }

    async fn delete_article(&mut self, article_id: i64) -> Result<(), RepositoryError> {
        self.guard.articles.remove(&article_id);
        Ok(())
    }

    async fn create_cluster(&mut self, cluster: NewCluster) -> Result<Cluster, RepositoryError> {
        self.guard.next_cluster_id += 1;
        let cluster = Cluster {
            id: self.guard.next_cluster_id,
            user_id: cluster.user_id,
            main_article_id: Some(cluster.main_article_id),
            main_title: cluster.main_title,
            main_link: cluster.main_link,
            main_date: cluster.main_date,
            created_at: cluster.created_at,
        };
        self.guard.clusters.insert(cluster.id, cluster.clone());
        Ok(cluster)
    }

    async fn save_cluster(&mut self, cluster: Cluster) -> Result<Cluster, RepositoryError> {
        if !self.guard.clusters.contains_key(&cluster.id) {
            return Err(RepositoryError::NotFound {
                entity: "cluster",
                id: cluster.id,
            });
        }
        self.guard.clusters.insert(cluster.id, cluster.clone());
        Ok(cluster)
    }

    async fn get_cluster(&mut self, cluster_id: i64) -> Result<Option<Cluster>, RepositoryError> {
        Ok(self.guard.clusters.get(&cluster_id).cloned())
    }

    async fn cluster_members(&mut self, cluster_id: i64) -> Result<Vec<Article>, RepositoryError> {
        Ok(self.guard.members_of(cluster_id).into_iter().cloned().collect())
    }

    async fn delete_cluster(&mut self, cluster_id: i64) -> Result<(), RepositoryError> {
        self.guard.clusters.remove(&cluster_id);
        Ok(())
    }

    async fn commit(mut self) -> Result<(), RepositoryError> {
        self.backup = None;
        Ok(())
    }
}
