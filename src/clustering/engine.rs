use std::cmp::Reverse;
use tracing::{debug, info, instrument, warn};

use super::config::ClusterConfig;
use super::similarity::best_match;
use super::types::{Cluster, ClusterError, ClusterReason, ClusterScope, ClusterView, NewCluster};
use crate::article::{Article, ArticleFlags, ClusterLink};
use crate::repository::Repository;
use crate::TARGET_CLUSTER;

/// An accepted match: the cluster to join and how it was found.
#[derive(Debug, Clone, PartialEq)]
struct ClusterMatch {
    cluster_id: i64,
    link: ClusterLink,
}

impl ClusterMatch {
    fn exact(neighbor: &Article, reason: ClusterReason) -> Option<Self> {
        let cluster_id = neighbor.cluster_id()?;
        Some(ClusterMatch {
            cluster_id,
            link: ClusterLink::new(cluster_id, reason),
        })
    }
}

/// Ranks articles as main article candidates, best last.
fn main_quality(article: &Article) -> (bool, bool, bool, Reverse<chrono::DateTime<chrono::Utc>>, Reverse<i64>) {
    (
        article.has_title(),
        article.readability_parsed,
        article.has_content(),
        Reverse(article.date),
        Reverse(article.id),
    )
}

fn ensure_main_is_member(cluster: &Cluster, members: &[Article]) -> Result<(), ClusterError> {
    match cluster.main_article_id {
        Some(main) if !members.iter().any(|article| article.id == main) => {
            Err(ClusterError::MainArticleNotMember {
                cluster_id: cluster.id,
                article_id: main,
            })
        }
        _ => Ok(()),
    }
}

/// Decides and applies cluster membership of articles.
///
/// Every method expects to run inside the repository's transaction and under
/// the [`super::ScopeLocks`] guard of the article's scope.
#[derive(Debug, Clone, Default)]
pub struct ClusterEngine {
    config: ClusterConfig,
}

impl ClusterEngine {
    pub fn new(config: ClusterConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ClusterConfig {
        &self.config
    }

    /// Places a freshly created article into an existing cluster, or into a
    /// new one when nothing matches. Returns the article as now stored.
    #[instrument(target = "cluster", level = "debug", skip_all, fields(article_id = article.id))]
    pub async fn clusterize<R: Repository>(
        &self,
        repo: &mut R,
        article: &Article,
        scope: &ClusterScope,
        flags: ArticleFlags,
    ) -> Result<Article, ClusterError> {
        if let Some(cluster_id) = article.cluster_id() {
            return Err(ClusterError::AlreadyClustered {
                article_id: article.id,
                cluster_id,
            });
        }

        let mut clustered = article.clone();
        if !flags.is_empty() {
            repo.update_article_flags(article.id, flags).await?;
            if let Some(read) = flags.read {
                clustered.read = read;
            }
            clustered.liked |= flags.liked;
        }

        let link = match self.find_match(repo, article, scope).await? {
            Some(found) => self.join(repo, article, found).await?,
            None => self.create_from_article(repo, article).await?,
        };
        repo.update_article_cluster(article.id, &link).await?;

        clustered.cluster = link;
        Ok(clustered)
    }

    /// Removes an article from its cluster.
    ///
    /// The cluster is deleted when the article was its last member; when the
    /// article was the main article the best remaining member replaces it.
    #[instrument(target = "cluster", level = "debug", skip_all, fields(article_id = article.id))]
    pub async fn detach<R: Repository>(&self, repo: &mut R, article: &Article) -> Result<(), ClusterError> {
        let Some(cluster_id) = article.cluster_id() else {
            return Ok(());
        };

        let cluster = repo.get_cluster(cluster_id).await?;
        let members = match &cluster {
            Some(cluster) => {
                let members = repo.cluster_members(cluster.id).await?;
                ensure_main_is_member(cluster, &members)?;
                members
            }
            None => Vec::new(),
        };

        repo.update_article_cluster(article.id, &ClusterLink::default()).await?;

        let Some(mut cluster) = cluster else {
            warn!(
                target: TARGET_CLUSTER,
                "Article {} referenced missing cluster {}, link cleared", article.id, cluster_id
            );
            return Ok(());
        };

        let replacement = members
            .iter()
            .filter(|member| member.id != article.id)
            .max_by_key(|member| main_quality(member));

        match replacement {
            None => {
                repo.delete_cluster(cluster.id).await?;
                info!(
                    target: TARGET_CLUSTER,
                    "Deleted cluster {}: article {} was its last member", cluster.id, article.id
                );
            }
            Some(replacement) if cluster.main_article_id == Some(article.id) => {
                cluster.main_article_id = None;
                Self::enrich_cluster(&mut cluster, replacement, true);
                info!(
                    target: TARGET_CLUSTER,
                    "Article {} replaces article {} as main of cluster {}",
                    replacement.id, article.id, cluster.id
                );
                repo.save_cluster(cluster).await?;
            }
            Some(_) => {
                debug!(
                    target: TARGET_CLUSTER,
                    "Article {} left cluster {}", article.id, cluster.id
                );
            }
        }
        Ok(())
    }

    /// The cluster with its derived aggregates.
    pub async fn view<R: Repository>(&self, repo: &mut R, cluster_id: i64) -> Result<Option<ClusterView>, ClusterError> {
        let Some(cluster) = repo.get_cluster(cluster_id).await? else {
            return Ok(None);
        };
        let members = repo.cluster_members(cluster_id).await?;
        ensure_main_is_member(&cluster, &members)?;
        Ok(Some(ClusterView::new(cluster, &members)))
    }

    /// Joining never demotes an existing main article; it only fills a
    /// missing one, unless `force_as_main` is set.
    fn enrich_cluster(cluster: &mut Cluster, article: &Article, force_as_main: bool) -> bool {
        if force_as_main || cluster.main_article_id.is_none() {
            cluster.set_main_article(article);
            return true;
        }
        false
    }

    async fn find_match<R: Repository>(
        &self,
        repo: &mut R,
        article: &Article,
        scope: &ClusterScope,
    ) -> Result<Option<ClusterMatch>, ClusterError> {
        if let Some(link) = article.link.as_deref().filter(|link| !link.is_empty()) {
            if let Some(neighbor) = repo.find_clustered_by_link(scope, link, article.id).await? {
                return Ok(ClusterMatch::exact(&neighbor, ClusterReason::Link));
            }
        }

        if !article.entry_id.is_empty() {
            if let Some(neighbor) = repo
                .find_clustered_by_entry_id(scope, &article.entry_id, article.id)
                .await?
            {
                return Ok(ClusterMatch::exact(&neighbor, ClusterReason::EntryId));
            }
        }

        if scope.match_titles {
            if let Some(title) = article.title.as_deref().filter(|title| !title.trim().is_empty()) {
                if let Some(neighbor) = repo.find_clustered_by_title(scope, title, article.id).await? {
                    return Ok(ClusterMatch::exact(&neighbor, ClusterReason::Title));
                }
            }
        }

        self.match_by_similarity(repo, article, scope).await
    }

    fn within_time_window(&self, article: &Article, candidate: &Article) -> bool {
        let window = self.config.time_window;
        (candidate.date - article.date).abs() <= window
            || (candidate.retrieved_date - article.retrieved_date).abs() <= window
    }

    async fn match_by_similarity<R: Repository>(
        &self,
        repo: &mut R,
        article: &Article,
        scope: &ClusterScope,
    ) -> Result<Option<ClusterMatch>, ClusterError> {
        if !self.config.tfidf_enabled || article.valuable_tokens.is_empty() {
            return Ok(None);
        }

        let neighbors: Vec<Article> = repo
            .find_candidate_articles(scope.user_id, scope.category_id, self.config.neighbor_pool_limit)
            .await?
            .into_iter()
            .filter(|candidate| {
                candidate.id != article.id
                    && candidate.cluster_id().is_some()
                    && self.within_time_window(article, candidate)
            })
            .collect();

        if neighbors.is_empty() || neighbors.len() < self.config.tfidf_min_sample_size {
            debug!(
                target: TARGET_CLUSTER,
                "Only {} neighbors against {} required, no TF-IDF for article {}",
                neighbors.len(),
                self.config.tfidf_min_sample_size,
                article.id
            );
            return Ok(None);
        }

        let Some(best) = best_match(&article.valuable_tokens, &neighbors) else {
            return Ok(None);
        };
        debug!(
            target: TARGET_CLUSTER,
            "Best TF-IDF neighbor of article {} is {} with score {:.4} among {}",
            article.id,
            best.article.id,
            best.score,
            neighbors.len()
        );
        if best.score <= self.config.tfidf_min_score {
            return Ok(None);
        }

        let Some(cluster_id) = best.article.cluster_id() else {
            return Ok(None);
        };
        Ok(Some(ClusterMatch {
            cluster_id,
            link: ClusterLink {
                cluster_id: Some(cluster_id),
                cluster_reason: Some(ClusterReason::TfIdf),
                cluster_score: Some(best.score),
                cluster_tfidf_with: Some(best.article.id),
                cluster_tfidf_neighbor_size: Some(neighbors.len() as i64),
            },
        }))
    }

    async fn join<R: Repository>(
        &self,
        repo: &mut R,
        article: &Article,
        found: ClusterMatch,
    ) -> Result<ClusterLink, ClusterError> {
        let mut cluster = repo
            .get_cluster(found.cluster_id)
            .await?
            .ok_or(ClusterError::ClusterNotFound(found.cluster_id))?;
        let members = repo.cluster_members(cluster.id).await?;
        ensure_main_is_member(&cluster, &members)?;

        if Self::enrich_cluster(&mut cluster, article, false) {
            repo.save_cluster(cluster.clone()).await?;
        }

        info!(
            target: TARGET_CLUSTER,
            "Article {} joins cluster {} ({}{})",
            article.id,
            cluster.id,
            found.link.cluster_reason.unwrap_or(ClusterReason::Original),
            found
                .link
                .cluster_score
                .map(|score| format!(", score {:.4}", score))
                .unwrap_or_default()
        );
        Ok(found.link)
    }

    async fn create_from_article<R: Repository>(
        &self,
        repo: &mut R,
        article: &Article,
    ) -> Result<ClusterLink, ClusterError> {
        let cluster = repo.create_cluster(NewCluster::from_article(article)).await?;
        info!(
            target: TARGET_CLUSTER,
            "Article {} starts cluster {}", article.id, cluster.id
        );
        Ok(ClusterLink::new(cluster.id, ClusterReason::Original))
    }
}
