//! Storage boundary of the clustering core.
//!
//! The engine never holds live references between entities, only ids
//! resolved through a [`Repository`]. A repository value *is* a transaction:
//! everything done through it becomes visible on [`Repository::commit`] and
//! is discarded if it is dropped first.

mod memory;

use std::future::Future;
use thiserror::Error;

use crate::article::{Article, ArticleFlags, ClusterLink, NewArticle};
use crate::clustering::{Cluster, ClusterScope, NewCluster};
use crate::feed::Feed;

pub use self::memory::{MemoryState, MemoryStore, MemoryTx};

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("invalid stored value in {column}: {value:?}")]
    InvalidValue { column: &'static str, value: String },
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },
}

/// Opens transactions.
pub trait Store: Send + Sync {
    type Tx: Repository;

    fn begin(&self) -> impl Future<Output = Result<Self::Tx, RepositoryError>> + Send;
}

/// Article, cluster and feed access within one transaction.
pub trait Repository: Send {
    fn get_feed(
        &mut self,
        feed_id: i64,
    ) -> impl Future<Output = Result<Option<Feed>, RepositoryError>> + Send;

    fn get_article(
        &mut self,
        article_id: i64,
    ) -> impl Future<Output = Result<Option<Article>, RepositoryError>> + Send;

    /// Recent articles of a user, optionally of one category only, most
    /// recently retrieved first.
    fn find_candidate_articles(
        &mut self,
        user_id: i64,
        category_id: Option<i64>,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<Article>, RepositoryError>> + Send;

    /// Most recent clustered article of `scope` with this exact link.
    fn find_clustered_by_link(
        &mut self,
        scope: &ClusterScope,
        link: &str,
        exclude_id: i64,
    ) -> impl Future<Output = Result<Option<Article>, RepositoryError>> + Send;

    /// Most recent clustered article of `scope` with this entry id.
    fn find_clustered_by_entry_id(
        &mut self,
        scope: &ClusterScope,
        entry_id: &str,
        exclude_id: i64,
    ) -> impl Future<Output = Result<Option<Article>, RepositoryError>> + Send;

    /// Most recent clustered article of `scope` with this exact title.
    fn find_clustered_by_title(
        &mut self,
        scope: &ClusterScope,
        title: &str,
        exclude_id: i64,
    ) -> impl Future<Output = Result<Option<Article>, RepositoryError>> + Send;

    /// Stores a new article. Ownership fields must already be resolved.
    fn create_article(
        &mut self,
        user_id: i64,
        feed_id: i64,
        article: NewArticle,
    ) -> impl Future<Output = Result<Article, RepositoryError>> + Send;

    fn update_article_cluster(
        &mut self,
        article_id: i64,
        link: &ClusterLink,
    ) -> impl Future<Output = Result<(), RepositoryError>> + Send;

    fn update_article_flags(
        &mut self,
        article_id: i64,
        flags: ArticleFlags,
    ) -> impl Future<Output = Result<(), RepositoryError>> + Send;

    fn delete_article(
        &mut self,
        article_id: i64,
    ) -> impl Future<Output = Result<(), RepositoryError>> + Send;

    fn create_cluster(
        &mut self,
        cluster: NewCluster,
    ) -> impl Future<Output = Result<Cluster, RepositoryError>> + Send;

    fn save_cluster(
        &mut self,
        cluster: Cluster,
    ) -> impl Future<Output = Result<Cluster, RepositoryError>> + Send;

    fn get_cluster(
        &mut self,
        cluster_id: i64,
    ) -> impl Future<Output = Result<Option<Cluster>, RepositoryError>> + Send;

    /// Members of a cluster, oldest first.
    fn cluster_members(
        &mut self,
        cluster_id: i64,
    ) -> impl Future<Output = Result<Vec<Article>, RepositoryError>> + Send;

    /// Deletes the cluster record only; member articles are untouched.
    fn delete_cluster(
        &mut self,
        cluster_id: i64,
    ) -> impl Future<Output = Result<(), RepositoryError>> + Send;

    fn commit(self) -> impl Future<Output = Result<(), RepositoryError>> + Send;
}
