use tracing::{debug, instrument};

use super::article::{article_from_row, ARTICLE_COLUMNS};
use super::cluster::{cluster_from_row, CLUSTER_COLUMNS};
use super::core::{encode_time, SqliteTx};
use super::feed::feed_from_row;
use crate::article::{Article, ArticleFlags, ClusterLink, NewArticle};
use crate::clustering::{Cluster, ClusterScope, NewCluster};
use crate::feed::Feed;
use crate::repository::{Repository, RepositoryError};
use crate::TARGET_DB;

impl SqliteTx {
    /// Most recent clustered article of `scope` whose `column` equals `value`.
    async fn most_recent_clustered(
        &mut self,
        column: &'static str,
        scope: &ClusterScope,
        value: &str,
        exclude_id: i64,
    ) -> Result<Option<Article>, RepositoryError> {
        let row = sqlx::query(&format!(
            r#"
            SELECT {} FROM articles
            WHERE user_id = ? AND (? IS NULL OR category_id = ?)
              AND cluster_id IS NOT NULL AND id != ? AND {} = ?
            ORDER BY retrieved_date DESC, id DESC
            LIMIT 1
            "#,
            ARTICLE_COLUMNS, column
        ))
        .bind(scope.user_id)
        .bind(scope.category_id)
        .bind(scope.category_id)
        .bind(exclude_id)
        .bind(value)
        .fetch_optional(&mut *self.tx)
        .await?;

        row.as_ref().map(article_from_row).transpose()
    }
}

impl Repository for SqliteTx {
    #[instrument(target = "db", level = "debug", skip(self))]
    async fn get_feed(&mut self, feed_id: i64) -> Result<Option<Feed>, RepositoryError> {
        let row = sqlx::query(
            r#"
            SELECT f.id, f.user_id, f.category_id, f.title, f.filters,
                   (f.cluster_on_title OR COALESCE(c.cluster_on_title, 0)) AS cluster_on_title
            FROM feeds f
            LEFT JOIN categories c ON c.id = f.category_id
            WHERE f.id = ?
            "#,
        )
        .bind(feed_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        row.as_ref().map(feed_from_row).transpose()
    }

    #[instrument(target = "db", level = "debug", skip(self))]
    async fn get_article(&mut self, article_id: i64) -> Result<Option<Article>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {} FROM articles WHERE id = ?", ARTICLE_COLUMNS))
            .bind(article_id)
            .fetch_optional(&mut *self.tx)
            .await?;

        row.as_ref().map(article_from_row).transpose()
    }

    #[instrument(target = "db", level = "debug", skip(self))]
    async fn find_candidate_articles(
        &mut self,
        user_id: i64,
        category_id: Option<i64>,
        limit: usize,
    ) -> Result<Vec<Article>, RepositoryError> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {} FROM articles
            WHERE user_id = ? AND (? IS NULL OR category_id = ?)
            ORDER BY retrieved_date DESC, id DESC
            LIMIT ?
            "#,
            ARTICLE_COLUMNS
        ))
        .bind(user_id)
        .bind(category_id)
        .bind(category_id)
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&mut *self.tx)
        .await?;

        debug!(target: TARGET_DB, "Loaded {} candidate articles for user {}", rows.len(), user_id);
        rows.iter().map(article_from_row).collect()
    }

    async fn find_clustered_by_link(
        &mut self,
        scope: &ClusterScope,
        link: &str,
        exclude_id: i64,
    ) -> Result<Option<Article>, RepositoryError> {
        self.most_recent_clustered("link", scope, link, exclude_id).await
    }

    async fn find_clustered_by_entry_id(
        &mut self,
        scope: &ClusterScope,
        entry_id: &str,
        exclude_id: i64,
    ) -> Result<Option<Article>, RepositoryError> {
        self.most_recent_clustered("entry_id", scope, entry_id, exclude_id).await
    }

    async fn find_clustered_by_title(
        &mut self,
        scope: &ClusterScope,
        title: &str,
        exclude_id: i64,
    ) -> Result<Option<Article>, RepositoryError> {
        self.most_recent_clustered("title", scope, title, exclude_id).await
    }

    #[instrument(target = "db", level = "debug", skip(self, article), fields(entry_id = %article.entry_id))]
    async fn create_article(
        &mut self,
        user_id: i64,
        feed_id: i64,
        article: NewArticle,
    ) -> Result<Article, RepositoryError> {
        let tags = serde_json::to_string(&article.tags)?;
        let tokens = serde_json::to_string(&article.valuable_tokens)?;
        let result = sqlx::query(
            r#"
            INSERT INTO articles (user_id, feed_id, category_id, entry_id, link, title, content,
                comments, lang, date, retrieved_date, readability_parsed, tags, valuable_tokens)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
            "#,
        )
        .bind(user_id)
        .bind(feed_id)
        .bind(article.category_id)
        .bind(&article.entry_id)
        .bind(&article.link)
        .bind(&article.title)
        .bind(&article.content)
        .bind(&article.comments)
        .bind(&article.lang)
        .bind(encode_time(&article.date))
        .bind(encode_time(&article.retrieved_date))
        .bind(article.readability_parsed)
        .bind(&tags)
        .bind(&tokens)
        .execute(&mut *self.tx)
        .await?;

        let id = result.last_insert_rowid();
        debug!(target: TARGET_DB, "Article created with id {}", id);
        Ok(Article::from_new(id, user_id, feed_id, article))
    }

    #[instrument(target = "db", level = "debug", skip(self))]
    async fn update_article_cluster(&mut self, article_id: i64, link: &ClusterLink) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r#"
            UPDATE articles
            SET cluster_id = ?, cluster_reason = ?, cluster_score = ?,
                cluster_tfidf_with = ?, cluster_tfidf_neighbor_size = ?
            WHERE id = ?
            "#,
        )
        .bind(link.cluster_id)
        .bind(link.cluster_reason.map(|reason| reason.as_str()))
        .bind(link.cluster_score)
        .bind(link.cluster_tfidf_with)
        .bind(link.cluster_tfidf_neighbor_size)
        .bind(article_id)
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound {
                entity: "article",
                id: article_id,
            });
        }
        Ok(())
    }

    #[instrument(target = "db", level = "debug", skip(self))]
    async fn update_article_flags(&mut self, article_id: i64, flags: ArticleFlags) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE articles SET read = COALESCE(?, read), liked = (liked OR ?) WHERE id = ?",
        )
        .bind(flags.read)
        .bind(flags.liked)
        .bind(article_id)
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound {
                entity: "article",
                id: article_id,
            });
        }
        Ok(())
    }

    #[instrument(target = "db", level = "debug", skip(self))]
    async fn delete_article(&mut self, article_id: i64) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM articles WHERE id = ?")
            .bind(article_id)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    #[instrument(target = "db", level = "debug", skip_all, fields(main_article_id = cluster.main_article_id))]
    async fn create_cluster(&mut self, cluster: NewCluster) -> Result<Cluster, RepositoryError> {
        let result = sqlx::query(
            r#"
            INSERT INTO clusters (user_id, main_article_id, main_title, main_link, main_date, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(cluster.user_id)
        .bind(cluster.main_article_id)
        .bind(&cluster.main_title)
        .bind(&cluster.main_link)
        .bind(encode_time(&cluster.main_date))
        .bind(encode_time(&cluster.created_at))
        .execute(&mut *self.tx)
        .await?;

        Ok(Cluster {
            id: result.last_insert_rowid(),
            user_id: cluster.user_id,
            main_article_id: Some(cluster.main_article_id),
            main_title: cluster.main_title,
            main_link: cluster.main_link,
            main_date: cluster.main_date,
            created_at: cluster.created_at,
        })
    }

    #[instrument(target = "db", level = "debug", skip_all, fields(cluster_id = cluster.id))]
    async fn save_cluster(&mut self, cluster: Cluster) -> Result<Cluster, RepositoryError> {
        let result = sqlx::query(
            r#"
            UPDATE clusters
            SET main_article_id = ?, main_title = ?, main_link = ?, main_date = ?
            WHERE id = ?
            "#,
        )
        .bind(cluster.main_article_id)
        .bind(&cluster.main_title)
        .bind(&cluster.main_link)
        .bind(encode_time(&cluster.main_date))
        .bind(cluster.id)
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound {
                entity: "cluster",
                id: cluster.id,
            });
        }
        Ok(cluster)
    }

    #[instrument(target = "db", level = "debug", skip(self))]
    async fn get_cluster(&mut self, cluster_id: i64) -> Result<Option<Cluster>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {} FROM clusters WHERE id = ?", CLUSTER_COLUMNS))
            .bind(cluster_id)
            .fetch_optional(&mut *self.tx)
            .await?;

        row.as_ref().map(cluster_from_row).transpose()
    }

    #[instrument(target = "db", level = "debug", skip(self))]
    async fn cluster_members(&mut self, cluster_id: i64) -> Result<Vec<Article>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM articles WHERE cluster_id = ? ORDER BY id",
            ARTICLE_COLUMNS
        ))
        .bind(cluster_id)
        .fetch_all(&mut *self.tx)
        .await?;

        rows.iter().map(article_from_row).collect()
    }

    #[instrument(target = "db", level = "debug", skip(self))]
    async fn delete_cluster(&mut self, cluster_id: i64) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM clusters WHERE id = ?")
            .bind(cluster_id)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn commit(self) -> Result<(), RepositoryError> {
        self.tx.commit().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clustering::{ClusterEngine, ClusterReason};
    use crate::db::Database;
    use crate::filters::{FilterAction, FilterKind, FilterTrigger, RawFilterRule};
    use crate::repository::Store;
    use chrono::{SubsecRound, Utc};

    fn draft(category_id: Option<i64>, entry_id: &str) -> NewArticle {
        // stored timestamps keep microseconds
        let now = Utc::now().trunc_subsecs(6);
        NewArticle {
            feed_id: None,
            user_id: None,
            category_id,
            entry_id: entry_id.to_string(),
            link: Some(format!("https://example.com/{}", entry_id)),
            title: Some(format!("Title {}", entry_id)),
            content: Some("content".to_string()),
            comments: None,
            lang: Some("en".to_string()),
            date: now,
            retrieved_date: now,
            readability_parsed: true,
            tags: vec!["space".to_string()],
            valuable_tokens: ["moon", "launch"].iter().map(|t| t.to_string()).collect(),
        }
    }

    #[tokio::test]
    async fn test_feed_round_trip() {
        let db = Database::in_memory().await.unwrap();
        let category = db.add_category(1, "news", true).await.unwrap();
        let rules = vec![RawFilterRule::new(
            FilterAction::Skip,
            FilterTrigger::OnMatch,
            FilterKind::TagExactMatch,
            "sponsored",
        )];
        let feed = db.add_feed(1, Some(category.id), "Daily", rules.clone()).await.unwrap();

        let mut tx = db.begin().await.unwrap();
        let loaded = tx.get_feed(feed.id).await.unwrap().unwrap();
        assert_eq!(loaded.filters, rules);
        // inherited from the category
        assert!(loaded.cluster_on_title);
        assert!(tx.get_feed(feed.id + 1).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_article_and_cluster_round_trip() {
        let db = Database::in_memory().await.unwrap();
        let feed = db.add_feed(1, None, "Daily", vec![]).await.unwrap();

        let mut tx = db.begin().await.unwrap();
        let article = tx.create_article(1, feed.id, draft(None, "a")).await.unwrap();
        let engine = ClusterEngine::default();
        let flags = ArticleFlags {
            read: Some(true),
            liked: false,
        };
        let article = engine
            .clusterize(&mut tx, &article, &ClusterScope::user(1), flags)
            .await
            .unwrap();
        tx.commit().await.unwrap();

        let mut tx = db.begin().await.unwrap();
        let loaded = tx.get_article(article.id).await.unwrap().unwrap();
        assert_eq!(loaded.cluster.cluster_reason, Some(ClusterReason::Original));
        assert_eq!(loaded.valuable_tokens, article.valuable_tokens);
        assert_eq!(loaded.tags, vec!["space".to_string()]);
        assert!(loaded.read && !loaded.liked);
        assert_eq!(loaded.date, article.date);

        let cluster = tx.get_cluster(loaded.cluster_id().unwrap()).await.unwrap().unwrap();
        assert_eq!(cluster.main_article_id, Some(article.id));
        assert_eq!(tx.cluster_members(cluster.id).await.unwrap(), vec![loaded.clone()]);

        let mut second = draft(None, "b");
        second.link = loaded.link.clone();
        let second = tx.create_article(1, feed.id, second).await.unwrap();
        let second = engine
            .clusterize(&mut tx, &second, &ClusterScope::user(1), ArticleFlags::default())
            .await
            .unwrap();
        assert_eq!(second.cluster.cluster_reason, Some(ClusterReason::Link));
        assert_eq!(second.cluster_id(), Some(cluster.id));

        engine.detach(&mut tx, &loaded).await.unwrap();
        let cluster = tx.get_cluster(cluster.id).await.unwrap().unwrap();
        assert_eq!(cluster.main_article_id, Some(second.id));
        tx.commit().await.unwrap();

        assert_eq!(db.list_clusters(1, 10).await.unwrap().len(), 1);
        assert_eq!(db.recent_articles(1, 10).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_uncommitted_transaction_rolls_back() {
        let db = Database::in_memory().await.unwrap();
        let feed = db.add_feed(1, None, "Daily", vec![]).await.unwrap();
        {
            let mut tx = db.begin().await.unwrap();
            tx.create_article(1, feed.id, draft(None, "a")).await.unwrap();
        }
        assert!(db.recent_articles(1, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_scoped_lookup() {
        let db = Database::in_memory().await.unwrap();
        let news = db.add_category(1, "news", true).await.unwrap();
        let sport = db.add_category(1, "sport", true).await.unwrap();
        let feed = db.add_feed(1, Some(news.id), "Daily", vec![]).await.unwrap();

        let mut tx = db.begin().await.unwrap();
        let article = tx.create_article(1, feed.id, draft(Some(news.id), "a")).await.unwrap();
        tx.update_article_cluster(article.id, &ClusterLink::new(7, ClusterReason::Original))
            .await
            .unwrap();

        let scope = |category_id| ClusterScope {
            user_id: 1,
            category_id: Some(category_id),
            match_titles: true,
        };
        let title = article.title.as_deref().unwrap();
        assert!(tx
            .find_clustered_by_title(&scope(news.id), title, 0)
            .await
            .unwrap()
            .is_some());
        assert!(tx
            .find_clustered_by_title(&scope(sport.id), title, 0)
            .await
            .unwrap()
            .is_none());
        assert!(tx
            .find_clustered_by_title(&scope(news.id), title, article.id)
            .await
            .unwrap()
            .is_none());
        assert!(tx
            .find_clustered_by_entry_id(&ClusterScope::user(1), "a", 0)
            .await
            .unwrap()
            .is_some());
        assert!(tx
            .find_clustered_by_link(&ClusterScope::user(2), article.link.as_deref().unwrap(), 0)
            .await
            .unwrap()
            .is_none());
    }
}
