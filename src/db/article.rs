use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use tracing::instrument;

use super::core::{decode_time, Database};
use crate::article::{Article, ClusterLink};
use crate::clustering::ClusterReason;
use crate::repository::RepositoryError;

pub(crate) const ARTICLE_COLUMNS: &str = "id, user_id, feed_id, category_id, entry_id, link, title, \
     content, comments, lang, date, retrieved_date, readability_parsed, tags, valuable_tokens, \
     read, liked, cluster_id, cluster_reason, cluster_score, cluster_tfidf_with, \
     cluster_tfidf_neighbor_size";

pub(crate) fn article_from_row(row: &SqliteRow) -> Result<Article, RepositoryError> {
    let cluster_reason = match row.try_get::<Option<String>, _>("cluster_reason")? {
        Some(name) => Some(
            ClusterReason::from_name(&name).ok_or(RepositoryError::InvalidValue {
                column: "cluster_reason",
                value: name,
            })?,
        ),
        None => None,
    };

    Ok(Article {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        feed_id: row.try_get("feed_id")?,
        category_id: row.try_get("category_id")?,
        entry_id: row.try_get("entry_id")?,
        link: row.try_get("link")?,
        title: row.try_get("title")?,
        content: row.try_get("content")?,
        comments: row.try_get("comments")?,
        lang: row.try_get("lang")?,
        date: decode_time("date", row.try_get("date")?)?,
        retrieved_date: decode_time("retrieved_date", row.try_get("retrieved_date")?)?,
        readability_parsed: row.try_get("readability_parsed")?,
        tags: serde_json::from_str(&row.try_get::<String, _>("tags")?)?,
        valuable_tokens: serde_json::from_str(&row.try_get::<String, _>("valuable_tokens")?)?,
        read: row.try_get("read")?,
        liked: row.try_get("liked")?,
        cluster: ClusterLink {
            cluster_id: row.try_get("cluster_id")?,
            cluster_reason,
            cluster_score: row.try_get("cluster_score")?,
            cluster_tfidf_with: row.try_get("cluster_tfidf_with")?,
            cluster_tfidf_neighbor_size: row.try_get("cluster_tfidf_neighbor_size")?,
        },
    })
}

impl Database {
    /// Most recently retrieved articles of a user.
    #[instrument(target = "db", level = "debug", skip(self))]
    pub async fn recent_articles(&self, user_id: i64, limit: i64) -> Result<Vec<Article>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM articles WHERE user_id = ? ORDER BY retrieved_date DESC, id DESC LIMIT ?",
            ARTICLE_COLUMNS
        ))
        .bind(user_id)
        .bind(limit)
        .fetch_all(self.pool())
        .await?;

        rows.iter().map(article_from_row).collect()
    }
}
