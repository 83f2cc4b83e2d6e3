use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use tracing::{info, instrument};

use super::core::Database;
use crate::feed::{Category, Feed};
use crate::filters::RawFilterRule;
use crate::repository::RepositoryError;
use crate::TARGET_DB;

/// Expects the `cluster_on_title` column to already combine feed and category.
pub(crate) fn feed_from_row(row: &SqliteRow) -> Result<Feed, RepositoryError> {
    Ok(Feed {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        category_id: row.try_get("category_id")?,
        title: row.try_get("title")?,
        filters: serde_json::from_str(&row.try_get::<String, _>("filters")?)?,
        cluster_on_title: row.try_get::<i64, _>("cluster_on_title")? != 0,
    })
}

impl Database {
    #[instrument(target = "db", level = "info", skip(self))]
    pub async fn add_category(
        &self,
        user_id: i64,
        name: &str,
        cluster_on_title: bool,
    ) -> Result<Category, RepositoryError> {
        let result = sqlx::query(
            "INSERT INTO categories (user_id, name, cluster_on_title) VALUES (?, ?, ?)",
        )
        .bind(user_id)
        .bind(name)
        .bind(cluster_on_title)
        .execute(self.pool())
        .await?;

        let category = Category {
            id: result.last_insert_rowid(),
            user_id,
            name: name.to_string(),
            cluster_on_title,
        };
        info!(target: TARGET_DB, "Added category {} ({})", category.id, category.name);
        Ok(category)
    }

    #[instrument(target = "db", level = "info", skip(self, filters))]
    pub async fn add_feed(
        &self,
        user_id: i64,
        category_id: Option<i64>,
        title: &str,
        filters: Vec<RawFilterRule>,
    ) -> Result<Feed, RepositoryError> {
        let encoded = serde_json::to_string(&filters)?;
        let result = sqlx::query(
            "INSERT INTO feeds (user_id, category_id, title, filters) VALUES (?, ?, ?, ?)",
        )
        .bind(user_id)
        .bind(category_id)
        .bind(title)
        .bind(&encoded)
        .execute(self.pool())
        .await?;

        // a feed clusters on titles whenever its category does
        let cluster_on_title = match category_id {
            Some(category_id) => sqlx::query_scalar::<_, i64>(
                "SELECT cluster_on_title FROM categories WHERE id = ?",
            )
            .bind(category_id)
            .fetch_optional(self.pool())
            .await?
            .map_or(false, |flag| flag != 0),
            None => false,
        };

        let feed = Feed {
            id: result.last_insert_rowid(),
            user_id,
            category_id,
            title: title.to_string(),
            filters,
            cluster_on_title,
        };
        info!(
            target: TARGET_DB,
            "Added feed {} ({}) with {} filters", feed.id, feed.title, feed.filters.len()
        );
        Ok(feed)
    }
}
