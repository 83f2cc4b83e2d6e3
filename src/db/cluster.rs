use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use tracing::instrument;

use super::core::{decode_time, Database};
use crate::clustering::Cluster;
use crate::repository::RepositoryError;

pub(crate) const CLUSTER_COLUMNS: &str =
    "id, user_id, main_article_id, main_title, main_link, main_date, created_at";

pub(crate) fn cluster_from_row(row: &SqliteRow) -> Result<Cluster, RepositoryError> {
    Ok(Cluster {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        main_article_id: row.try_get("main_article_id")?,
        main_title: row.try_get("main_title")?,
        main_link: row.try_get("main_link")?,
        main_date: decode_time("main_date", row.try_get("main_date")?)?,
        created_at: decode_time("created_at", row.try_get("created_at")?)?,
    })
}

impl Database {
    /// A user's clusters, newest story first.
    #[instrument(target = "db", level = "debug", skip(self))]
    pub async fn list_clusters(&self, user_id: i64, limit: i64) -> Result<Vec<Cluster>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM clusters WHERE user_id = ? ORDER BY main_date DESC, id DESC LIMIT ?",
            CLUSTER_COLUMNS
        ))
        .bind(user_id)
        .bind(limit)
        .fetch_all(self.pool())
        .await?;

        rows.iter().map(cluster_from_row).collect()
    }
}
