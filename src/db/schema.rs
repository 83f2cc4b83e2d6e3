use tracing::info;

use super::core::Database;
use crate::TARGET_DB;

impl Database {
    pub(crate) async fn initialize_schema(&self) -> Result<(), sqlx::Error> {
        let mut conn = self.pool().acquire().await?;
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS categories (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                name TEXT NOT NULL,
                cluster_on_title BOOLEAN NOT NULL DEFAULT 0
            );
            CREATE INDEX IF NOT EXISTS idx_categories_user_id ON categories (user_id);

            CREATE TABLE IF NOT EXISTS feeds (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                category_id INTEGER,
                title TEXT NOT NULL,
                filters TEXT NOT NULL DEFAULT '[]', -- JSON list of filter rules
                cluster_on_title BOOLEAN NOT NULL DEFAULT 0,
                FOREIGN KEY (category_id) REFERENCES categories (id) ON DELETE SET NULL
            );
            CREATE INDEX IF NOT EXISTS idx_feeds_user_id ON feeds (user_id);

            -- main_article_id is kept consistent by the clustering engine, not by a foreign key
            CREATE TABLE IF NOT EXISTS clusters (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                main_article_id INTEGER,
                main_title TEXT,
                main_link TEXT,
                main_date TEXT NOT NULL,
                created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_clusters_user_id ON clusters (user_id);

            CREATE TABLE IF NOT EXISTS articles (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                feed_id INTEGER NOT NULL,
                category_id INTEGER,
                entry_id TEXT NOT NULL,
                link TEXT,
                title TEXT,
                content TEXT,
                comments TEXT,
                lang TEXT,
                date TEXT NOT NULL,
                retrieved_date TEXT NOT NULL,
                readability_parsed BOOLEAN NOT NULL DEFAULT 0,
                tags TEXT NOT NULL DEFAULT '[]', -- JSON
                valuable_tokens TEXT NOT NULL DEFAULT '[]', -- JSON
                read BOOLEAN NOT NULL DEFAULT 0,
                liked BOOLEAN NOT NULL DEFAULT 0,
                cluster_id INTEGER,
                cluster_reason TEXT,
                cluster_score REAL,
                cluster_tfidf_with INTEGER,
                cluster_tfidf_neighbor_size INTEGER,
                FOREIGN KEY (feed_id) REFERENCES feeds (id) ON DELETE CASCADE
            );
            CREATE INDEX IF NOT EXISTS idx_articles_user_retrieved ON articles (user_id, retrieved_date);
            CREATE INDEX IF NOT EXISTS idx_articles_user_link ON articles (user_id, link);
            CREATE INDEX IF NOT EXISTS idx_articles_user_entry_id ON articles (user_id, entry_id);
            CREATE INDEX IF NOT EXISTS idx_articles_user_title ON articles (user_id, title);
            CREATE INDEX IF NOT EXISTS idx_articles_cluster_id ON articles (cluster_id);
            "#,
        )
        .execute(&mut *conn)
        .await?;
        info!(target: TARGET_DB, "Tables ensured to exist");

        Ok(())
    }
}
