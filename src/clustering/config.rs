use chrono::Duration;

use crate::environment::get_env_var_or;

/// Tunables of the clustering engine.
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterConfig {
    /// Whether fuzzy matching runs at all; exact matches always do.
    pub tfidf_enabled: bool,
    /// Minimum cosine similarity for a TF-IDF match to be accepted.
    pub tfidf_min_score: f64,
    /// Pools smaller than this are not worth a TF-IDF comparison.
    pub tfidf_min_sample_size: usize,
    /// Upper bound on the number of recent articles compared against.
    pub neighbor_pool_limit: usize,
    /// Candidates must be this close to the article's publish or retrieval date.
    pub time_window: Duration,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            tfidf_enabled: true,
            tfidf_min_score: 0.75,
            tfidf_min_sample_size: 1,
            neighbor_pool_limit: 500,
            time_window: Duration::days(7),
        }
    }
}

impl ClusterConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            tfidf_enabled: get_env_var_or("FEEDFOLD_TFIDF_ENABLED", defaults.tfidf_enabled),
            tfidf_min_score: get_env_var_or("FEEDFOLD_TFIDF_MIN_SCORE", defaults.tfidf_min_score),
            tfidf_min_sample_size: get_env_var_or(
                "FEEDFOLD_TFIDF_MIN_SAMPLE_SIZE",
                defaults.tfidf_min_sample_size,
            ),
            neighbor_pool_limit: get_env_var_or(
                "FEEDFOLD_NEIGHBOR_POOL_LIMIT",
                defaults.neighbor_pool_limit,
            ),
            time_window: Duration::days(get_env_var_or(
                "FEEDFOLD_TIME_WINDOW_DAYS",
                defaults.time_window.num_days(),
            )),
        }
    }

    pub fn with_min_score(mut self, score: f64) -> Self {
        self.tfidf_min_score = score;
        self
    }

    pub fn with_min_sample_size(mut self, size: usize) -> Self {
        self.tfidf_min_sample_size = size;
        self
    }

    pub fn with_tfidf(mut self, enabled: bool) -> Self {
        self.tfidf_enabled = enabled;
        self
    }
}
