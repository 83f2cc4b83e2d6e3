use serde::{Deserialize, Serialize};

use crate::filters::RawFilterRule;

/// A user's grouping of feeds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    /// Restricts clustering to the category and enables exact-title matching.
    pub cluster_on_title: bool,
}

/// The owning feed of incoming entries, as far as filtering and clustering care.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feed {
    pub id: i64,
    pub user_id: i64,
    pub category_id: Option<i64>,
    pub title: String,
    #[serde(default)]
    pub filters: Vec<RawFilterRule>,
    /// Inherited from the category when the feed is loaded from storage.
    #[serde(default)]
    pub cluster_on_title: bool,
}
