//! Articles: the raw feed entry, its normalized form and the stored record.

mod construct;
mod entry;
mod types;

pub use self::construct::{construct_article, should_skip, should_skip_with};
pub use self::entry::FeedEntry;
pub use self::types::{Article, ArticleFlags, ClusterLink, NewArticle};
