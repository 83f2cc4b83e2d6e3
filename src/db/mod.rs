// SQLite persistence: the Database pool and its transactional repository
mod article;
mod cluster;
pub mod core;
mod feed;
mod repository;
mod schema;

pub use self::core::{Database, DbLockErrorExt, SqliteTx};
pub use sqlx::Row;
