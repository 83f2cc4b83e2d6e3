pub mod article;
pub mod clustering;
pub mod db;
pub mod environment;
pub mod feed;
pub mod filters;
pub mod ingest;
pub mod logging;
pub mod repository;
pub mod tokens;

pub const TARGET_DB: &str = "db_query";
pub const TARGET_CLUSTER: &str = "cluster";
pub const TARGET_FILTER: &str = "filter";
pub const TARGET_INGEST: &str = "ingest";
