// Module declarations
pub mod config;
pub mod engine;
pub mod locks;
pub mod similarity;
pub mod types;

pub use config::ClusterConfig;
pub use engine::ClusterEngine;
pub use locks::{ScopeGuard, ScopeLocks};
pub use similarity::{best_match, TfIdfMatch};
pub use types::*;
