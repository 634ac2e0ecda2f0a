//! Contributor History Engine: one author's commits, metrics, trends and reviews.
//!
//! Pipeline: validate repository → resolve the author query to commits →
//! batched per-commit detail (behind an LRU cache) → velocity/impact metrics,
//! calendar trends, or risk-annotated review packets.
//!
//! git is reached only through [`executor::GitExecutor`]; everything else is
//! in-memory computation.

pub mod batch;
pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod executor;
pub mod metrics;
pub mod repo;
pub mod resolver;
pub mod review;
pub mod scope;
pub mod stats;
pub mod trends;
pub mod types;

pub use cache::CommitCache;
pub use config::Config;
pub use error::{EngineError, ErrorCode, ErrorOutput};
pub use executor::{GitExecutor, GitStream, SystemGit};
pub use metrics::MetricsAggregator;
pub use repo::Repository;
pub use resolver::{AuthorQuery, AuthorResolver};
pub use review::ReviewBuilder;
pub use scope::PathScope;
pub use trends::{Period, TrendCalculator};
pub use types::{Commit, Report, VelocityMetrics};
