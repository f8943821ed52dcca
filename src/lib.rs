pub mod batching;
pub mod config;
pub mod fetcher;
pub mod poll_job;
pub mod scheduler;
pub mod shutdown;
pub mod storage;
pub mod subscription;
pub mod types;

pub use batching::split_by_batch;
pub use config::CrawlerConfig;
pub use fetcher::{FeedFetcher, HttpFeedFetcher};
pub use poll_job::FeedPollJob;
pub use scheduler::{Daemon, Job};
pub use shutdown::{Close, ShutdownCloser};
pub use storage::{ItemStore, PgItemStore, PgSourceStore, SourceStore};
pub use subscription::SubscriptionManager;
pub use types::*;
