use clap::Parser;

/// Runtime configuration, from CLI flags with environment fallbacks.
#[derive(Debug, Parser)]
#[command(
    name = "feed-crawler",
    about = "Polls feeds, persists new items and notifies subscribers in batches"
)]
pub struct CrawlerConfig {
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: String,

    /// Seconds between poll runs.
    #[arg(long, env = "POLL_INTERVAL_SECS", default_value_t = 300)]
    pub poll_interval_secs: u64,

    /// Delay before each source within a run, to throttle outbound requests.
    #[arg(long, env = "SOURCE_THROTTLE_SECS", default_value_t = 3)]
    pub source_throttle_secs: u64,

    /// A notification batch flushes at this many events...
    #[arg(long, env = "BATCH_SIZE", default_value_t = 10)]
    pub batch_size: usize,

    /// ...or after this many seconds, whichever comes first.
    #[arg(long, env = "BATCH_WINDOW_SECS", default_value_t = 60)]
    pub batch_window_secs: u64,

    #[arg(long, env = "REQUEST_TIMEOUT_SECS", default_value_t = 30)]
    pub request_timeout_secs: u64,

    #[arg(long, env = "USER_AGENT", default_value = "feed-crawler/0.1")]
    pub user_agent: String,
}
