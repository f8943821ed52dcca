use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A polled feed. `url` is the natural key; `published` is the watermark:
/// the latest item timestamp (plus one second) already delivered for this
/// source. Only the poll job moves it, and only forward.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Source {
    pub url: String,
    pub title: String,
    pub active: bool,
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
    pub published: DateTime<Utc>,
}

/// A discovered feed item, keyed by `link`. Upserts update every mutable
/// field but never the key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Item {
    pub link: String,
    pub resource_id: String,
    pub title: String,
    pub description: String,
    pub content: String,
    pub author: String,
    pub image: String,
    pub created: DateTime<Utc>,
    pub published: DateTime<Utc>,
}

/// A feed entry as the fetcher hands it over, before diffing.
#[derive(Debug, Clone)]
pub struct RawItem {
    pub link: String,
    pub title: String,
    pub description: String,
    pub content: String,
    pub author: String,
    pub image: String,
    pub published_at: Option<DateTime<Utc>>,
}

/// Fetch result for one source URL.
#[derive(Debug, Clone)]
pub struct FetchedFeed {
    pub title: Option<String>,
    pub items: Vec<RawItem>,
}

/// What subscribers receive: an item enriched with its source title at the
/// moment of discovery. Never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationEvent {
    pub resource_id: String,
    pub resource_title: String,
    pub link: String,
    pub title: String,
    pub description: String,
    pub content: String,
    pub author: String,
    pub image: String,
    pub created: DateTime<Utc>,
    pub published: DateTime<Utc>,
}

impl NotificationEvent {
    pub fn new(item: &Item, resource_title: &str) -> Self {
        Self {
            resource_id: item.resource_id.clone(),
            resource_title: resource_title.to_string(),
            link: item.link.clone(),
            title: item.title.clone(),
            description: item.description.clone(),
            content: item.content.clone(),
            author: item.author.clone(),
            image: item.image.clone(),
            created: item.created,
            published: item.published,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub user_agent: String,
    pub timeout_seconds: u64,
    pub max_retries: u32,
    pub retry_delay_seconds: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "feed-crawler/0.1".to_string(),
            timeout_seconds: 30,
            max_retries: 3,
            retry_delay_seconds: 5,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CrawlerError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Feed parse error: {0}")]
    Parse(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Subscription manager closed the connection")]
    SubscriptionClosed,

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("General error: {0}")]
    General(String),
}

pub type Result<T> = std::result::Result<T, CrawlerError>;
