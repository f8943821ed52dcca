use std::time::Duration;

use async_trait::async_trait;
use backoff::{backoff::Backoff, exponential::ExponentialBackoff};
use chrono::Utc;
use feed_rs::parser;
use reqwest::Client;
use tracing::{debug, info, warn};
use url::Url;

use crate::types::{CrawlerError, FetchConfig, FetchedFeed, RawItem, Result};

/// Turns a source URL into a feed title and its raw items. The poll job only
/// sees this trait; the wire format behind it is pluggable.
#[async_trait]
pub trait FeedFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchedFeed>;
}

/// RSS/Atom fetcher over HTTP: shared client, retry with exponential backoff,
/// feed-rs for parsing.
pub struct HttpFeedFetcher {
    client: Client,
    config: FetchConfig,
}

impl HttpFeedFetcher {
    pub fn new(config: FetchConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_seconds))
            .gzip(true)
            .deflate(true)
            .brotli(true)
            .build()?;

        Ok(Self { client, config })
    }

    async fn fetch_body(&self, url: &str) -> Result<String> {
        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(CrawlerError::General(format!(
                "HTTP {}: {}",
                status,
                status.canonical_reason().unwrap_or("Unknown")
            )));
        }

        Ok(response.text().await?)
    }

    async fn fetch_with_retry(&self, url: &str) -> Result<String> {
        let retry_delay = Duration::from_secs(self.config.retry_delay_seconds);
        let mut backoff: ExponentialBackoff<backoff::SystemClock> = ExponentialBackoff {
            current_interval: retry_delay,
            initial_interval: retry_delay,
            max_interval: retry_delay * 32,
            multiplier: 2.0,
            max_elapsed_time: Some(retry_delay * 60),
            ..Default::default()
        };

        let mut attempt = 0;
        loop {
            match self.fetch_body(url).await {
                Ok(body) => return Ok(body),
                Err(err) => {
                    attempt += 1;
                    if attempt > self.config.max_retries {
                        return Err(err);
                    }

                    let Some(delay) = backoff.next_backoff() else {
                        return Err(err);
                    };
                    warn!("Attempt {} failed for {}, retrying in {:?}", attempt, url, delay);
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

#[async_trait]
impl FeedFetcher for HttpFeedFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedFeed> {
        let parsed = Url::parse(url)?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(CrawlerError::General(format!(
                "Unsupported scheme in feed URL: {}",
                url
            )));
        }

        debug!("Fetching feed: {}", url);
        let body = self.fetch_with_retry(url).await?;

        let feed = parser::parse(body.as_bytes())
            .map_err(|e| CrawlerError::Parse(format!("Failed to parse feed {}: {}", url, e)))?;

        let title = feed.title.map(|t| t.content);
        let items: Vec<RawItem> = feed.entries.into_iter().filter_map(raw_item).collect();

        info!("Fetched {} entries from {}", items.len(), url);

        Ok(FetchedFeed { title, items })
    }
}

fn raw_item(entry: feed_rs::model::Entry) -> Option<RawItem> {
    // An entry without a link can't be keyed, so it's useless to us.
    let link = entry.links.first()?.href.clone();

    let title = entry
        .title
        .map(|t| t.content)
        .unwrap_or_else(|| "Untitled".to_string());
    let description = entry
        .summary
        .map(|s| s.content)
        .unwrap_or_default();
    let content = entry
        .content
        .and_then(|c| c.body)
        .unwrap_or_else(|| description.clone());
    let author = entry
        .authors
        .first()
        .map(|a| a.name.clone())
        .unwrap_or_default();
    let image = entry
        .media
        .first()
        .and_then(|m| m.thumbnails.first())
        .map(|t| t.image.uri.clone())
        .unwrap_or_default();
    let published_at = entry.published.map(|dt| dt.with_timezone(&Utc));

    Some(RawItem {
        link,
        title,
        description,
        content,
        author,
        image,
        published_at,
    })
}
