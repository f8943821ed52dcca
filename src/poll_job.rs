use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, info, warn};

use crate::fetcher::FeedFetcher;
use crate::scheduler::Job;
use crate::storage::{ItemStore, SourceStore};
use crate::subscription::SubscriptionManager;
use crate::types::{Item, NotificationEvent, Result, Source};

/// One scheduled pass over all active sources: fetch, diff against each
/// source's watermark, notify subscribers about the survivors, persist them
/// and advance the watermark.
///
/// A fetch or parse failure skips that source for this run only. A store
/// failure aborts the remainder of the run. Notification happens before
/// persistence, so a crash mid-persist re-notifies on the next run while the
/// upsert keeps storage deduplicated.
pub struct FeedPollJob {
    fetcher: Arc<dyn FeedFetcher>,
    sources: Arc<dyn SourceStore>,
    items: Arc<dyn ItemStore>,
    manager: Arc<SubscriptionManager<NotificationEvent>>,
    throttle: Duration,
}

impl FeedPollJob {
    pub fn new(
        fetcher: Arc<dyn FeedFetcher>,
        sources: Arc<dyn SourceStore>,
        items: Arc<dyn ItemStore>,
        manager: Arc<SubscriptionManager<NotificationEvent>>,
        throttle: Duration,
    ) -> Self {
        Self {
            fetcher,
            sources,
            items,
            manager,
            throttle,
        }
    }

    async fn process_source(&self, source: &Source) -> Result<()> {
        let (updated, items) = match self.diff_source(source).await {
            Ok(result) => result,
            Err(err) => {
                warn!("Can't parse source {}: {}", source.url, err);
                return Ok(());
            }
        };

        if items.is_empty() {
            debug!("No new items for {}", source.url);
            return Ok(());
        }

        self.notify(&items, &updated).await;

        for item in &items {
            self.items.upsert(item).await?;
            info!("Item saved: {}", item.link);
        }

        self.sources.upsert(&updated).await?;
        info!("Source saved: {}", updated.url);

        Ok(())
    }

    /// Fetches the source and keeps only items published strictly after its
    /// watermark. Returns the refreshed source (watermark pushed one second
    /// past the newest kept item) together with the kept items, in feed
    /// order.
    async fn diff_source(&self, source: &Source) -> Result<(Source, Vec<Item>)> {
        let feed = self.fetcher.fetch(&source.url).await?;
        let now = Utc::now();

        let mut kept = Vec::new();
        let mut max_published = source.published;

        for raw in feed.items {
            let published = raw.published_at.unwrap_or(now);
            if published <= source.published {
                continue;
            }

            if published > max_published {
                max_published = published;
            }

            kept.push(Item {
                link: raw.link,
                resource_id: source.url.clone(),
                title: raw.title,
                description: raw.description,
                content: raw.content,
                author: raw.author,
                image: raw.image,
                created: now,
                published,
            });
        }

        let updated = Source {
            url: source.url.clone(),
            title: feed.title.unwrap_or_else(|| source.title.clone()),
            active: source.active,
            created: source.created,
            modified: now,
            published: max_published + chrono::Duration::seconds(1),
        };

        Ok((updated, kept))
    }

    async fn notify(&self, items: &[Item], source: &Source) {
        let events = items
            .iter()
            .map(|item| NotificationEvent::new(item, &source.title))
            .collect();

        self.manager.notify(events).await;
    }
}

#[async_trait]
impl Job for FeedPollJob {
    fn description(&self) -> &str {
        "feed-poll"
    }

    async fn execute(&self) -> Result<()> {
        let sources = self.sources.list_active().await?;
        if sources.is_empty() {
            warn!("No active sources found");
            return Ok(());
        }

        for source in &sources {
            // Spread outbound requests so feed providers don't get hammered.
            tokio::time::sleep(self.throttle).await;

            self.process_source(source).await?;
        }

        Ok(())
    }
}
