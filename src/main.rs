use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use sqlx::PgPool;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use uuid::Uuid;

use feed_crawler::{
    CrawlerConfig, Daemon, FeedPollJob, FetchConfig, HttpFeedFetcher, NotificationEvent,
    PgItemStore, PgSourceStore, ShutdownCloser, SubscriptionManager,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let config = CrawlerConfig::parse();
    info!("Starting feed crawler");

    let db = PgPool::connect(&config.database_url).await?;
    sqlx::migrate!().run(&db).await?;
    info!("Connected to database");

    let manager: Arc<SubscriptionManager<NotificationEvent>> = SubscriptionManager::new(
        config.batch_size,
        Duration::from_secs(config.batch_window_secs),
    );

    let closer = ShutdownCloser::new();
    closer.register("subscription-manager", manager.clone()).await;

    let fetch_config = FetchConfig {
        user_agent: config.user_agent.clone(),
        timeout_seconds: config.request_timeout_secs,
        ..FetchConfig::default()
    };
    let fetcher = Arc::new(HttpFeedFetcher::new(fetch_config)?);

    let job = Arc::new(FeedPollJob::new(
        fetcher,
        Arc::new(PgSourceStore::new(db.clone())),
        Arc::new(PgItemStore::new(db.clone())),
        manager.clone(),
        Duration::from_secs(config.source_throttle_secs),
    ));

    let cancel = CancellationToken::new();

    // Built-in consumer: logs every delivered event as one JSON line. Real
    // consumers register the same way.
    let mut events = manager
        .add_subscriber(cancel.child_token(), Uuid::new_v4().to_string())
        .await?;
    tokio::spawn(async move {
        while let Some(batch) = events.recv().await {
            for event in &batch {
                match serde_json::to_string(event) {
                    Ok(line) => info!("Delivered: {}", line),
                    Err(err) => error!("Can't serialize event {}: {}", event.link, err),
                }
            }
        }
    });

    let mut daemon = Daemon::new(Duration::from_secs(config.poll_interval_secs));
    daemon.register(job);
    let scheduler = daemon.start(cancel.clone());

    tokio::signal::ctrl_c().await?;
    info!("Shutting down");

    cancel.cancel();
    if let Err(err) = closer.close_all().await {
        error!("Shutdown error: {}", err);
    }
    let _ = scheduler.await;

    info!("Feed crawler exited");
    Ok(())
}
