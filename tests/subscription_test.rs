use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use feed_crawler::types::{CrawlerError, Result};
use feed_crawler::{Close, ShutdownCloser, SubscriptionManager};
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn delivers_batched_events_to_subscriber() {
    let manager = SubscriptionManager::new(10, Duration::from_secs(60));
    let cancel = CancellationToken::new();
    let mut events = manager
        .add_subscriber(cancel, "subscriber-1")
        .await
        .unwrap();

    let items: Vec<i32> = (1..=10).collect();
    manager.notify(items.clone()).await;

    let received = events.recv().await.unwrap();
    assert_eq!(received, items);
}

#[tokio::test]
async fn broadcasts_each_batch_to_every_subscriber() {
    let manager = SubscriptionManager::new(3, Duration::from_secs(60));
    let cancel = CancellationToken::new();
    let mut first = manager
        .add_subscriber(cancel.clone(), "subscriber-1")
        .await
        .unwrap();
    let mut second = manager
        .add_subscriber(cancel.clone(), "subscriber-2")
        .await
        .unwrap();

    manager.notify(vec![1, 2, 3]).await;

    assert_eq!(first.recv().await.unwrap(), vec![1, 2, 3]);
    assert_eq!(second.recv().await.unwrap(), vec![1, 2, 3]);
}

#[tokio::test]
async fn close_severs_subscribers_and_rejects_new_ones() {
    let manager = SubscriptionManager::new(10, Duration::from_secs(60));
    let cancel = CancellationToken::new();
    let mut events = manager
        .add_subscriber(cancel, "subscriber-1")
        .await
        .unwrap();

    manager.close().await.unwrap();

    assert!(events.recv().await.is_none(), "channel should be closed");

    // No-op after close; must not panic or block.
    manager.notify(vec![1, 2, 3]).await;

    let err = manager
        .add_subscriber(CancellationToken::new(), "subscriber-2")
        .await
        .unwrap_err();
    assert!(matches!(err, CrawlerError::SubscriptionClosed));
}

#[tokio::test]
async fn cancelled_scope_removes_subscriber() {
    let manager: Arc<SubscriptionManager<i32>> =
        SubscriptionManager::new(3, Duration::from_millis(20));
    let cancel = CancellationToken::new();
    let mut events = manager
        .add_subscriber(cancel.clone(), "subscriber-1")
        .await
        .unwrap();

    cancel.cancel();

    assert!(
        events.recv().await.is_none(),
        "removal should close the delivery channel"
    );
}

#[tokio::test]
async fn reregistering_an_id_replaces_the_old_entry() {
    let manager = SubscriptionManager::new(2, Duration::from_secs(60));
    let cancel = CancellationToken::new();
    let mut first = manager.add_subscriber(cancel.clone(), "dup").await.unwrap();
    let mut second = manager.add_subscriber(cancel.clone(), "dup").await.unwrap();

    manager.notify(vec![1, 2]).await;

    assert_eq!(second.recv().await.unwrap(), vec![1, 2]);
    assert!(
        first.recv().await.is_none(),
        "the replaced channel should be closed"
    );
}

#[tokio::test]
async fn remove_subscriber_is_idempotent() {
    let manager: Arc<SubscriptionManager<i32>> =
        SubscriptionManager::new(2, Duration::from_secs(60));
    let mut events = manager
        .add_subscriber(CancellationToken::new(), "gone")
        .await
        .unwrap();

    manager.remove_subscriber("gone").await;
    manager.remove_subscriber("gone").await;

    assert!(events.recv().await.is_none());
}

struct FlakyService {
    healthy: bool,
    closed: Arc<AtomicBool>,
}

#[async_trait]
impl Close for FlakyService {
    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        if self.healthy {
            Ok(())
        } else {
            Err(CrawlerError::General("refused to close".to_string()))
        }
    }
}

#[tokio::test]
async fn shutdown_closer_closes_everything_and_aggregates_failures() {
    let closer = ShutdownCloser::new();

    let healthy_closed = Arc::new(AtomicBool::new(false));
    let broken_closed = Arc::new(AtomicBool::new(false));

    closer
        .register(
            "healthy",
            Arc::new(FlakyService {
                healthy: true,
                closed: healthy_closed.clone(),
            }),
        )
        .await;
    closer
        .register(
            "broken",
            Arc::new(FlakyService {
                healthy: false,
                closed: broken_closed.clone(),
            }),
        )
        .await;

    let err = closer.close_all().await.unwrap_err();

    assert!(healthy_closed.load(Ordering::SeqCst));
    assert!(broken_closed.load(Ordering::SeqCst));
    assert!(err.to_string().contains("broken"));

    // The registry drains on close; a second pass has nothing left to fail.
    assert!(closer.close_all().await.is_ok());
}

#[tokio::test]
async fn manager_registered_with_the_closer_shuts_down_cleanly() {
    let manager: Arc<SubscriptionManager<i32>> =
        SubscriptionManager::new(2, Duration::from_secs(60));

    let closer = ShutdownCloser::new();
    closer.register("subscription-manager", manager.clone()).await;

    closer.close_all().await.unwrap();

    let err = manager
        .add_subscriber(CancellationToken::new(), "late")
        .await
        .unwrap_err();
    assert!(matches!(err, CrawlerError::SubscriptionClosed));
}
