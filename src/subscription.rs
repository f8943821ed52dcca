use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::batching::split_by_batch;
use crate::shutdown::Close;
use crate::types::{CrawlerError, Result};

/// Queue depth of each subscriber's delivery channel. A subscriber that falls
/// further behind than this starts losing batches instead of stalling the
/// broadcaster.
const SUBSCRIBER_QUEUE_DEPTH: usize = 32;

/// Fans batched events out to a dynamic set of subscribers.
///
/// Events pushed through [`notify`](Self::notify) are grouped by
/// [`split_by_batch`] and every batch is sent to each registered subscriber.
/// A subscriber's lifetime is bound to the `CancellationToken` it registered
/// with; once the manager is closed, `notify` becomes a no-op and new
/// registrations are rejected.
pub struct SubscriptionManager<T> {
    subscribers: Arc<Mutex<HashMap<String, mpsc::Sender<Vec<T>>>>>,
    // `None` doubles as the closed flag; dropping the sender lets the batcher
    // drain and the broadcaster exit.
    input: RwLock<Option<mpsc::Sender<T>>>,
}

impl<T: Clone + Send + 'static> SubscriptionManager<T> {
    pub fn new(batch_size: usize, batch_window: Duration) -> Arc<Self> {
        let (input_tx, input_rx) = mpsc::channel(1);
        let mut batches = split_by_batch(input_rx, batch_size, batch_window);

        let subscribers: Arc<Mutex<HashMap<String, mpsc::Sender<Vec<T>>>>> =
            Arc::new(Mutex::new(HashMap::new()));

        let targets = subscribers.clone();
        tokio::spawn(async move {
            while let Some(events) = batches.recv().await {
                let targets = targets.lock().await;
                info!(
                    "Sending {} events to {} subscribers",
                    events.len(),
                    targets.len()
                );

                for (id, subscriber) in targets.iter() {
                    match subscriber.try_send(events.clone()) {
                        Ok(()) => {}
                        Err(TrySendError::Full(_)) => {
                            warn!("Subscriber {} is not keeping up, dropping batch", id);
                        }
                        Err(TrySendError::Closed(_)) => {
                            debug!("Subscriber {} is gone, skipping", id);
                        }
                    }
                }
            }
        });

        Arc::new(Self {
            subscribers,
            input: RwLock::new(Some(input_tx)),
        })
    }

    /// Enqueues events for batching, in call order. Silently drops everything
    /// once the manager is closed. May suspend until the batcher has room.
    pub async fn notify(&self, events: Vec<T>) {
        let input = self.input.read().await;
        let Some(input) = input.as_ref() else {
            return;
        };

        for event in events {
            if input.send(event).await.is_err() {
                return;
            }
        }
    }

    /// Registers a new subscriber under `id` and returns the read side of its
    /// delivery channel. The caller picks the id; re-registering an existing
    /// id replaces the old entry without draining it. A watcher task removes
    /// the subscriber when `cancel` fires.
    pub async fn add_subscriber(
        self: &Arc<Self>,
        cancel: CancellationToken,
        id: impl Into<String>,
    ) -> Result<mpsc::Receiver<Vec<T>>> {
        let input = self.input.read().await;
        if input.is_none() {
            return Err(CrawlerError::SubscriptionClosed);
        }

        let id = id.into();
        let (tx, rx) = mpsc::channel(SUBSCRIBER_QUEUE_DEPTH);

        {
            let mut subscribers = self.subscribers.lock().await;
            if subscribers.insert(id.clone(), tx).is_some() {
                warn!("Replaced existing subscriber {}", id);
            }
        }
        info!("Added new subscriber {}", id);

        let manager = Arc::downgrade(self);
        let watched_id = id.clone();
        tokio::spawn(async move {
            cancel.cancelled().await;
            if let Some(manager) = manager.upgrade() {
                manager.remove_subscriber(&watched_id).await;
            }
        });

        Ok(rx)
    }

    /// Idempotent: drops the subscriber's delivery channel (closing the read
    /// side) and forgets the id.
    pub async fn remove_subscriber(&self, id: &str) {
        let mut subscribers = self.subscribers.lock().await;
        if subscribers.remove(id).is_some() {
            info!("Removed subscriber {}", id);
        }
    }

    /// Marks the manager closed, severs every subscriber and shuts the
    /// batching pipeline down. Later `notify` calls are no-ops and
    /// `add_subscriber` calls fail.
    pub async fn close(&self) -> Result<()> {
        let mut input = self.input.write().await;

        let mut subscribers = self.subscribers.lock().await;
        let severed = subscribers.len();
        subscribers.clear();
        drop(subscribers);

        input.take();
        info!("Subscription manager closed, severed {} subscribers", severed);

        Ok(())
    }
}

#[async_trait::async_trait]
impl<T: Clone + Send + Sync + 'static> Close for SubscriptionManager<T> {
    async fn close(&self) -> Result<()> {
        SubscriptionManager::close(self).await
    }
}
