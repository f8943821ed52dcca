use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::types::Result;

/// A unit of background work the daemon runs on its cadence.
#[async_trait]
pub trait Job: Send + Sync {
    fn description(&self) -> &str;
    async fn execute(&self) -> Result<()>;
}

/// Runs every registered job on a fixed interval until cancelled. The first
/// round runs immediately; a failed run is logged and the cadence continues.
pub struct Daemon {
    interval: Duration,
    jobs: Vec<Arc<dyn Job>>,
}

impl Daemon {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            jobs: Vec::new(),
        }
    }

    pub fn register(&mut self, job: Arc<dyn Job>) {
        info!("Registered job: {}", job.description());
        self.jobs.push(job);
    }

    pub fn start(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(self.interval);
            tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tick.tick() => {
                        for job in &self.jobs {
                            if let Err(err) = job.execute().await {
                                error!("Job {} failed: {}", job.description(), err);
                            }
                        }
                    }
                }
            }

            info!("Scheduler stopped");
        })
    }
}
