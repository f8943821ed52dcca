use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{error, info};

use crate::types::{CrawlerError, Result};

/// A service that has to be closed in an orderly way on shutdown.
#[async_trait]
pub trait Close: Send + Sync {
    async fn close(&self) -> Result<()>;
}

/// Registry of services to close when the process shuts down. Close failures
/// do not stop the remaining services; they are aggregated into one error.
#[derive(Default)]
pub struct ShutdownCloser {
    services: Mutex<Vec<(String, Arc<dyn Close>)>>,
}

impl ShutdownCloser {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, name: impl Into<String>, service: Arc<dyn Close>) {
        let name = name.into();
        info!("Registered service for shutdown: {}", name);
        self.services.lock().await.push((name, service));
    }

    pub async fn close_all(&self) -> Result<()> {
        let services: Vec<_> = self.services.lock().await.drain(..).collect();

        let mut failures = String::new();
        for (name, service) in services {
            if let Err(err) = service.close().await {
                error!("Failed to close {}: {}", name, err);
                failures.push_str(&format!("{}: {}\n", name, err));
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(CrawlerError::General(failures))
        }
    }
}
