use std::sync::Arc;
use std::time::Instant;

use tokio::sync::broadcast;

use crate::config::Config;
use crate::store::Store;
use crate::stream::{ChangeFeed, StreamHandler};

#[derive(Clone)]
pub struct AppState {
    store: Arc<Store>,
    config: Arc<Config>,
    feed: ChangeFeed,
    stream: StreamHandler,
    shutdown_tx: broadcast::Sender<()>,
    started_at: Instant,
}

impl AppState {
    pub fn new(
        store: Arc<Store>,
        config: &Config,
        feed: ChangeFeed,
        shutdown_tx: broadcast::Sender<()>,
    ) -> Self {
        Self {
            stream: StreamHandler::new(store.clone()),
            store,
            config: Arc::new(config.clone()),
            feed,
            shutdown_tx,
            started_at: Instant::now(),
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Where work CRUD publishes the changes it makes to the works tree.
    pub fn feed(&self) -> &ChangeFeed {
        &self.feed
    }

    pub fn stream(&self) -> &StreamHandler {
        &self.stream
    }

    pub fn shutdown_rx(&self) -> broadcast::Receiver<()> {
        self.shutdown_tx.subscribe()
    }

    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}
