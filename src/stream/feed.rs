//! In-process change stream of the works tree.

use thiserror::Error;
use tokio::sync::{broadcast, mpsc};

use crate::stream::event::ChangeEvent;
use crate::stream::handler::StreamHandler;

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("change feed is closed")]
    Closed,
}

#[derive(Debug, Clone)]
pub struct ChangeFeed {
    tx: mpsc::Sender<ChangeEvent>,
}

impl ChangeFeed {
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<ChangeEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    pub async fn publish(&self, event: ChangeEvent) -> Result<(), FeedError> {
        self.tx.send(event).await.map_err(|_| FeedError::Closed)
    }
}

/// Groups whatever is already queued, up to `batch_size`, behind the first event.
fn drain_batch(
    first: ChangeEvent,
    rx: &mut mpsc::Receiver<ChangeEvent>,
    batch_size: usize,
) -> Vec<ChangeEvent> {
    let mut batch = vec![first];
    while batch.len() < batch_size {
        match rx.try_recv() {
            Ok(event) => batch.push(event),
            Err(_) => break,
        }
    }
    batch
}

/// Feeds batches to the handler until shutdown; events queued at shutdown are still handled.
pub async fn run_consumer(
    mut rx: mpsc::Receiver<ChangeEvent>,
    handler: StreamHandler,
    batch_size: usize,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    let batch_size = batch_size.max(1);
    loop {
        tokio::select! {
            received = rx.recv() => match received {
                Some(first) => {
                    let batch = drain_batch(first, &mut rx, batch_size);
                    tracing::debug!(len = batch.len(), "Change batch drained");
                    handler.handle_batch(batch).await;
                }
                None => break,
            },
            _ = shutdown_rx.recv() => {
                rx.close();
                while let Some(first) = rx.recv().await {
                    let batch = drain_batch(first, &mut rx, batch_size);
                    handler.handle_batch(batch).await;
                }
                break;
            }
        }
    }
    tracing::info!("Change feed consumer stopped");
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use tempfile::tempdir;

    use super::*;
    use crate::store::Store;
    use crate::stream::event::EventName;

    fn noise() -> ChangeEvent {
        ChangeEvent {
            event_name: EventName::Unknown,
            old_image: None,
            new_image: None,
        }
    }

    #[tokio::test]
    async fn drain_respects_batch_size() {
        let (feed, mut rx) = ChangeFeed::channel(8);
        for _ in 0..5 {
            feed.publish(noise()).await.unwrap();
        }
        let first = rx.recv().await.unwrap();
        assert_eq!(drain_batch(first, &mut rx, 3).len(), 3);
        let first = rx.recv().await.unwrap();
        assert_eq!(drain_batch(first, &mut rx, 3).len(), 2);
    }

    #[tokio::test]
    async fn consumer_stops_on_shutdown() {
        let dir = tempdir().unwrap();
        let store = Arc::new(Store::open(dir.path().join("feed-db").to_str().unwrap()).unwrap());
        let (feed, rx) = ChangeFeed::channel(4);
        let (shutdown_tx, _) = broadcast::channel(1);

        let consumer = tokio::spawn(run_consumer(
            rx,
            StreamHandler::new(store),
            10,
            shutdown_tx.subscribe(),
        ));
        feed.publish(noise()).await.unwrap();
        shutdown_tx.send(()).unwrap();

        tokio::time::timeout(Duration::from_secs(5), consumer)
            .await
            .unwrap()
            .unwrap();
        assert!(feed.publish(noise()).await.is_err());
    }
}
