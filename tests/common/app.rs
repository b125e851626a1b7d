use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use tempfile::TempDir;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use labour_ledger::config::{Config, StatsConfig, StreamConfig, WorkerConfig};
use labour_ledger::routes::build_router;
use labour_ledger::state::AppState;
use labour_ledger::store::Store;
use labour_ledger::stream::{run_consumer, ChangeFeed, StreamHandler};

pub struct TestApp {
    pub app: Router,
    pub state: AppState,
    pub store: Arc<Store>,
    pub config: Config,
    shutdown_tx: broadcast::Sender<()>,
    consumer: Option<JoinHandle<()>>,
    _temp_dir: TempDir,
}

impl TestApp {
    /// Stops the change-feed consumer after it has handled everything queued so far.
    pub async fn drain_feed(&mut self) {
        let _ = self.shutdown_tx.send(());
        if let Some(consumer) = self.consumer.take() {
            tokio::time::timeout(Duration::from_secs(10), consumer)
                .await
                .expect("consumer drains in time")
                .expect("consumer task");
        }
    }

    /// Polls until `check` holds, giving the feed consumer time to catch up.
    pub async fn eventually<F>(&self, mut check: F)
    where
        F: FnMut(&Store) -> bool,
    {
        for _ in 0..200 {
            if check(&self.store) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not reached within 2s");
    }
}

pub fn test_config(sled_path: String) -> Config {
    // Built directly: set_var would race between parallel tests.
    Config {
        host: std::net::IpAddr::V4(std::net::Ipv4Addr::new(127, 0, 0, 1)),
        port: 3000,
        log_level: "info".to_string(),
        enable_file_logs: false,
        log_dir: "./logs".to_string(),
        sled_path,
        cors_origin: "http://localhost:5173".to_string(),
        stats: StatsConfig::default(),
        stream: StreamConfig {
            batch_size: 16,
            channel_capacity: 64,
        },
        worker: WorkerConfig {
            is_leader: false,
            enable_day_stats: false,
            enable_dead_letter_alert: false,
        },
    }
}

pub async fn spawn_test_server() -> TestApp {
    let temp_dir = tempfile::tempdir().expect("tempdir");
    let sled_path = temp_dir.path().join("labour-test.sled");
    let config = test_config(sled_path.to_string_lossy().to_string());

    let store = Arc::new(Store::open(&config.sled_path).expect("open store"));
    let (shutdown_tx, _) = broadcast::channel::<()>(8);

    let (feed, feed_rx) = ChangeFeed::channel(config.stream.channel_capacity);
    let consumer = tokio::spawn(run_consumer(
        feed_rx,
        StreamHandler::new(store.clone()),
        config.stream.batch_size,
        shutdown_tx.subscribe(),
    ));

    let state = AppState::new(store.clone(), &config, feed, shutdown_tx.clone());
    let app = build_router(state.clone());

    TestApp {
        app,
        state,
        store,
        config,
        shutdown_tx,
        consumer: Some(consumer),
        _temp_dir: temp_dir,
    }
}
