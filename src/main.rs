use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::{header, HeaderValue};
use labour_ledger::config::Config;
use labour_ledger::logging::{init_tracing, LogConfig};
use labour_ledger::routes::build_router;
use labour_ledger::state::AppState;
use labour_ledger::store::Store;
use labour_ledger::stream::{run_consumer, ChangeFeed, StreamHandler};
use labour_ledger::workers::WorkerManager;
use tokio::sync::broadcast;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let config = Config::from_env();

    if let Err(e) = init_tracing(&LogConfig {
        log_level: config.log_level.clone(),
        enable_file_logs: config.enable_file_logs,
        log_dir: config.log_dir.clone(),
    }) {
        eprintln!("labour-ledger: {e}");
        std::process::exit(1);
    }
    tracing::info!("Starting labour-ledger");

    let store = match Store::open(&config.sled_path) {
        Ok(store) => Arc::new(store),
        Err(e) => {
            tracing::error!(error = %e, path = %config.sled_path, "Failed to open sled database");
            std::process::exit(1);
        }
    };

    let (shutdown_tx, _) = broadcast::channel::<()>(8);

    let (feed, feed_rx) = ChangeFeed::channel(config.stream.channel_capacity);
    let consumer_handle = tokio::spawn(run_consumer(
        feed_rx,
        StreamHandler::new(store.clone()),
        config.stream.batch_size,
        shutdown_tx.subscribe(),
    ));

    let state = AppState::new(store.clone(), &config, feed, shutdown_tx.clone());

    let worker_handle = if config.worker.is_leader {
        let worker_manager = WorkerManager::new(
            store.clone(),
            shutdown_tx.subscribe(),
            &config.worker,
            &config.stats,
        );
        Some(tokio::spawn(async move {
            if let Err(e) = worker_manager.start().await {
                tracing::error!(error = %e, "Worker manager failed");
            }
        }))
    } else {
        None
    };

    let cors_layer = match build_cors_layer(&config) {
        Some(layer) => layer,
        None => std::process::exit(1),
    };

    let app = build_router(state)
        .layer(cors_layer)
        .layer(TraceLayer::new_for_http())
        .layer(CatchPanicLayer::new())
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ));

    let addr = SocketAddr::new(config.host, config.port);
    tracing::info!(%addr, "Listening");
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(error = %e, %addr, "Failed to bind TCP listener");
            std::process::exit(1);
        }
    };

    let server_future = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal(shutdown_tx.clone()));

    if let Some(handle) = worker_handle {
        // A panicking worker is logged; the HTTP server keeps running.
        tokio::spawn(async move {
            match handle.await {
                Err(e) => {
                    tracing::error!(error = %e, "Worker task panicked, HTTP server continues")
                }
                Ok(()) => tracing::info!("Worker manager exited normally"),
            }
        });
    }

    if let Err(e) = server_future.await {
        tracing::error!(error = %e, "HTTP server crashed");
    }

    // The consumer drains queued change events before it returns.
    if let Err(e) = consumer_handle.await {
        tracing::error!(error = %e, "Change feed consumer panicked");
    }

    tracing::info!("Flushing store before exit");
    if let Err(e) = store.flush() {
        tracing::error!(error = %e, "Failed to flush store before exit");
    }
    tracing::info!("Shutdown complete");
}

fn build_cors_layer(config: &Config) -> Option<CorsLayer> {
    if config.cors_origin.trim() == "*" {
        return Some(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_credentials(false)
                .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
                .allow_methods(Any),
        );
    }

    match config.cors_origin.parse::<HeaderValue>() {
        Ok(origin) => Some(
            CorsLayer::new()
                .allow_origin(origin)
                .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
                .allow_methods(Any),
        ),
        Err(e) => {
            tracing::error!(
                origin = %config.cors_origin,
                error = %e,
                "Invalid CORS_ORIGIN; fix the environment variable"
            );
            None
        }
    }
}

async fn shutdown_signal(shutdown_tx: broadcast::Sender<()>) {
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = sigterm.recv() => {},
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "SIGTERM handler unavailable, waiting for Ctrl-C only");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }

    tracing::info!("Shutdown signal received");
    let _ = shutdown_tx.send(());
}
