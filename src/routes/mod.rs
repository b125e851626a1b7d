pub mod dead_letters;
pub mod health;
pub mod products;
pub mod stats;
pub mod stream;
pub mod works;

use axum::extract::DefaultBodyLimit;
use axum::Router;

use crate::middleware::request_id;
use crate::state::AppState;

/// Maximum request body size: 8 MiB, enough for a full change batch.
const MAX_BODY_SIZE: usize = 8 * 1024 * 1024;

pub fn build_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .nest("/works", works::router())
        .nest("/stream", stream::router())
        .nest("/products", products::router())
        .nest("/stats", stats::router())
        .nest("/dead-letters", dead_letters::router())
        .layer(DefaultBodyLimit::max(MAX_BODY_SIZE));

    Router::new()
        .nest("/api", api_routes)
        .nest("/health", health::router())
        .layer(axum::middleware::from_fn(request_id::request_id_middleware))
        .with_state(state)
}
