use axum::extract::State;
use axum::routing::post;
use axum::Router;

use crate::extractors::JsonBody;
use crate::response::{ok, AppError};
use crate::state::AppState;
use crate::stream::ChangeBatch;

pub fn router() -> Router<AppState> {
    Router::new().route("/works", post(ingest_works))
}

/// Answers success whatever happens to individual events, so producers never
/// redeliver a batch that was partly applied; failures go to the dead letters.
async fn ingest_works(
    State(state): State<AppState>,
    JsonBody(batch): JsonBody<ChangeBatch>,
) -> Result<impl axum::response::IntoResponse, AppError> {
    tracing::info!(records = batch.records.len(), "Change batch received");
    let report = state.stream().handle_batch(batch.records).await;
    Ok(ok(report))
}
