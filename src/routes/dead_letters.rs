use axum::extract::{Path, Query, State};
use axum::routing::{delete, get, post};
use axum::Router;
use serde::Deserialize;

use crate::constants::MAX_DEAD_LETTERS_LISTED;
use crate::response::{ok, AppError};
use crate::state::AppState;
use crate::stream::handler::EventOutcome;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_dead_letters))
        .route("/:id", delete(discard_dead_letter))
        .route("/:id/replay", post(replay_dead_letter))
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    limit: Option<usize>,
}

async fn list_dead_letters(
    Query(q): Query<ListQuery>,
    State(state): State<AppState>,
) -> Result<impl axum::response::IntoResponse, AppError> {
    let limit = q
        .limit
        .unwrap_or(MAX_DEAD_LETTERS_LISTED)
        .clamp(1, MAX_DEAD_LETTERS_LISTED);
    let letters = state.store().list_dead_letters(limit)?;
    Ok(ok(serde_json::json!({
        "total": state.store().count_dead_letters(),
        "letters": letters,
    })))
}

async fn replay_dead_letter(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Result<impl axum::response::IntoResponse, AppError> {
    match state.stream().replay(&id).await {
        Ok(Some(EventOutcome::Applied { upserted, deleted })) => Ok(ok(serde_json::json!({
            "replayed": id,
            "upserted": upserted,
            "deleted": deleted,
        }))),
        Ok(Some(EventOutcome::Skipped(reason))) => Ok(ok(serde_json::json!({
            "replayed": id,
            "skipped": reason.to_string(),
        }))),
        Ok(None) => Err(AppError::not_found("Dead letter not found")),
        Err(e) => Err(AppError::conflict("REPLAY_FAILED", &e.to_string())),
    }
}

async fn discard_dead_letter(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Result<impl axum::response::IntoResponse, AppError> {
    if !state.store().delete_dead_letter(&id)? {
        return Err(AppError::not_found("Dead letter not found"));
    }
    tracing::warn!(letter_id = %id, "Dead letter discarded");
    Ok(ok(serde_json::json!({ "discarded": id })))
}
