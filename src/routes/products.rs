use axum::extract::{Path, State};
use axum::routing::get;
use axum::Router;

use crate::response::{ok, AppError};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/:id", get(get_product))
}

async fn get_product(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Result<impl axum::response::IntoResponse, AppError> {
    match state.store().get_product(&id)? {
        Some(product) => Ok(ok(product)),
        None => Err(AppError::not_found("Product not found")),
    }
}
