use axum::extract::{Query, State};
use axum::routing::get;
use axum::Router;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::extractors::JsonBody;
use crate::response::{ok, AppError};
use crate::state::AppState;
use crate::stats::{self, StatsRequest};

pub fn router() -> Router<AppState> {
    Router::new().route("/day", get(list_day_stats).post(regenerate_day_stats))
}

#[derive(Debug, Deserialize)]
struct DayStatsQuery {
    from: DateTime<Utc>,
    to: DateTime<Utc>,
}

async fn list_day_stats(
    Query(q): Query<DayStatsQuery>,
    State(state): State<AppState>,
) -> Result<impl axum::response::IntoResponse, AppError> {
    if q.to < q.from {
        return Err(AppError::bad_request(
            "INVALID_STATS_RANGE",
            "to must not precede from",
        ));
    }
    Ok(ok(state.store().day_stats_between(q.from, q.to)?))
}

async fn regenerate_day_stats(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<StatsRequest>,
) -> Result<impl axum::response::IntoResponse, AppError> {
    let summary = stats::regenerate(state.store(), &state.config().stats, &req, Utc::now())?;
    Ok(ok(summary))
}
