use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::Router;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::TAG_CURRENT;
use crate::extractors::JsonBody;
use crate::response::{created, ok, AppError};
use crate::state::AppState;
use crate::stats::{self, StatsSummary};
use crate::store::{keys, Table};
use crate::store::operations::works::{ModelRef, Work};
use crate::stream::ChangeEvent;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(start_work))
        .route("/:id", get(get_work).delete(delete_work))
        .route("/:id/finish", post(finish_work))
        .route("/:id/edit", post(edit_work))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StartWorkRequest {
    exec_id: String,
    exec_name: String,
    work_type: String,
    #[serde(default)]
    work_sub_type: Option<String>,
    #[serde(default)]
    model: Option<ModelRef>,
    /// Defaults to now.
    #[serde(default)]
    start: Option<DateTime<Utc>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FinishWorkRequest {
    #[serde(default)]
    fin: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EditWorkRequest {
    start: DateTime<Utc>,
    #[serde(default)]
    fin: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ChangedWork {
    #[serde(flatten)]
    work: Work,
    /// Id the work had before this change, when it is gone now.
    deleted: Option<String>,
    stats: Option<StatsSummary>,
}

async fn publish(state: &AppState, event: ChangeEvent) -> Result<(), AppError> {
    state.feed().publish(event).await.map_err(|e| {
        tracing::error!(error = %e, "Change event could not be published");
        AppError::unavailable("Change feed is not accepting events")
    })
}

fn require_work(state: &AppState, id: &str) -> Result<Work, AppError> {
    Ok(state.store().get_required(Table::Works, id)?)
}

/// Stats follow the works tree; a failed regeneration does not undo the change.
fn regenerate_stats(
    state: &AppState,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
    exec_id: &str,
) -> Option<StatsSummary> {
    match stats::regenerate_affected(state.store(), &state.config().stats, from, to, exec_id) {
        Ok(summary) => summary,
        Err(e) => {
            tracing::error!(exec_id, error = %e, "Day stats regeneration failed");
            None
        }
    }
}

async fn start_work(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<StartWorkRequest>,
) -> Result<impl axum::response::IntoResponse, AppError> {
    for (field, value) in [
        ("execId", &req.exec_id),
        ("execName", &req.exec_name),
        ("workType", &req.work_type),
    ] {
        if value.trim().is_empty() {
            return Err(AppError::bad_request(
                "VALIDATION_ERROR",
                &format!("{field} must not be empty"),
            ));
        }
    }

    let start = req.start.unwrap_or_else(Utc::now);
    let token = uuid::Uuid::new_v4().simple().to_string();
    let work = Work {
        id: keys::work_key(start, &format!("_{}", &token[..12])),
        start,
        fin: None,
        exec_id: req.exec_id,
        exec_name: req.exec_name,
        work_type: req.work_type,
        work_sub_type: req.work_sub_type,
        tag: Some(TAG_CURRENT.to_string()),
        upd_note: None,
        models: req.model.into_iter().collect(),
        time: None,
    };

    let event = state.store().put_work(&work)?;
    publish(&state, event).await?;
    tracing::info!(work_id = %work.id, exec_id = %work.exec_id, "Work started");
    Ok(created(work))
}

async fn get_work(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Result<impl axum::response::IntoResponse, AppError> {
    Ok(ok(require_work(&state, &id)?))
}

async fn finish_work(
    Path(id): Path<String>,
    State(state): State<AppState>,
    JsonBody(req): JsonBody<FinishWorkRequest>,
) -> Result<impl axum::response::IntoResponse, AppError> {
    let mut work = require_work(&state, &id)?;
    if work.fin.is_some() {
        return Err(AppError::conflict("WORK_ALREADY_FINISHED", "Work is already finished"));
    }
    let fin = req.fin.unwrap_or_else(Utc::now);
    if fin <= work.start {
        return Err(AppError::bad_request(
            "VALIDATION_ERROR",
            "fin must be later than start",
        ));
    }

    work.fin = Some(fin);
    work.tag = None;
    let event = state.store().put_work(&work)?;
    publish(&state, event).await?;
    tracing::info!(work_id = %work.id, "Work finished");
    Ok(ok(work))
}

/// Replaces the work: its id embeds the start, so a new start means a new key.
async fn edit_work(
    Path(id): Path<String>,
    State(state): State<AppState>,
    JsonBody(req): JsonBody<EditWorkRequest>,
) -> Result<impl axum::response::IntoResponse, AppError> {
    let time = match req.fin {
        Some(fin) if fin <= req.start => {
            return Err(AppError::bad_request(
                "VALIDATION_ERROR",
                "fin must be later than start",
            ))
        }
        Some(fin) => Some(((fin - req.start).num_milliseconds() + 500) / 1000),
        None => None,
    };
    require_work(&state, &id)?;

    let removed = state.store().delete_work(&id)?;
    let Some(old) = removed.old_image.clone() else {
        return Err(AppError::internal("delete returned no image"));
    };
    let work = Work {
        id: keys::work_key(req.start, keys::work_id_suffix(&old.id)),
        start: req.start,
        fin: req.fin,
        time,
        ..old.clone()
    };
    let inserted = state.store().put_work(&work)?;
    publish(&state, removed).await?;
    publish(&state, inserted).await?;

    let now = Utc::now();
    let from = old.start.min(work.start);
    let to = old.fin.unwrap_or(now).max(work.fin.unwrap_or(now));
    let stats = regenerate_stats(&state, from, to, &work.exec_id);

    tracing::info!(old_id = %old.id, work_id = %work.id, "Work edited");
    let deleted = (old.id != work.id).then(|| old.id.clone());
    Ok(ok(ChangedWork {
        work,
        deleted,
        stats,
    }))
}

async fn delete_work(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Result<impl axum::response::IntoResponse, AppError> {
    require_work(&state, &id)?;
    let removed = state.store().delete_work(&id)?;
    let Some(old) = removed.old_image.clone() else {
        return Err(AppError::internal("delete returned no image"));
    };
    publish(&state, removed).await?;

    let stats = regenerate_stats(
        &state,
        old.start,
        old.fin.unwrap_or_else(Utc::now),
        &old.exec_id,
    );
    tracing::info!(work_id = %old.id, "Work deleted");
    Ok(ok(ChangedWork {
        deleted: Some(old.id.clone()),
        work: old,
        stats,
    }))
}
