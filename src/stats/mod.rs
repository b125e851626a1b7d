//! Day Statistics Aggregator: per `(day, executor)` labour rows.

pub mod aggregate;
pub mod request;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::config::StatsConfig;
use crate::store::facade::to_chunks;
use crate::store::keys;
use crate::store::operations::day_stats::DayExecStat;
use crate::store::{Store, StoreError, Table, WriteRequest};

pub use request::{local_day_start, StatsPlan, StatsRequest};

#[derive(Debug, Error)]
pub enum StatsError {
    #[error("last day of the period must not precede the first day")]
    LastBeforeFirst,
    #[error("period must consist of whole organisation-local days")]
    PartialDays,
    #[error("stats can only be generated for days before today")]
    NotBeforeToday,
    #[error("period may span at most {max_days} days")]
    RangeTooLong { max_days: i64 },
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsSummary {
    pub days: Vec<DateTime<Utc>>,
    pub deleted: usize,
    pub written: usize,
}

pub fn regenerate(
    store: &Store,
    config: &StatsConfig,
    request: &StatsRequest,
    now: DateTime<Utc>,
) -> Result<StatsSummary, StatsError> {
    let plan = request.plan(config, now)?;
    tracing::info!(
        first = ?plan.first(),
        last = ?plan.last(),
        exec_id = plan.exec_id.as_deref().unwrap_or("*"),
        clean_mode = plan.clean_mode,
        "Regenerating day stats"
    );

    let deleted = if plan.clean_mode {
        clean(store, &plan)?
    } else {
        0
    };

    let mut rows = Vec::new();
    for &day in &plan.days {
        let works = store.works_started_between(
            day - Duration::days(1),
            day + Duration::days(1) - Duration::milliseconds(1),
        )?;
        let works: Vec<_> = match plan.exec_id.as_deref() {
            Some(exec_id) => works.into_iter().filter(|w| w.exec_id == exec_id).collect(),
            None => works,
        };
        rows.extend(aggregate::day_exec_stats(day, &works, now));
    }

    let puts: Vec<WriteRequest<DayExecStat>> = rows
        .into_iter()
        .map(|row| WriteRequest::Put {
            key: row.id.clone(),
            item: row,
        })
        .collect();
    for chunk in to_chunks(&puts) {
        store.batch_write(Table::DayStats, &chunk)?;
    }

    let summary = StatsSummary {
        days: plan.days,
        deleted,
        written: puts.len(),
    };
    tracing::info!(
        days = summary.days.len(),
        deleted = summary.deleted,
        written = summary.written,
        "Day stats regenerated"
    );
    Ok(summary)
}

/// Drops existing rows of the planned days before they are recomputed.
fn clean(store: &Store, plan: &StatsPlan) -> Result<usize, StatsError> {
    let (Some(first), Some(last)) = (plan.first(), plan.last()) else {
        return Ok(0);
    };
    let ids: Vec<String> = match plan.exec_id.as_deref() {
        Some(exec_id) => plan
            .days
            .iter()
            .map(|&day| keys::day_stat_key(day, exec_id))
            .collect(),
        None => store.day_stat_keys_between(first, last)?,
    };

    let deletes: Vec<WriteRequest<DayExecStat>> = ids
        .into_iter()
        .map(|key| WriteRequest::Delete { key })
        .collect();
    for chunk in to_chunks(&deletes) {
        store.batch_write(Table::DayStats, &chunk)?;
    }
    Ok(deletes.len())
}

/// Regenerates one executor's stats for the days `[from, to]` touches.
/// `Ok(None)` when the span lies entirely in today and there is nothing to regenerate yet.
pub fn regenerate_affected(
    store: &Store,
    config: &StatsConfig,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
    exec_id: &str,
) -> Result<Option<StatsSummary>, StatsError> {
    let request = StatsRequest::affected(from, to, exec_id, config.tz_offset_hours);
    match regenerate(store, config, &request, Utc::now()) {
        Ok(summary) => Ok(Some(summary)),
        Err(StatsError::NotBeforeToday) => Ok(None),
        Err(e) => Err(e),
    }
}
