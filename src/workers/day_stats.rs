//! Nightly day stats for yesterday (01:00 UTC)

use chrono::Utc;

use crate::config::StatsConfig;
use crate::stats::{self, StatsRequest};
use crate::store::Store;

pub async fn run(store: &Store, config: &StatsConfig) {
    tracing::info!("Day stats worker running");

    match stats::regenerate(store, config, &StatsRequest::yesterday(), Utc::now()) {
        Ok(summary) => tracing::info!(
            deleted = summary.deleted,
            written = summary.written,
            "Day stats worker complete"
        ),
        Err(e) => tracing::error!(error = %e, "Day stats worker failed"),
    }
}
