use chrono::{DateTime, Duration, SecondsFormat, Utc};

/// Length of an ISO-8601 UTC timestamp with millisecond precision (`2024-03-01T08:00:00.000Z`).
pub const ISO_LEN: usize = 24;

pub fn iso(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Work ids start with the work's start instant so the works tree is ordered by start time.
pub fn work_key(start: DateTime<Utc>, suffix: &str) -> String {
    format!("{}{}", iso(start), suffix)
}

/// The part of a work id that survives an edit of its start time.
pub fn work_id_suffix(work_id: &str) -> &str {
    work_id.get(ISO_LEN..).unwrap_or("")
}

/// Inclusive key range of works that started within `[from, to]`.
pub fn works_started_between(from: DateTime<Utc>, to: DateTime<Utc>) -> (String, String) {
    // Suffixed ids sort after the bare timestamp, so the upper bound is bumped by one millisecond.
    (iso(from), iso(to + Duration::milliseconds(1)))
}

pub fn product_key(model_id: &str, prod_id: &str) -> String {
    format!("{model_id}-{prod_id}")
}

/// Products persisted before keys were composite only carry their in-model number.
pub fn is_composite_product_key(id: &str) -> bool {
    id.contains('-')
}

pub fn day_stat_key(day: DateTime<Utc>, exec_id: &str) -> String {
    format!("{}_{}", iso(day), exec_id)
}

/// Inclusive key range of every executor's stat row for days in `[first, last]`.
pub fn day_stats_between(first: DateTime<Utc>, last: DateTime<Utc>) -> (String, String) {
    (iso(first), iso(last + Duration::milliseconds(1)))
}

pub fn dead_letter_key(failed_at_ms: i64, letter_id: &str) -> String {
    let ts = failed_at_ms.max(0) as u64;
    format!("{:020}:{}", ts, letter_id)
}
