use chrono::{DateTime, Duration, FixedOffset, NaiveTime, TimeZone, Utc};
use serde::Deserialize;

use crate::config::StatsConfig;
use crate::constants::DAY_MS;
use crate::stats::StatsError;

/// Start of the organisation-local day containing `instant`, as a UTC instant.
pub fn local_day_start(instant: DateTime<Utc>, tz_offset_hours: i32) -> DateTime<Utc> {
    let Some(offset) = FixedOffset::east_opt(tz_offset_hours * 3600) else {
        return instant;
    };
    let local_midnight = instant
        .with_timezone(&offset)
        .date_naive()
        .and_time(NaiveTime::MIN);
    match offset.from_local_datetime(&local_midnight).single() {
        Some(start) => start.with_timezone(&Utc),
        None => instant,
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsRequest {
    #[serde(default)]
    pub first: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last: Option<DateTime<Utc>>,
    /// Limits regeneration to one executor; implies clean mode.
    #[serde(default)]
    pub exec_id: Option<String>,
    #[serde(default)]
    pub clean_mode: Option<bool>,
}

/// A validated regeneration: whole organisation-local days, all before today.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatsPlan {
    pub days: Vec<DateTime<Utc>>,
    pub exec_id: Option<String>,
    pub clean_mode: bool,
}

impl StatsPlan {
    pub fn first(&self) -> Option<DateTime<Utc>> {
        self.days.first().copied()
    }

    pub fn last(&self) -> Option<DateTime<Utc>> {
        self.days.last().copied()
    }
}

impl StatsRequest {
    /// The nightly run: yesterday, every executor, clean mode.
    pub fn yesterday() -> Self {
        Self::default()
    }

    /// Regeneration of the days touched by `[from, to]` for one executor.
    pub fn affected(
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        exec_id: &str,
        tz_offset_hours: i32,
    ) -> Self {
        Self {
            first: Some(local_day_start(from.min(to), tz_offset_hours)),
            last: Some(local_day_start(from.max(to), tz_offset_hours)),
            exec_id: Some(exec_id.to_string()),
            clean_mode: Some(true),
        }
    }

    pub fn plan(&self, config: &StatsConfig, now: DateTime<Utc>) -> Result<StatsPlan, StatsError> {
        let yesterday = local_day_start(now, config.tz_offset_hours) - Duration::days(1);
        let (first, mut last, clean_mode) = match (self.first, self.last) {
            (None, None) => (yesterday, yesterday, true),
            (first, last) => {
                let first = first.or(last).unwrap_or(yesterday);
                let last = last.unwrap_or(first);
                let clean = self.exec_id.is_some() || self.clean_mode.unwrap_or(false);
                (first, last, clean)
            }
        };

        let span_ms = (last - first).num_milliseconds();
        if span_ms < 0 {
            return Err(StatsError::LastBeforeFirst);
        }
        if span_ms % DAY_MS != 0 || local_day_start(first, config.tz_offset_hours) != first {
            return Err(StatsError::PartialDays);
        }
        if now < first + Duration::days(1) {
            return Err(StatsError::NotBeforeToday);
        }
        if now < last + Duration::days(1) {
            last = yesterday;
        }

        let max_days = if clean_mode && self.exec_id.is_none() {
            config.max_days_clean_all
        } else {
            config.max_days
        };
        if (last - first).num_milliseconds() > max_days * DAY_MS {
            return Err(StatsError::RangeTooLong { max_days });
        }

        let mut days = Vec::new();
        let mut day = first;
        while day <= last {
            days.push(day);
            day += Duration::days(1);
        }

        Ok(StatsPlan {
            days,
            exec_id: self.exec_id.clone(),
            clean_mode,
        })
    }
}
