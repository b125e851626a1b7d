use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::store::keys;
use crate::store::{Store, StoreError, Table};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProdStat {
    pub id: String,
    pub fullnumber: String,
    pub time: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelStat {
    pub name: String,
    pub article: String,
    pub time: i64,
    pub prods: Vec<ProdStat>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubTypeStat {
    pub work_sub_type: String,
    pub time: i64,
    pub models: Vec<ModelStat>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkTypeStat {
    pub work_type: String,
    /// `main`, `aux`, `aside`, `rest` or `negative`.
    pub work_type_class: String,
    pub time: i64,
    pub work_sub_types: Vec<SubTypeStat>,
}

/// Labour of one executor during one organisation-local day, in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DayExecStat {
    /// `{dayIso}_{execId}`.
    pub id: String,
    pub day: DateTime<Utc>,
    pub exec_id: String,
    pub exec_name: String,
    pub time: i64,
    pub work_types: Vec<WorkTypeStat>,
}

impl Store {
    /// Stored rows of every executor for days in `[first, last]`.
    pub fn day_stats_between(
        &self,
        first: DateTime<Utc>,
        last: DateTime<Utc>,
    ) -> Result<Vec<DayExecStat>, StoreError> {
        let (from, to) = keys::day_stats_between(first, last);
        self.query_range(Table::DayStats, &from, &to)
    }

    pub fn day_stat_keys_between(
        &self,
        first: DateTime<Utc>,
        last: DateTime<Utc>,
    ) -> Result<Vec<String>, StoreError> {
        let (from, to) = keys::day_stats_between(first, last);
        self.query_range_keys(Table::DayStats, &from, &to)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};
    use tempfile::tempdir;

    use super::*;
    use crate::store::WriteRequest;

    fn row(day: DateTime<Utc>, exec_id: &str) -> DayExecStat {
        DayExecStat {
            id: keys::day_stat_key(day, exec_id),
            day,
            exec_id: exec_id.to_string(),
            exec_name: exec_id.to_uppercase(),
            time: 1_000,
            work_types: Vec::new(),
        }
    }

    #[test]
    fn range_read_is_inclusive_of_last_day() {
        let dir = tempdir().unwrap();
        let store = Store::open(dir.path().join("stats-db").to_str().unwrap()).unwrap();
        let d0 = Utc.with_ymd_and_hms(2024, 2, 29, 21, 0, 0).unwrap();
        let d1 = d0 + Duration::days(1);
        let d2 = d0 + Duration::days(2);

        let writes: Vec<WriteRequest<DayExecStat>> = [row(d0, "a"), row(d1, "a"), row(d1, "b"), row(d2, "a")]
            .into_iter()
            .map(|r| WriteRequest::Put {
                key: r.id.clone(),
                item: r,
            })
            .collect();
        store.batch_write(Table::DayStats, &writes).unwrap();

        let rows = store.day_stats_between(d0, d1).unwrap();
        assert_eq!(rows.len(), 3);
        assert!(rows.iter().all(|r| r.day <= d1));
        assert_eq!(store.day_stat_keys_between(d1, d1).unwrap().len(), 2);
    }
}
