//! Per-day labour statistics built from the works overlapping that day.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};

use crate::constants::{ASIDE_WORK_TYPE, AUX_WORK_TYPE, PRIMARY_WORK_TYPE, REST_WORK_TYPE};
use crate::store::keys;
use crate::store::operations::day_stats::{
    DayExecStat, ModelStat, ProdStat, SubTypeStat, WorkTypeStat,
};
use crate::store::operations::works::Work;

pub fn work_type_class(work_type: &str) -> &'static str {
    match work_type {
        PRIMARY_WORK_TYPE => "main",
        AUX_WORK_TYPE => "aux",
        ASIDE_WORK_TYPE => "aside",
        REST_WORK_TYPE => "rest",
        _ => "negative",
    }
}

/// Whether the work's interval intersects `[day, day + 1d)`; open works run until now.
pub fn overlaps_day(work: &Work, day: DateTime<Utc>) -> bool {
    let day_end = day + Duration::days(1);
    work.start < day_end && work.fin.map_or(true, |fin| fin > day)
}

/// Milliseconds of the work that fall inside the day.
pub fn clipped_ms(work: &Work, day: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    let day_end = day + Duration::days(1);
    let start = work.start.max(day);
    let fin = work.fin.unwrap_or(now).min(day_end);
    (fin - start).num_milliseconds().max(0)
}

struct Clipped<'a> {
    work: &'a Work,
    time: i64,
}

fn total(works: &[Clipped<'_>]) -> i64 {
    works.iter().map(|c| c.time).sum()
}

fn group_by<'a, K: Ord>(
    works: &[Clipped<'a>],
    key: impl Fn(&Work) -> Option<K>,
) -> BTreeMap<K, Vec<Clipped<'a>>> {
    let mut groups: BTreeMap<K, Vec<Clipped<'a>>> = BTreeMap::new();
    for c in works {
        if let Some(k) = key(c.work) {
            groups.entry(k).or_default().push(Clipped {
                work: c.work,
                time: c.time,
            });
        }
    }
    groups
}

/// One row per executor who worked during `day`, ordered by executor name.
pub fn day_exec_stats(day: DateTime<Utc>, works: &[Work], now: DateTime<Utc>) -> Vec<DayExecStat> {
    let clipped: Vec<Clipped<'_>> = works
        .iter()
        .filter(|w| overlaps_day(w, day))
        .map(|work| Clipped {
            work,
            time: clipped_ms(work, day, now),
        })
        .collect();

    group_by(&clipped, |w| Some((w.exec_name.clone(), w.exec_id.clone())))
        .into_iter()
        .map(|((exec_name, exec_id), works)| DayExecStat {
            id: keys::day_stat_key(day, &exec_id),
            day,
            exec_id,
            exec_name,
            time: total(&works),
            work_types: work_type_stats(&works),
        })
        .collect()
}

fn work_type_stats(works: &[Clipped<'_>]) -> Vec<WorkTypeStat> {
    group_by(works, |w| Some(w.work_type.clone()))
        .into_iter()
        .map(|(work_type, works)| WorkTypeStat {
            work_type_class: work_type_class(&work_type).to_string(),
            work_type,
            time: total(&works),
            work_sub_types: sub_type_stats(&works),
        })
        .collect()
}

fn sub_type_stats(works: &[Clipped<'_>]) -> Vec<SubTypeStat> {
    group_by(works, |w| w.work_sub_type.clone())
        .into_iter()
        .map(|(work_sub_type, works)| SubTypeStat {
            work_sub_type,
            time: total(&works),
            models: model_stats(&works),
        })
        .collect()
}

fn model_stats(works: &[Clipped<'_>]) -> Vec<ModelStat> {
    group_by(works, |w| w.model().and_then(|m| m.article.clone()))
        .into_iter()
        .map(|(article, works)| ModelStat {
            name: works[0]
                .work
                .model()
                .map(|m| m.name.clone())
                .unwrap_or_default(),
            article,
            time: total(&works),
            prods: prod_stats(&works),
        })
        .collect()
}

/// Each work's time is shared equally among the products it was booked on.
fn prod_stats(works: &[Clipped<'_>]) -> Vec<ProdStat> {
    let mut prods: BTreeMap<String, ProdStat> = BTreeMap::new();
    for c in works {
        let Some(model) = c.work.model() else { continue };
        if model.prods.is_empty() {
            continue;
        }
        let share = c.time / model.prods.len() as i64;
        for prod in &model.prods {
            prods
                .entry(prod.id.clone())
                .or_insert_with(|| ProdStat {
                    id: prod.id.clone(),
                    fullnumber: prod.fullnumber.clone(),
                    time: 0,
                })
                .time += share;
        }
    }
    prods.into_values().collect()
}
