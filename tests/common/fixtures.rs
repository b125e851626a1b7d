use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::{json, Value};

use labour_ledger::constants::{PRIMARY_WORK_TYPE, TAG_CURRENT};
use labour_ledger::store::keys;
use labour_ledger::store::operations::works::{ModelRef, ProdRef, Work};
use labour_ledger::stream::{ChangeEvent, EventName};

pub const MINUTE_MS: i64 = 60_000;

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 4, 6, 0, 0).unwrap()
}

pub fn model(prods: usize) -> ModelRef {
    ModelRef {
        id: "m7".to_string(),
        name: "Wardrobe".to_string(),
        article: Some("W-7".to_string()),
        prods: (1..=prods)
            .map(|n| ProdRef {
                id: n.to_string(),
                fullnumber: format!("W7-{n:03}"),
            })
            .collect(),
    }
}

pub fn model_json(prods: usize) -> Value {
    serde_json::to_value(model(prods)).expect("model json")
}

/// A finished primary work on `prods` products of model `m7`.
pub fn finished(suffix: &str, sub: &str, start_min: i64, len_min: i64, prods: usize) -> Work {
    let start = t0() + Duration::minutes(start_min);
    Work {
        id: keys::work_key(start, suffix),
        start,
        fin: Some(start + Duration::minutes(len_min)),
        exec_id: "e1".to_string(),
        exec_name: "Morozov".to_string(),
        work_type: PRIMARY_WORK_TYPE.to_string(),
        work_sub_type: Some(sub.to_string()),
        tag: None,
        upd_note: None,
        models: vec![model(prods)],
        time: None,
    }
}

pub fn insert(work: &Work) -> ChangeEvent {
    ChangeEvent {
        event_name: EventName::Insert,
        old_image: None,
        new_image: Some(work.clone()),
    }
}

/// The MODIFY a work emits when its executor finishes it.
pub fn finish(work: &Work) -> ChangeEvent {
    let mut running = work.clone();
    running.fin = None;
    running.tag = Some(TAG_CURRENT.to_string());
    ChangeEvent {
        event_name: EventName::Modify,
        old_image: Some(running),
        new_image: Some(work.clone()),
    }
}

pub fn remove(work: &Work) -> ChangeEvent {
    ChangeEvent {
        event_name: EventName::Remove,
        old_image: Some(work.clone()),
        new_image: None,
    }
}

pub fn batch(events: &[ChangeEvent]) -> Value {
    json!({ "records": events })
}
