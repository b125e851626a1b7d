use std::collections::BTreeMap;

use chrono::{DateTime, Duration, TimeZone, Utc};
use proptest::prelude::*;

use labour_ledger::store::operations::products::{OpWork, Product, ProductModel};
use labour_ledger::stream::merge::{append_most_recent, insert_work, remove_work};

const SUBTYPES: [&str; 3] = ["cut", "sew", "pack"];

#[derive(Debug, Clone)]
enum Step {
    /// Slots are ten minutes apart, so works never overlap.
    Insert { slot: u8, sub: usize, len_min: i64 },
    /// A live work is finished again, possibly with another subtype or length.
    Refinish { pick: usize, sub: usize, len_min: i64 },
    /// A new work finishes after every live one.
    Append { sub: usize, len_min: i64 },
    Remove { pick: usize },
}

fn step() -> impl Strategy<Value = Step> {
    prop_oneof![
        3 => (0_u8..40, 0_usize..SUBTYPES.len(), 1_i64..10)
            .prop_map(|(slot, sub, len_min)| Step::Insert { slot, sub, len_min }),
        2 => (any::<usize>(), 0_usize..SUBTYPES.len(), 1_i64..10)
            .prop_map(|(pick, sub, len_min)| Step::Refinish { pick, sub, len_min }),
        2 => (0_usize..SUBTYPES.len(), 1_i64..10)
            .prop_map(|(sub, len_min)| Step::Append { sub, len_min }),
        1 => any::<usize>().prop_map(|pick| Step::Remove { pick }),
    ]
}

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 6, 0, 0).unwrap()
}

fn op_work(slot: u8, len_min: i64) -> OpWork {
    let start = t0() + Duration::minutes(i64::from(slot) * 10);
    OpWork {
        id: format!("w{slot:03}"),
        time: len_min * 60_000,
        start,
        fin: start + Duration::minutes(len_min),
        exec_name: "Volkov".to_string(),
    }
}

fn empty() -> Product {
    Product {
        id: "m1-1".to_string(),
        fullnumber: "P-1".to_string(),
        model: ProductModel {
            name: "Shelf".to_string(),
        },
        time: 0,
        ops: Vec::new(),
    }
}

fn sub(index: usize) -> Option<String> {
    Some(SUBTYPES[index].to_string())
}

/// The history a product must end up with: its works in start order, grouped into maximal runs.
fn canonical(live: &BTreeMap<u8, (usize, i64)>) -> Product {
    live.iter().fold(empty(), |product, (&slot, &(s, len))| {
        append_most_recent(&product, &sub(s), &op_work(slot, len))
    })
}

fn assert_well_formed(product: &Product) -> Result<(), TestCaseError> {
    let mut total = 0;
    let mut previous_start = None;
    for (i, op) in product.ops.iter().enumerate() {
        prop_assert!(!op.works.is_empty(), "empty run at {}", i);
        if i > 0 {
            prop_assert_ne!(&product.ops[i - 1].work_sub_type, &op.work_sub_type);
        }
        prop_assert_eq!(op.time, op.works.iter().map(|w| w.time).sum::<i64>());
        prop_assert_eq!(op.start, op.works[0].start);
        prop_assert_eq!(op.fin, op.works[op.works.len() - 1].fin);
        for w in &op.works {
            if let Some(prev) = previous_start {
                prop_assert!(prev < w.start);
            }
            previous_start = Some(w.start);
        }
        total += op.time;
    }
    prop_assert_eq!(product.time, total);
    Ok(())
}

proptest! {
    #[test]
    fn pt_any_insert_modify_remove_sequence_keeps_histories_canonical(steps in prop::collection::vec(step(), 1..40)) {
        let mut product = empty();
        let mut live: BTreeMap<u8, (usize, i64)> = BTreeMap::new();

        for step in steps {
            match step {
                Step::Insert { slot, sub: s, len_min } => {
                    product = insert_work(&product, &sub(s), &op_work(slot, len_min));
                    live.insert(slot, (s, len_min));
                }
                Step::Refinish { pick, sub: s, len_min } => {
                    if live.is_empty() {
                        continue;
                    }
                    let slot = *live.keys().nth(pick % live.len()).unwrap();
                    product = append_most_recent(&product, &sub(s), &op_work(slot, len_min));
                    live.insert(slot, (s, len_min));
                }
                Step::Append { sub: s, len_min } => {
                    let slot = live.keys().next_back().map_or(0, |last| last + 1);
                    product = append_most_recent(&product, &sub(s), &op_work(slot, len_min));
                    live.insert(slot, (s, len_min));
                }
                Step::Remove { pick } => {
                    if live.is_empty() {
                        prop_assert!(remove_work(&product, "w000").is_err());
                        continue;
                    }
                    let slot = *live.keys().nth(pick % live.len()).unwrap();
                    product = remove_work(&product, &op_work(slot, 1).id).unwrap();
                    live.remove(&slot);
                }
            }
            assert_well_formed(&product)?;
        }

        prop_assert_eq!(product, canonical(&live));
    }

    #[test]
    fn pt_tail_insert_equals_append(
        works in prop::collection::btree_map(0_u8..30, (0_usize..SUBTYPES.len(), 1_i64..10), 0..15),
        tail_sub in 0_usize..SUBTYPES.len(),
        tail_len in 1_i64..10,
    ) {
        let product = canonical(&works);
        let tail = op_work(30 + (works.len() as u8), tail_len);
        prop_assert_eq!(
            insert_work(&product, &sub(tail_sub), &tail),
            append_most_recent(&product, &sub(tail_sub), &tail)
        );
    }

    #[test]
    fn pt_insert_then_remove_restores_the_product(
        works in prop::collection::btree_map(0_u8..30, (0_usize..SUBTYPES.len(), 1_i64..10), 0..15),
        slot in 30_u8..40,
        s in 0_usize..SUBTYPES.len(),
        len in 1_i64..10,
    ) {
        let before = canonical(&works);
        let work = op_work(slot, len);
        let after = remove_work(&insert_work(&before, &sub(s), &work), &work.id).unwrap();
        prop_assert_eq!(after, before);
    }
}
