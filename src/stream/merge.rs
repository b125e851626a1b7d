//! Incremental maintenance of per-product operation histories.
//!
//! A product's `ops` is a time-ordered list of runs; every run holds
//! contiguous works that share one subtype, and neighbouring runs never share
//! a subtype. Each function here takes a product snapshot and returns the
//! patched product, touching only the runs around the changed work.

use thiserror::Error;

use crate::store::keys;
use crate::store::operations::products::{OpWork, Operation, Product};
use crate::store::operations::works::ModelRef;
use crate::stream::classify::{MergeKind, NormalizedWork};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MergeError {
    #[error("work {work_id} is not part of the history of product {product_id}")]
    WorkNotFound { product_id: String, work_id: String },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeOutcome {
    pub to_upsert: Vec<Product>,
    /// Products whose history became empty.
    pub to_delete: Vec<String>,
}

/// This work as booked against one of its products: the duration is shared
/// evenly among every product of the model.
pub fn op_work(work: &NormalizedWork) -> OpWork {
    let share = work.model.prods.len().max(1) as i64;
    OpWork {
        id: work.id.clone(),
        time: work.duration_ms() / share,
        start: work.start,
        fin: work.fin,
        exec_name: work.exec_name.clone(),
    }
}

pub fn merge(
    kind: MergeKind,
    work: &NormalizedWork,
    products: Vec<Product>,
) -> Result<MergeOutcome, MergeError> {
    let entry = op_work(work);
    let mut outcome = MergeOutcome::default();

    for product in products {
        match kind {
            MergeKind::Insert => {
                let product = with_identity(product, &work.model);
                outcome
                    .to_upsert
                    .push(insert_work(&product, &work.work_sub_type, &entry));
            }
            MergeKind::Modify => {
                let product = with_identity(product, &work.model);
                outcome
                    .to_upsert
                    .push(append_most_recent(&product, &work.work_sub_type, &entry));
            }
            MergeKind::Remove => {
                let patched = remove_work(&product, &work.id)?;
                if patched.ops.is_empty() {
                    outcome.to_delete.push(patched.id);
                } else {
                    outcome.to_upsert.push(patched);
                }
            }
        }
    }

    Ok(outcome)
}

/// Legacy rows keyed by the bare product number get the composite key, and a
/// missing model name is taken from the work.
fn with_identity(mut product: Product, model: &ModelRef) -> Product {
    if !keys::is_composite_product_key(&product.id) {
        product.id = keys::product_key(&model.id, &product.id);
    }
    if product.model.name.is_empty() {
        product.model.name = model.name.clone();
    }
    product
}

/// Index of the run holding `work_id` and the work's index inside it.
fn locate(ops: &[Operation], work_id: &str) -> Option<(usize, usize)> {
    ops.iter()
        .enumerate()
        .find_map(|(op_index, op)| op.position_of(work_id).map(|w| (op_index, w)))
}

/// First run containing a work that starts strictly after `work`, with that work's index.
fn first_later(ops: &[Operation], work: &OpWork) -> Option<(usize, usize)> {
    ops.iter().enumerate().find_map(|(op_index, op)| {
        op.works
            .iter()
            .position(|w| w.start > work.start)
            .map(|w| (op_index, w))
    })
}

/// Drops a stale copy of the work so redelivered or re-finished works are not counted twice.
fn without_work(product: &Product, work_id: &str) -> Product {
    remove_work(product, work_id).unwrap_or_else(|_| product.clone())
}

fn extended_at_end(op: &Operation, work: &OpWork) -> Operation {
    let mut op = op.clone();
    op.fin = work.fin;
    op.time += work.time;
    op.works.push(work.clone());
    op
}

/// Places a finished work at its chronological position.
pub fn insert_work(product: &Product, work_sub_type: &Option<String>, work: &OpWork) -> Product {
    let mut next = without_work(product, &work.id);

    let Some((op_index, work_index)) = first_later(&next.ops, work) else {
        return append_most_recent(&next, work_sub_type, work);
    };

    let op = &next.ops[op_index];
    if op.work_sub_type == *work_sub_type {
        let mut grown = op.clone();
        grown.works.insert(work_index, work.clone());
        grown.time += work.time;
        if work_index == 0 {
            grown.start = work.start;
        }
        next.ops[op_index] = grown;
    } else if work_index > 0 {
        // `work_index` points at a work of `op`, so both halves keep at least one work.
        let (prev_op, next_op) = op.split_at(work_index);
        let middle = Operation::single(work_sub_type.clone(), work.clone());
        next.ops
            .splice(op_index..=op_index, [prev_op, middle, next_op]);
    } else if op_index == 0 || next.ops[op_index - 1].work_sub_type != *work_sub_type {
        next.ops
            .insert(op_index, Operation::single(work_sub_type.clone(), work.clone()));
    } else {
        let grown = extended_at_end(&next.ops[op_index - 1], work);
        next.ops[op_index - 1] = grown;
    }

    next.time += work.time;
    next
}

/// Appends a work known to be the product's most recent one. A work the
/// history already holds is re-placed at its chronological position instead,
/// since an edit release may target any earlier work.
pub fn append_most_recent(product: &Product, work_sub_type: &Option<String>, work: &OpWork) -> Product {
    if locate(&product.ops, &work.id).is_some() {
        return insert_work(product, work_sub_type, work);
    }
    let mut next = product.clone();

    match next.ops.last_mut() {
        Some(last) if last.work_sub_type == *work_sub_type => {
            *last = extended_at_end(last, work);
        }
        _ => next
            .ops
            .push(Operation::single(work_sub_type.clone(), work.clone())),
    }

    next.time += work.time;
    next
}

/// Takes a work out of the history, dropping its run when it empties and
/// fusing the neighbours that run used to separate.
pub fn remove_work(product: &Product, work_id: &str) -> Result<Product, MergeError> {
    let (op_index, work_index) =
        locate(&product.ops, work_id).ok_or_else(|| MergeError::WorkNotFound {
            product_id: product.id.clone(),
            work_id: work_id.to_string(),
        })?;

    let mut ops = product.ops.clone();
    let removed = ops[op_index].works.remove(work_index);

    if ops[op_index].works.is_empty() {
        ops.remove(op_index);
        let between = op_index > 0 && op_index < ops.len();
        if between && ops[op_index - 1].work_sub_type == ops[op_index].work_sub_type {
            let later = ops.remove(op_index);
            let earlier = &mut ops[op_index - 1];
            earlier.fin = later.fin;
            earlier.time += later.time;
            earlier.works.extend(later.works);
        }
    } else {
        let op = &mut ops[op_index];
        op.time -= removed.time;
        if let (Some(first), Some(last)) = (op.works.first(), op.works.last()) {
            op.start = first.start;
            op.fin = last.fin;
        }
    }

    Ok(Product {
        time: product.time - removed.time,
        ops,
        ..product.clone()
    })
}
