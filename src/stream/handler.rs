//! Applies batches of work change events to product histories.
//!
//! Removes run to completion before any other event of the batch starts.
//! Within a phase, events of different models run concurrently while events
//! of one model run in delivery order, since they share products. Store calls
//! are chunked to the store's batch ceiling and issued in parallel on the
//! blocking pool.

use std::sync::Arc;

use futures::future::{join_all, try_join_all};
use serde::Serialize;
use thiserror::Error;

use crate::store::facade::to_chunks;
use crate::store::keys;
use crate::store::operations::products::Product;
use crate::store::operations::works::ModelRef;
use crate::store::{Store, StoreError, Table, WriteRequest};
use crate::stream::classify::{classify, Classification, SkipReason};
use crate::stream::event::ChangeEvent;
use crate::stream::merge::{merge, MergeError, MergeOutcome};

#[derive(Debug, Error)]
pub enum StreamError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Merge(#[from] MergeError),
    #[error("store task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventOutcome {
    Applied { upserted: usize, deleted: usize },
    Skipped(SkipReason),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReport {
    pub processed: usize,
    pub skipped: usize,
    /// Events routed to the dead-letter tree.
    pub failed: usize,
}

impl BatchReport {
    fn record(&mut self, outcome: &Result<EventOutcome, StreamError>) {
        match outcome {
            Ok(EventOutcome::Applied { .. }) => self.processed += 1,
            Ok(EventOutcome::Skipped(_)) => self.skipped += 1,
            Err(_) => self.failed += 1,
        }
    }
}

/// Splits events into per-model queues, keeping delivery order inside each.
fn by_model(events: Vec<ChangeEvent>) -> Vec<Vec<ChangeEvent>> {
    let mut groups: Vec<(Option<String>, Vec<ChangeEvent>)> = Vec::new();
    for event in events {
        let key = event.model_id().map(str::to_string);
        let slot = key
            .as_ref()
            .and_then(|k| groups.iter().position(|(g, _)| g.as_ref() == Some(k)));
        match slot {
            Some(i) => groups[i].1.push(event),
            None => groups.push((key, vec![event])),
        }
    }
    groups.into_iter().map(|(_, group)| group).collect()
}

#[derive(Clone)]
pub struct StreamHandler {
    store: Arc<Store>,
}

impl StreamHandler {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    /// Never fails: per-event errors are logged and dead-lettered so the
    /// producer has no reason to redeliver a partially applied batch.
    pub async fn handle_batch(&self, events: Vec<ChangeEvent>) -> BatchReport {
        let (removes, others): (Vec<_>, Vec<_>) =
            events.into_iter().partition(ChangeEvent::is_remove);
        let mut report = BatchReport::default();

        for phase in [removes, others] {
            if phase.is_empty() {
                continue;
            }
            let groups = join_all(by_model(phase).into_iter().map(|group| async move {
                let mut results = Vec::with_capacity(group.len());
                for event in group {
                    let result = self.handle_event(&event).await;
                    results.push((event, result));
                }
                results
            }))
            .await;
            for (event, result) in groups.into_iter().flatten() {
                report.record(&result);
                if let Err(e) = result {
                    self.dead_letter(&event, &e).await;
                }
            }
        }

        tracing::info!(
            processed = report.processed,
            skipped = report.skipped,
            failed = report.failed,
            "Stream batch handled"
        );
        report
    }

    pub async fn handle_event(&self, event: &ChangeEvent) -> Result<EventOutcome, StreamError> {
        let classified = match classify(event) {
            Classification::Accepted(c) => c,
            Classification::Skipped(reason) => {
                tracing::info!(
                    event_kind = event.event_name.as_str(),
                    work_id = event.work_id().unwrap_or("-"),
                    reason = %reason,
                    "Change event skipped"
                );
                return Ok(EventOutcome::Skipped(reason));
            }
        };

        let products = self.load_products(&classified.work.model).await?;
        let outcome = merge(classified.kind, &classified.work, products)?;
        let (upserted, deleted) = (outcome.to_upsert.len(), outcome.to_delete.len());
        self.write_products(outcome).await?;

        tracing::info!(
            event_kind = classified.kind.as_str(),
            work_id = %classified.work.id,
            upserted,
            deleted,
            "Product histories updated"
        );
        Ok(EventOutcome::Applied { upserted, deleted })
    }

    /// Re-runs a dead-lettered event and drops the letter once it applies.
    /// `Ok(None)` when no such letter exists.
    pub async fn replay(&self, letter_id: &str) -> Result<Option<EventOutcome>, StreamError> {
        let Some(letter) = self.store.get_dead_letter(letter_id)? else {
            return Ok(None);
        };
        let outcome = self.handle_event(&letter.event).await?;
        self.store.delete_dead_letter(letter_id)?;
        tracing::info!(letter_id, "Dead letter replayed");
        Ok(Some(outcome))
    }

    async fn dead_letter(&self, event: &ChangeEvent, error: &StreamError) {
        tracing::error!(
            event_kind = event.event_name.as_str(),
            work_id = event.work_id().unwrap_or("-"),
            error = %error,
            "Change event failed"
        );
        let store = self.store.clone();
        let event = event.clone();
        let message = error.to_string();
        let recorded =
            tokio::task::spawn_blocking(move || store.record_dead_letter(&event, &message)).await;
        match recorded {
            Ok(Ok(letter)) => tracing::warn!(letter_id = %letter.id, "Dead letter recorded"),
            Ok(Err(e)) => tracing::error!(error = %e, "Failed to record dead letter"),
            Err(e) => tracing::error!(error = %e, "Dead letter task failed"),
        }
    }

    /// Stored products of the model, plus fresh ones for products never worked on.
    async fn load_products(&self, model: &ModelRef) -> Result<Vec<Product>, StreamError> {
        let keys: Vec<String> = model
            .prods
            .iter()
            .map(|p| keys::product_key(&model.id, &p.id))
            .collect();

        let chunks = to_chunks(&keys).into_iter().enumerate().map(|(chunk, keys)| {
            let store = self.store.clone();
            async move {
                tracing::debug!(chunk, len = keys.len(), "Loading product chunk");
                let found = tokio::task::spawn_blocking(move || {
                    store.batch_get::<Product>(Table::Products, &keys)
                })
                .await??;
                Ok::<_, StreamError>(found)
            }
        });
        let stored: Vec<Product> = try_join_all(chunks).await?.into_iter().flatten().collect();

        let unregistered = model
            .prods
            .iter()
            .filter(|p| {
                let key = keys::product_key(&model.id, &p.id);
                !stored.iter().any(|s| s.id == key)
            })
            .map(|p| Product::unregistered(model, p))
            .collect::<Vec<_>>();

        Ok(unregistered.into_iter().chain(stored).collect())
    }

    async fn write_products(&self, outcome: MergeOutcome) -> Result<(), StreamError> {
        let requests: Vec<WriteRequest<Product>> = outcome
            .to_upsert
            .into_iter()
            .map(|product| WriteRequest::Put {
                key: product.id.clone(),
                item: product,
            })
            .chain(
                outcome
                    .to_delete
                    .into_iter()
                    .map(|key| WriteRequest::Delete { key }),
            )
            .collect();

        let chunks = to_chunks(&requests).into_iter().map(|chunk| {
            let store = self.store.clone();
            async move {
                tokio::task::spawn_blocking(move || store.batch_write(Table::Products, &chunk))
                    .await??;
                Ok::<_, StreamError>(())
            }
        });
        try_join_all(chunks).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use tempfile::{tempdir, TempDir};

    use super::*;
    use crate::constants::{PRIMARY_WORK_TYPE, TAG_CURRENT};
    use crate::store::operations::works::{ProdRef, Work};
    use crate::stream::event::EventName;

    fn setup() -> (TempDir, StreamHandler, Arc<Store>) {
        let dir = tempdir().unwrap();
        let store = Arc::new(Store::open(dir.path().join("stream-db").to_str().unwrap()).unwrap());
        (dir, StreamHandler::new(store.clone()), store)
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap()
    }

    fn finished_work(suffix: &str, start_min: i64, len_min: i64, prods: usize) -> Work {
        let start = t0() + Duration::minutes(start_min);
        Work {
            id: keys::work_key(start, suffix),
            start,
            fin: Some(start + Duration::minutes(len_min)),
            exec_id: "e1".to_string(),
            exec_name: "Kuznetsov".to_string(),
            work_type: PRIMARY_WORK_TYPE.to_string(),
            work_sub_type: Some("cut".to_string()),
            tag: None,
            upd_note: None,
            models: vec![ModelRef {
                id: "m1".to_string(),
                name: "Desk".to_string(),
                article: Some("D-1".to_string()),
                prods: (1..=prods)
                    .map(|n| ProdRef {
                        id: n.to_string(),
                        fullnumber: format!("D-{n:03}"),
                    })
                    .collect(),
            }],
            time: None,
        }
    }

    fn finish(work: &Work) -> ChangeEvent {
        let mut old = work.clone();
        old.fin = None;
        old.tag = Some(TAG_CURRENT.to_string());
        ChangeEvent {
            event_name: EventName::Modify,
            old_image: Some(old),
            new_image: Some(work.clone()),
        }
    }

    fn remove(work: &Work) -> ChangeEvent {
        ChangeEvent {
            event_name: EventName::Remove,
            old_image: Some(work.clone()),
            new_image: None,
        }
    }

    #[tokio::test]
    async fn finishing_a_work_books_it_on_every_product_across_chunks() {
        let (_dir, handler, store) = setup();
        let work = finished_work("_a", 0, 25, 25);

        let report = handler.handle_batch(vec![finish(&work)]).await;
        assert_eq!(report, BatchReport { processed: 1, skipped: 0, failed: 0 });

        for n in 1..=25 {
            let product = store.get_product(&format!("m1-{n}")).unwrap().unwrap();
            assert_eq!(product.time, 60_000);
            assert_eq!(product.ops.len(), 1);
            assert_eq!(product.model.name, "Desk");
        }
    }

    #[tokio::test]
    async fn removes_run_before_other_events_of_the_batch() {
        let (_dir, handler, store) = setup();
        let first = finished_work("_a", 0, 10, 1);
        handler.handle_batch(vec![finish(&first)]).await;

        // The replacement starts at the same instant; applied first it would be
        // removed again by the delete of the original.
        let mut replacement = finished_work("_a", 0, 20, 1);
        replacement.work_sub_type = Some("sew".to_string());
        let report = handler
            .handle_batch(vec![
                ChangeEvent {
                    event_name: EventName::Insert,
                    old_image: None,
                    new_image: Some(replacement.clone()),
                },
                remove(&first),
            ])
            .await;
        assert_eq!(report.processed, 2);

        let product = store.get_product("m1-1").unwrap().unwrap();
        assert_eq!(product.ops.len(), 1);
        assert_eq!(product.ops[0].work_sub_type.as_deref(), Some("sew"));
        assert_eq!(product.time, 20 * 60_000);
    }

    #[tokio::test]
    async fn removing_the_last_work_deletes_the_product() {
        let (_dir, handler, store) = setup();
        let work = finished_work("_a", 0, 10, 2);
        handler.handle_batch(vec![finish(&work)]).await;
        handler.handle_batch(vec![remove(&work)]).await;
        assert!(store.get_product("m1-1").unwrap().is_none());
        assert!(store.get_product("m1-2").unwrap().is_none());
    }

    #[tokio::test]
    async fn failures_are_dead_lettered_and_replayable() {
        let (_dir, handler, store) = setup();
        let work = finished_work("_a", 0, 10, 1);

        let report = handler.handle_batch(vec![remove(&work)]).await;
        assert_eq!(report.failed, 1);
        let letters = store.list_dead_letters(10).unwrap();
        assert_eq!(letters.len(), 1);
        assert!(letters[0].error.contains("not part of the history"));

        assert!(handler.replay(&letters[0].id).await.is_err());

        handler.handle_batch(vec![finish(&work)]).await;
        let outcome = handler.replay(&letters[0].id).await.unwrap();
        assert_eq!(outcome, Some(EventOutcome::Applied { upserted: 0, deleted: 1 }));
        assert_eq!(store.count_dead_letters(), 0);
        assert_eq!(handler.replay(&letters[0].id).await.unwrap(), None);
    }

    #[tokio::test]
    async fn same_model_events_of_one_batch_do_not_overwrite_each_other() {
        let (_dir, handler, store) = setup();
        let works: Vec<Work> = (0..5)
            .map(|i| finished_work(&format!("_{i}"), i * 10, 5, 3))
            .collect();
        let report = handler.handle_batch(works.iter().map(finish).collect()).await;
        assert_eq!(report.processed, 5);

        let product = store.get_product("m1-2").unwrap().unwrap();
        assert_eq!(product.ops.len(), 1);
        assert_eq!(product.ops[0].works.len(), 5);
        assert_eq!(product.time, 5 * 5 * 60_000 / 3);
    }

    #[test]
    fn events_are_queued_per_model_in_delivery_order() {
        let mut other = finished_work("_x", 0, 5, 1);
        other.models[0].id = "m2".to_string();
        let a = finished_work("_a", 0, 5, 1);
        let b = finished_work("_b", 10, 5, 1);
        let groups = by_model(vec![finish(&a), finish(&other), finish(&b)]);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].len(), 2);
        assert_eq!(groups[0][1].work_id(), Some(b.id.as_str()));
    }

    #[tokio::test]
    async fn out_of_scope_events_are_counted_as_skipped() {
        let (_dir, handler, store) = setup();
        let mut rest = finished_work("_r", 0, 10, 1);
        rest.work_type = "Отдых".to_string();
        let report = handler.handle_batch(vec![finish(&rest)]).await;
        assert_eq!(report, BatchReport { processed: 0, skipped: 1, failed: 0 });
        assert!(store.get_product("m1-1").unwrap().is_none());
    }
}
