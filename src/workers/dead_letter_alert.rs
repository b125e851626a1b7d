//! Periodic warning while dead letters wait for replay (every 15 minutes)

use crate::store::Store;

pub async fn run(store: &Store) {
    let pending = store.count_dead_letters();
    if pending == 0 {
        tracing::debug!("No pending dead letters");
        return;
    }

    let oldest = match store.list_dead_letters(1) {
        Ok(letters) => letters.into_iter().next(),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to read oldest dead letter");
            None
        }
    };
    tracing::warn!(
        pending,
        oldest_id = oldest.as_ref().map(|l| l.id.as_str()).unwrap_or("-"),
        oldest_error = oldest.as_ref().map(|l| l.error.as_str()).unwrap_or("-"),
        "Change events are waiting in the dead-letter tree"
    );
}
