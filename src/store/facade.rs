//! Uniform request/response access over the store's trees.
//!
//! Mirrors the contract of a partitioned key-value service: single get,
//! inclusive range query, batch get that silently drops missing keys, and
//! batch write of puts/deletes. Batch calls accept at most
//! [`STORE_BATCH_LIMIT`] items; callers are expected to chunk.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::constants::STORE_BATCH_LIMIT;
use crate::store::{Store, StoreError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    Works,
    Products,
    DayStats,
    DeadLetters,
}

impl Table {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Works => "works",
            Self::Products => "products",
            Self::DayStats => "day_stats",
            Self::DeadLetters => "dead_letters",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum WriteRequest<T> {
    Put { key: String, item: T },
    Delete { key: String },
}

impl<T> WriteRequest<T> {
    pub fn key(&self) -> &str {
        match self {
            Self::Put { key, .. } | Self::Delete { key } => key,
        }
    }
}

impl Store {
    fn tree(&self, table: Table) -> &sled::Tree {
        match table {
            Table::Works => &self.works,
            Table::Products => &self.products,
            Table::DayStats => &self.day_stats,
            Table::DeadLetters => &self.dead_letters,
        }
    }

    pub fn get<T: DeserializeOwned>(&self, table: Table, key: &str) -> Result<Option<T>, StoreError> {
        tracing::debug!(table = table.as_str(), key, "store get");
        match self.tree(table).get(key.as_bytes())? {
            Some(raw) => Ok(Some(Self::deserialize(&raw)?)),
            None => Ok(None),
        }
    }

    pub fn get_required<T: DeserializeOwned>(&self, table: Table, key: &str) -> Result<T, StoreError> {
        self.get(table, key)?.ok_or_else(|| StoreError::NotFound {
            entity: table.as_str().to_string(),
            key: key.to_string(),
        })
    }

    /// Items whose keys fall in `[from, to]`, in key order.
    pub fn query_range<T: DeserializeOwned>(
        &self,
        table: Table,
        from: &str,
        to: &str,
    ) -> Result<Vec<T>, StoreError> {
        let mut items = Vec::new();
        if from > to {
            return Ok(items);
        }
        for entry in self.tree(table).range(from.as_bytes()..=to.as_bytes()) {
            let (_, value) = entry?;
            items.push(Self::deserialize(&value)?);
        }
        tracing::debug!(table = table.as_str(), from, to, count = items.len(), "store query");
        Ok(items)
    }

    /// Keys only, like a query projecting the sort key.
    pub fn query_range_keys(&self, table: Table, from: &str, to: &str) -> Result<Vec<String>, StoreError> {
        let mut keys = Vec::new();
        if from > to {
            return Ok(keys);
        }
        for entry in self.tree(table).range(from.as_bytes()..=to.as_bytes()) {
            let (key, _) = entry?;
            keys.push(String::from_utf8_lossy(&key).into_owned());
        }
        Ok(keys)
    }

    pub fn batch_get<T: DeserializeOwned>(
        &self,
        table: Table,
        keys: &[String],
    ) -> Result<Vec<T>, StoreError> {
        check_batch_limit("batch_get", keys.len())?;
        let tree = self.tree(table);
        let mut items = Vec::with_capacity(keys.len());
        for key in keys {
            if let Some(raw) = tree.get(key.as_bytes())? {
                items.push(Self::deserialize(&raw)?);
            }
        }
        tracing::debug!(
            table = table.as_str(),
            requested = keys.len(),
            found = items.len(),
            "store batch_get"
        );
        Ok(items)
    }

    /// Applies all requests atomically.
    pub fn batch_write<T: Serialize>(
        &self,
        table: Table,
        requests: &[WriteRequest<T>],
    ) -> Result<(), StoreError> {
        check_batch_limit("batch_write", requests.len())?;
        let mut batch = sled::Batch::default();
        let mut puts = 0usize;
        for request in requests {
            match request {
                WriteRequest::Put { key, item } => {
                    batch.insert(key.as_bytes(), Self::serialize(item)?);
                    puts += 1;
                }
                WriteRequest::Delete { key } => batch.remove(key.as_bytes()),
            }
        }
        self.tree(table).apply_batch(batch)?;
        tracing::debug!(
            table = table.as_str(),
            puts,
            deletes = requests.len() - puts,
            "store batch_write"
        );
        Ok(())
    }

    pub fn put<T: Serialize>(&self, table: Table, key: &str, item: &T) -> Result<Option<Vec<u8>>, StoreError> {
        let previous = self.tree(table).insert(key.as_bytes(), Self::serialize(item)?)?;
        Ok(previous.map(|raw| raw.to_vec()))
    }

    /// Removes the item and returns it; an absent key is an inconsistency, not a no-op.
    pub fn delete_returning<T: DeserializeOwned>(&self, table: Table, key: &str) -> Result<T, StoreError> {
        match self.tree(table).remove(key.as_bytes())? {
            Some(raw) => Self::deserialize(&raw),
            None => Err(StoreError::EmptyResult {
                operation: "delete",
                detail: format!("table={} key={key}", table.as_str()),
            }),
        }
    }
}

fn check_batch_limit(operation: &'static str, len: usize) -> Result<(), StoreError> {
    if len > STORE_BATCH_LIMIT {
        return Err(StoreError::BatchLimitExceeded {
            operation,
            len,
            limit: STORE_BATCH_LIMIT,
        });
    }
    Ok(())
}

/// Splits `items` into slices the store accepts in one batch call.
pub fn to_chunks<T: Clone>(items: &[T]) -> Vec<Vec<T>> {
    items
        .chunks(STORE_BATCH_LIMIT)
        .map(<[T]>::to_vec)
        .collect()
}
