use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::store::keys;
use crate::store::{Store, StoreError, Table};
use crate::stream::event::ChangeEvent;

/// A change event whose processing failed and was not retried by the feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeadLetter {
    /// Also the storage key; sorts by failure time.
    pub id: String,
    pub event: ChangeEvent,
    pub error: String,
    pub failed_at: DateTime<Utc>,
}

impl Store {
    pub fn record_dead_letter(
        &self,
        event: &ChangeEvent,
        error: &str,
    ) -> Result<DeadLetter, StoreError> {
        let failed_at = Utc::now();
        let letter = DeadLetter {
            id: keys::dead_letter_key(
                failed_at.timestamp_millis(),
                &uuid::Uuid::new_v4().simple().to_string(),
            ),
            event: event.clone(),
            error: error.to_string(),
            failed_at,
        };
        self.put(Table::DeadLetters, &letter.id, &letter)?;
        Ok(letter)
    }

    pub fn get_dead_letter(&self, id: &str) -> Result<Option<DeadLetter>, StoreError> {
        self.get(Table::DeadLetters, id)
    }

    /// Oldest first.
    pub fn list_dead_letters(&self, limit: usize) -> Result<Vec<DeadLetter>, StoreError> {
        let mut letters = Vec::new();
        for item in self.dead_letters.iter().take(limit) {
            let (_, value) = item?;
            letters.push(Self::deserialize(&value)?);
        }
        Ok(letters)
    }

    pub fn count_dead_letters(&self) -> usize {
        self.dead_letters.len()
    }

    pub fn delete_dead_letter(&self, id: &str) -> Result<bool, StoreError> {
        Ok(self.dead_letters.remove(id.as_bytes())?.is_some())
    }
}
