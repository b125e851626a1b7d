use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::store::keys;
use crate::store::{Store, StoreError, Table};
use crate::stream::event::{ChangeEvent, EventName};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProdRef {
    /// Product number within its model.
    pub id: String,
    #[serde(default)]
    pub fullnumber: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelRef {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub article: Option<String>,
    #[serde(default)]
    pub prods: Vec<ProdRef>,
}

/// One executor's labour interval, as stored in the works tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Work {
    pub id: String,
    pub start: DateTime<Utc>,
    #[serde(default)]
    pub fin: Option<DateTime<Utc>>,
    pub exec_id: String,
    pub exec_name: String,
    pub work_type: String,
    #[serde(default)]
    pub work_sub_type: Option<String>,
    #[serde(default)]
    pub tag: Option<String>,
    #[serde(default)]
    pub upd_note: Option<String>,
    #[serde(default)]
    pub models: Vec<ModelRef>,
    /// Duration in seconds, filled in when an admin edits a finished work.
    #[serde(default)]
    pub time: Option<i64>,
}

impl Work {
    /// The model whose products this work is booked against.
    pub fn model(&self) -> Option<&ModelRef> {
        self.models.first()
    }

    pub fn duration_ms(&self) -> Option<i64> {
        self.fin.map(|fin| (fin - self.start).num_milliseconds())
    }
}

impl Store {
    pub fn get_work(&self, id: &str) -> Result<Option<Work>, StoreError> {
        self.get(Table::Works, id)
    }

    /// Writes the work and reports the change as the works tree's change feed would.
    pub fn put_work(&self, work: &Work) -> Result<ChangeEvent, StoreError> {
        let previous = self.put(Table::Works, &work.id, work)?;
        let old_image = previous
            .map(|raw| Self::deserialize::<Work>(&raw))
            .transpose()?;
        let event_name = if old_image.is_some() {
            EventName::Modify
        } else {
            EventName::Insert
        };
        Ok(ChangeEvent {
            event_name,
            old_image,
            new_image: Some(work.clone()),
        })
    }

    pub fn delete_work(&self, id: &str) -> Result<ChangeEvent, StoreError> {
        let old: Work = self.delete_returning(Table::Works, id)?;
        Ok(ChangeEvent {
            event_name: EventName::Remove,
            old_image: Some(old),
            new_image: None,
        })
    }

    /// Works that started within `[from, to]`, ordered by start.
    pub fn works_started_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Work>, StoreError> {
        let (lo, hi) = keys::works_started_between(from, to);
        self.query_range(Table::Works, &lo, &hi)
    }
}
