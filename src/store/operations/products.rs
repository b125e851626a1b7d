use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::store::keys;
use crate::store::operations::works::{ModelRef, ProdRef};
use crate::store::{Store, StoreError, Table};

/// A work as recorded inside a product's history; `time` is this product's share.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpWork {
    pub id: String,
    pub time: i64,
    pub start: DateTime<Utc>,
    pub fin: DateTime<Utc>,
    pub exec_name: String,
}

/// A maximal run of contiguous works sharing one subtype.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    pub work_sub_type: Option<String>,
    pub start: DateTime<Utc>,
    pub fin: DateTime<Utc>,
    pub time: i64,
    pub works: Vec<OpWork>,
}

impl Operation {
    pub fn single(work_sub_type: Option<String>, work: OpWork) -> Self {
        Self {
            work_sub_type,
            start: work.start,
            fin: work.fin,
            time: work.time,
            works: vec![work],
        }
    }

    /// Splits the run before `index`, which must leave both halves non-empty.
    pub fn split_at(&self, index: usize) -> (Self, Self) {
        let (head, tail) = self.works.split_at(index);
        (
            Self::from_run(self.work_sub_type.clone(), head),
            Self::from_run(self.work_sub_type.clone(), tail),
        )
    }

    /// Rebuilds an operation from a non-empty run of works.
    pub fn from_run(work_sub_type: Option<String>, works: &[OpWork]) -> Self {
        Self {
            work_sub_type,
            start: works[0].start,
            fin: works[works.len() - 1].fin,
            time: works.iter().map(|w| w.time).sum(),
            works: works.to_vec(),
        }
    }

    pub fn position_of(&self, work_id: &str) -> Option<usize> {
        self.works.iter().position(|w| w.id == work_id)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductModel {
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    /// `{modelId}-{prodId}`.
    pub id: String,
    #[serde(default)]
    pub fullnumber: String,
    #[serde(default)]
    pub model: ProductModel,
    #[serde(default)]
    pub time: i64,
    #[serde(default)]
    pub ops: Vec<Operation>,
}

impl Product {
    /// A product referenced by a work but not stored yet.
    pub fn unregistered(model: &ModelRef, prod: &ProdRef) -> Self {
        Self {
            id: keys::product_key(&model.id, &prod.id),
            fullnumber: prod.fullnumber.clone(),
            model: ProductModel {
                name: model.name.clone(),
            },
            time: 0,
            ops: Vec::new(),
        }
    }
}

impl Store {
    pub fn get_product(&self, id: &str) -> Result<Option<Product>, StoreError> {
        self.get(Table::Products, id)
    }
}
