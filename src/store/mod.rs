pub mod facade;
pub mod keys;
pub mod operations;
pub mod trees;

use serde::de::DeserializeOwned;
use serde::Serialize;
use sled::Db;
use thiserror::Error;

pub use facade::{Table, WriteRequest};

#[derive(Debug)]
pub struct Store {
    db: Db,
    pub works: sled::Tree,
    pub products: sled::Tree,
    pub day_stats: sled::Tree,
    pub dead_letters: sled::Tree,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("not found: entity={entity}, key={key}")]
    NotFound { entity: String, key: String },
    #[error("{operation} returned no data: {detail}")]
    EmptyResult { operation: &'static str, detail: String },
    #[error("{operation} got {len} items, store accepts at most {limit} per call")]
    BatchLimitExceeded {
        operation: &'static str,
        len: usize,
        limit: usize,
    },
    #[error("validation error: {0}")]
    Validation(String),
}

impl Store {
    pub fn open(sled_path: &str) -> Result<Self, StoreError> {
        let db = sled::open(sled_path)?;
        let works = db.open_tree(trees::WORKS)?;
        let products = db.open_tree(trees::PRODUCTS)?;
        let day_stats = db.open_tree(trees::DAY_STATS)?;
        let dead_letters = db.open_tree(trees::DEAD_LETTERS)?;

        Ok(Self {
            db,
            works,
            products,
            day_stats,
            dead_letters,
        })
    }

    pub fn flush(&self) -> Result<(), StoreError> {
        self.db.flush()?;
        Ok(())
    }

    pub(crate) fn serialize<T: Serialize>(value: &T) -> Result<Vec<u8>, StoreError> {
        Ok(serde_json::to_vec(value)?)
    }

    pub(crate) fn deserialize<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, StoreError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}
