//! Record stores.
//!
//! A store receives one [`Batch`] per flush and writes it in bulk. A failed
//! write returns an error and the buffer keeps the batch for the next
//! attempt, so a store may see the same rows more than once; every row
//! carries its natural key for that reason.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use encounter_core::records::{Record, Table};

use crate::error::StorageError;

mod jsonl;
#[cfg(test)]
pub(crate) mod memory;

pub use jsonl::JsonLinesStore;

/// Records taken from the buffer in one flush, grouped by table
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Batch {
    tables: BTreeMap<Table, Vec<Record>>,
}

impl Batch {
    pub fn from_records(records: Vec<Record>) -> Self {
        let mut tables: BTreeMap<Table, Vec<Record>> = BTreeMap::new();
        for record in records {
            tables.entry(record.table()).or_default().push(record);
        }
        Batch { tables }
    }

    /// Records for one table, in the order they were queued
    pub fn get(&self, table: Table) -> &[Record] {
        self.tables.get(&table).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Non-empty tables in table order
    pub fn tables(&self) -> impl Iterator<Item = (Table, &[Record])> {
        self.tables.iter().map(|(t, r)| (*t, r.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.tables.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Flatten back into records; order within each table is preserved
    pub fn into_records(self) -> Vec<Record> {
        self.tables.into_values().flatten().collect()
    }
}

#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Write every record in the batch, returning how many were written
    async fn write_batch(&self, batch: &Batch) -> Result<usize, StorageError>;
}

#[async_trait]
impl<S: RecordStore + ?Sized> RecordStore for Arc<S> {
    async fn write_batch(&self, batch: &Batch) -> Result<usize, StorageError> {
        (**self).write_batch(batch).await
    }
}
