//! JSON-lines store: one file per table, one object per line.
//!
//! Storage path: `{data_dir}/{table}.jsonl`

use std::path::PathBuf;

use async_trait::async_trait;
use encounter_core::records::{Record, Table};
use log::{debug, info};
use serde::Serialize;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;

use super::{Batch, RecordStore};
use crate::error::StorageError;

/// One output line
#[derive(Serialize)]
struct Row<'a> {
    key: String,
    #[serde(flatten)]
    record: &'a Record,
}

#[derive(Debug, Clone)]
pub struct JsonLinesStore {
    base_dir: PathBuf,
}

impl JsonLinesStore {
    /// Open a store under `base_dir`, creating the directory if needed
    pub async fn open(base_dir: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let base_dir = base_dir.into();
        fs::create_dir_all(&base_dir)
            .await
            .map_err(|source| StorageError::CreateDir {
                path: base_dir.clone(),
                source,
            })?;
        info!("Writing records to {}", base_dir.display());
        Ok(Self { base_dir })
    }

    /// File holding the rows of `table`
    pub fn table_path(&self, table: Table) -> PathBuf {
        self.base_dir.join(format!("{}.jsonl", table))
    }

    async fn append(&self, table: Table, records: &[Record]) -> Result<(), StorageError> {
        let mut lines = String::new();
        for record in records {
            let row = Row {
                key: record.key(),
                record,
            };
            let line = serde_json::to_string(&row)
                .map_err(|source| StorageError::Serialize { table, source })?;
            lines.push_str(&line);
            lines.push('\n');
        }

        let path = self.table_path(table);
        let write_err = |source| StorageError::Write {
            table,
            path: path.clone(),
            source,
        };
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(write_err)?;
        file.write_all(lines.as_bytes()).await.map_err(write_err)?;
        file.flush().await.map_err(write_err)?;

        debug!("Appended {} rows to {}", records.len(), path.display());
        Ok(())
    }
}

#[async_trait]
impl RecordStore for JsonLinesStore {
    async fn write_batch(&self, batch: &Batch) -> Result<usize, StorageError> {
        let mut written = 0;
        for (table, records) in batch.tables() {
            self.append(table, records).await?;
            written += records.len();
        }
        Ok(written)
    }
}
