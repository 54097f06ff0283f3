use std::io;
use std::path::PathBuf;

use encounter_core::records::Table;
use encounter_core::SettingsError;
use thiserror::Error;

/// A bulk write that did not reach the store; the batch stays queued
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Failed to create data directory {}: {source}", .path.display())]
    CreateDir { path: PathBuf, source: io::Error },

    #[error("Failed to write {table} records to {}: {source}", .path.display())]
    Write {
        table: Table,
        path: PathBuf,
        source: io::Error,
    },

    #[error("Failed to serialize {table} record: {source}")]
    Serialize {
        table: Table,
        source: serde_json::Error,
    },
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Cannot read config file {}: {source}", .path.display())]
    Read { path: PathBuf, source: io::Error },

    #[error("Cannot parse config file {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error(transparent)]
    Settings(#[from] SettingsError),

    #[error("Invalid buffer setting '{field}': must be non-zero")]
    Buffer { field: &'static str },

    #[error("Cannot determine a data directory, pass --data-dir")]
    NoDataDir,
}

#[derive(Error, Debug)]
pub enum InputError {
    #[error("Cannot open input {}: {source}", .path.display())]
    Open { path: PathBuf, source: io::Error },

    #[error("Failed reading input: {0}")]
    Read(#[from] io::Error),
}
