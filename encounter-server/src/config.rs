//! Collector configuration.
//!
//! Loaded from an optional JSON file; every section and field falls back to
//! its default, so a file only needs the values it changes:
//!
//! ```json
//! { "encounters": { "start_distance_nm": 2.0 }, "buffer": { "batch_size": 500 } }
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use encounter_core::EncounterSettings;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Longest gap between statistics log lines, one day
const MAX_STATS_INTERVAL_S: u64 = 24 * 3600;

pub fn get_project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("org", "encounter", "encounter-server")
}

/// Where the JSON-lines tables go when `--data-dir` is not given
pub fn default_data_dir() -> Result<PathBuf, ConfigError> {
    let project_dirs = get_project_dirs().ok_or(ConfigError::NoDataDir)?;
    Ok(project_dirs.data_dir().to_owned())
}

/// Write buffering
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BufferSettings {
    /// Flush as soon as this many records are queued
    pub batch_size: usize,
    /// Flush at least this often (seconds) while records are queued
    pub flush_interval_s: u64,
}

impl Default for BufferSettings {
    fn default() -> Self {
        Self {
            batch_size: 100,
            flush_interval_s: 5,
        }
    }
}

impl BufferSettings {
    pub fn flush_interval(&self) -> Duration {
        Duration::from_secs(self.flush_interval_s)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch_size == 0 {
            return Err(ConfigError::Buffer {
                field: "batch_size",
            });
        }
        if self.flush_interval_s == 0 {
            return Err(ConfigError::Buffer {
                field: "flush_interval_s",
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub encounters: EncounterSettings,
    pub buffer: BufferSettings,
    /// Seconds between engine statistics log lines
    pub stats_interval_s: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            encounters: EncounterSettings::default(),
            buffer: BufferSettings::default(),
            stats_interval_s: 30,
        }
    }
}

impl Config {
    /// Load from `path`, or use the defaults when no file is given
    pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
        let config = match path {
            Some(path) => {
                let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
                    path: path.to_owned(),
                    source,
                })?;
                let config: Config =
                    serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
                        path: path.to_owned(),
                        source,
                    })?;
                debug!("Loaded config from {}", path.display());
                config
            }
            None => Config::default(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.encounters.validate()?;
        self.buffer.validate()
    }

    pub fn stats_interval(&self) -> Duration {
        Duration::from_secs(self.stats_interval_s.clamp(1, MAX_STATS_INTERVAL_S))
    }
}
