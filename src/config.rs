//! Engine configuration
//! TOML file with environment variable overrides; everything has a default
//! so a missing or partial file still yields a working engine

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::partitions;
use crate::store::DurableStore;

const CONFIG_FILE: &str = "config.toml";
const DB_DIR: &str = "state.db";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Directory holding the database and config file
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Debounce window for write-back, in milliseconds
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

fn default_data_dir() -> PathBuf {
    let mut path = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
    path.push("durastate");
    path
}

fn default_debounce_ms() -> u64 {
    300
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            debounce_ms: default_debounce_ms(),
        }
    }
}

impl EngineConfig {
    fn config_path() -> PathBuf {
        let mut path = default_data_dir();
        path.push(CONFIG_FILE);
        path
    }

    /// Load from the config file, falling back to defaults, then apply
    /// environment variable overrides.
    pub fn load() -> Self {
        let path = Self::config_path();
        let mut config = Self::default();

        if path.exists() {
            if let Ok(contents) = fs::read_to_string(&path) {
                match toml::from_str::<EngineConfig>(&contents) {
                    Ok(loaded) => {
                        tracing::debug!(path = %path.display(), "loaded engine config");
                        config = loaded;
                    }
                    Err(err) => {
                        tracing::warn!(
                            path = %path.display(),
                            error = %err,
                            "malformed engine config, using defaults"
                        );
                    }
                }
            }
        }

        config.apply_env_overrides();
        config
    }

    /// Write the config out atomically (temp file + rename).
    pub fn save(&self) -> anyhow::Result<()> {
        let path = Self::config_path();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        let temp_path = path.with_extension("toml.tmp");
        fs::write(&temp_path, &contents)?;
        fs::rename(&temp_path, &path)?;
        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(dir) = std::env::var("DURASTATE_DATA_DIR") {
            if !dir.is_empty() {
                self.data_dir = PathBuf::from(dir);
            }
        }
        if let Ok(ms) = std::env::var("DURASTATE_DEBOUNCE_MS") {
            if let Ok(ms) = ms.parse::<u64>() {
                self.debounce_ms = ms;
            }
        }
    }

    /// Path of the sled database under the data directory.
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join(DB_DIR)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    /// Build the durable store this config describes, declaring every
    /// registered partition.
    pub fn open_store(&self) -> DurableStore {
        DurableStore::new(self.db_path(), partitions::ALL)
    }
}
