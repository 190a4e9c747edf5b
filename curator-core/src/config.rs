//! `<home>/.curator/config.yaml`.
//!
//! Missing file means defaults; a malformed file is an error rather than a
//! silent fallback.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{io_err, StoreError};
use crate::store::{curator_root, write_atomic};

pub const DEFAULT_DEBOUNCE_MS: u64 = 500;
pub const DEFAULT_RECONCILE_TIMEOUT_MS: u64 = 10_000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CuratorConfig {
    /// Quiet period before a debounced commit fires.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Bounded wait for reorder and document-save reconciliation.
    #[serde(default = "default_reconcile_timeout_ms")]
    pub reconcile_timeout_ms: u64,

    /// JSON file replacing the built-in default content document.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub defaults_path: Option<PathBuf>,
}

fn default_debounce_ms() -> u64 {
    DEFAULT_DEBOUNCE_MS
}

fn default_reconcile_timeout_ms() -> u64 {
    DEFAULT_RECONCILE_TIMEOUT_MS
}

impl Default for CuratorConfig {
    fn default() -> Self {
        Self {
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            reconcile_timeout_ms: DEFAULT_RECONCILE_TIMEOUT_MS,
            defaults_path: None,
        }
    }
}

impl CuratorConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn reconcile_timeout(&self) -> Duration {
        Duration::from_millis(self.reconcile_timeout_ms)
    }
}

pub fn config_path_at(home: &Path) -> PathBuf {
    curator_root(home).join("config.yaml")
}

pub fn load_at(home: &Path) -> Result<CuratorConfig, StoreError> {
    let path = config_path_at(home);
    if !path.exists() {
        return Ok(CuratorConfig::default());
    }
    let contents = std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
    serde_yaml::from_str(&contents).map_err(|e| StoreError::Config { path, source: e })
}

/// Write the config only if none exists yet. Returns whether it was written.
pub fn init_at(home: &Path) -> Result<bool, StoreError> {
    let path = config_path_at(home);
    if path.exists() {
        return Ok(false);
    }
    let yaml = serde_yaml::to_string(&CuratorConfig::default())?;
    write_atomic(&path, yaml.as_bytes())?;
    Ok(true)
}
