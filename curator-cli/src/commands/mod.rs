pub mod add;
pub mod content;
pub mod edit;
pub mod init;
pub mod list;
pub mod reorder;
pub mod status;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use serde_json::Value;

use curator_core::{config, CuratorConfig, FieldSnapshot, FileStore};

pub(crate) fn home() -> Result<PathBuf> {
    dirs::home_dir().context("could not determine home directory")
}

/// The file-backed collaborator plus the config that tunes it.
pub(crate) fn open_store() -> Result<(Arc<FileStore>, CuratorConfig)> {
    let home = home()?;
    let cfg = config::load_at(&home).context("failed to load ~/.curator/config.yaml")?;
    Ok((Arc::new(FileStore::new(home)), cfg))
}

/// Parse `key=value`. The value is read as JSON when it parses, else as a
/// plain string, so `price=12` is a number and `title=Intro` a string.
pub(crate) fn parse_field(raw: &str) -> Result<(String, Value), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{raw}'"))?;
    if key.is_empty() {
        return Err(format!("empty field name in '{raw}'"));
    }
    Ok((key.to_string(), parse_value(value)))
}

pub(crate) fn parse_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

pub(crate) fn into_snapshot(fields: Vec<(String, Value)>) -> FieldSnapshot {
    fields.into_iter().collect()
}

/// Convert a 1-based display position to an index.
pub(crate) fn position_index(position: usize) -> Result<usize> {
    position
        .checked_sub(1)
        .ok_or_else(|| anyhow!("positions start at 1"))
}
