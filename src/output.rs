//! Persistence helpers for pipeline artifacts.
//!
//! Every artifact is a UTF-8, comma-delimited CSV with a header row, except
//! the analysis summary which is pretty-printed JSON.

use serde::Serialize;
use std::fs;
use std::path::Path;
use tracing::info;

use crate::error::Result;

/// Creates the parent directory of `path` if it does not exist yet.
pub fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

/// Writes `records` to a fresh CSV at `path`, replacing any previous file.
///
/// `header` is written even when `records` is empty, so downstream readers
/// always find their columns. It must list the fields in serialization order.
pub fn write_records<T: Serialize>(path: &Path, header: &[&str], records: &[T]) -> Result<()> {
    ensure_parent(path)?;
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)?;
    writer.write_record(header)?;
    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;
    info!(path = %path.display(), rows = records.len(), "CSV written");
    Ok(())
}

/// Writes `value` as pretty-printed JSON.
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    ensure_parent(path)?;
    let body = serde_json::to_string_pretty(value)?;
    fs::write(path, body)?;
    info!(path = %path.display(), "JSON written");
    Ok(())
}

/// Logs a value as pretty-printed JSON.
pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    info!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
