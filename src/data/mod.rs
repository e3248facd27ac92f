//! Snapshot discovery and loading.
//!
//! A snapshot is a directory of per-category JSON arrays written by the
//! collector, named by a sortable timestamp under the data root.

pub mod ingest;

use anyhow::{bail, Context, Result};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, info};

pub use ingest::{ingest_records, Ingested};

/// Aggregate file the collector writes alongside the category files.
pub const AGGREGATE_FILE: &str = "all_markets.json";

/// Newest snapshot directory under `data_dir`: greatest name, then
/// latest modification time.
pub fn latest_snapshot(data_dir: &Path) -> Result<PathBuf> {
    let entries = std::fs::read_dir(data_dir)
        .with_context(|| format!("Failed to list data directory {}", data_dir.display()))?;

    let mut dirs: Vec<(String, SystemTime, PathBuf)> = Vec::new();
    for entry in entries {
        let entry = entry.context("Failed to read data directory entry")?;
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        let modified = entry
            .metadata()
            .and_then(|m| m.modified())
            .unwrap_or(SystemTime::UNIX_EPOCH);
        dirs.push((name, modified, path));
    }

    dirs.sort_by(|a, b| a.0.cmp(&b.0).then(a.1.cmp(&b.1)));
    match dirs.pop() {
        Some((name, _, path)) => {
            info!(snapshot = %name, candidates = dirs.len() + 1, "Selected latest snapshot");
            Ok(path)
        }
        None => bail!("No snapshot directories found in {}", data_dir.display()),
    }
}

/// Validate an operator-supplied snapshot path.
pub fn explicit_snapshot(path: &Path) -> Result<PathBuf> {
    if !path.is_dir() {
        bail!("Snapshot {} is not a directory", path.display());
    }
    Ok(path.to_path_buf())
}

/// Category files in a snapshot, sorted by name, aggregate file excluded.
pub fn category_files(snapshot: &Path) -> Result<Vec<PathBuf>> {
    let entries = std::fs::read_dir(snapshot)
        .with_context(|| format!("Failed to list snapshot {}", snapshot.display()))?;

    let mut files = Vec::new();
    for entry in entries {
        let path = entry.context("Failed to read snapshot entry")?.path();
        let is_json = path.extension().and_then(|e| e.to_str()) == Some("json");
        let is_aggregate = path.file_name().and_then(|n| n.to_str()) == Some(AGGREGATE_FILE);
        if path.is_file() && is_json && !is_aggregate {
            files.push(path);
        }
    }
    files.sort();
    debug!(snapshot = %snapshot.display(), count = files.len(), "Listed category files");
    Ok(files)
}

/// File stem used as the category name in logs and output files.
pub fn category_name(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Final path component of a snapshot directory.
pub fn snapshot_name(path: &Path) -> String {
    path.file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "snapshot".to_string())
}

/// Read a category file as raw records. Fails if the file is not a JSON array.
pub fn load_category(path: &Path) -> Result<Vec<Value>> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let value: Value = serde_json::from_str(&contents)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    match value {
        Value::Array(records) => Ok(records),
        other => bail!(
            "{} is not a JSON array (found {})",
            path.display(),
            json_kind(&other)
        ),
    }
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
