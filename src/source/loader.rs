//! Loading activity records from exported listings.
//!
//! An input is either a single JSON file or a directory tree of them.
//! Each file holds a bare array of records or the listing envelope
//! `{ "data": [...] }`.

use crate::models::ActivityRecord;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};
use walkdir::{DirEntry, WalkDir};

/// Errors raised while reading an input.
#[derive(Error, Debug)]
pub enum SourceError {
    /// Input path does not exist
    #[error("input not found: {0}")]
    NotFound(PathBuf),

    /// File could not be read
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// File is not valid JSON
    #[error("invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// JSON is valid but not a listing
    #[error("expected a JSON array or an object with a \"data\" array in {0}")]
    Shape(PathBuf),

    /// Directory walk failed
    #[error("failed to walk {path}: {source}")]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    /// Directory holds no listing files
    #[error("no .json files found under {0}")]
    EmptyDirectory(PathBuf),
}

/// Result type alias for record loading
pub type Result<T> = std::result::Result<T, SourceError>;

/// Records read from an input.
#[derive(Debug, Clone, Default)]
pub struct LoadedRecords {
    pub records: Vec<ActivityRecord>,
    /// Number of files read.
    pub files: usize,
    /// Rows that were not JSON objects and were skipped.
    pub skipped: usize,
}

/// Load every record from a file or directory.
pub fn load_records(path: &Path) -> Result<LoadedRecords> {
    if !path.exists() {
        return Err(SourceError::NotFound(path.to_path_buf()));
    }

    let loaded = if path.is_dir() {
        load_directory(path)?
    } else {
        let (records, skipped) = load_file(path)?;
        LoadedRecords {
            records,
            files: 1,
            skipped,
        }
    };

    info!(
        "Loaded {} records from {} file(s) ({} skipped)",
        loaded.records.len(),
        loaded.files,
        loaded.skipped
    );

    Ok(loaded)
}

fn load_directory(root: &Path) -> Result<LoadedRecords> {
    let mut loaded = LoadedRecords::default();

    let walker = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| entry.depth() == 0 || !is_hidden(entry));

    for entry in walker {
        let entry = entry.map_err(|source| SourceError::Walk {
            path: root.to_path_buf(),
            source,
        })?;

        if !entry.file_type().is_file() || !is_listing_file(entry.path()) {
            continue;
        }

        debug!("Reading {}", entry.path().display());
        let (records, skipped) = load_file(entry.path())?;
        loaded.records.extend(records);
        loaded.skipped += skipped;
        loaded.files += 1;
    }

    if loaded.files == 0 {
        return Err(SourceError::EmptyDirectory(root.to_path_buf()));
    }

    Ok(loaded)
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .map(|name| name.starts_with('.'))
        .unwrap_or(false)
}

fn is_listing_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("json"))
        .unwrap_or(false)
}

/// Read and parse one listing file.
fn load_file(path: &Path) -> Result<(Vec<ActivityRecord>, usize)> {
    let value = read_json(path)?;
    let rows = listing_rows(value, path)?;

    let mut records = Vec::with_capacity(rows.len());
    let mut skipped = 0;

    for (i, row) in rows.into_iter().enumerate() {
        if !row.is_object() {
            warn!("Skipping row {} in {}: not an object", i, path.display());
            skipped += 1;
            continue;
        }

        match serde_json::from_value::<ActivityRecord>(row) {
            Ok(record) => records.push(record),
            Err(e) => {
                warn!("Skipping row {} in {}: {}", i, path.display(), e);
                skipped += 1;
            }
        }
    }

    Ok((records, skipped))
}

pub(crate) fn read_json(path: &Path) -> Result<Value> {
    let content = fs::read_to_string(path).map_err(|source| SourceError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    serde_json::from_str(&content).map_err(|source| SourceError::Json {
        path: path.to_path_buf(),
        source,
    })
}

/// Unwrap a bare array or a `{ "data": [...] }` envelope.
pub(crate) fn listing_rows(value: Value, path: &Path) -> Result<Vec<Value>> {
    match value {
        Value::Array(rows) => Ok(rows),
        Value::Object(mut map) => match map.remove("data") {
            Some(Value::Array(rows)) => Ok(rows),
            _ => Err(SourceError::Shape(path.to_path_buf())),
        },
        _ => Err(SourceError::Shape(path.to_path_buf())),
    }
}
