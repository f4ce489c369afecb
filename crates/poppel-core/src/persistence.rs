//! Single-file persistence helpers
//!
//! Descriptors, attribute documents and array payloads are each written
//! atomically (write to temp file, then rename). There is no coordination
//! across files.

use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::warn;

use crate::error::{PoppelError, Result};

/// How JSON documents are laid out on disk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JsonStyle {
    #[default]
    Compact,
    Pretty,
}

/// Write data to a file atomically
///
/// 1. Write to a temporary file next to the target
/// 2. Sync the file to disk
/// 3. Rename the temp file over the target
///
/// The parent directory must already exist.
pub fn atomic_write(path: &Path, data: &[u8]) -> Result<()> {
    let temp_path = match path.extension() {
        Some(ext) => path.with_extension(format!("{}.tmp", ext.to_string_lossy())),
        None => path.with_extension("tmp"),
    };

    let result = write_and_sync(&temp_path, data).and_then(|()| {
        fs::rename(&temp_path, path).map_err(|e| PoppelError::write(e, path))
    });

    if result.is_err() && temp_path.exists() {
        if let Err(e) = fs::remove_file(&temp_path) {
            warn!("Failed to remove temp file {:?}: {}", temp_path, e);
        }
    }
    result
}

fn write_and_sync(temp_path: &Path, data: &[u8]) -> Result<()> {
    let mut file = File::create(temp_path).map_err(|e| PoppelError::write(e, temp_path))?;
    file.write_all(data)
        .map_err(|e| PoppelError::write(e, temp_path))?;
    file.sync_all()
        .map_err(|e| PoppelError::write(e, temp_path))?;
    Ok(())
}

/// Read and parse a whole JSON document
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = fs::read_to_string(path).map_err(|e| PoppelError::read(e, path))?;
    serde_json::from_str(&content).map_err(|e| PoppelError::Format {
        path: Some(path.to_path_buf()),
        details: e.to_string(),
    })
}

/// Serialize and atomically write a whole JSON document
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T, style: JsonStyle) -> Result<()> {
    let serialized = match style {
        JsonStyle::Compact => serde_json::to_vec(value),
        JsonStyle::Pretty => serde_json::to_vec_pretty(value),
    }
    .map_err(|e| PoppelError::Format {
        path: Some(path.to_path_buf()),
        details: e.to_string(),
    })?;

    atomic_write(path, &serialized)
}
