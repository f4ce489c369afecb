//! Command handlers

pub mod attrs;
pub mod config;
pub mod header;
pub mod init;
pub mod node;
pub mod tree;

use std::path::Path;

use anyhow::{bail, Context, Result};
use serde_json::Value;

use poppel_core::{Config, Dataset, ErrorKind, File, Group, OpenMode};

/// A group or dataset found by path
pub enum Target {
    Group(Group),
    Dataset(Dataset),
}

impl Target {
    pub fn load_attrs(&self) -> Result<Value> {
        let loaded = match self {
            Target::Group(group) => group.load_attrs(),
            Target::Dataset(dataset) => dataset.load_attrs(),
        };
        match loaded {
            Ok(attrs) => Ok(attrs),
            // Read-only files cannot create the document; nothing stored yet.
            Err(e) if e.kind() == ErrorKind::State => Ok(Value::Object(Default::default())),
            Err(e) => Err(e).context("Failed to load attributes"),
        }
    }
}

/// Open a file with the configured attribute layout
pub fn open(path: &Path, mode: OpenMode, config: &Config) -> Result<File> {
    File::open_with_config(path, mode, config)
        .with_context(|| format!("Failed to open {:?}", path))
}

/// Whether `path` names the file root itself
fn is_root(path: &str) -> bool {
    matches!(path.trim_matches('/'), "" | ".")
}

/// Find the group or dataset at `path`; empty, `.` and `/` mean the root
pub fn lookup(file: &File, path: &str) -> Result<Target> {
    if is_root(path) {
        return Ok(Target::Group(file.root().clone()));
    }

    let path = path.trim_start_matches('/');
    if file.has_group(path)? {
        return Ok(Target::Group(file.get_group(path)?));
    }
    if file.has_dataset(path)? {
        return Ok(Target::Dataset(file.get_dataset(path)?));
    }
    bail!("No group or dataset at '{}' in {:?}", path, file.path())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_lookup() {
        let temp_dir = TempDir::new().unwrap();
        let file = File::open(temp_dir.path().join("t.poppel"), OpenMode::CREATE_WRITE).unwrap();
        file.create_group("g").unwrap();
        file.create_dataset("g/d", &1u8).unwrap();

        assert!(matches!(lookup(&file, "").unwrap(), Target::Group(_)));
        assert!(matches!(lookup(&file, "/").unwrap(), Target::Group(_)));
        assert!(matches!(lookup(&file, "/g").unwrap(), Target::Group(_)));
        assert!(matches!(lookup(&file, "g/d").unwrap(), Target::Dataset(_)));
        assert!(lookup(&file, "missing").is_err());
    }

    #[test]
    fn test_attrs_missing_on_read_only() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("t.poppel");
        File::open(&path, OpenMode::CREATE_WRITE).unwrap();

        let file = File::open(&path, OpenMode::READ_ONLY).unwrap();
        let attrs = lookup(&file, "").unwrap().load_attrs().unwrap();
        assert_eq!(attrs, serde_json::json!({}));
    }
}
