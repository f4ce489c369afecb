//! Group creation and node removal handlers

use std::path::Path;

use anyhow::{Context, Result};

use poppel_core::{Config, OpenMode};

use super::Target;
use crate::output::Output;

/// Create a group and any missing ancestors
pub fn mkgroup(path: &Path, group: &str, config: &Config, output: &Output) -> Result<()> {
    let file = super::open(path, OpenMode::READ_WRITE, config)?;
    let created = file
        .require_group(group)
        .with_context(|| format!("Failed to create group '{}'", group))?;

    if output.is_quiet() {
        println!("{}", created.path().display());
    } else {
        output.success(&format!("Group '{}' ready", group));
    }
    Ok(())
}

/// Delete a group or dataset with everything below it
pub fn rm(path: &Path, node: &str, config: &Config, output: &Output) -> Result<()> {
    let file = super::open(path, OpenMode::READ_WRITE, config)?;
    let node = node.trim_start_matches('/');

    let (kind, result) = match super::lookup(&file, node)? {
        Target::Group(group) if group.node().relpath.as_os_str().is_empty() => {
            anyhow::bail!("Refusing to remove the file root; delete the directory instead")
        }
        Target::Group(_) => ("group", file.delete_group(node)),
        Target::Dataset(_) => ("dataset", file.delete_dataset(node)),
    };
    result.with_context(|| format!("Failed to delete {} '{}'", kind, node))?;

    output.success(&format!("Deleted {} '{}'", kind, node));
    Ok(())
}
