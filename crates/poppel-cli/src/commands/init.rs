//! Init command handler

use std::path::Path;

use anyhow::Result;

use poppel_core::{Config, OpenMode};

use crate::output::Output;

/// Create a new, empty file
///
/// Without `force` an existing directory is left alone and the command
/// fails; with it the directory is erased and recreated.
pub fn init(path: &Path, force: bool, config: &Config, output: &Output) -> Result<()> {
    let mode = if force {
        OpenMode::OVERWRITE
    } else {
        OpenMode::CREATE_WRITE | OpenMode::EXCL
    };
    let file = super::open(path, mode, config)?;

    if output.is_json() {
        println!(
            "{}",
            serde_json::json!({"path": file.path(), "created": true})
        );
    } else if output.is_quiet() {
        println!("{}", file.path().display());
    } else {
        output.success(&format!("Created {}", file.path().display()));
    }
    Ok(())
}
