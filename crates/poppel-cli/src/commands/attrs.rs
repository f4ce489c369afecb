//! Attribute command handlers

use std::path::Path;

use anyhow::{bail, Context, Result};
use serde_json::Value;

use poppel_core::{Config, OpenMode};

use super::Target;
use crate::output::{Output, OutputFormat};

/// Print the attribute document of a node (the root when `node` is absent)
pub fn show(path: &Path, node: Option<&str>, config: &Config, output: &Output) -> Result<()> {
    let file = super::open(path, OpenMode::READ_ONLY, config)?;
    let attrs = super::lookup(&file, node.unwrap_or(""))?.load_attrs()?;

    match output.format {
        OutputFormat::Json => output.json(&attrs)?,
        OutputFormat::Quiet => println!("{}", attrs),
        OutputFormat::Human => match &attrs {
            Value::Object(map) if map.is_empty() => println!("No attributes."),
            Value::Object(map) => {
                for (key, value) in map {
                    println!("{}: {}", key, value);
                }
            }
            other => println!("{}", other),
        },
    }
    Ok(())
}

/// Replace the attribute document of a node with a JSON object
pub fn set(
    path: &Path,
    node: &str,
    document: &str,
    config: &Config,
    output: &Output,
) -> Result<()> {
    let attrs: Value = serde_json::from_str(document).context("Attributes are not valid JSON")?;
    if !attrs.is_object() {
        bail!("Attributes must be a JSON object");
    }

    let file = super::open(path, OpenMode::READ_WRITE, config)?;
    let saved = match super::lookup(&file, node)? {
        Target::Group(group) => group.save_attrs(&attrs),
        Target::Dataset(dataset) => dataset.save_attrs(&attrs),
    };
    saved.with_context(|| format!("Failed to save attributes of '{}'", node))?;

    output.success(&format!("Saved attributes of '{}'", node));
    Ok(())
}
