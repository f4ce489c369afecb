//! Tree and info command handlers

use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::Value;

use poppel_core::{Config, Group, Header, NodeType, OpenMode};

use super::Target;
use crate::output::{format_bytes, format_shape, Output, OutputFormat};

/// One node of a listed tree
#[derive(Debug, Serialize)]
pub struct TreeEntry {
    pub name: String,
    #[serde(rename = "type")]
    pub node_type: NodeType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dtype: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shape: Option<Vec<usize>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<TreeEntry>,
}

/// Walk a group recursively
///
/// Datasets whose payload cannot be read are listed without dtype and shape.
pub fn build(group: &Group) -> Result<TreeEntry> {
    let mut children = Vec::new();
    for node in group.children()? {
        let name = node.name();
        let entry = match node.node_type() {
            NodeType::Group => build(&group.get_group(&name)?)?,
            NodeType::Dataset => {
                let header = group.get_dataset(&name)?.header().ok();
                TreeEntry {
                    name,
                    node_type: NodeType::Dataset,
                    dtype: header.as_ref().map(|h| h.dtype.descr()),
                    shape: header.map(|h| h.shape),
                    children: Vec::new(),
                }
            }
            other => TreeEntry {
                name,
                node_type: other,
                dtype: None,
                shape: None,
                children: Vec::new(),
            },
        };
        children.push(entry);
    }

    Ok(TreeEntry {
        name: group.name(),
        node_type: group.node().node_type(),
        dtype: None,
        shape: None,
        children,
    })
}

fn print_human(entry: &TreeEntry, depth: usize) {
    let indent = "  ".repeat(depth);
    match (&entry.dtype, &entry.shape) {
        (Some(dtype), Some(shape)) => {
            println!("{}{}  [{} {}]", indent, entry.name, dtype, format_shape(shape))
        }
        _ if entry.node_type == NodeType::Dataset => {
            println!("{}{}  [no data]", indent, entry.name)
        }
        _ => println!("{}{}/", indent, entry.name),
    }
    for child in &entry.children {
        print_human(child, depth + 1);
    }
}

fn print_paths(entry: &TreeEntry, prefix: &str) {
    for child in &entry.children {
        let path = if prefix.is_empty() {
            child.name.clone()
        } else {
            format!("{}/{}", prefix, child.name)
        };
        println!("{}", path);
        print_paths(child, &path);
    }
}

/// Print the whole tree of a file
pub fn tree(path: &Path, config: &Config, output: &Output) -> Result<()> {
    let file = super::open(path, OpenMode::READ_ONLY, config)?;
    let root = build(file.root()).context("Failed to list tree")?;

    match output.format {
        OutputFormat::Json => output.json(&root)?,
        OutputFormat::Quiet => print_paths(&root, ""),
        OutputFormat::Human => print_human(&root, 0),
    }
    Ok(())
}

fn dataset_json(header: &Header) -> Result<Value> {
    Ok(serde_json::json!({
        "descr": header.dtype.descr(),
        "fortran_order": header.fortran_order,
        "shape": header.shape,
        "word_size": header.dtype.item_size,
        "len": header.len()?,
        "bytes": header.num_bytes()?
    }))
}

/// Print details of one group or dataset
pub fn info(path: &Path, node: &str, config: &Config, output: &Output) -> Result<()> {
    let file = super::open(path, OpenMode::READ_ONLY, config)?;
    let target = super::lookup(&file, node)?;
    let attrs = target.load_attrs()?;

    match &target {
        Target::Group(group) => {
            let keys = group.keys()?;
            match output.format {
                OutputFormat::Json => output.json(&serde_json::json!({
                    "path": group.path(),
                    "type": group.node().node_type(),
                    "children": keys,
                    "attributes": attrs
                }))?,
                OutputFormat::Quiet => println!("{}", group.node().node_type()),
                OutputFormat::Human => {
                    println!("Path:       {}", group.path().display());
                    println!("Type:       {}", group.node().node_type());
                    println!("Children:   {}", keys.len());
                    for key in &keys {
                        println!("  {}", key);
                    }
                    println!("Attributes: {}", attrs);
                }
            }
        }
        Target::Dataset(dataset) => {
            let header = dataset
                .header()
                .with_context(|| format!("Failed to read payload of '{}'", node))?;
            match output.format {
                OutputFormat::Json => {
                    let mut value = dataset_json(&header)?;
                    value["path"] = serde_json::json!(dataset.path());
                    value["type"] = serde_json::json!(NodeType::Dataset);
                    value["attributes"] = attrs;
                    output.json(&value)?
                }
                OutputFormat::Quiet => {
                    println!("{} {}", header.dtype, format_shape(&header.shape))
                }
                OutputFormat::Human => {
                    println!("Path:       {}", dataset.path().display());
                    println!("Type:       dataset");
                    println!("dtype:      {}", header.dtype);
                    println!(
                        "Order:      {}",
                        if header.fortran_order {
                            "column-major"
                        } else {
                            "row-major"
                        }
                    );
                    println!("Shape:      {}", format_shape(&header.shape));
                    println!("Elements:   {}", header.len()?);
                    println!("Payload:    {}", format_bytes(header.num_bytes()?));
                    println!("Attributes: {}", attrs);
                }
            }
        }
    }
    Ok(())
}
