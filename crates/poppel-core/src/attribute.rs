//! Per-node attribute documents
//!
//! Any node may carry a free-form JSON document in `attributes.json`. The
//! document is created as `{}` on first access through a writable file and
//! is otherwise read and written whole.

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::error::{PoppelError, Result};
use crate::node::Node;
use crate::persistence::{read_json, write_json, JsonStyle};
use crate::state::{OpenState, OpenStateHandle};

/// Name of the attribute document inside a node directory
pub const ATTRIBUTE_FILE: &str = "attributes.json";

/// Locate the attribute document of a node, creating an empty one if the
/// file is writable
///
/// A read-only file whose node has no document fails with `State`, since the
/// document cannot be created.
pub fn attribute_path_for(node: &Node, state: &OpenStateHandle) -> Result<PathBuf> {
    state.ensure_open()?;

    let path = node.path().join(ATTRIBUTE_FILE);
    if path.is_file() {
        return Ok(path);
    }

    match state.get() {
        OpenState::ReadWrite => {
            write_json(&path, &Value::Object(Default::default()), JsonStyle::Compact)?;
            debug!("Created attribute document {:?}", path);
            Ok(path)
        }
        _ => Err(PoppelError::ReadOnly),
    }
}

pub fn read_document(path: &Path) -> Result<Value> {
    read_json(path)
}

pub fn write_document(path: &Path, document: &Value, style: JsonStyle) -> Result<()> {
    write_json(path, document, style)
}
