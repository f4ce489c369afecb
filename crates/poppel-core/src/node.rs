//! Node data model
//!
//! A node is a directory tagged by a `poppel.json` descriptor. The node
//! values here are plain data; all filesystem access goes through
//! [`crate::store`].

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Name of the per-node descriptor file
pub const DESCRIPTOR_FILE: &str = "poppel.json";

/// Current descriptor version
pub const DESCRIPTOR_VERSION: u32 = 1;

/// Type tag stored in a node descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeType {
    File,
    Group,
    Dataset,
    Raw,
    #[serde(other)]
    Unknown,
}

impl NodeType {
    /// Tag as written in the descriptor (empty for `Unknown`)
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeType::File => "file",
            NodeType::Group => "group",
            NodeType::Dataset => "dataset",
            NodeType::Raw => "raw",
            NodeType::Unknown => "",
        }
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeType::Unknown => f.write_str("unknown"),
            other => f.write_str(other.as_str()),
        }
    }
}

/// Persisted node descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeDescriptor {
    pub version: u32,
    #[serde(rename = "type")]
    pub node_type: NodeType,
}

impl NodeDescriptor {
    /// Fresh descriptor for a node of the given type
    pub fn new(node_type: NodeType) -> Self {
        Self {
            version: DESCRIPTOR_VERSION,
            node_type,
        }
    }
}

/// A resolved node in the tree
///
/// `root` is the directory of the top-level file node and `relpath` the
/// normalized path below it (empty for the file node itself).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub root: PathBuf,
    pub relpath: PathBuf,
    pub descriptor: NodeDescriptor,
}

impl Node {
    pub fn new(root: PathBuf, relpath: PathBuf, descriptor: NodeDescriptor) -> Self {
        Self {
            root,
            relpath,
            descriptor,
        }
    }

    /// Full directory path of the node
    pub fn path(&self) -> PathBuf {
        if self.relpath.as_os_str().is_empty() {
            self.root.clone()
        } else {
            self.root.join(&self.relpath)
        }
    }

    pub fn node_type(&self) -> NodeType {
        self.descriptor.node_type
    }

    /// Last path segment, or the root directory name for the file node
    pub fn name(&self) -> String {
        let path: &Path = if self.relpath.as_os_str().is_empty() {
            &self.root
        } else {
            &self.relpath
        };
        path.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Path of the descriptor file inside this node
    pub fn descriptor_path(&self) -> PathBuf {
        self.path().join(DESCRIPTOR_FILE)
    }
}

/// Shape and layout of a dataset, read live from its array header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetDescriptor {
    pub shape: Vec<usize>,
    /// Element width in bytes
    pub word_size: usize,
    /// Whether the first axis varies fastest (column-major)
    pub fortran_order: bool,
}

impl DatasetDescriptor {
    /// Number of elements (1 for a scalar)
    pub fn len(&self) -> usize {
        self.shape.iter().product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn ndim(&self) -> usize {
        self.shape.len()
    }
}
