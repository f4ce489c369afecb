//! Path and type invariants
//!
//! Relative node paths are normalized lexically and validated once, at the
//! boundary of every store operation. Both `/` and `\` count as separators
//! so that paths written on one platform mean the same thing on another.

use std::fmt;
use std::path::PathBuf;

use crate::error::{PoppelError, Result};
use crate::node::{Node, NodeType};

/// A validated, normalized relative node path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelPath {
    segments: Vec<String>,
}

impl RelPath {
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// The final segment
    pub fn file_name(&self) -> &str {
        // Validation guarantees at least one segment.
        self.segments.last().map(String::as_str).unwrap_or_default()
    }

    /// Everything but the final segment, if there is anything
    pub fn parent(&self) -> Option<RelPath> {
        if self.segments.len() > 1 {
            Some(RelPath {
                segments: self.segments[..self.segments.len() - 1].to_vec(),
            })
        } else {
            None
        }
    }

    pub fn to_path_buf(&self) -> PathBuf {
        self.segments.iter().collect()
    }
}

impl fmt::Display for RelPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("/"))
    }
}

fn is_separator(c: char) -> bool {
    c == '/' || c == '\\'
}

fn has_drive_prefix(raw: &str) -> bool {
    let mut chars = raw.chars();
    matches!(
        (chars.next(), chars.next()),
        (Some(letter), Some(':')) if letter.is_ascii_alphabetic()
    )
}

/// Normalize and validate a relative node path
///
/// Rejects empty paths, absolute paths, paths that escape their parent, and
/// paths without a terminal segment (`"a/"`, `"a/."`, `"a/.."`).
pub fn normalize(raw: &str) -> Result<RelPath> {
    let invalid = |reason| PoppelError::InvalidPath {
        path: raw.to_string(),
        reason,
    };

    if raw.is_empty() {
        return Err(invalid("path is empty"));
    }
    if raw.starts_with(is_separator) || has_drive_prefix(raw) {
        return Err(invalid("path must be relative"));
    }

    let raw_segments: Vec<&str> = raw.split(is_separator).collect();
    if matches!(raw_segments.last(), Some(&"") | Some(&".") | Some(&"..")) {
        return Err(invalid("path has no terminal segment"));
    }

    let mut segments: Vec<String> = Vec::new();
    for segment in raw_segments {
        match segment {
            "" | "." => {}
            ".." => match segments.last() {
                Some(last) if last != ".." => {
                    segments.pop();
                }
                _ => segments.push("..".to_string()),
            },
            name => segments.push(name.to_string()),
        }
    }

    match segments.first().map(String::as_str) {
        None => Err(invalid("path is empty after normalization")),
        Some("..") => Err(invalid("path escapes its parent node")),
        Some(_) => Ok(RelPath { segments }),
    }
}

/// Whether `raw` is acceptable as a relative node path
pub fn is_valid_path(raw: &str) -> bool {
    normalize(raw).is_ok()
}

/// File and group nodes may hold children
pub fn is_container_like(node: &Node) -> bool {
    matches!(node.node_type(), NodeType::File | NodeType::Group)
}

pub fn is_dataset(node: &Node) -> bool {
    node.node_type() == NodeType::Dataset
}

/// Fail with `TypeMismatch` unless the node can hold children
pub fn ensure_container_like(node: &Node) -> Result<()> {
    if is_container_like(node) {
        Ok(())
    } else {
        Err(PoppelError::TypeMismatch {
            path: node.path(),
            expected: NodeType::Group,
            found: node.node_type(),
        })
    }
}

/// Fail with `TypeMismatch` unless the node is a dataset
pub fn ensure_dataset(node: &Node) -> Result<()> {
    if is_dataset(node) {
        Ok(())
    } else {
        Err(PoppelError::TypeMismatch {
            path: node.path(),
            expected: NodeType::Dataset,
            found: node.node_type(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::node::NodeDescriptor;

    fn node_of(node_type: NodeType) -> Node {
        Node::new(
            PathBuf::from("/tmp/x"),
            PathBuf::new(),
            NodeDescriptor::new(node_type),
        )
    }

    #[test]
    fn test_validation_table() {
        assert!(!is_valid_path(""));
        assert!(!is_valid_path("."));
        assert!(!is_valid_path(".."));
        assert!(!is_valid_path("/"));
        assert!(!is_valid_path("//"));
        assert!(!is_valid_path("\\"));
        assert!(!is_valid_path("C:\\"));
        assert!(!is_valid_path("c/"));
        assert!(!is_valid_path("../c"));
        assert!(!is_valid_path("a/"));
        assert!(is_valid_path("a"));
        assert!(is_valid_path("a/b"));
        assert!(is_valid_path("c/c"));
    }

    #[test]
    fn test_normalization() {
        assert_eq!(normalize("a//b").unwrap().to_string(), "a/b");
        assert_eq!(normalize("./a/./b").unwrap().to_string(), "a/b");
        assert_eq!(normalize("a/x/../b").unwrap().to_string(), "a/b");
        assert_eq!(normalize("a\\b").unwrap().segments(), ["a", "b"]);
    }

    #[test]
    fn test_rejects_escape_and_dangling_dots() {
        assert!(normalize("a/../../b").is_err());
        assert!(normalize("a/.").is_err());
        assert!(normalize("a/b/..").is_err());
        assert!(normalize("/abs").is_err());
    }

    #[test]
    fn test_path_error_kind() {
        let err = normalize("").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Path);
    }

    #[test]
    fn test_parent_and_file_name() {
        let path = normalize("g1/g2/d1").unwrap();
        assert_eq!(path.file_name(), "d1");
        assert_eq!(path.parent().unwrap().to_string(), "g1/g2");
        assert!(normalize("d1").unwrap().parent().is_none());
        assert_eq!(path.to_path_buf(), PathBuf::from("g1/g2/d1"));
    }

    #[test]
    fn test_node_classification() {
        assert!(is_container_like(&node_of(NodeType::File)));
        assert!(is_container_like(&node_of(NodeType::Group)));
        assert!(!is_container_like(&node_of(NodeType::Dataset)));
        assert!(!is_container_like(&node_of(NodeType::Raw)));
        assert!(!is_container_like(&node_of(NodeType::Unknown)));

        assert!(!is_dataset(&node_of(NodeType::File)));
        assert!(!is_dataset(&node_of(NodeType::Group)));
        assert!(is_dataset(&node_of(NodeType::Dataset)));
        assert!(!is_dataset(&node_of(NodeType::Raw)));
        assert!(!is_dataset(&node_of(NodeType::Unknown)));
    }

    #[test]
    fn test_ensure_helpers() {
        assert!(ensure_container_like(&node_of(NodeType::Group)).is_ok());
        let err = ensure_container_like(&node_of(NodeType::Dataset)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TypeMismatch);

        assert!(ensure_dataset(&node_of(NodeType::Dataset)).is_ok());
        let err = ensure_dataset(&node_of(NodeType::Group)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TypeMismatch);
    }
}
