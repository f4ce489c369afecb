//! Node store
//!
//! Creates, resolves and deletes directory-backed nodes. Every call re-reads
//! the filesystem; nothing is cached, so the directory tree is always the
//! single source of truth.
//!
//! ## Partial failure
//!
//! `require` creates missing segments one at a time. If a later segment
//! turns out to have the wrong type, the segments already created before it
//! stay on disk; nothing is rolled back. A failing segment is never replaced
//! by a placeholder of another type.
//!
//! Concurrent writers on the same tree are not coordinated.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{PoppelError, Result};
use crate::node::{Node, NodeDescriptor, NodeType, DESCRIPTOR_FILE, DESCRIPTOR_VERSION};
use crate::path::{ensure_container_like, normalize, RelPath};
use crate::persistence::{read_json, write_json, JsonStyle};
use crate::state::{OpenMode, OpenStateHandle};

/// Read and validate the descriptor of a node directory
pub fn read_descriptor(node_dir: &Path) -> Result<NodeDescriptor> {
    let path = node_dir.join(DESCRIPTOR_FILE);
    let descriptor: NodeDescriptor = read_json(&path).map_err(|e| match e {
        PoppelError::NotFound { .. } => PoppelError::Format {
            path: Some(path.clone()),
            details: "missing node descriptor".to_string(),
        },
        other => other,
    })?;

    if descriptor.version != DESCRIPTOR_VERSION {
        return Err(PoppelError::UnsupportedVersion {
            what: "node descriptor",
            version: descriptor.version.to_string(),
        });
    }
    Ok(descriptor)
}

fn write_descriptor(node_dir: &Path, node_type: NodeType) -> Result<()> {
    write_json(
        &node_dir.join(DESCRIPTOR_FILE),
        &NodeDescriptor::new(node_type),
        JsonStyle::Compact,
    )
}

/// Load the node at `root/relpath`, checking its type
fn load_node(root: &Path, relpath: PathBuf, expected: NodeType) -> Result<Node> {
    let node_dir = if relpath.as_os_str().is_empty() {
        root.to_path_buf()
    } else {
        root.join(&relpath)
    };

    if !node_dir.is_dir() {
        return Err(PoppelError::NotFound { path: node_dir });
    }

    let descriptor = read_descriptor(&node_dir)?;
    if descriptor.node_type != expected {
        return Err(PoppelError::TypeMismatch {
            path: node_dir,
            expected,
            found: descriptor.node_type,
        });
    }

    Ok(Node::new(root.to_path_buf(), relpath, descriptor))
}

fn create_root(path: &Path) -> Result<Node> {
    fs::create_dir_all(path).map_err(|e| PoppelError::write(e, path))?;
    write_descriptor(path, NodeType::File)?;
    debug!("Created file node {:?}", path);
    Ok(Node::new(
        path.to_path_buf(),
        PathBuf::new(),
        NodeDescriptor::new(NodeType::File),
    ))
}

/// Open the top-level file node at `path`, creating it if the mode allows
///
/// * existing directory: fails with `EXCL`, is erased and recreated with
///   `TRUNCATE`, otherwise must carry a file descriptor;
/// * missing: created with `CREATE`, otherwise `NotFound`.
pub fn open_or_create_root(path: &Path, mode: OpenMode) -> Result<Node> {
    mode.validate()?;

    if path.is_dir() {
        if mode.contains(OpenMode::EXCL) {
            return Err(PoppelError::AlreadyExists {
                path: path.to_path_buf(),
            });
        }
        if mode.contains(OpenMode::TRUNCATE) {
            fs::remove_dir_all(path).map_err(|e| PoppelError::write(e, path))?;
            debug!("Truncated file node {:?}", path);
            return create_root(path);
        }
        return load_node(path, PathBuf::new(), NodeType::File);
    }

    if path.exists() {
        // Something other than a directory is in the way.
        return Err(if mode.contains(OpenMode::CREATE) {
            PoppelError::AlreadyExists {
                path: path.to_path_buf(),
            }
        } else {
            PoppelError::NotFound {
                path: path.to_path_buf(),
            }
        });
    }

    if mode.contains(OpenMode::CREATE) {
        create_root(path)
    } else {
        Err(PoppelError::NotFound {
            path: path.to_path_buf(),
        })
    }
}

/// Whether `relpath` below `parent` is a node of `expected` type
///
/// Missing segments, unreadable descriptors and type mismatches all yield
/// `false`. Never touches the filesystem beyond reading.
pub fn exists(
    parent: &Node,
    relpath: &str,
    expected: NodeType,
    state: &OpenStateHandle,
) -> Result<bool> {
    state.ensure_open()?;
    ensure_container_like(parent)?;
    let relpath = normalize(relpath)?;

    let node_dir = parent.path().join(relpath.to_path_buf());
    if !node_dir.is_dir() {
        return Ok(false);
    }
    Ok(matches!(
        read_descriptor(&node_dir),
        Ok(descriptor) if descriptor.node_type == expected
    ))
}

/// Resolve an existing node of `expected` type
pub fn resolve(
    parent: &Node,
    relpath: &str,
    expected: NodeType,
    state: &OpenStateHandle,
) -> Result<Node> {
    state.ensure_open()?;
    ensure_container_like(parent)?;
    let relpath = normalize(relpath)?;

    load_node(
        &parent.root,
        parent.relpath.join(relpath.to_path_buf()),
        expected,
    )
}

/// Create a single child directory and tag it
///
/// Does not create intermediate directories.
fn create_immediate(
    parent: &Node,
    name: &str,
    node_type: NodeType,
    state: &OpenStateHandle,
) -> Result<Node> {
    state.ensure_writable()?;

    let node_dir = parent.path().join(name);
    if node_dir.symlink_metadata().is_ok() {
        return Err(PoppelError::AlreadyExists { path: node_dir });
    }

    fs::create_dir(&node_dir).map_err(|e| PoppelError::write(e, &node_dir))?;
    if let Err(e) = write_descriptor(&node_dir, node_type) {
        if let Err(cleanup) = fs::remove_dir_all(&node_dir) {
            warn!(
                "Failed to remove untagged directory {:?}: {}",
                node_dir, cleanup
            );
        }
        return Err(e);
    }

    debug!("Created {} node {:?}", node_type, node_dir);
    Ok(Node::new(
        parent.root.clone(),
        parent.relpath.join(name),
        NodeDescriptor::new(node_type),
    ))
}

/// Walk an already normalized path, resolving or creating every segment
fn require_normalized(
    parent: &Node,
    relpath: &RelPath,
    node_type: NodeType,
    state: &OpenStateHandle,
) -> Result<Node> {
    let segments = relpath.segments();
    let mut current = parent.clone();

    for (i, segment) in segments.iter().enumerate() {
        let required = if i + 1 == segments.len() {
            node_type
        } else {
            NodeType::Group
        };

        current = if current.path().join(segment).is_dir() {
            load_node(&current.root, current.relpath.join(segment), required)?
        } else {
            create_immediate(&current, segment, required, state)?
        };
    }

    Ok(current)
}

/// Create a new node, requiring missing ancestors as groups
///
/// The final segment must not exist yet.
pub fn create(
    parent: &Node,
    relpath: &str,
    node_type: NodeType,
    state: &OpenStateHandle,
) -> Result<Node> {
    state.ensure_writable()?;
    ensure_container_like(parent)?;
    let relpath = normalize(relpath)?;

    let container = match relpath.parent() {
        Some(ancestors) => require_normalized(parent, &ancestors, NodeType::Group, state)?,
        None => parent.clone(),
    };
    create_immediate(&container, relpath.file_name(), node_type, state)
}

/// Resolve a node, creating it and any missing ancestor groups
///
/// Existing intermediate segments must be groups. See the module docs for
/// what happens when a segment has the wrong type.
pub fn require(
    parent: &Node,
    relpath: &str,
    node_type: NodeType,
    state: &OpenStateHandle,
) -> Result<Node> {
    state.ensure_open()?;
    ensure_container_like(parent)?;
    let relpath = normalize(relpath)?;

    require_normalized(parent, &relpath, node_type, state)
}

/// Remove a node and its entire subtree
pub fn delete(parent: &Node, relpath: &str, state: &OpenStateHandle) -> Result<()> {
    state.ensure_writable()?;
    ensure_container_like(parent)?;
    let relpath = normalize(relpath)?;

    let node_dir = parent.path().join(relpath.to_path_buf());
    if !node_dir.is_dir() {
        return Err(PoppelError::NotFound { path: node_dir });
    }

    fs::remove_dir_all(&node_dir).map_err(|e| PoppelError::write(e, &node_dir))?;
    debug!("Deleted node {:?}", node_dir);
    Ok(())
}

/// List the immediate child nodes of a container, sorted by name
///
/// Entries that are not directories or carry no readable descriptor are
/// skipped.
pub fn children(parent: &Node, state: &OpenStateHandle) -> Result<Vec<Node>> {
    state.ensure_open()?;
    ensure_container_like(parent)?;

    let parent_dir = parent.path();
    let entries = fs::read_dir(&parent_dir).map_err(|e| PoppelError::read(e, &parent_dir))?;

    let mut nodes = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| PoppelError::read(e, &parent_dir))?;
        let is_dir = entry
            .file_type()
            .map(|t| t.is_dir())
            .map_err(|e| PoppelError::read(e, entry.path()))?;
        if !is_dir {
            continue;
        }

        match read_descriptor(&entry.path()) {
            Ok(descriptor) => nodes.push(Node::new(
                parent.root.clone(),
                parent.relpath.join(entry.file_name()),
                descriptor,
            )),
            Err(e) => debug!("Skipping {:?}: {}", entry.path(), e),
        }
    }

    nodes.sort_by(|a, b| a.relpath.cmp(&b.relpath));
    Ok(nodes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::state::OpenState;
    use tempfile::TempDir;

    fn new_root(temp_dir: &TempDir) -> Node {
        open_or_create_root(&temp_dir.path().join("test.poppel"), OpenMode::CREATE_WRITE)
            .unwrap()
    }

    fn rw() -> OpenStateHandle {
        OpenStateHandle::new(OpenState::ReadWrite)
    }

    /// Snapshot of every path below `dir`, for zero-mutation checks
    fn snapshot(dir: &Path) -> Vec<PathBuf> {
        let mut paths = Vec::new();
        let mut stack = vec![dir.to_path_buf()];
        while let Some(current) = stack.pop() {
            for entry in fs::read_dir(&current).unwrap() {
                let path = entry.unwrap().path();
                if path.is_dir() {
                    stack.push(path.clone());
                }
                paths.push(path);
            }
        }
        paths.sort();
        paths
    }

    #[test]
    fn test_open_or_create_root_modes() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("f.poppel");

        let err = open_or_create_root(&path, OpenMode::READ_WRITE).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let root = open_or_create_root(&path, OpenMode::CREATE_WRITE).unwrap();
        assert_eq!(root.node_type(), NodeType::File);
        assert!(path.join(DESCRIPTOR_FILE).exists());

        let reopened = open_or_create_root(&path, OpenMode::READ_ONLY).unwrap();
        assert_eq!(reopened, root);

        let err =
            open_or_create_root(&path, OpenMode::CREATE_WRITE | OpenMode::EXCL).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AlreadyExists);
    }

    #[test]
    fn test_truncate_erases_contents() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("f.poppel");
        let root = open_or_create_root(&path, OpenMode::CREATE_WRITE).unwrap();
        create(&root, "g1", NodeType::Group, &rw()).unwrap();

        let root = open_or_create_root(&path, OpenMode::OVERWRITE).unwrap();
        assert!(!exists(&root, "g1", NodeType::Group, &rw()).unwrap());
        assert_eq!(read_descriptor(&path).unwrap().node_type, NodeType::File);
    }

    #[test]
    fn test_open_root_rejects_non_file_descriptor() {
        let temp_dir = TempDir::new().unwrap();
        let root = new_root(&temp_dir);
        create(&root, "g1", NodeType::Group, &rw()).unwrap();

        let err = open_or_create_root(&root.path().join("g1"), OpenMode::READ_ONLY).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TypeMismatch);
    }

    #[test]
    fn test_open_root_over_regular_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("plain.txt");
        fs::write(&path, "hello").unwrap();

        let err = open_or_create_root(&path, OpenMode::CREATE_WRITE).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AlreadyExists);
        let err = open_or_create_root(&path, OpenMode::READ_ONLY).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_open_root_without_descriptor() {
        let temp_dir = TempDir::new().unwrap();
        let err = open_or_create_root(temp_dir.path(), OpenMode::READ_ONLY).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Format);
    }

    #[test]
    fn test_descriptor_version_checked() {
        let temp_dir = TempDir::new().unwrap();
        let root = new_root(&temp_dir);
        fs::write(
            root.descriptor_path(),
            r#"{"version": 2, "type": "file"}"#,
        )
        .unwrap();

        let err = open_or_create_root(&root.path(), OpenMode::READ_ONLY).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedVersion);
    }

    #[test]
    fn test_nested_require_creates_typed_ancestors() {
        let temp_dir = TempDir::new().unwrap();
        let root = new_root(&temp_dir);
        let state = rw();

        let dataset = require(&root, "g1/g1/d1", NodeType::Dataset, &state).unwrap();
        assert_eq!(dataset.relpath, PathBuf::from("g1/g1/d1"));

        let base = root.path();
        assert_eq!(
            read_descriptor(&base.join("g1")).unwrap().node_type,
            NodeType::Group
        );
        assert_eq!(
            read_descriptor(&base.join("g1/g1")).unwrap().node_type,
            NodeType::Group
        );
        assert_eq!(
            read_descriptor(&base.join("g1/g1/d1")).unwrap().node_type,
            NodeType::Dataset
        );

        let subdirs: Vec<_> = snapshot(&base).into_iter().filter(|p| p.is_dir()).collect();
        assert_eq!(subdirs.len(), 3);
    }

    #[test]
    fn test_require_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let root = new_root(&temp_dir);
        let state = rw();

        let first = require(&root, "a/b", NodeType::Group, &state).unwrap();
        let second = require(&root, "a/b", NodeType::Group, &state).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_resolve_idempotent_and_typed() {
        let temp_dir = TempDir::new().unwrap();
        let root = new_root(&temp_dir);
        let state = rw();
        create(&root, "g1/d1", NodeType::Dataset, &state).unwrap();

        let a = resolve(&root, "g1/d1", NodeType::Dataset, &state).unwrap();
        let b = resolve(&root, "g1//./d1", NodeType::Dataset, &state).unwrap();
        assert_eq!(a, b);

        let err = resolve(&root, "g1/d1", NodeType::Group, &state).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TypeMismatch);

        let err = resolve(&root, "g1/missing", NodeType::Dataset, &state).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_resolve_relative_to_group() {
        let temp_dir = TempDir::new().unwrap();
        let root = new_root(&temp_dir);
        let state = rw();
        let group = create(&root, "outer", NodeType::Group, &state).unwrap();
        create(&group, "inner/d", NodeType::Dataset, &state).unwrap();

        let node = resolve(&root, "outer/inner/d", NodeType::Dataset, &state).unwrap();
        assert_eq!(node.relpath, PathBuf::from("outer/inner/d"));
        assert_eq!(node, resolve(&group, "inner/d", NodeType::Dataset, &state).unwrap());
    }

    #[test]
    fn test_conflict_detection_leaves_group_untouched() {
        let temp_dir = TempDir::new().unwrap();
        let root = new_root(&temp_dir);
        let state = rw();
        create(&root, "g1", NodeType::Group, &state).unwrap();
        let before = snapshot(&root.path());

        let err = require(&root, "g1", NodeType::Dataset, &state).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TypeMismatch);

        let err = create(&root, "g1", NodeType::Dataset, &state).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AlreadyExists);

        assert_eq!(snapshot(&root.path()), before);
        assert!(exists(&root, "g1", NodeType::Group, &state).unwrap());
    }

    #[test]
    fn test_require_through_dataset_fails() {
        let temp_dir = TempDir::new().unwrap();
        let root = new_root(&temp_dir);
        let state = rw();
        create(&root, "d1", NodeType::Dataset, &state).unwrap();

        let err = create(&root, "d1/child", NodeType::Group, &state).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TypeMismatch);
        assert!(!root.path().join("d1/child").exists());
    }

    #[test]
    fn test_require_mismatch_keeps_earlier_segments() {
        let temp_dir = TempDir::new().unwrap();
        let root = new_root(&temp_dir);
        let state = rw();
        create(&root, "a/d", NodeType::Dataset, &state).unwrap();

        // No rollback: segments walked before the failing one stay as they are.
        let err = require(&root, "a/d/x", NodeType::Group, &state).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TypeMismatch);
        assert!(exists(&root, "a", NodeType::Group, &state).unwrap());
        assert!(exists(&root, "a/d", NodeType::Dataset, &state).unwrap());
        assert!(!root.path().join("a/d/x").exists());
    }

    #[test]
    fn test_state_gating_zero_mutation() {
        let temp_dir = TempDir::new().unwrap();
        let root = new_root(&temp_dir);
        create(&root, "g1", NodeType::Group, &rw()).unwrap();
        let before = snapshot(&root.path());

        for state in [
            OpenStateHandle::new(OpenState::ReadOnly),
            OpenStateHandle::new(OpenState::Closed),
        ] {
            let err = create(&root, "g2", NodeType::Group, &state).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::State);
            let err = require(&root, "g2/g3", NodeType::Group, &state).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::State);
            let err = delete(&root, "g1", &state).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::State);
        }

        assert_eq!(snapshot(&root.path()), before);
    }

    #[test]
    fn test_read_only_can_resolve_existing() {
        let temp_dir = TempDir::new().unwrap();
        let root = new_root(&temp_dir);
        create(&root, "g1/g2", NodeType::Group, &rw()).unwrap();

        let ro = OpenStateHandle::new(OpenState::ReadOnly);
        assert!(resolve(&root, "g1/g2", NodeType::Group, &ro).is_ok());
        assert!(require(&root, "g1/g2", NodeType::Group, &ro).is_ok());
        assert!(exists(&root, "g1", NodeType::Group, &ro).unwrap());

        let closed = OpenStateHandle::new(OpenState::Closed);
        let err = resolve(&root, "g1", NodeType::Group, &closed).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::State);
        let err = exists(&root, "g1", NodeType::Group, &closed).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::State);
    }

    #[test]
    fn test_delete_removes_subtree() {
        let temp_dir = TempDir::new().unwrap();
        let root = new_root(&temp_dir);
        let state = rw();
        require(&root, "g1/g2/d1", NodeType::Dataset, &state).unwrap();
        require(&root, "g1/d2", NodeType::Dataset, &state).unwrap();

        delete(&root, "g1", &state).unwrap();

        assert!(!exists(&root, "g1", NodeType::Group, &state).unwrap());
        assert!(!exists(&root, "g1/g2", NodeType::Group, &state).unwrap());
        assert!(!exists(&root, "g1/g2/d1", NodeType::Dataset, &state).unwrap());
        assert!(!exists(&root, "g1/d2", NodeType::Dataset, &state).unwrap());

        let err = delete(&root, "g1", &state).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_exists_is_false_on_mismatch_and_missing() {
        let temp_dir = TempDir::new().unwrap();
        let root = new_root(&temp_dir);
        let state = rw();
        create(&root, "g1", NodeType::Group, &state).unwrap();
        fs::create_dir(root.path().join("untagged")).unwrap();

        assert!(exists(&root, "g1", NodeType::Group, &state).unwrap());
        assert!(!exists(&root, "g1", NodeType::Dataset, &state).unwrap());
        assert!(!exists(&root, "nope/deeper", NodeType::Group, &state).unwrap());
        assert!(!exists(&root, "untagged", NodeType::Group, &state).unwrap());

        let err = exists(&root, "", NodeType::Group, &state).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Path);
    }

    #[test]
    fn test_parent_must_be_container() {
        let temp_dir = TempDir::new().unwrap();
        let root = new_root(&temp_dir);
        let state = rw();
        let dataset = create(&root, "d1", NodeType::Dataset, &state).unwrap();

        let err = create(&dataset, "x", NodeType::Group, &state).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TypeMismatch);
        let err = resolve(&dataset, "x", NodeType::Group, &state).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TypeMismatch);
    }

    #[test]
    fn test_invalid_paths_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let root = new_root(&temp_dir);
        let state = rw();

        for bad in ["", ".", "..", "a/", "../escape", "/abs"] {
            let err = create(&root, bad, NodeType::Group, &state).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Path, "path {:?}", bad);
        }
    }

    #[test]
    fn test_children_listing() {
        let temp_dir = TempDir::new().unwrap();
        let root = new_root(&temp_dir);
        let state = rw();
        create(&root, "b", NodeType::Dataset, &state).unwrap();
        create(&root, "a", NodeType::Group, &state).unwrap();
        create(&root, "a/inner", NodeType::Group, &state).unwrap();
        fs::create_dir(root.path().join("untagged")).unwrap();
        fs::write(root.path().join("attributes.json"), "{}").unwrap();

        let listed = children(&root, &state).unwrap();
        let names: Vec<String> = listed.iter().map(Node::name).collect();
        assert_eq!(names, ["a", "b"]);
        assert_eq!(listed[0].node_type(), NodeType::Group);
        assert_eq!(listed[1].node_type(), NodeType::Dataset);
    }
}
