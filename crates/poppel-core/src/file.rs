//! File, group and dataset handles
//!
//! A [`File`] owns the open state of one tree. Every [`Group`] and
//! [`Dataset`] obtained from it shares that state, so closing the file (or
//! dropping it) makes all of them fail with a state error.

use std::ops::Deref;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::attribute::{attribute_path_for, read_document, write_document};
use crate::config::Config;
use crate::dataset::{self, FromPayload, Payload};
use crate::error::Result;
use crate::node::{DatasetDescriptor, Node, NodeType};
use crate::npy::{Element, Header};
use crate::persistence::JsonStyle;
use crate::state::{OpenMode, OpenState, OpenStateHandle};
use crate::store;

/// Memory layout of a multi-dimensional buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MemoryOrder {
    /// Last axis varies fastest
    #[default]
    RowMajor,
    /// First axis varies fastest
    ColumnMajor,
}

impl MemoryOrder {
    pub fn is_fortran(self) -> bool {
        self == MemoryOrder::ColumnMajor
    }
}

/// An open tree
///
/// Dereferences to the root [`Group`].
#[derive(Debug)]
pub struct File {
    path: PathBuf,
    mode: OpenMode,
    root: Group,
}

impl File {
    /// Open or create the tree at `path`
    pub fn open(path: impl AsRef<Path>, mode: OpenMode) -> Result<Self> {
        Self::open_with_style(path.as_ref(), mode, JsonStyle::default())
    }

    /// Open with the attribute layout taken from `config`
    pub fn open_with_config(
        path: impl AsRef<Path>,
        mode: OpenMode,
        config: &Config,
    ) -> Result<Self> {
        Self::open_with_style(path.as_ref(), mode, config.json_style())
    }

    fn open_with_style(path: &Path, mode: OpenMode, style: JsonStyle) -> Result<Self> {
        let root = Self::open_root(path, mode, style)?;
        debug!("Opened {:?} ({})", path, mode);
        Ok(Self {
            path: path.to_path_buf(),
            mode,
            root,
        })
    }

    fn open_root(path: &Path, mode: OpenMode, style: JsonStyle) -> Result<Group> {
        let node = store::open_or_create_root(path, mode)?;
        Ok(Group {
            node,
            state: OpenStateHandle::new(mode.initial_state()),
            style,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn mode(&self) -> OpenMode {
        self.mode
    }

    pub fn state(&self) -> OpenState {
        self.root.state.get()
    }

    pub fn is_open(&self) -> bool {
        self.root.state.is_open()
    }

    /// Close the file; handles obtained from it stop working
    ///
    /// Closing an already closed file does nothing.
    pub fn close(&self) {
        if self.root.state.close() {
            debug!("Closed {:?}", self.path);
        }
    }

    /// Close the current tree and open another one in its place
    ///
    /// If the new tree cannot be opened the current one stays open.
    pub fn reopen(&mut self, path: impl AsRef<Path>, mode: OpenMode) -> Result<()> {
        let path = path.as_ref();
        let root = Self::open_root(path, mode, self.root.style)?;
        self.close();
        debug!("Reopened {:?} ({})", path, mode);

        self.path = path.to_path_buf();
        self.mode = mode;
        self.root = root;
        Ok(())
    }

    /// The root group
    pub fn root(&self) -> &Group {
        &self.root
    }
}

impl Deref for File {
    type Target = Group;

    fn deref(&self) -> &Group {
        &self.root
    }
}

impl Drop for File {
    fn drop(&mut self) {
        self.close();
    }
}

fn load_attrs(node: &Node, state: &OpenStateHandle) -> Result<Value> {
    read_document(&attribute_path_for(node, state)?)
}

fn save_attrs(
    node: &Node,
    state: &OpenStateHandle,
    style: JsonStyle,
    attrs: &Value,
) -> Result<()> {
    state.ensure_writable()?;
    write_document(&attribute_path_for(node, state)?, attrs, style)
}

/// Handle to a container node (the file root or a group)
#[derive(Debug, Clone)]
pub struct Group {
    node: Node,
    state: OpenStateHandle,
    style: JsonStyle,
}

impl Group {
    fn child_group(&self, node: Node) -> Group {
        Group {
            node,
            state: self.state.clone(),
            style: self.style,
        }
    }

    fn child_dataset(&self, node: Node) -> Dataset {
        Dataset {
            node,
            state: self.state.clone(),
            style: self.style,
        }
    }

    pub fn node(&self) -> &Node {
        &self.node
    }

    pub fn path(&self) -> PathBuf {
        self.node.path()
    }

    pub fn name(&self) -> String {
        self.node.name()
    }

    pub fn has_group(&self, name: &str) -> Result<bool> {
        store::exists(&self.node, name, NodeType::Group, &self.state)
    }

    pub fn get_group(&self, name: &str) -> Result<Group> {
        let node = store::resolve(&self.node, name, NodeType::Group, &self.state)?;
        Ok(self.child_group(node))
    }

    pub fn create_group(&self, name: &str) -> Result<Group> {
        let node = store::create(&self.node, name, NodeType::Group, &self.state)?;
        Ok(self.child_group(node))
    }

    pub fn require_group(&self, name: &str) -> Result<Group> {
        let node = store::require(&self.node, name, NodeType::Group, &self.state)?;
        Ok(self.child_group(node))
    }

    /// Delete a group and everything below it
    pub fn delete_group(&self, name: &str) -> Result<()> {
        self.state.ensure_writable()?;
        store::resolve(&self.node, name, NodeType::Group, &self.state)?;
        store::delete(&self.node, name, &self.state)
    }

    pub fn has_dataset(&self, name: &str) -> Result<bool> {
        store::exists(&self.node, name, NodeType::Dataset, &self.state)
    }

    pub fn get_dataset(&self, name: &str) -> Result<Dataset> {
        let node = store::resolve(&self.node, name, NodeType::Dataset, &self.state)?;
        Ok(self.child_dataset(node))
    }

    /// Create a dataset holding `value`
    pub fn create_dataset<V: Payload + ?Sized>(&self, name: &str, value: &V) -> Result<Dataset> {
        let node = store::create(&self.node, name, NodeType::Dataset, &self.state)?;
        let dataset = self.child_dataset(node);
        dataset.save(value)?;
        Ok(dataset)
    }

    /// Create an empty dataset node to be filled with [`Dataset::save_from`]
    pub fn create_dataset_node(&self, name: &str) -> Result<Dataset> {
        let node = store::create(&self.node, name, NodeType::Dataset, &self.state)?;
        Ok(self.child_dataset(node))
    }

    /// Get a dataset, creating it with `default` if it does not exist
    ///
    /// An existing dataset keeps its stored value.
    pub fn require_dataset<V: Payload + ?Sized>(
        &self,
        name: &str,
        default: &V,
    ) -> Result<Dataset> {
        let existed = self.has_dataset(name)?;
        let node = store::require(&self.node, name, NodeType::Dataset, &self.state)?;
        let dataset = self.child_dataset(node);
        if !existed {
            dataset.save(default)?;
        }
        Ok(dataset)
    }

    pub fn delete_dataset(&self, name: &str) -> Result<()> {
        self.state.ensure_writable()?;
        store::resolve(&self.node, name, NodeType::Dataset, &self.state)?;
        store::delete(&self.node, name, &self.state)
    }

    /// Names of the immediate children, sorted
    pub fn keys(&self) -> Result<Vec<String>> {
        Ok(self.children()?.iter().map(Node::name).collect())
    }

    /// Immediate child nodes, sorted by name
    pub fn children(&self) -> Result<Vec<Node>> {
        store::children(&self.node, &self.state)
    }

    pub fn load_attrs(&self) -> Result<Value> {
        load_attrs(&self.node, &self.state)
    }

    /// Replace the whole attribute document
    pub fn save_attrs(&self, attrs: &Value) -> Result<()> {
        save_attrs(&self.node, &self.state, self.style, attrs)
    }
}

/// Handle to a dataset node
#[derive(Debug, Clone)]
pub struct Dataset {
    node: Node,
    state: OpenStateHandle,
    style: JsonStyle,
}

impl Dataset {
    pub fn node(&self) -> &Node {
        &self.node
    }

    pub fn path(&self) -> PathBuf {
        self.node.path()
    }

    pub fn name(&self) -> String {
        self.node.name()
    }

    pub fn load<V: FromPayload>(&self) -> Result<V> {
        dataset::load_value(&self.node, &self.state)
    }

    /// Load into an existing value, leaving it untouched on failure
    pub fn load_to<V: FromPayload>(&self, out: &mut V) -> Result<()> {
        *out = self.load()?;
        Ok(())
    }

    pub fn save<V: Payload + ?Sized>(&self, value: &V) -> Result<()> {
        dataset::save_value(&self.node, &self.state, value)
    }

    /// Load into a buffer of `shape` stored in `order`
    ///
    /// With `reshape`, any stored shape with the same element count is
    /// accepted.
    pub fn load_into<T: Element>(
        &self,
        buffer: &mut [T],
        order: MemoryOrder,
        shape: &[usize],
        reshape: bool,
    ) -> Result<()> {
        dataset::load_raw(
            &self.node,
            &self.state,
            buffer,
            order.is_fortran(),
            shape,
            reshape,
        )
    }

    pub fn save_from<T: Element>(
        &self,
        buffer: &[T],
        order: MemoryOrder,
        shape: &[usize],
    ) -> Result<()> {
        dataset::save_raw(&self.node, &self.state, buffer, order.is_fortran(), shape)
    }

    pub fn header(&self) -> Result<Header> {
        dataset::dataset_header(&self.node, &self.state)
    }

    pub fn descriptor(&self) -> Result<DatasetDescriptor> {
        dataset::dataset_descriptor(&self.node, &self.state)
    }

    pub fn load_attrs(&self) -> Result<Value> {
        load_attrs(&self.node, &self.state)
    }

    pub fn save_attrs(&self, attrs: &Value) -> Result<()> {
        save_attrs(&self.node, &self.state, self.style, attrs)
    }
}
