//! Poppel Core Library
//!
//! Hierarchical array storage backed by a plain directory tree. Every node
//! (file, group, dataset) is a directory tagged with a small JSON
//! descriptor; dataset payloads are NumPy `.npy` files and any node may
//! carry a JSON attribute document.
//!
//! # Layout
//!
//! ```text
//! experiment.poppel/
//!     poppel.json            {"version":1,"type":"file"}
//!     attributes.json
//!     run1/
//!         poppel.json        {"version":1,"type":"group"}
//!         trace/
//!             poppel.json    {"version":1,"type":"dataset"}
//!             data.npy
//! ```
//!
//! # Quick Start
//!
//! ```no_run
//! use poppel_core::{File, OpenMode};
//!
//! # fn main() -> poppel_core::Result<()> {
//! let file = File::open("experiment.poppel", OpenMode::CREATE_WRITE)?;
//! let run = file.require_group("run1")?;
//! let trace = run.create_dataset("trace", &vec![0.5f64, 1.0, 1.5])?;
//! let values: Vec<f64> = trace.load()?;
//! # Ok(())
//! # }
//! ```
//!
//! # Modules
//!
//! - `file`: File, group and dataset handles (main entry point)
//! - `store`: Node creation, resolution and deletion
//! - `npy`: `.npy` array codec
//! - `dataset`: Dataset payload I/O
//! - `attribute`: Per-node attribute documents
//! - `config`: Configuration

pub mod attribute;
pub mod config;
pub mod dataset;
pub mod error;
pub mod file;
pub mod node;
pub mod npy;
pub mod path;
pub mod persistence;
pub mod state;
pub mod store;

pub use config::Config;
pub use dataset::{FromPayload, Payload};
pub use error::{ErrorKind, PoppelError, Result};
pub use file::{Dataset, File, Group, MemoryOrder};
pub use node::{DatasetDescriptor, Node, NodeType};
pub use npy::{Complex32, Complex64, Dtype, Element, Header, NpyArray};
pub use persistence::JsonStyle;
pub use state::{OpenMode, OpenState};
