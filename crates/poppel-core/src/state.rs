//! Open modes and the shared open state of a file
//!
//! A `File` owns one [`OpenStateHandle`]; every group and dataset handle
//! derived from it holds a clone pointing at the same slot, so closing the
//! file is observed by all of them.

use std::cell::Cell;
use std::fmt;
use std::ops::BitOr;
use std::rc::Rc;

use crate::error::{PoppelError, Result};

/// Composable file open flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OpenMode(u8);

impl OpenMode {
    pub const READ: OpenMode = OpenMode(1);
    /// Requires `READ`
    pub const WRITE: OpenMode = OpenMode(2);
    /// Create the file if it does not exist
    pub const CREATE: OpenMode = OpenMode(4);
    /// Fail if the file already exists
    pub const EXCL: OpenMode = OpenMode(8);
    /// Erase and recreate the file if it exists
    pub const TRUNCATE: OpenMode = OpenMode(16);

    pub const READ_ONLY: OpenMode = Self::READ;
    pub const READ_WRITE: OpenMode = OpenMode(Self::READ.0 | Self::WRITE.0);
    pub const CREATE_WRITE: OpenMode = OpenMode(Self::READ_WRITE.0 | Self::CREATE.0);
    pub const OVERWRITE: OpenMode = OpenMode(Self::CREATE_WRITE.0 | Self::TRUNCATE.0);

    pub fn contains(self, other: OpenMode) -> bool {
        self.0 & other.0 == other.0
    }

    /// Reject flag combinations that have no meaning
    pub fn validate(self) -> Result<()> {
        let invalid = |reason| PoppelError::InvalidMode { mode: self, reason };

        if !self.contains(Self::READ) {
            return Err(invalid("files cannot be opened without read access"));
        }
        if !self.contains(Self::WRITE)
            && (self.contains(Self::CREATE) || self.contains(Self::TRUNCATE))
        {
            return Err(invalid("create and truncate require write access"));
        }
        if self.contains(Self::EXCL) && self.contains(Self::TRUNCATE) {
            return Err(invalid("exclusive and truncate cannot be combined"));
        }
        Ok(())
    }

    /// State a file opened with this mode starts in
    pub fn initial_state(self) -> OpenState {
        if self.contains(Self::WRITE) {
            OpenState::ReadWrite
        } else {
            OpenState::ReadOnly
        }
    }
}

impl BitOr for OpenMode {
    type Output = OpenMode;

    fn bitor(self, rhs: OpenMode) -> OpenMode {
        OpenMode(self.0 | rhs.0)
    }
}

impl fmt::Display for OpenMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = [
            (Self::READ, "read"),
            (Self::WRITE, "write"),
            (Self::CREATE, "create"),
            (Self::EXCL, "excl"),
            (Self::TRUNCATE, "truncate"),
        ];
        let set: Vec<&str> = names
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| *name)
            .collect();
        if set.is_empty() {
            f.write_str("(none)")
        } else {
            f.write_str(&set.join("|"))
        }
    }
}

/// Process-local open state of a file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenState {
    Closed,
    ReadOnly,
    ReadWrite,
}

/// Shared, reference-counted open state slot
#[derive(Debug, Clone)]
pub struct OpenStateHandle {
    slot: Rc<Cell<OpenState>>,
}

impl OpenStateHandle {
    pub fn new(state: OpenState) -> Self {
        Self {
            slot: Rc::new(Cell::new(state)),
        }
    }

    pub fn get(&self) -> OpenState {
        self.slot.get()
    }

    pub fn is_open(&self) -> bool {
        self.get() != OpenState::Closed
    }

    /// Fail unless the file is open
    pub fn ensure_open(&self) -> Result<()> {
        match self.get() {
            OpenState::Closed => Err(PoppelError::Closed),
            _ => Ok(()),
        }
    }

    /// Fail unless the file is open for writing
    pub fn ensure_writable(&self) -> Result<()> {
        match self.get() {
            OpenState::Closed => Err(PoppelError::Closed),
            OpenState::ReadOnly => Err(PoppelError::ReadOnly),
            OpenState::ReadWrite => Ok(()),
        }
    }

    /// Mark the slot closed
    ///
    /// Returns `true` only for the call that actually closed it.
    pub fn close(&self) -> bool {
        self.slot.replace(OpenState::Closed) != OpenState::Closed
    }
}
