mod guard;
mod registry;

pub(crate) use guard::OwnedHandle;
pub use registry::{HandleRegistry, HandleStats};

use serde::{Deserialize, Serialize};
use std::fmt;

/// The three native handle kinds. Environment handles parent connection
/// handles, which in turn parent statement handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HandleKind {
    Environment,
    Connection,
    Statement,
}

impl HandleKind {
    pub const ALL: [HandleKind; 3] = [
        HandleKind::Environment,
        HandleKind::Connection,
        HandleKind::Statement,
    ];

    pub fn name(self) -> &'static str {
        match self {
            HandleKind::Environment => "environment",
            HandleKind::Connection => "connection",
            HandleKind::Statement => "statement",
        }
    }
}

impl fmt::Display for HandleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Opaque native handle value. Only the native API layer interprets it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RawHandle(usize);

impl RawHandle {
    pub const NULL: RawHandle = RawHandle(0);

    pub fn from_addr(addr: usize) -> Self {
        Self(addr)
    }

    pub fn addr(self) -> usize {
        self.0
    }

    pub fn is_null(self) -> bool {
        self.0 == 0
    }
}
