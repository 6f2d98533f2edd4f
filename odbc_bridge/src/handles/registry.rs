use super::HandleKind;
use crate::error::{OdbcError, Result};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

lazy_static::lazy_static! {
    static ref GLOBAL_REGISTRY: Arc<HandleRegistry> = Arc::new(HandleRegistry::new());
}

/// Live native handle counts per kind.
///
/// Every successful allocation increments the counter of its kind and every
/// successful release decrements it, so a registry whose owners have all been
/// dropped reads zero everywhere. Counters never go below zero: a decrement
/// at zero is reported as an accounting error and leaves the counter as is.
#[derive(Debug, Default)]
pub struct HandleRegistry {
    environment: AtomicU64,
    connection: AtomicU64,
    statement: AtomicU64,
}

impl HandleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process-wide registry used by [`crate::OdbcEnvironment::odbc`].
    pub fn global() -> Arc<HandleRegistry> {
        Arc::clone(&GLOBAL_REGISTRY)
    }

    fn counter(&self, kind: HandleKind) -> &AtomicU64 {
        match kind {
            HandleKind::Environment => &self.environment,
            HandleKind::Connection => &self.connection,
            HandleKind::Statement => &self.statement,
        }
    }

    pub fn increment(&self, kind: HandleKind) -> Result<()> {
        self.counter(kind)
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_add(1))
            .map(|_| ())
            .map_err(|count| OdbcError::Accounting {
                kind,
                count,
                reason: "counter overflow",
            })
    }

    pub fn decrement(&self, kind: HandleKind) -> Result<()> {
        self.counter(kind)
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
            .map(|_| ())
            .map_err(|count| OdbcError::Accounting {
                kind,
                count,
                reason: "release without a matching allocation",
            })
    }

    pub fn count(&self, kind: HandleKind) -> u64 {
        self.counter(kind).load(Ordering::Acquire)
    }

    pub fn snapshot(&self) -> HandleStats {
        HandleStats {
            environment: self.count(HandleKind::Environment),
            connection: self.count(HandleKind::Connection),
            statement: self.count(HandleKind::Statement),
        }
    }

    /// True when no handle of any kind is outstanding.
    pub fn is_quiescent(&self) -> bool {
        HandleKind::ALL.iter().all(|kind| self.count(*kind) == 0)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandleStats {
    pub environment: u64,
    pub connection: u64,
    pub statement: u64,
}

impl HandleStats {
    pub fn get(&self, kind: HandleKind) -> u64 {
        match kind {
            HandleKind::Environment => self.environment,
            HandleKind::Connection => self.connection,
            HandleKind::Statement => self.statement,
        }
    }

    pub fn total(&self) -> u64 {
        self.environment + self.connection + self.statement
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self)
            .map_err(|e| OdbcError::InternalError(format!("Failed to serialize handle stats: {}", e)))
    }
}
