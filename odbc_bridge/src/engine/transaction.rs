use crate::native::Completion;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IsolationLevel {
    ReadUncommitted,
    ReadCommitted,
    RepeatableRead,
    Serializable,
}

impl IsolationLevel {
    /// `SQL_TXN_*` bitmask value for the `SQL_ATTR_TXN_ISOLATION` attribute.
    pub(crate) fn to_odbc_value(self) -> u32 {
        match self {
            Self::ReadUncommitted => 1,
            Self::ReadCommitted => 2,
            Self::RepeatableRead => 4,
            Self::Serializable => 8,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    None,
    Active,
    Committed,
    RolledBack,
}

impl From<Completion> for TransactionState {
    fn from(completion: Completion) -> Self {
        match completion {
            Completion::Commit => TransactionState::Committed,
            Completion::Rollback => TransactionState::RolledBack,
        }
    }
}

/// Bookkeeping for the transaction a connection currently has open. The
/// native work (autocommit, end-transaction) is done by the connection.
#[derive(Debug)]
pub(crate) struct Transaction {
    isolation_level: Option<IsolationLevel>,
    started: Instant,
}

impl Transaction {
    pub(crate) fn begin(isolation_level: Option<IsolationLevel>) -> Self {
        Self {
            isolation_level,
            started: Instant::now(),
        }
    }

    pub(crate) fn isolation_level(&self) -> Option<IsolationLevel> {
        self.isolation_level
    }

    pub(crate) fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}
