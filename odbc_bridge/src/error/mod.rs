mod diagnostics;

pub(crate) use diagnostics::classify;
pub use diagnostics::{DiagRecord, BAD_CONNECTION_STATES};

use crate::handles::HandleKind;
use crate::native::SqlReturn;
use thiserror::Error;

/// Error category for decision-making (retry, abort, reconnect, etc.)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Transient error - the caller may try again
    Transient,
    /// Fatal error - should abort operation
    Fatal,
    /// Validation error - invalid user input
    Validation,
    /// Connection lost - discard the connection and reconnect
    ConnectionLost,
}

#[derive(Error, Debug, Clone)]
pub enum OdbcError {
    #[error("Connection string is empty")]
    EmptyConnectionString,

    #[error("{}", describe_native(.operation, .status, .records))]
    Native {
        operation: &'static str,
        status: i16,
        records: Vec<DiagRecord>,
    },

    /// The connection handle is no longer usable and must not be reused.
    #[error("Bad connection after {operation}: {}", join_records(.records))]
    BadConnection {
        operation: &'static str,
        records: Vec<DiagRecord>,
    },

    #[error("Handle accounting error for {kind} handles: {reason} (count {count})")]
    Accounting {
        kind: HandleKind,
        count: u64,
        reason: &'static str,
    },

    #[error("Internal error: {0}")]
    InternalError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),
}

fn join_records(records: &[DiagRecord]) -> String {
    records
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}

fn describe_native(operation: &str, status: &i16, records: &[DiagRecord]) -> String {
    if records.is_empty() {
        format!("{} failed with status {}", operation, status)
    } else {
        format!("{}: {}", operation, join_records(records))
    }
}

impl OdbcError {
    /// Failure without diagnostics, e.g. when no valid handle exists to
    /// read records from.
    pub(crate) fn from_status(operation: &'static str, status: SqlReturn) -> Self {
        OdbcError::Native {
            operation,
            status: status.0,
            records: Vec::new(),
        }
    }

    pub fn is_bad_connection(&self) -> bool {
        matches!(self, OdbcError::BadConnection { .. })
    }

    /// Native function that failed, if the error came from the native layer.
    pub fn operation(&self) -> Option<&'static str> {
        match self {
            OdbcError::Native { operation, .. } | OdbcError::BadConnection { operation, .. } => {
                Some(operation)
            }
            _ => None,
        }
    }

    pub fn records(&self) -> &[DiagRecord] {
        match self {
            OdbcError::Native { records, .. } | OdbcError::BadConnection { records, .. } => records,
            _ => &[],
        }
    }

    pub fn sqlstate(&self) -> [u8; 5] {
        self.records()
            .first()
            .map(DiagRecord::sqlstate)
            .unwrap_or([0u8; 5])
    }

    pub fn native_code(&self) -> i32 {
        self.records().first().map_or(0, |r| r.native_error)
    }

    pub fn message(&self) -> String {
        match self.records().first() {
            Some(record) => record.message.clone(),
            None => self.to_string(),
        }
    }

    /// Returns true if the error is transient and may be retried by the caller
    pub fn is_retryable(&self) -> bool {
        match self {
            OdbcError::Native { records, .. } => records
                .iter()
                .any(|r| r.state.starts_with("08") || r.state.starts_with("HYT")),
            _ => false,
        }
    }

    /// Returns true if this is a connection-related error
    pub fn is_connection_error(&self) -> bool {
        match self {
            OdbcError::EmptyConnectionString | OdbcError::BadConnection { .. } => true,
            OdbcError::Native { records, .. } => records.iter().any(|r| r.state.starts_with("08")),
            _ => false,
        }
    }

    /// Returns the error category for decision-making
    pub fn error_category(&self) -> ErrorCategory {
        match self {
            OdbcError::ValidationError(_) | OdbcError::EmptyConnectionString => {
                ErrorCategory::Validation
            }
            OdbcError::BadConnection { .. } => ErrorCategory::ConnectionLost,
            _ if self.is_retryable() => ErrorCategory::Transient,
            _ => ErrorCategory::Fatal,
        }
    }
}

pub type Result<T> = std::result::Result<T, OdbcError>;
