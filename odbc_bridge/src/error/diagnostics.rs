use super::OdbcError;
use crate::handles::{HandleKind, RawHandle};
use crate::native::{NativeApi, SqlReturn};
use serde::{Deserialize, Serialize};
use std::fmt;

/// SQLSTATEs after which a connection handle is no longer usable:
/// communication link failure and connection not open.
pub const BAD_CONNECTION_STATES: &[&str] = &["08S01", "08003"];

// Upper bound on records read per failure; some drivers repeat records.
const MAX_DIAG_RECORDS: i16 = 64;

/// One diagnostic record read from a native handle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagRecord {
    pub state: String,
    pub native_error: i32,
    pub message: String,
}

impl DiagRecord {
    pub fn new(state: impl Into<String>, native_error: i32, message: impl Into<String>) -> Self {
        Self {
            state: state.into(),
            native_error,
            message: message.into(),
        }
    }

    pub fn sqlstate(&self) -> [u8; 5] {
        let mut out = [0u8; 5];
        for (dst, src) in out.iter_mut().zip(self.state.bytes()) {
            *dst = src;
        }
        out
    }

    pub fn is_bad_connection(&self) -> bool {
        BAD_CONNECTION_STATES.contains(&self.state.as_str())
    }
}

impl fmt::Display for DiagRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{}}} {}", self.state, self.message)
    }
}

/// Turns a failed native status into an error, reading every diagnostic
/// record available on `handle`. Any bad-connection SQLSTATE yields
/// [`OdbcError::BadConnection`].
pub(crate) fn classify(
    api: &dyn NativeApi,
    operation: &'static str,
    status: SqlReturn,
    kind: HandleKind,
    handle: RawHandle,
) -> OdbcError {
    let mut records = Vec::new();
    for number in 1..=MAX_DIAG_RECORDS {
        match api.diagnostic_record(kind, handle, number) {
            Some(record) => records.push(record),
            None => break,
        }
    }

    if records.iter().any(DiagRecord::is_bad_connection) {
        return OdbcError::BadConnection { operation, records };
    }
    OdbcError::Native {
        operation,
        status: status.0,
        records,
    }
}
