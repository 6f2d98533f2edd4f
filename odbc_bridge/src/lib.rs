//! Handle lifecycle management for ODBC drivers.
//!
//! An [`OdbcEnvironment`] owns the environment handle and opens
//! [`OdbcConnection`]s; catalog queries and direct execution produce
//! [`ResultCursor`]s that own their statement handle. Every allocation is
//! counted in a [`HandleRegistry`] and released on every exit path.

mod config;
pub mod engine;
mod error;
mod handles;
pub mod native;
#[cfg(feature = "test-helpers")]
pub mod test_helpers;

pub use config::{sanitize_connection_string, DriverConfig};
pub use engine::{
    ConnectionState, IsolationLevel, OdbcConnection, OdbcEnvironment, ResultCursor, Row,
    TransactionState,
};
pub use error::{DiagRecord, ErrorCategory, OdbcError, Result, BAD_CONNECTION_STATES};
pub use handles::{HandleKind, HandleRegistry, HandleStats, RawHandle};
pub use native::{ColumnDescription, NativeApi};
