//! Boundary to the handle-based native API.
//!
//! Every call returns the raw status code; interpreting it (and reading
//! diagnostics on failure) is up to the caller. [`OdbcApi`] talks to the
//! system driver manager, [`ScriptedApi`] is an in-memory stand-in used by
//! tests.

mod odbc;
#[cfg(any(test, feature = "test-helpers"))]
mod scripted;
mod wide;

pub use odbc::OdbcApi;
pub use odbc_api::sys::SqlReturn;
#[cfg(any(test, feature = "test-helpers"))]
pub use scripted::{NativeCall, NativeOp, ResultSet, ScriptedApi};
pub use wide::WideText;

use crate::error::DiagRecord;
use crate::handles::{HandleKind, RawHandle};
use serde::{Deserialize, Serialize};

pub const AUTOCOMMIT_OFF: u32 = 0;
pub const AUTOCOMMIT_ON: u32 = 1;

/// Anything other than `SUCCESS` or `SUCCESS_WITH_INFO` counts as failure.
pub fn is_error(ret: SqlReturn) -> bool {
    !(ret == SqlReturn::SUCCESS || ret == SqlReturn::SUCCESS_WITH_INFO)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionAttr {
    AutoCommit,
    LoginTimeout,
    TxnIsolation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Completion {
    Commit,
    Rollback,
}

/// Result column metadata as reported by the driver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDescription {
    pub name: String,
    pub data_type: i16,
    pub size: usize,
    pub decimal_digits: i16,
    /// `None` when the driver cannot tell.
    pub nullable: Option<bool>,
}

impl ColumnDescription {
    pub fn text(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: -9, // SQL_WVARCHAR
            size: 128,
            decimal_digits: 0,
            nullable: Some(true),
        }
    }
}

pub trait NativeApi: Send + Sync {
    /// Allocates a handle of `kind` under `parent` (null for environments).
    fn alloc_handle(&self, kind: HandleKind, parent: RawHandle) -> (SqlReturn, RawHandle);

    fn free_handle(&self, kind: HandleKind, handle: RawHandle) -> SqlReturn;

    fn set_odbc_version(&self, env: RawHandle) -> SqlReturn;

    fn set_connection_attr(&self, dbc: RawHandle, attr: ConnectionAttr, value: u32) -> SqlReturn;

    fn driver_connect(&self, dbc: RawHandle, connection_string: &WideText) -> SqlReturn;

    fn disconnect(&self, dbc: RawHandle) -> SqlReturn;

    fn end_transaction(&self, dbc: RawHandle, completion: Completion) -> SqlReturn;

    /// Catalog query for tables. `None` filters are passed as null pointers.
    fn tables(
        &self,
        stmt: RawHandle,
        catalog: Option<&WideText>,
        schema: Option<&WideText>,
        table: Option<&WideText>,
    ) -> SqlReturn;

    /// Catalog query for columns. `None` filters are passed as null pointers.
    fn columns(
        &self,
        stmt: RawHandle,
        catalog: Option<&WideText>,
        schema: Option<&WideText>,
        table: Option<&WideText>,
        column: Option<&WideText>,
    ) -> SqlReturn;

    fn exec_direct(&self, stmt: RawHandle, sql: &WideText) -> SqlReturn;

    fn num_result_cols(&self, stmt: RawHandle) -> (SqlReturn, i16);

    /// Describes result column `column` (1-based).
    fn describe_column(&self, stmt: RawHandle, column: u16) -> (SqlReturn, Option<ColumnDescription>);

    fn fetch(&self, stmt: RawHandle) -> SqlReturn;

    /// Reads column `column` (1-based) of the current row as text; `None` is SQL NULL.
    fn get_text(&self, stmt: RawHandle, column: u16) -> (SqlReturn, Option<String>);

    /// Diagnostic record `record` (1-based) of `handle`, `None` once exhausted.
    fn diagnostic_record(&self, kind: HandleKind, handle: RawHandle, record: i16) -> Option<DiagRecord>;
}
