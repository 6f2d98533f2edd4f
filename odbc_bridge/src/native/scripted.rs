use super::{ColumnDescription, Completion, ConnectionAttr, NativeApi, SqlReturn, WideText};
use crate::error::DiagRecord;
use crate::handles::{HandleKind, RawHandle};
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

const FIRST_HANDLE_ADDR: usize = 0x1000;
const HANDLE_STRIDE: usize = 0x10;

/// Native operations that can be scripted to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NativeOp {
    AllocHandle(HandleKind),
    FreeHandle(HandleKind),
    SetOdbcVersion,
    SetConnectionAttr(ConnectionAttr),
    DriverConnect,
    Disconnect,
    EndTransaction,
    Tables,
    Columns,
    ExecDirect,
    NumResultCols,
    DescribeColumn,
    Fetch,
    GetText,
}

/// Recorded native call, with marshaled strings decoded back for inspection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NativeCall {
    AllocHandle {
        kind: HandleKind,
        parent: RawHandle,
        handle: RawHandle,
    },
    FreeHandle {
        kind: HandleKind,
        handle: RawHandle,
    },
    SetOdbcVersion {
        env: RawHandle,
    },
    SetConnectionAttr {
        dbc: RawHandle,
        attr: ConnectionAttr,
        value: u32,
    },
    DriverConnect {
        dbc: RawHandle,
        connection_string: String,
    },
    Disconnect {
        dbc: RawHandle,
    },
    EndTransaction {
        dbc: RawHandle,
        completion: Completion,
    },
    Tables {
        stmt: RawHandle,
        catalog: Option<String>,
        schema: Option<String>,
        table: Option<String>,
    },
    Columns {
        stmt: RawHandle,
        catalog: Option<String>,
        schema: Option<String>,
        table: Option<String>,
        column: Option<String>,
    },
    ExecDirect {
        stmt: RawHandle,
        sql: String,
    },
    Fetch {
        stmt: RawHandle,
    },
}

/// Canned result set served to the next successful query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultSet {
    pub columns: Vec<ColumnDescription>,
    pub rows: Vec<Vec<Option<String>>>,
}

impl ResultSet {
    pub fn new(columns: &[&str]) -> Self {
        Self {
            columns: columns.iter().map(|c| ColumnDescription::text(*c)).collect(),
            rows: Vec::new(),
        }
    }

    pub fn row(mut self, values: &[Option<&str>]) -> Self {
        self.rows
            .push(values.iter().map(|v| v.map(str::to_string)).collect());
        self
    }

    fn tables() -> Self {
        Self::new(&["TABLE_CAT", "TABLE_SCHEM", "TABLE_NAME", "TABLE_TYPE", "REMARKS"])
    }

    fn columns() -> Self {
        Self::new(&[
            "TABLE_CAT",
            "TABLE_SCHEM",
            "TABLE_NAME",
            "COLUMN_NAME",
            "DATA_TYPE",
            "TYPE_NAME",
            "COLUMN_SIZE",
            "BUFFER_LENGTH",
            "DECIMAL_DIGITS",
            "NUM_PREC_RADIX",
            "NULLABLE",
            "REMARKS",
        ])
    }
}

struct Failure {
    status: SqlReturn,
    record: Option<DiagRecord>,
}

struct OpenCursor {
    result: ResultSet,
    position: Option<usize>,
}

impl OpenCursor {
    fn current_row(&self) -> Option<&Vec<Option<String>>> {
        self.position.and_then(|p| self.result.rows.get(p))
    }
}

#[derive(Default)]
struct State {
    allocated: usize,
    live: HashMap<RawHandle, HandleKind>,
    failures: HashMap<NativeOp, VecDeque<Failure>>,
    diagnostics: HashMap<RawHandle, Vec<DiagRecord>>,
    queued_results: VecDeque<ResultSet>,
    cursors: HashMap<RawHandle, OpenCursor>,
    calls: Vec<NativeCall>,
}

impl State {
    fn is_live(&self, handle: RawHandle, kind: HandleKind) -> bool {
        self.live.get(&handle) == Some(&kind)
    }

    /// Starts a call on `handle`: clears its previous diagnostics and, if a
    /// failure is scripted for `op`, records it on the handle and returns it.
    fn enter(&mut self, op: NativeOp, handle: RawHandle) -> Option<SqlReturn> {
        self.diagnostics.remove(&handle);
        let failure = self.failures.get_mut(&op).and_then(VecDeque::pop_front)?;
        if let Some(record) = failure.record {
            if !handle.is_null() {
                self.diagnostics.entry(handle).or_default().push(record);
            }
        }
        Some(failure.status)
    }

    fn push_diagnostic(&mut self, handle: RawHandle, state: &str, message: &str) {
        self.diagnostics
            .entry(handle)
            .or_default()
            .push(DiagRecord::new(state, 0, message));
    }

    /// Common path for status-only calls.
    fn simple(&mut self, op: NativeOp, handle: RawHandle, kind: HandleKind) -> SqlReturn {
        if !self.is_live(handle, kind) {
            return SqlReturn::INVALID_HANDLE;
        }
        self.enter(op, handle).unwrap_or(SqlReturn::SUCCESS)
    }

    fn open_cursor(&mut self, stmt: RawHandle, fallback: ResultSet) {
        let result = self.queued_results.pop_front().unwrap_or(fallback);
        self.cursors.insert(
            stmt,
            OpenCursor {
                result,
                position: None,
            },
        );
    }
}

fn decode(text: Option<&WideText>) -> Option<String> {
    text.map(WideText::to_string_lossy)
}

/// In-memory native API with scripted failures, canned result sets and a
/// call log. Handle values are unique for the lifetime of the instance.
#[derive(Default)]
pub struct ScriptedApi {
    state: Mutex<State>,
}

impl ScriptedApi {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Makes the next `op` fail with `SQL_ERROR` and one diagnostic record.
    pub fn fail_next(&self, op: NativeOp, sqlstate: &str, message: &str) {
        self.state().failures.entry(op).or_default().push_back(Failure {
            status: SqlReturn::ERROR,
            record: Some(DiagRecord::new(sqlstate, 0, message)),
        });
    }

    /// Makes the next `op` return `status` without diagnostics.
    pub fn fail_next_with_status(&self, op: NativeOp, status: SqlReturn) {
        self.state().failures.entry(op).or_default().push_back(Failure {
            status,
            record: None,
        });
    }

    pub fn queue_result(&self, result: ResultSet) {
        self.state().queued_results.push_back(result);
    }

    pub fn calls(&self) -> Vec<NativeCall> {
        self.state().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }

    pub fn live_handles(&self, kind: HandleKind) -> usize {
        self.state().live.values().filter(|k| **k == kind).count()
    }

    pub fn total_allocations(&self) -> usize {
        self.state().allocated
    }
}

impl NativeApi for ScriptedApi {
    fn alloc_handle(&self, kind: HandleKind, parent: RawHandle) -> (SqlReturn, RawHandle) {
        let mut s = self.state();
        let parent_kind = match kind {
            HandleKind::Environment => None,
            HandleKind::Connection => Some(HandleKind::Environment),
            HandleKind::Statement => Some(HandleKind::Connection),
        };
        let outcome = match parent_kind {
            Some(pk) if !s.is_live(parent, pk) => Some(SqlReturn::INVALID_HANDLE),
            _ => s.enter(NativeOp::AllocHandle(kind), parent),
        };
        let handle = match outcome {
            Some(_) => RawHandle::NULL,
            None => {
                s.allocated += 1;
                let handle = RawHandle::from_addr(FIRST_HANDLE_ADDR + s.allocated * HANDLE_STRIDE);
                s.live.insert(handle, kind);
                handle
            }
        };
        s.calls.push(NativeCall::AllocHandle {
            kind,
            parent,
            handle,
        });
        (outcome.unwrap_or(SqlReturn::SUCCESS), handle)
    }

    fn free_handle(&self, kind: HandleKind, handle: RawHandle) -> SqlReturn {
        let mut s = self.state();
        s.calls.push(NativeCall::FreeHandle { kind, handle });
        let ret = s.simple(NativeOp::FreeHandle(kind), handle, kind);
        if ret == SqlReturn::SUCCESS {
            s.live.remove(&handle);
            s.cursors.remove(&handle);
            s.diagnostics.remove(&handle);
        }
        ret
    }

    fn set_odbc_version(&self, env: RawHandle) -> SqlReturn {
        let mut s = self.state();
        s.calls.push(NativeCall::SetOdbcVersion { env });
        s.simple(NativeOp::SetOdbcVersion, env, HandleKind::Environment)
    }

    fn set_connection_attr(&self, dbc: RawHandle, attr: ConnectionAttr, value: u32) -> SqlReturn {
        let mut s = self.state();
        s.calls.push(NativeCall::SetConnectionAttr { dbc, attr, value });
        s.simple(NativeOp::SetConnectionAttr(attr), dbc, HandleKind::Connection)
    }

    fn driver_connect(&self, dbc: RawHandle, connection_string: &WideText) -> SqlReturn {
        let mut s = self.state();
        s.calls.push(NativeCall::DriverConnect {
            dbc,
            connection_string: connection_string.to_string_lossy(),
        });
        s.simple(NativeOp::DriverConnect, dbc, HandleKind::Connection)
    }

    fn disconnect(&self, dbc: RawHandle) -> SqlReturn {
        let mut s = self.state();
        s.calls.push(NativeCall::Disconnect { dbc });
        s.simple(NativeOp::Disconnect, dbc, HandleKind::Connection)
    }

    fn end_transaction(&self, dbc: RawHandle, completion: Completion) -> SqlReturn {
        let mut s = self.state();
        s.calls.push(NativeCall::EndTransaction { dbc, completion });
        s.simple(NativeOp::EndTransaction, dbc, HandleKind::Connection)
    }

    fn tables(
        &self,
        stmt: RawHandle,
        catalog: Option<&WideText>,
        schema: Option<&WideText>,
        table: Option<&WideText>,
    ) -> SqlReturn {
        let mut s = self.state();
        s.calls.push(NativeCall::Tables {
            stmt,
            catalog: decode(catalog),
            schema: decode(schema),
            table: decode(table),
        });
        let ret = s.simple(NativeOp::Tables, stmt, HandleKind::Statement);
        if ret == SqlReturn::SUCCESS {
            s.open_cursor(stmt, ResultSet::tables());
        }
        ret
    }

    fn columns(
        &self,
        stmt: RawHandle,
        catalog: Option<&WideText>,
        schema: Option<&WideText>,
        table: Option<&WideText>,
        column: Option<&WideText>,
    ) -> SqlReturn {
        let mut s = self.state();
        s.calls.push(NativeCall::Columns {
            stmt,
            catalog: decode(catalog),
            schema: decode(schema),
            table: decode(table),
            column: decode(column),
        });
        let ret = s.simple(NativeOp::Columns, stmt, HandleKind::Statement);
        if ret == SqlReturn::SUCCESS {
            s.open_cursor(stmt, ResultSet::columns());
        }
        ret
    }

    fn exec_direct(&self, stmt: RawHandle, sql: &WideText) -> SqlReturn {
        let mut s = self.state();
        s.calls.push(NativeCall::ExecDirect {
            stmt,
            sql: sql.to_string_lossy(),
        });
        let ret = s.simple(NativeOp::ExecDirect, stmt, HandleKind::Statement);
        if ret == SqlReturn::SUCCESS {
            s.open_cursor(stmt, ResultSet::default());
        }
        ret
    }

    fn num_result_cols(&self, stmt: RawHandle) -> (SqlReturn, i16) {
        let mut s = self.state();
        let ret = s.simple(NativeOp::NumResultCols, stmt, HandleKind::Statement);
        if ret != SqlReturn::SUCCESS {
            return (ret, 0);
        }
        let count = s.cursors.get(&stmt).map_or(0, |c| c.result.columns.len());
        (ret, count as i16)
    }

    fn describe_column(&self, stmt: RawHandle, column: u16) -> (SqlReturn, Option<ColumnDescription>) {
        let mut s = self.state();
        let ret = s.simple(NativeOp::DescribeColumn, stmt, HandleKind::Statement);
        if ret != SqlReturn::SUCCESS {
            return (ret, None);
        }
        let description = s
            .cursors
            .get(&stmt)
            .and_then(|c| c.result.columns.get(usize::from(column).wrapping_sub(1)))
            .cloned();
        match description {
            Some(d) => (SqlReturn::SUCCESS, Some(d)),
            None => {
                s.push_diagnostic(stmt, "07009", "Invalid descriptor index");
                (SqlReturn::ERROR, None)
            }
        }
    }

    fn fetch(&self, stmt: RawHandle) -> SqlReturn {
        let mut s = self.state();
        s.calls.push(NativeCall::Fetch { stmt });
        let ret = s.simple(NativeOp::Fetch, stmt, HandleKind::Statement);
        if ret != SqlReturn::SUCCESS {
            return ret;
        }
        if !s.cursors.contains_key(&stmt) {
            s.push_diagnostic(stmt, "24000", "Invalid cursor state");
            return SqlReturn::ERROR;
        }
        let Some(cursor) = s.cursors.get_mut(&stmt) else {
            return SqlReturn::ERROR;
        };
        let next = cursor.position.map_or(0, |p| p + 1);
        cursor.position = Some(next);
        if next < cursor.result.rows.len() {
            SqlReturn::SUCCESS
        } else {
            SqlReturn::NO_DATA
        }
    }

    fn get_text(&self, stmt: RawHandle, column: u16) -> (SqlReturn, Option<String>) {
        let mut s = self.state();
        let ret = s.simple(NativeOp::GetText, stmt, HandleKind::Statement);
        if ret != SqlReturn::SUCCESS {
            return (ret, None);
        }
        let value = s
            .cursors
            .get(&stmt)
            .and_then(OpenCursor::current_row)
            .and_then(|row| row.get(usize::from(column).wrapping_sub(1)))
            .cloned();
        match value {
            Some(v) => (SqlReturn::SUCCESS, v),
            None => {
                s.push_diagnostic(stmt, "07009", "Invalid descriptor index");
                (SqlReturn::ERROR, None)
            }
        }
    }

    fn diagnostic_record(&self, _kind: HandleKind, handle: RawHandle, record: i16) -> Option<DiagRecord> {
        let index = usize::try_from(record).ok()?.checked_sub(1)?;
        self.state()
            .diagnostics
            .get(&handle)
            .and_then(|records| records.get(index))
            .cloned()
    }
}
