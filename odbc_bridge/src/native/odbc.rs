use super::{is_error, ColumnDescription, Completion, ConnectionAttr, NativeApi, WideText};
use crate::error::DiagRecord;
use crate::handles::{HandleKind, RawHandle};
use odbc_api::sys::{
    self, AttrOdbcVersion, CDataType, CompletionType, ConnectionAttribute, DriverConnectOption,
    EnvironmentAttribute, HandleType, Nullability, SqlDataType, SqlReturn, WChar,
};
use std::ffi::c_void;
use std::mem::size_of;
use std::ptr::{null, null_mut};

const NTS_SMALL: i16 = sys::NTS as i16;
const NTS_INTEGER: i32 = sys::NTS as i32;
const MAX_MESSAGE_LENGTH: usize = 1024;
const MAX_COLUMN_NAME_LENGTH: usize = 256;
const TEXT_CHUNK_LENGTH: usize = 4096;

/// Native API backed by the system ODBC driver manager, using the wide (`W`)
/// entry points.
#[derive(Debug, Default, Clone, Copy)]
pub struct OdbcApi;

fn handle_type(kind: HandleKind) -> HandleType {
    match kind {
        HandleKind::Environment => HandleType::Env,
        HandleKind::Connection => HandleType::Dbc,
        HandleKind::Statement => HandleType::Stmt,
    }
}

fn as_handle(handle: RawHandle) -> sys::Handle {
    sys::Handle(handle.addr() as *mut c_void)
}

fn as_env(handle: RawHandle) -> sys::HEnv {
    sys::HEnv(handle.addr() as *mut c_void)
}

fn as_dbc(handle: RawHandle) -> sys::HDbc {
    sys::HDbc(handle.addr() as *mut c_void)
}

fn as_stmt(handle: RawHandle) -> sys::HStmt {
    sys::HStmt(handle.addr() as *mut c_void)
}

fn wide_ptr(text: Option<&WideText>) -> *const WChar {
    text.map_or(null(), WideText::as_ptr)
}

fn connection_attribute(attr: ConnectionAttr) -> ConnectionAttribute {
    match attr {
        ConnectionAttr::AutoCommit => ConnectionAttribute::AutoCommit,
        ConnectionAttr::LoginTimeout => ConnectionAttribute::LoginTimeout,
        ConnectionAttr::TxnIsolation => ConnectionAttribute::TxnIsolation,
    }
}

impl NativeApi for OdbcApi {
    fn alloc_handle(&self, kind: HandleKind, parent: RawHandle) -> (SqlReturn, RawHandle) {
        let mut out: sys::Handle = sys::Handle(null_mut());
        // SAFETY: `parent` is either null (environment) or a live handle owned by the caller.
        let ret = unsafe { sys::SQLAllocHandle(handle_type(kind), as_handle(parent), &mut out) };
        (ret, RawHandle::from_addr(out.0 as usize))
    }

    fn free_handle(&self, kind: HandleKind, handle: RawHandle) -> SqlReturn {
        // SAFETY: the handle guard calls this at most once per allocated handle.
        unsafe { sys::SQLFreeHandle(handle_type(kind), as_handle(handle)) }
    }

    fn set_odbc_version(&self, env: RawHandle) -> SqlReturn {
        let version = AttrOdbcVersion::Odbc3 as i32 as usize as sys::Pointer;
        // SAFETY: `env` is live; the version is passed by value in the pointer argument.
        unsafe { sys::SQLSetEnvAttr(as_env(env), EnvironmentAttribute::OdbcVersion, version, 0) }
    }

    fn set_connection_attr(&self, dbc: RawHandle, attr: ConnectionAttr, value: u32) -> SqlReturn {
        // SAFETY: `dbc` is live and every supported attribute is an integer passed by value.
        unsafe {
            sys::SQLSetConnectAttrW(
                as_dbc(dbc),
                connection_attribute(attr),
                value as usize as sys::Pointer,
                0,
            )
        }
    }

    fn driver_connect(&self, dbc: RawHandle, connection_string: &WideText) -> SqlReturn {
        // SAFETY: `dbc` is live and the connection string is NUL-terminated, matching `NTS`.
        unsafe {
            sys::SQLDriverConnectW(
                as_dbc(dbc),
                null_mut(),
                connection_string.as_ptr(),
                NTS_SMALL,
                null_mut(),
                0,
                null_mut(),
                DriverConnectOption::NoPrompt,
            )
        }
    }

    fn disconnect(&self, dbc: RawHandle) -> SqlReturn {
        // SAFETY: `dbc` is a live connection handle.
        unsafe { sys::SQLDisconnect(as_dbc(dbc)) }
    }

    fn end_transaction(&self, dbc: RawHandle, completion: Completion) -> SqlReturn {
        let completion = match completion {
            Completion::Commit => CompletionType::Commit,
            Completion::Rollback => CompletionType::Rollback,
        };
        // SAFETY: `dbc` is a live connection handle.
        unsafe { sys::SQLEndTran(HandleType::Dbc, as_handle(dbc), completion) }
    }

    fn tables(
        &self,
        stmt: RawHandle,
        catalog: Option<&WideText>,
        schema: Option<&WideText>,
        table: Option<&WideText>,
    ) -> SqlReturn {
        // SAFETY: `stmt` is live; each filter is null or a NUL-terminated buffer alive for the call.
        unsafe {
            sys::SQLTablesW(
                as_stmt(stmt),
                wide_ptr(catalog),
                NTS_SMALL,
                wide_ptr(schema),
                NTS_SMALL,
                wide_ptr(table),
                NTS_SMALL,
                null(),
                0,
            )
        }
    }

    fn columns(
        &self,
        stmt: RawHandle,
        catalog: Option<&WideText>,
        schema: Option<&WideText>,
        table: Option<&WideText>,
        column: Option<&WideText>,
    ) -> SqlReturn {
        // SAFETY: `stmt` is live; each filter is null or a NUL-terminated buffer alive for the call.
        unsafe {
            sys::SQLColumnsW(
                as_stmt(stmt),
                wide_ptr(catalog),
                NTS_SMALL,
                wide_ptr(schema),
                NTS_SMALL,
                wide_ptr(table),
                NTS_SMALL,
                wide_ptr(column),
                NTS_SMALL,
            )
        }
    }

    fn exec_direct(&self, stmt: RawHandle, sql: &WideText) -> SqlReturn {
        // SAFETY: `stmt` is live and `sql` is NUL-terminated, matching `NTS`.
        unsafe { sys::SQLExecDirectW(as_stmt(stmt), sql.as_ptr(), NTS_INTEGER) }
    }

    fn num_result_cols(&self, stmt: RawHandle) -> (SqlReturn, i16) {
        let mut count: i16 = 0;
        // SAFETY: `stmt` is live and `count` outlives the call.
        let ret = unsafe { sys::SQLNumResultCols(as_stmt(stmt), &mut count) };
        (ret, count)
    }

    fn describe_column(&self, stmt: RawHandle, column: u16) -> (SqlReturn, Option<ColumnDescription>) {
        let mut name = vec![0 as WChar; MAX_COLUMN_NAME_LENGTH];
        let mut name_length: i16 = 0;
        let mut data_type = SqlDataType::UNKNOWN_TYPE;
        let mut size: sys::ULen = 0;
        let mut decimal_digits: i16 = 0;
        let mut nullable = Nullability::UNKNOWN;

        // SAFETY: `stmt` is live; the name buffer length passed is its real capacity.
        let ret = unsafe {
            sys::SQLDescribeColW(
                as_stmt(stmt),
                column,
                name.as_mut_ptr(),
                name.len() as i16,
                &mut name_length,
                &mut data_type,
                &mut size,
                &mut decimal_digits,
                &mut nullable,
            )
        };
        if is_error(ret) {
            return (ret, None);
        }

        // Truncated names report their full length; keep what fits.
        let length = (name_length.max(0) as usize).min(name.len() - 1);
        let nullable = if nullable.0 == Nullability::NULLABLE.0 {
            Some(true)
        } else if nullable.0 == Nullability::NO_NULLS.0 {
            Some(false)
        } else {
            None
        };
        let description = ColumnDescription {
            name: String::from_utf16_lossy(&name[..length]),
            data_type: data_type.0,
            size,
            decimal_digits,
            nullable,
        };
        (ret, Some(description))
    }

    fn fetch(&self, stmt: RawHandle) -> SqlReturn {
        // SAFETY: `stmt` is live with an executed result set.
        unsafe { sys::SQLFetch(as_stmt(stmt)) }
    }

    fn get_text(&self, stmt: RawHandle, column: u16) -> (SqlReturn, Option<String>) {
        let mut text: Vec<WChar> = Vec::new();
        let mut buffer = vec![0 as WChar; TEXT_CHUNK_LENGTH];
        // One unit is always taken by the terminator the driver writes.
        let capacity = buffer.len() - 1;

        loop {
            let mut indicator: sys::Len = 0;
            // SAFETY: `stmt` is live; the buffer length passed is its real size in bytes.
            let ret = unsafe {
                sys::SQLGetData(
                    as_stmt(stmt),
                    column,
                    CDataType::WChar,
                    buffer.as_mut_ptr() as sys::Pointer,
                    (buffer.len() * size_of::<WChar>()) as sys::Len,
                    &mut indicator,
                )
            };
            if ret == SqlReturn::NO_DATA {
                break;
            }
            if is_error(ret) {
                return (ret, None);
            }
            if indicator == sys::NULL_DATA {
                return (SqlReturn::SUCCESS, None);
            }

            let available = indicator.max(0) as usize / size_of::<WChar>();
            let truncated = indicator == sys::NO_TOTAL || available > capacity;
            let received = if truncated { capacity } else { available };
            text.extend_from_slice(&buffer[..received]);

            // SUCCESS_WITH_INFO on a truncated value: the next call continues it.
            if ret == SqlReturn::SUCCESS || !truncated {
                break;
            }
        }
        (SqlReturn::SUCCESS, Some(String::from_utf16_lossy(&text)))
    }

    fn diagnostic_record(&self, kind: HandleKind, handle: RawHandle, record: i16) -> Option<DiagRecord> {
        let mut state = [0 as WChar; 6];
        let mut native_error: i32 = 0;
        let mut message = vec![0 as WChar; MAX_MESSAGE_LENGTH];
        let mut message_length: i16 = 0;

        // SAFETY: `handle` is live for `kind`; buffer lengths match their real capacities.
        let ret = unsafe {
            sys::SQLGetDiagRecW(
                handle_type(kind),
                as_handle(handle),
                record,
                state.as_mut_ptr(),
                &mut native_error,
                message.as_mut_ptr(),
                message.len() as i16,
                &mut message_length,
            )
        };
        if ret == SqlReturn::NO_DATA || is_error(ret) {
            return None;
        }

        let length = (message_length.max(0) as usize).min(message.len() - 1);
        Some(DiagRecord::new(
            String::from_utf16_lossy(&state[..5]),
            native_error,
            String::from_utf16_lossy(&message[..length]),
        ))
    }
}
