use super::connection::OdbcConnection;
use super::cursor::ResultCursor;
use super::statement::Statement;
use crate::error::{OdbcError, Result};
use crate::handles::RawHandle;
use crate::native::{is_error, NativeApi, SqlReturn, WideText};

/// Native call that produces a result set on a fresh statement handle.
enum NativeQuery<'a> {
    Tables {
        catalog: &'a str,
        schema: &'a str,
        table: &'a str,
    },
    Columns {
        catalog: &'a str,
        schema: &'a str,
        table: &'a str,
        column: &'a str,
    },
    Direct(&'a str),
}

impl NativeQuery<'_> {
    fn operation(&self) -> &'static str {
        match self {
            NativeQuery::Tables { .. } => "SQLTables",
            NativeQuery::Columns { .. } => "SQLColumns",
            NativeQuery::Direct(_) => "SQLExecDirect",
        }
    }

    /// Marshals the arguments and issues the call. Empty filters go down as
    /// null pointers.
    fn issue(&self, api: &dyn NativeApi, stmt: RawHandle) -> Result<SqlReturn> {
        match *self {
            NativeQuery::Tables {
                catalog,
                schema,
                table,
            } => {
                let catalog = WideText::filter(catalog)?;
                let schema = WideText::filter(schema)?;
                let table = WideText::filter(table)?;
                Ok(api.tables(stmt, catalog.as_ref(), schema.as_ref(), table.as_ref()))
            }
            NativeQuery::Columns {
                catalog,
                schema,
                table,
                column,
            } => {
                let catalog = WideText::filter(catalog)?;
                let schema = WideText::filter(schema)?;
                let table = WideText::filter(table)?;
                let column = WideText::filter(column)?;
                Ok(api.columns(
                    stmt,
                    catalog.as_ref(),
                    schema.as_ref(),
                    table.as_ref(),
                    column.as_ref(),
                ))
            }
            NativeQuery::Direct(sql) => {
                let sql = WideText::new(sql)?;
                Ok(api.exec_direct(stmt, &sql))
            }
        }
    }

    /// `SQL_NO_DATA` from a direct execution means "no rows affected".
    fn succeeded(&self, ret: SqlReturn) -> bool {
        !is_error(ret) || (matches!(self, NativeQuery::Direct(_)) && ret == SqlReturn::NO_DATA)
    }
}

/// Allocate, issue, bind, wrap. Every failure after allocation releases the
/// statement handle before the error is returned; on success the handle
/// moves into the cursor.
fn run<'c>(conn: &'c OdbcConnection, query: NativeQuery<'_>) -> Result<ResultCursor<'c>> {
    let stmt = Statement::allocate(conn)?;

    let ret = match query.issue(stmt.api(), stmt.raw()) {
        Ok(ret) => ret,
        Err(e) => {
            stmt.discard();
            return Err(e);
        }
    };
    if !query.succeeded(ret) {
        let err = conn.track(stmt.diagnose(query.operation(), ret));
        stmt.discard();
        return Err(err);
    }

    let columns = if ret == SqlReturn::NO_DATA {
        Vec::new()
    } else {
        match stmt.bind_columns() {
            Ok(columns) => columns,
            Err(e) => {
                let err = conn.track(e);
                stmt.discard();
                return Err(err);
            }
        }
    };

    Ok(ResultCursor::new(conn, stmt, columns))
}

pub(crate) fn list_tables<'c>(
    conn: &'c OdbcConnection,
    catalog: &str,
    schema: &str,
    table: &str,
) -> Result<ResultCursor<'c>> {
    run(
        conn,
        NativeQuery::Tables {
            catalog,
            schema,
            table,
        },
    )
}

pub(crate) fn list_columns<'c>(
    conn: &'c OdbcConnection,
    catalog: &str,
    schema: &str,
    table: &str,
    column: &str,
) -> Result<ResultCursor<'c>> {
    run(
        conn,
        NativeQuery::Columns {
            catalog,
            schema,
            table,
            column,
        },
    )
}

pub(crate) fn execute_direct<'c>(conn: &'c OdbcConnection, sql: &str) -> Result<ResultCursor<'c>> {
    if sql.trim().is_empty() {
        return Err(OdbcError::ValidationError(
            "SQL text cannot be empty".to_string(),
        ));
    }
    run(conn, NativeQuery::Direct(sql))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::native::{NativeCall, ScriptedApi};

    #[test]
    fn test_operation_names() {
        assert_eq!(
            NativeQuery::Tables {
                catalog: "",
                schema: "",
                table: ""
            }
            .operation(),
            "SQLTables"
        );
        assert_eq!(NativeQuery::Direct("SELECT 1").operation(), "SQLExecDirect");
    }

    #[test]
    fn test_direct_accepts_no_data() {
        let direct = NativeQuery::Direct("DELETE FROM t");
        assert!(direct.succeeded(SqlReturn::NO_DATA));
        assert!(direct.succeeded(SqlReturn::SUCCESS_WITH_INFO));
        assert!(!direct.succeeded(SqlReturn::ERROR));

        let tables = NativeQuery::Tables {
            catalog: "",
            schema: "",
            table: "",
        };
        assert!(!tables.succeeded(SqlReturn::NO_DATA));
    }

    #[test]
    fn test_issue_passes_null_for_empty_filters() {
        let api = ScriptedApi::new();
        let query = NativeQuery::Columns {
            catalog: "",
            schema: "dbo",
            table: "",
            column: "id",
        };
        // The handle is not live, so the call fails, but it is still recorded.
        let ret = query.issue(&api, RawHandle::from_addr(0x99)).unwrap();
        assert_eq!(ret, SqlReturn::INVALID_HANDLE);
        assert_eq!(
            api.calls(),
            vec![NativeCall::Columns {
                stmt: RawHandle::from_addr(0x99),
                catalog: None,
                schema: Some("dbo".to_string()),
                table: None,
                column: Some("id".to_string()),
            }]
        );
    }
}
