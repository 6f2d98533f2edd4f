use super::connection::OdbcConnection;
use crate::error::{classify, OdbcError, Result};
use crate::handles::{HandleKind, OwnedHandle, RawHandle};
use crate::native::{is_error, ColumnDescription, NativeApi, SqlReturn};

/// A statement handle allocated under a connection. Owned by the query that
/// created it until it is handed to a result cursor.
pub(crate) struct Statement {
    handle: OwnedHandle,
}

impl Statement {
    /// Allocates the statement handle and records it in the registry. On
    /// failure nothing is left allocated.
    pub(crate) fn allocate(conn: &OdbcConnection) -> Result<Self> {
        let parent = conn
            .usable_handle("SQLAllocHandle")
            .map_err(|e| conn.track(e))?;
        let handle = OwnedHandle::allocate(
            conn.api(),
            conn.registry(),
            HandleKind::Statement,
            Some((HandleKind::Connection, parent)),
        )
        .map_err(|e| conn.track(e))?;
        Ok(Self { handle })
    }

    pub(crate) fn raw(&self) -> RawHandle {
        self.handle.raw()
    }

    pub(crate) fn api(&self) -> &dyn NativeApi {
        self.handle.api()
    }

    /// Classifies a failed call using this statement's diagnostics.
    pub(crate) fn diagnose(&self, operation: &'static str, ret: SqlReturn) -> OdbcError {
        classify(self.api(), operation, ret, HandleKind::Statement, self.raw())
    }

    /// Describes every result column of the executed statement.
    pub(crate) fn bind_columns(&self) -> Result<Vec<ColumnDescription>> {
        let (ret, count) = self.api().num_result_cols(self.raw());
        if is_error(ret) {
            return Err(self.diagnose("SQLNumResultCols", ret));
        }
        let count = u16::try_from(count).map_err(|_| {
            OdbcError::InternalError(format!("Driver reported {} result columns", count))
        })?;

        (1..=count)
            .map(|column| {
                let (ret, description) = self.api().describe_column(self.raw(), column);
                if is_error(ret) {
                    return Err(self.diagnose("SQLDescribeCol", ret));
                }
                description.ok_or_else(|| {
                    OdbcError::InternalError(format!("No description for column {}", column))
                })
            })
            .collect()
    }

    /// Advances to the next row; `false` once the result set is exhausted.
    pub(crate) fn fetch(&self) -> Result<bool> {
        let ret = self.api().fetch(self.raw());
        if ret == SqlReturn::NO_DATA {
            return Ok(false);
        }
        if is_error(ret) {
            return Err(self.diagnose("SQLFetch", ret));
        }
        Ok(true)
    }

    pub(crate) fn read_text(&self, column: u16) -> Result<Option<String>> {
        let (ret, value) = self.api().get_text(self.raw(), column);
        if is_error(ret) {
            return Err(self.diagnose("SQLGetData", ret));
        }
        Ok(value)
    }

    pub(crate) fn release(self) -> Result<()> {
        self.handle.release()
    }

    pub(crate) fn discard(self) {
        self.handle.discard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DriverConfig;
    use crate::engine::OdbcEnvironment;
    use crate::handles::HandleRegistry;
    use crate::native::{NativeOp, ResultSet, ScriptedApi, WideText};
    use std::sync::Arc;

    fn open() -> (Arc<ScriptedApi>, OdbcEnvironment, OdbcConnection) {
        let api = Arc::new(ScriptedApi::new());
        let env = OdbcEnvironment::new(
            api.clone(),
            Arc::new(HandleRegistry::new()),
            DriverConfig::default(),
        )
        .unwrap();
        let conn = env.open("DSN=test").unwrap();
        (api, env, conn)
    }

    #[test]
    fn test_allocate_and_release_statement() {
        let (api, env, conn) = open();
        let stmt = Statement::allocate(&conn).unwrap();
        assert_eq!(env.stats().statement, 1);
        assert_eq!(api.live_handles(HandleKind::Statement), 1);

        stmt.release().unwrap();
        assert_eq!(env.stats().statement, 0);
        assert_eq!(api.live_handles(HandleKind::Statement), 0);
    }

    #[test]
    fn test_allocate_failure_leaves_nothing_behind() {
        let (api, env, conn) = open();
        api.fail_next(
            NativeOp::AllocHandle(HandleKind::Statement),
            "HY001",
            "Memory allocation error",
        );
        let err = Statement::allocate(&conn).err().unwrap();
        assert_eq!(err.sqlstate(), *b"HY001");
        assert!(!conn.is_bad());
        assert_eq!(env.stats().statement, 0);
    }

    #[test]
    fn test_bind_and_fetch_text() {
        let (api, _env, conn) = open();
        api.queue_result(
            ResultSet::new(&["id", "name"])
                .row(&[Some("1"), Some("alpha")])
                .row(&[Some("2"), None]),
        );
        let stmt = Statement::allocate(&conn).unwrap();
        let sql = WideText::new("SELECT id, name FROM t").unwrap();
        assert_eq!(stmt.api().exec_direct(stmt.raw(), &sql), SqlReturn::SUCCESS);

        let columns = stmt.bind_columns().unwrap();
        let names: Vec<_> = columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["id", "name"]);

        assert!(stmt.fetch().unwrap());
        assert_eq!(stmt.read_text(2).unwrap().as_deref(), Some("alpha"));
        assert!(stmt.fetch().unwrap());
        assert_eq!(stmt.read_text(2).unwrap(), None);
        assert!(!stmt.fetch().unwrap());
        stmt.release().unwrap();
    }

    #[test]
    fn test_read_out_of_range_column_is_classified() {
        let (api, _env, conn) = open();
        api.queue_result(ResultSet::new(&["id"]).row(&[Some("1")]));
        let stmt = Statement::allocate(&conn).unwrap();
        let sql = WideText::new("SELECT id FROM t").unwrap();
        assert_eq!(stmt.api().exec_direct(stmt.raw(), &sql), SqlReturn::SUCCESS);
        assert!(stmt.fetch().unwrap());

        let err = stmt.read_text(3).unwrap_err();
        assert_eq!(err.operation(), Some("SQLGetData"));
        assert_eq!(err.sqlstate(), *b"07009");
        stmt.discard();
    }
}
