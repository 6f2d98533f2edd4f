use super::catalog;
use super::cursor::ResultCursor;
use super::environment::EnvironmentShared;
use super::transaction::{IsolationLevel, Transaction, TransactionState};
use crate::config::sanitize_connection_string;
use crate::error::{classify, OdbcError, Result};
use crate::handles::{HandleKind, HandleRegistry, HandleStats, OwnedHandle, RawHandle};
use crate::native::{
    is_error, Completion, ConnectionAttr, NativeApi, SqlReturn, WideText, AUTOCOMMIT_OFF,
    AUTOCOMMIT_ON,
};
use std::cell::Cell;
use std::sync::Arc;

/// Normalized marker of the Microsoft Access driver, whose catalog queries
/// need a different dialect.
const ACCESS_DRIVER_MARKER: &str = "DRIVER={MICROSOFTACCESSDRIVER";

/// Case-insensitive, whitespace-insensitive check for the Access driver.
pub(crate) fn is_access_connection_string(connection_string: &str) -> bool {
    let normalized: String = connection_string
        .chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_uppercase)
        .collect();
    normalized.contains(ACCESS_DRIVER_MARKER)
}

/// Info line for an opened connection; credentials are masked.
fn opened_log_line(connection_string: &str) -> String {
    format!(
        "Connection opened: {}",
        sanitize_connection_string(connection_string)
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Open,
    /// A native call reported the link unusable; close and replace.
    Bad,
    Closed,
}

/// One connected native connection handle.
///
/// Intended for use from one thread at a time: it is `Send` but not `Sync`.
/// Cursors borrow the connection, so it cannot be closed while any of them
/// is still alive.
pub struct OdbcConnection {
    env: Arc<EnvironmentShared>,
    handle: Option<OwnedHandle>,
    tx: Option<Transaction>,
    last_transaction: TransactionState,
    bad: Cell<bool>,
    access_driver: bool,
}

impl OdbcConnection {
    pub(crate) fn open(env: Arc<EnvironmentShared>, connection_string: &str) -> Result<Self> {
        if connection_string.is_empty() {
            return Err(OdbcError::EmptyConnectionString);
        }

        let handle = OwnedHandle::allocate(
            &env.api,
            &env.registry,
            HandleKind::Connection,
            Some((HandleKind::Environment, env.raw())),
        )?;
        let api = env.api.as_ref();

        if let Some(secs) = env.config.login_timeout_secs {
            let ret = api.set_connection_attr(handle.raw(), ConnectionAttr::LoginTimeout, secs);
            if is_error(ret) {
                let err = classify(api, "SQLSetConnectAttr", ret, HandleKind::Connection, handle.raw());
                handle.discard();
                return Err(err);
            }
        }

        let wide = match WideText::new(connection_string) {
            Ok(wide) => wide,
            Err(e) => {
                handle.discard();
                return Err(e);
            }
        };
        let ret = api.driver_connect(handle.raw(), &wide);
        if is_error(ret) {
            let err = classify(api, "SQLDriverConnect", ret, HandleKind::Connection, handle.raw());
            handle.discard();
            return Err(err);
        }

        if env.config.log_connections {
            log::info!("{}", opened_log_line(connection_string));
        }
        let access_driver = is_access_connection_string(connection_string);
        log::debug!(
            "Connected handle {:#x} (access driver: {})",
            handle.raw().addr(),
            access_driver
        );

        Ok(Self {
            env,
            handle: Some(handle),
            tx: None,
            last_transaction: TransactionState::None,
            bad: Cell::new(false),
            access_driver,
        })
    }

    pub(crate) fn api(&self) -> &Arc<dyn NativeApi> {
        &self.env.api
    }

    pub(crate) fn registry(&self) -> &Arc<HandleRegistry> {
        &self.env.registry
    }

    /// Handle of a connection that may still be used for new work.
    pub(crate) fn usable_handle(&self, operation: &'static str) -> Result<RawHandle> {
        if self.bad.get() {
            return Err(OdbcError::BadConnection {
                operation,
                records: Vec::new(),
            });
        }
        self.raw_handle()
    }

    fn raw_handle(&self) -> Result<RawHandle> {
        self.handle
            .as_ref()
            .map(OwnedHandle::raw)
            .ok_or_else(|| OdbcError::ValidationError("Connection is closed".to_string()))
    }

    /// Records a bad-connection error on this connection and passes it on.
    pub(crate) fn track(&self, err: OdbcError) -> OdbcError {
        if err.is_bad_connection() && !self.bad.replace(true) {
            log::warn!("Connection marked bad: {}", err);
        }
        err
    }

    fn mark_bad(&self, err: OdbcError) -> OdbcError {
        if !self.bad.replace(true) {
            log::warn!("Connection marked bad: {}", err);
        }
        err
    }

    fn classify_connection(&self, operation: &'static str, ret: SqlReturn) -> OdbcError {
        let raw = self.handle.as_ref().map_or(RawHandle::NULL, OwnedHandle::raw);
        classify(self.api().as_ref(), operation, ret, HandleKind::Connection, raw)
    }

    pub fn is_bad(&self) -> bool {
        self.bad.get()
    }

    /// True when the connection string named the Microsoft Access driver.
    pub fn is_access_driver(&self) -> bool {
        self.access_driver
    }

    pub fn state(&self) -> ConnectionState {
        if self.handle.is_none() {
            ConnectionState::Closed
        } else if self.bad.get() {
            ConnectionState::Bad
        } else {
            ConnectionState::Open
        }
    }

    pub fn in_transaction(&self) -> bool {
        self.tx.is_some()
    }

    pub fn transaction_state(&self) -> TransactionState {
        if self.tx.is_some() {
            TransactionState::Active
        } else {
            self.last_transaction
        }
    }

    pub fn handle_stats(&self) -> HandleStats {
        self.env.registry.snapshot()
    }

    /// Lists tables matching the filters; an empty filter is unrestricted.
    pub fn tables(&self, catalog: &str, schema: &str, table: &str) -> Result<ResultCursor<'_>> {
        catalog::list_tables(self, catalog, schema, table)
    }

    /// Lists columns matching the filters; an empty filter is unrestricted.
    pub fn columns(
        &self,
        catalog: &str,
        schema: &str,
        table: &str,
        column: &str,
    ) -> Result<ResultCursor<'_>> {
        catalog::list_columns(self, catalog, schema, table, column)
    }

    /// Executes `sql` directly, without parameters.
    pub fn execute(&self, sql: &str) -> Result<ResultCursor<'_>> {
        catalog::execute_direct(self, sql)
    }

    pub fn begin_transaction(&mut self, isolation_level: Option<IsolationLevel>) -> Result<()> {
        let raw = self
            .usable_handle("SQLSetConnectAttr")
            .map_err(|e| self.track(e))?;
        if self.tx.is_some() {
            return Err(OdbcError::ValidationError(
                "Transaction already in progress".to_string(),
            ));
        }

        if let Some(level) = isolation_level {
            let ret = self.api().set_connection_attr(
                raw,
                ConnectionAttr::TxnIsolation,
                level.to_odbc_value(),
            );
            if is_error(ret) {
                let err = self.classify_connection("SQLSetConnectAttr", ret);
                return Err(self.track(err));
            }
        }

        let ret = self
            .api()
            .set_connection_attr(raw, ConnectionAttr::AutoCommit, AUTOCOMMIT_OFF);
        if is_error(ret) {
            let err = self.classify_connection("SQLSetConnectAttr", ret);
            return Err(self.mark_bad(err));
        }

        self.tx = Some(Transaction::begin(isolation_level));
        Ok(())
    }

    pub fn commit(&mut self) -> Result<()> {
        self.usable_handle("SQLEndTran")?;
        self.end_transaction(Completion::Commit)
    }

    pub fn rollback(&mut self) -> Result<()> {
        self.usable_handle("SQLEndTran")?;
        self.end_transaction(Completion::Rollback)
    }

    /// Ends the active transaction. A failure leaves the connection in an
    /// unknown transaction state, so it is marked bad.
    fn end_transaction(&mut self, completion: Completion) -> Result<()> {
        let tx = self
            .tx
            .take()
            .ok_or_else(|| OdbcError::ValidationError("Not in a transaction".to_string()))?;
        let raw = self.raw_handle()?;

        let ret = self.api().end_transaction(raw, completion);
        if is_error(ret) {
            let err = self.classify_connection("SQLEndTran", ret);
            return Err(self.mark_bad(err));
        }
        let ret = self
            .api()
            .set_connection_attr(raw, ConnectionAttr::AutoCommit, AUTOCOMMIT_ON);
        if is_error(ret) {
            let err = self.classify_connection("SQLSetConnectAttr", ret);
            return Err(self.mark_bad(err));
        }

        self.last_transaction = TransactionState::from(completion);
        log::debug!(
            "Transaction {:?} after {:?} (isolation {:?})",
            self.last_transaction,
            tx.elapsed(),
            tx.isolation_level()
        );
        Ok(())
    }

    /// Rolls back an active transaction, disconnects and releases the handle.
    ///
    /// The handle is released whether or not disconnect succeeds. When both
    /// disconnect and release fail the disconnect error is returned and the
    /// release error is logged.
    pub fn close(mut self) -> Result<()> {
        self.shutdown()
    }

    fn shutdown(&mut self) -> Result<()> {
        if self.tx.is_some() {
            // Best effort even on a bad connection.
            if let Err(e) = self.end_transaction(Completion::Rollback) {
                log::warn!("Rollback on close failed: {}", e);
            }
        }

        let Some(handle) = self.handle.take() else {
            return Ok(());
        };

        let ret = self.env.api.disconnect(handle.raw());
        let disconnect_err = if is_error(ret) {
            let err = classify(
                self.env.api.as_ref(),
                "SQLDisconnect",
                ret,
                HandleKind::Connection,
                handle.raw(),
            );
            Some(self.track(err))
        } else {
            None
        };

        match (disconnect_err, handle.release()) {
            (Some(err), Err(dropped)) => {
                log::warn!("Dropped release failure after disconnect failure: {}", dropped);
                Err(err)
            }
            (Some(err), Ok(())) => Err(err),
            (None, released) => released,
        }
    }
}

impl Drop for OdbcConnection {
    fn drop(&mut self) {
        if self.handle.is_none() {
            return;
        }
        if let Err(e) = self.shutdown() {
            log::warn!("Failed to close connection on drop: {}", e);
        }
    }
}
