mod catalog;
pub mod connection;
pub mod cursor;
pub mod environment;
mod statement;
pub mod transaction;

pub use connection::{ConnectionState, OdbcConnection};
pub use cursor::{ResultCursor, Row};
pub use environment::OdbcEnvironment;
pub use transaction::{IsolationLevel, TransactionState};
