pub mod env;
pub mod scripted;

#[allow(unused_imports)]
pub use env::get_test_dsn;
#[allow(unused_imports)]
pub use scripted::{connection_handle, init_logging, position_of, Fixture, TEST_DSN};
