//! Helper functions for reading environment variables in tests

use odbc_bridge::test_helpers::load_dotenv;

/// Get the ODBC_TEST_DSN connection string from the environment (or `.env`).
/// Returns None if not set (tests should be skipped in this case)
#[allow(dead_code)]
pub fn get_test_dsn() -> Option<String> {
    load_dotenv();
    std::env::var("ODBC_TEST_DSN")
        .ok()
        .filter(|s| !s.is_empty())
}
