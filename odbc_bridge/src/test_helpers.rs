//! Support for tests and benches that run against a real driver.

use std::sync::Once;

static LOAD_DOTENV: Once = Once::new();

/// Loads `.env` from the working directory (or a parent) once per process.
/// A missing file is not an error; the variables may come from the shell.
pub fn load_dotenv() {
    LOAD_DOTENV.call_once(|| {
        if let Err(e) = dotenvy::dotenv() {
            log::debug!("No .env loaded: {}", e);
        }
    });
}
