use serde::{Deserialize, Serialize};

const LOGIN_TIMEOUT_ENV: &str = "ODBC_BRIDGE_LOGIN_TIMEOUT_SECS";
const LOG_CONNECTIONS_ENV: &str = "ODBC_BRIDGE_LOG_CONNECTIONS";
const MASK: &str = "***";

/// Driver-wide settings applied to every connection opened from an
/// environment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriverConfig {
    /// Login timeout set on each connection handle before the handshake.
    pub login_timeout_secs: Option<u32>,
    /// Log opened connections (credentials masked) at info level.
    pub log_connections: bool,
}

impl DriverConfig {
    /// Reads `ODBC_BRIDGE_LOGIN_TIMEOUT_SECS` and `ODBC_BRIDGE_LOG_CONNECTIONS`.
    /// Unparseable values fall back to the defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let login_timeout_secs = lookup(LOGIN_TIMEOUT_ENV).and_then(|v| v.trim().parse::<u32>().ok());
        let log_connections = lookup(LOG_CONNECTIONS_ENV)
            .and_then(|v| parse_bool_flag(&v))
            .unwrap_or(false);
        Self {
            login_timeout_secs,
            log_connections,
        }
    }

    pub fn with_login_timeout(mut self, secs: u32) -> Self {
        self.login_timeout_secs = Some(secs);
        self
    }

    pub fn with_connection_logging(mut self, enabled: bool) -> Self {
        self.log_connections = enabled;
        self
    }
}

pub(crate) fn parse_bool_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn split_connection_string_parts(connection_string: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0usize;
    let mut brace_depth = 0u32;

    for (idx, ch) in connection_string.char_indices() {
        match ch {
            '{' => brace_depth = brace_depth.saturating_add(1),
            '}' => brace_depth = brace_depth.saturating_sub(1),
            ';' if brace_depth == 0 => {
                parts.push(&connection_string[start..idx]);
                start = idx + ch.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(&connection_string[start..]);
    parts
}

fn is_secret_key(key: &str) -> bool {
    matches!(key, "pwd" | "password")
}

/// Connection string with password values replaced, safe for logs.
pub fn sanitize_connection_string(connection_string: &str) -> String {
    split_connection_string_parts(connection_string)
        .into_iter()
        .map(|part| match part.split_once('=') {
            Some((key, _)) if is_secret_key(&key.trim().to_ascii_lowercase()) => {
                format!("{}={}", key, MASK)
            }
            _ => part.to_string(),
        })
        .collect::<Vec<_>>()
        .join(";")
}
