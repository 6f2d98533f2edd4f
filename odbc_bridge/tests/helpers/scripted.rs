//! Environment fixture backed by the in-memory scripted native API.
#![allow(dead_code)]

use odbc_bridge::native::{NativeCall, ScriptedApi};
use odbc_bridge::{
    DriverConfig, HandleKind, HandleRegistry, OdbcConnection, OdbcEnvironment, RawHandle,
};
use std::sync::Arc;

pub const TEST_DSN: &str = "DRIVER={PostgreSQL};SERVER=localhost;DATABASE=shop;UID=app;PWD=secret";

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// A scripted API, a private registry and an environment wired to both.
pub struct Fixture {
    pub api: Arc<ScriptedApi>,
    pub registry: Arc<HandleRegistry>,
    pub env: OdbcEnvironment,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_config(DriverConfig::default())
    }

    pub fn with_config(config: DriverConfig) -> Self {
        init_logging();
        let api = Arc::new(ScriptedApi::new());
        let registry = Arc::new(HandleRegistry::new());
        let env = OdbcEnvironment::new(api.clone(), registry.clone(), config)
            .expect("environment");
        Self { api, registry, env }
    }

    pub fn connect(&self) -> OdbcConnection {
        self.env.open(TEST_DSN).expect("connect")
    }

    pub fn count(&self, kind: HandleKind) -> u64 {
        self.registry.count(kind)
    }
}

/// Handle returned by the most recent successful connection allocation.
pub fn connection_handle(api: &ScriptedApi) -> RawHandle {
    api.calls()
        .iter()
        .rev()
        .find_map(|call| match call {
            NativeCall::AllocHandle {
                kind: HandleKind::Connection,
                handle,
                ..
            } if !handle.is_null() => Some(*handle),
            _ => None,
        })
        .expect("no connection handle allocated")
}

/// Index of the first recorded call matching `pred`.
pub fn position_of(calls: &[NativeCall], pred: impl Fn(&NativeCall) -> bool) -> usize {
    calls
        .iter()
        .position(pred)
        .expect("expected native call was not made")
}
