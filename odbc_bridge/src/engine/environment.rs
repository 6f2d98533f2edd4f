use super::connection::OdbcConnection;
use crate::config::DriverConfig;
use crate::error::{classify, Result};
use crate::handles::{HandleKind, HandleRegistry, HandleStats, OwnedHandle, RawHandle};
use crate::native::{is_error, NativeApi, OdbcApi};
use std::sync::Arc;

/// State shared by an environment and every connection opened from it. The
/// environment handle is released when the last of them goes away.
pub(crate) struct EnvironmentShared {
    pub(crate) api: Arc<dyn NativeApi>,
    pub(crate) registry: Arc<HandleRegistry>,
    pub(crate) config: DriverConfig,
    handle: OwnedHandle,
}

impl EnvironmentShared {
    pub(crate) fn raw(&self) -> RawHandle {
        self.handle.raw()
    }
}

/// Owner of the environment handle and entry point for opening connections.
#[derive(Clone)]
pub struct OdbcEnvironment {
    shared: Arc<EnvironmentShared>,
}

impl OdbcEnvironment {
    /// Allocates the environment handle and selects ODBC 3 behaviour.
    pub fn new(
        api: Arc<dyn NativeApi>,
        registry: Arc<HandleRegistry>,
        config: DriverConfig,
    ) -> Result<Self> {
        let handle = OwnedHandle::allocate(&api, &registry, HandleKind::Environment, None)?;

        let ret = api.set_odbc_version(handle.raw());
        if is_error(ret) {
            let err = classify(
                api.as_ref(),
                "SQLSetEnvAttr",
                ret,
                HandleKind::Environment,
                handle.raw(),
            );
            handle.discard();
            return Err(err);
        }

        Ok(Self {
            shared: Arc::new(EnvironmentShared {
                api,
                registry,
                config,
                handle,
            }),
        })
    }

    /// Environment on the system driver manager, counted in the global
    /// registry and configured from the process environment.
    pub fn odbc() -> Result<Self> {
        Self::new(
            Arc::new(OdbcApi),
            HandleRegistry::global(),
            DriverConfig::from_env(),
        )
    }

    pub fn open(&self, connection_string: &str) -> Result<OdbcConnection> {
        OdbcConnection::open(Arc::clone(&self.shared), connection_string)
    }

    pub fn registry(&self) -> Arc<HandleRegistry> {
        Arc::clone(&self.shared.registry)
    }

    pub fn stats(&self) -> HandleStats {
        self.shared.registry.snapshot()
    }

    pub fn config(&self) -> &DriverConfig {
        &self.shared.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::native::{NativeOp, ScriptedApi};

    #[test]
    fn test_environment_allocates_one_handle() {
        let api = Arc::new(ScriptedApi::new());
        let registry = Arc::new(HandleRegistry::new());
        let env = OdbcEnvironment::new(api.clone(), registry.clone(), DriverConfig::default())
            .expect("environment");
        assert_eq!(env.stats().environment, 1);
        assert_eq!(api.live_handles(HandleKind::Environment), 1);

        drop(env);
        assert!(registry.is_quiescent());
        assert_eq!(api.live_handles(HandleKind::Environment), 0);
    }

    #[test]
    fn test_environment_clones_share_the_handle() {
        let api = Arc::new(ScriptedApi::new());
        let registry = Arc::new(HandleRegistry::new());
        let env = OdbcEnvironment::new(api.clone(), registry.clone(), DriverConfig::default())
            .unwrap();
        let copy = env.clone();
        drop(env);
        assert_eq!(registry.count(HandleKind::Environment), 1);
        drop(copy);
        assert_eq!(registry.count(HandleKind::Environment), 0);
    }

    #[test]
    fn test_version_failure_releases_environment() {
        let api = Arc::new(ScriptedApi::new());
        let registry = Arc::new(HandleRegistry::new());
        api.fail_next(NativeOp::SetOdbcVersion, "HY024", "Invalid attribute value");

        let err = OdbcEnvironment::new(api.clone(), registry.clone(), DriverConfig::default())
            .err()
            .expect("version failure");
        assert_eq!(err.operation(), Some("SQLSetEnvAttr"));
        assert!(registry.is_quiescent());
        assert_eq!(api.live_handles(HandleKind::Environment), 0);
    }

    #[test]
    fn test_environment_allocation_failure() {
        let api = Arc::new(ScriptedApi::new());
        let registry = Arc::new(HandleRegistry::new());
        api.fail_next_with_status(
            NativeOp::AllocHandle(HandleKind::Environment),
            crate::native::SqlReturn::ERROR,
        );

        let err = OdbcEnvironment::new(api, registry.clone(), DriverConfig::default())
            .err()
            .expect("allocation failure");
        assert_eq!(err.to_string(), "SQLAllocHandle failed with status -1");
        assert!(registry.is_quiescent());
    }
}
