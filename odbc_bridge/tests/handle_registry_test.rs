mod helpers;
use helpers::{init_logging, TEST_DSN};
use odbc_bridge::native::ScriptedApi;
use odbc_bridge::{DriverConfig, HandleKind, HandleRegistry, OdbcEnvironment};
use serial_test::serial;
use std::sync::Arc;
use std::thread;

#[test]
#[serial]
fn test_global_registry_returns_to_baseline() {
    init_logging();
    let registry = HandleRegistry::global();
    let baseline = registry.snapshot();

    let api = Arc::new(ScriptedApi::new());
    let env = OdbcEnvironment::new(api.clone(), registry.clone(), DriverConfig::default())
        .expect("environment");

    let connections: Vec<_> = (0..8)
        .map(|_| env.open(TEST_DSN).expect("connect"))
        .collect();
    assert_eq!(
        registry.count(HandleKind::Connection),
        baseline.connection + 8
    );

    for conn in &connections {
        let first = conn.tables("", "", "").expect("tables");
        let second = conn.columns("", "", "orders", "").expect("columns");
        assert_eq!(
            registry.count(HandleKind::Statement),
            baseline.statement + 2
        );
        drop(first);
        second.close().expect("close cursor");
    }

    for conn in connections {
        conn.close().expect("close");
    }
    drop(env);

    assert_eq!(registry.snapshot(), baseline);
    assert_eq!(api.live_handles(HandleKind::Environment), 0);
}

#[test]
#[serial]
fn test_failed_opens_leave_global_registry_untouched() {
    init_logging();
    let registry = HandleRegistry::global();
    let baseline = registry.snapshot();

    let api = Arc::new(ScriptedApi::new());
    let env = OdbcEnvironment::new(api.clone(), registry.clone(), DriverConfig::default())
        .expect("environment");
    for _ in 0..4 {
        api.fail_next(
            odbc_bridge::native::NativeOp::DriverConnect,
            "08001",
            "Client unable to establish connection",
        );
        assert!(env.open(TEST_DSN).is_err());
    }
    assert_eq!(registry.count(HandleKind::Connection), baseline.connection);

    drop(env);
    assert_eq!(registry.snapshot(), baseline);
}

#[test]
fn test_environments_on_separate_threads() {
    init_logging();
    let registry = Arc::new(HandleRegistry::new());
    let workers: Vec<_> = (0..4)
        .map(|_| {
            let registry = Arc::clone(&registry);
            thread::spawn(move || {
                let env = OdbcEnvironment::new(
                    Arc::new(ScriptedApi::new()),
                    registry,
                    DriverConfig::default(),
                )
                .expect("environment");
                for _ in 0..10 {
                    let conn = env.open(TEST_DSN).expect("connect");
                    let rows = conn.tables("", "", "").expect("tables").count();
                    assert_eq!(rows, 0);
                    conn.close().expect("close");
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().expect("worker panicked");
    }
    assert!(registry.is_quiescent());
}
