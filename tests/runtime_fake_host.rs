// tests/runtime_fake_host.rs

use std::collections::HashMap;
use std::error::Error;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tokio::time::{timeout, Duration};

use devcoord::coordinator::{Coordinator, CoordinatorEvent, CoordinatorOptions, Runtime};
use devcoord::device::{DeviceId, DeviceTree};
use devcoord::types::SuspendFlags;
use devcoord_test_utils::builders::DeviceTreeBuilder;
use devcoord_test_utils::fake_host::FakeHostBackend;
use devcoord_test_utils::init_tracing;

type TestResult = Result<(), Box<dyn Error>>;

/// grandparent -> parent -> child, all active, all hosted, no proxies.
fn three_level_chain() -> (DeviceTree, HashMap<String, DeviceId>) {
    DeviceTreeBuilder::new()
        .device("gp", "root", Some(1))
        .device("parent", "gp", Some(1))
        .device("child", "parent", Some(1))
        .build()
}

async fn run_to_exit<B: devcoord::host::DriverHostBackend>(runtime: Runtime<B>) -> TestResult {
    // Enforce an upper bound on how long the runtime may run.
    match timeout(Duration::from_secs(3), runtime.run()).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(e.into()),
        Err(_) => panic!("runtime did not finish within 3 seconds"),
    }
}

#[tokio::test]
async fn runtime_suspends_chain_leaf_first() -> TestResult {
    init_tracing();

    let (tree, ids) = three_level_chain();
    let (rt_tx, rt_rx) = mpsc::channel::<CoordinatorEvent>(16);

    let delivered = Arc::new(Mutex::new(Vec::new()));
    let backend = FakeHostBackend::new(rt_tx.clone(), delivered.clone());

    rt_tx
        .send(CoordinatorEvent::SuspendRequested {
            device: ids["gp"],
            flags: SuspendFlags::Poweroff,
        })
        .await?;

    let core = Coordinator::new(tree, CoordinatorOptions { exit_when_idle: true });
    run_to_exit(Runtime::new(core, rt_rx, backend)).await?;

    let order = delivered.lock().unwrap().clone();
    assert_eq!(
        order,
        vec!["child".to_string(), "parent".to_string(), "gp".to_string()]
    );
    Ok(())
}

#[tokio::test]
async fn runtime_feeds_dispatch_failure_back_and_exits() -> TestResult {
    init_tracing();

    let (tree, ids) = three_level_chain();
    let (rt_tx, rt_rx) = mpsc::channel::<CoordinatorEvent>(16);

    let delivered = Arc::new(Mutex::new(Vec::new()));
    let backend = FakeHostBackend::new(rt_tx.clone(), delivered.clone()).reject_device("child");

    rt_tx
        .send(CoordinatorEvent::SuspendRequested {
            device: ids["gp"],
            flags: SuspendFlags::SuspendToRam,
        })
        .await?;

    let core = Coordinator::new(tree, CoordinatorOptions { exit_when_idle: true });
    run_to_exit(Runtime::new(core, rt_rx, backend)).await?;

    // The rejected dispatch fails the whole chain; nothing was delivered and
    // the runtime still winds down instead of waiting for a completion that
    // will never come.
    assert!(delivered.lock().unwrap().is_empty());
    Ok(())
}

#[tokio::test]
async fn runtime_stops_ancestors_after_driver_failure() -> TestResult {
    init_tracing();

    let (tree, ids) = three_level_chain();
    let (rt_tx, rt_rx) = mpsc::channel::<CoordinatorEvent>(16);

    let delivered = Arc::new(Mutex::new(Vec::new()));
    let backend = FakeHostBackend::new(rt_tx.clone(), delivered.clone()).fail_device("parent", 3);

    rt_tx
        .send(CoordinatorEvent::SuspendRequested {
            device: ids["gp"],
            flags: SuspendFlags::Reboot,
        })
        .await?;

    let core = Coordinator::new(tree, CoordinatorOptions { exit_when_idle: true });
    run_to_exit(Runtime::new(core, rt_rx, backend)).await?;

    // The child suspends, the parent's host reports failure, and the
    // grandparent is never suspended.
    let order = delivered.lock().unwrap().clone();
    assert_eq!(order, vec!["child".to_string(), "parent".to_string()]);
    Ok(())
}

#[tokio::test]
async fn runtime_exits_on_shutdown_request() -> TestResult {
    init_tracing();

    let (tree, _ids) = three_level_chain();
    let (rt_tx, rt_rx) = mpsc::channel::<CoordinatorEvent>(16);

    let delivered = Arc::new(Mutex::new(Vec::new()));
    let backend = FakeHostBackend::new(rt_tx.clone(), delivered.clone());

    rt_tx.send(CoordinatorEvent::ShutdownRequested).await?;

    let core = Coordinator::new(
        tree,
        CoordinatorOptions {
            exit_when_idle: false,
        },
    );
    run_to_exit(Runtime::new(core, rt_rx, backend)).await?;

    assert!(delivered.lock().unwrap().is_empty());
    Ok(())
}
