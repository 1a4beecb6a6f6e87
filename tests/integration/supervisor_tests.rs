//! Integration tests for the process supervisor
//!
//! These tests launch real short-lived shell processes.

#![cfg(unix)]

use newsline::config::PolicyKind;
use newsline::supervisor::{Policy, ProcessSpec, Supervisor, INTERRUPTED_EXIT_CODE};
use std::time::Duration;
use tokio::sync::watch;

fn sh(name: &str, script: &str) -> ProcessSpec {
    ProcessSpec::new(name, vec!["sh".into(), "-c".into(), script.into()])
}

#[tokio::test]
async fn test_restart_relaunches_only_the_exited_child() {
    let specs = vec![sh("flaky", "sleep 0.1; exit 3"), sh("steady", "sleep 30")];
    let policy = Policy::new(PolicyKind::Restart, Duration::from_millis(50));
    let mut supervisor =
        Supervisor::start_with(specs, policy, Duration::from_millis(20)).expect("start");

    let steady_pid = supervisor.pids()[1].expect("steady running");

    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    while supervisor.restarts()[0] < 2 {
        assert!(tokio::time::Instant::now() < deadline, "flaky child was not restarted");
        assert_eq!(supervisor.step().await, None);
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    assert_eq!(supervisor.restarts()[1], 0);
    assert_eq!(supervisor.pids()[1], Some(steady_pid));

    supervisor.stop().await;
    assert_eq!(supervisor.pids(), vec![None, None]);
}

#[tokio::test]
async fn test_fail_fast_exits_with_child_code() {
    let specs = vec![sh("steady", "sleep 30"), sh("crashing", "sleep 0.2; exit 7")];
    let policy = Policy::new(PolicyKind::FailFast, Duration::from_millis(50));
    let mut supervisor =
        Supervisor::start_with(specs, policy, Duration::from_millis(20)).expect("start");

    let (_tx, rx) = watch::channel(false);
    let code = tokio::time::timeout(Duration::from_secs(10), supervisor.run(rx))
        .await
        .expect("supervisor exits");

    assert_eq!(code, 7);
    assert_eq!(supervisor.pids(), vec![None, None]);
    assert_eq!(supervisor.restarts(), vec![0, 0]);
}

#[tokio::test]
async fn test_signal_killed_child_maps_to_one() {
    let specs = vec![sh("suicidal", "sleep 0.1; kill -9 $$")];
    let policy = Policy::new(PolicyKind::FailFast, Duration::from_millis(50));
    let mut supervisor =
        Supervisor::start_with(specs, policy, Duration::from_millis(20)).expect("start");

    let (_tx, rx) = watch::channel(false);
    let code = tokio::time::timeout(Duration::from_secs(10), supervisor.run(rx))
        .await
        .expect("supervisor exits");
    assert_eq!(code, 1);
}

#[tokio::test]
async fn test_interrupt_stops_everything_with_130() {
    let specs = vec![sh("a", "sleep 30"), sh("b", "sleep 30")];
    let policy = Policy::new(PolicyKind::Restart, Duration::from_millis(50));
    let mut supervisor =
        Supervisor::start_with(specs, policy, Duration::from_millis(20)).expect("start");

    let (tx, rx) = watch::channel(false);
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        let _ = tx.send(true);
    });

    let code = tokio::time::timeout(Duration::from_secs(10), supervisor.run(rx))
        .await
        .expect("supervisor exits");

    assert_eq!(code, INTERRUPTED_EXIT_CODE);
    assert_eq!(supervisor.pids(), vec![None, None]);
}
