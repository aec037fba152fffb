//! End-to-end remediation scenarios driven through the orchestrator

use custodian::healing::{ActionStatus, Collaborators, RemediationAction};
use custodian::issues::IssueType;
use custodian::orchestrator::OrchestratorHandle;
use custodian::remote::RemoteExecutor;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::helpers::*;

fn pressured_metrics() -> custodian::PerformanceMetrics {
    custodian::PerformanceMetrics {
        mem_pct: 95.0,
        ..healthy_metrics()
    }
}

#[tokio::test]
async fn test_memory_pressure_healed_with_remote_assist() {
    let server = MockServer::start().await;
    mount_healthy_remote(&server).await;

    Mock::given(method("POST"))
        .and(path("/optimize-memory"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({"success": true, "message": "optimized"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let remote = RemoteExecutor::with_base(server.uri(), "mock".to_string(), None);
    // Cycle sample shows pressure, post-reclaim resample shows recovery.
    let source = ScriptedSource::new(vec![pressured_metrics(), healthy_metrics()]);

    let (handle, _events) = OrchestratorHandle::spawn(
        quiet_config(),
        source,
        Some(remote),
        None,
        Collaborators::default(),
    );

    handle.check_now().await.unwrap();

    assert!(handle.active_issues().await.unwrap().is_empty());

    let history = handle.healing_history().await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].action, RemediationAction::ReclaimMemory);
    assert_eq!(history[0].status, ActionStatus::Completed);

    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_failed_remediation_keeps_issue_open_and_retries_next_cycle() {
    // Memory never recovers: detection and every resample stay at 95%.
    let source = ScriptedSource::new(vec![pressured_metrics()]);
    let (handle, _events) =
        OrchestratorHandle::spawn(quiet_config(), source, None, None, Collaborators::default());

    handle.check_now().await.unwrap();

    let issues = handle.active_issues().await.unwrap();
    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].kind, IssueType::MemoryPressure);
    let first_id = issues[0].id;

    let history = handle.healing_history().await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].status, ActionStatus::Failed);

    // A single failure never delays the next attempt.
    handle.check_now().await.unwrap();
    let history = handle.healing_history().await.unwrap();
    assert_eq!(history.len(), 2);
    assert!(history.iter().all(|a| a.issue_id == first_id));

    // The same issue persisted across cycles instead of piling up clones.
    let issues = handle.active_issues().await.unwrap();
    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].id, first_id);
    assert_eq!(issues[0].actions.len(), 2);

    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_repeated_failures_back_off_before_retrying() {
    let source = ScriptedSource::new(vec![pressured_metrics()]);
    let (handle, _events) =
        OrchestratorHandle::spawn(quiet_config(), source, None, None, Collaborators::default());

    // Two consecutive failures...
    handle.check_now().await.unwrap();
    handle.check_now().await.unwrap();
    assert_eq!(handle.healing_history().await.unwrap().len(), 2);

    // ...make the third cycle sit the issue out...
    handle.check_now().await.unwrap();
    assert_eq!(handle.healing_history().await.unwrap().len(), 2);

    // ...and the fourth cycle tries again.
    handle.check_now().await.unwrap();
    assert_eq!(handle.healing_history().await.unwrap().len(), 3);

    handle.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_slow_cycles_skip_ticks_instead_of_bursting() {
    let mut config = quiet_config();
    config.intervals.health_check_secs = 1;

    // Each cycle takes 1.5 periods; catch-up ticks must be skipped.
    let source = SlowSource {
        delay: std::time::Duration::from_millis(1500),
    };
    let (handle, _events) =
        OrchestratorHandle::spawn(config, source, None, None, Collaborators::default());

    tokio::time::sleep(std::time::Duration::from_secs(10)).await;

    let logs = handle.tail_logs(100).await.unwrap();
    let completed = logs
        .iter()
        .filter(|entry| entry.message.contains("health cycle complete"))
        .count();

    // Roughly one cycle per 2s of virtual time; a bursting loop that queued
    // catch-up ticks would reach one per second (10 or more).
    assert!(
        (3..9).contains(&completed),
        "expected skipped ticks, got {completed} cycles"
    );

    handle.shutdown().await.unwrap();
}
