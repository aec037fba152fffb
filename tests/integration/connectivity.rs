//! Network probe and remote-host evaluation scenarios

use custodian::HealthStatus;
use custodian::healing::Collaborators;
use custodian::issues::{IssueType, Severity};
use custodian::orchestrator::OrchestratorHandle;
use custodian::remote::RemoteExecutor;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::helpers::*;

#[tokio::test]
async fn test_unreachable_host_yields_disconnected_with_critical_issue() {
    // Nothing listens on this port - every probe fails fast.
    let remote = RemoteExecutor::with_base(
        "http://127.0.0.1:9".to_string(),
        "127.0.0.1".to_string(),
        None,
    );

    let (handle, _events) = OrchestratorHandle::spawn(
        quiet_config(),
        ScriptedSource::new(vec![healthy_metrics()]),
        Some(remote),
        None,
        Collaborators::default(),
    );

    let health = handle.check_now().await.unwrap();
    assert_eq!(health, HealthStatus::Disconnected);

    let issues = handle.active_issues().await.unwrap();
    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].kind, IssueType::NetworkConnectivity);
    assert_eq!(issues[0].severity, Severity::Critical);

    // The re-probe remediation ran and failed - host is still down.
    let history = handle.healing_history().await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(
        history[0].status,
        custodian::healing::ActionStatus::Failed
    );

    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_probe_falls_back_when_primary_endpoint_is_broken() {
    let server = MockServer::start().await;

    // /health is broken but /api/status answers - host counts as reachable.
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/status"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/account/info"))
        .respond_with(ResponseTemplate::new(200).set_body_json(remote_metrics_json(10.0, 20.0)))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/services"))
        .respond_with(ResponseTemplate::new(200).set_body_json(services_json(&[
            ("gateway", true),
            ("worker", true),
            ("proxy", true),
        ])))
        .mount(&server)
        .await;

    let remote = RemoteExecutor::with_base(server.uri(), "mock".to_string(), None);
    let (handle, _events) = OrchestratorHandle::spawn(
        quiet_config(),
        ScriptedSource::new(vec![healthy_metrics()]),
        Some(remote),
        None,
        Collaborators::default(),
    );

    let health = handle.check_now().await.unwrap();
    assert_eq!(health, HealthStatus::Optimal);
    assert!(handle.active_issues().await.unwrap().is_empty());

    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_reachable_but_unhealthy_remote_is_critical() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    // Remote telemetry is catastrophic and no critical service runs.
    Mock::given(method("GET"))
        .and(path("/account/info"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "cpu_pct": 100.0,
            "mem_pct": 100.0,
            "disk_pct": 100.0,
            "network_latency_ms": 500.0,
            "response_time_secs": 30.0,
            "error_rate": 1.0,
            "uptime_secs": 60
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/services"))
        .respond_with(ResponseTemplate::new(200).set_body_json(services_json(&[
            ("gateway", false),
            ("worker", false),
            ("proxy", false),
        ])))
        .mount(&server)
        .await;
    // Remediation endpoint accepts the restart but nothing improves.
    Mock::given(method("POST"))
        .and(path("/restart-critical-services"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({"success": true, "message": "restarting"})),
        )
        .mount(&server)
        .await;

    let remote = RemoteExecutor::with_base(server.uri(), "mock".to_string(), None);
    let (handle, _events) = OrchestratorHandle::spawn(
        quiet_config(),
        ScriptedSource::new(vec![healthy_metrics()]),
        Some(remote),
        None,
        Collaborators::default(),
    );

    let health = handle.check_now().await.unwrap();
    assert_eq!(health, HealthStatus::Critical);

    let issues = handle.active_issues().await.unwrap();
    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].kind, IssueType::RemoteHostIssue);
    assert_eq!(issues[0].severity, Severity::Critical);

    // Restart ran, re-evaluation still critical, so the attempt failed.
    let history = handle.healing_history().await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(
        history[0].action,
        custodian::healing::RemediationAction::RestartRemoteServices
    );
    assert_eq!(
        history[0].status,
        custodian::healing::ActionStatus::Failed
    );

    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_no_remote_configured_skips_network_and_remote_checks() {
    let (handle, _events) = OrchestratorHandle::spawn(
        quiet_config(),
        ScriptedSource::new(vec![healthy_metrics()]),
        None,
        None,
        Collaborators::default(),
    );

    let health = handle.check_now().await.unwrap();
    assert_eq!(health, HealthStatus::Optimal);
    assert!(handle.active_issues().await.unwrap().is_empty());
    assert!(handle.healing_history().await.unwrap().is_empty());

    handle.shutdown().await.unwrap();
}
