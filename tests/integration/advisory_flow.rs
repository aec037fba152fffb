//! Advisory consultation wired into a full degraded cycle

use custodian::HealthStatus;
use custodian::advisory::{AdvisoryService, HttpAdvisoryClient};
use custodian::config::AdvisoryConfig;
use custodian::healing::{ActionStatus, Collaborators, RemediationAction};
use custodian::issues::IssueType;
use custodian::orchestrator::OrchestratorHandle;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::helpers::*;

fn advisory_report() -> serde_json::Value {
    serde_json::json!({
        "analysis": "multiple degraded signals, likely resource exhaustion",
        "recommendations": [
            {
                "title": "Apply mitigation policy",
                "description": "suspicious request pattern detected",
                "priority": "high",
                "category": "security",
                "auto_applicable": true,
                "action": "apply-policy",
                "confidence": 0.95
            },
            {
                "title": "Manual capacity review",
                "description": "consider scaling up",
                "priority": "medium",
                "category": "performance",
                "auto_applicable": false,
                "action": "scale-up",
                "confidence": 0.9
            },
            {
                "title": "Low-confidence guess",
                "description": "maybe the network",
                "priority": "low",
                "category": "network",
                "auto_applicable": true,
                "action": "reprobe",
                "confidence": 0.3
            }
        ]
    })
}

#[tokio::test]
async fn test_degraded_cycle_consults_advisory_and_applies_confident_recommendations() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/analyze"))
        .respond_with(ResponseTemplate::new(200).set_body_json(advisory_report()))
        .expect(1)
        .mount(&server)
        .await;

    let mut config = quiet_config();
    let advisory_config = AdvisoryConfig {
        url: format!("{}/analyze", server.uri()),
        confidence_threshold: 0.8,
    };
    config.advisory = Some(advisory_config.clone());
    let advisory: Box<dyn AdvisoryService> = Box::new(HttpAdvisoryClient::new(&advisory_config));

    // One catastrophic sample, then recovery for the healing resamples.
    let source = ScriptedSource::new(vec![failing_metrics(), healthy_metrics()]);
    let (handle, _events) =
        OrchestratorHandle::spawn(config, source, None, Some(advisory), Collaborators::default());

    let health = handle.check_now().await.unwrap();
    assert_eq!(health, HealthStatus::Critical);

    // Memory and performance heal via resample; the external API issue has
    // no collaborator and stays open. The accepted security recommendation
    // became an issue and was remediated on the spot.
    let issues = handle.active_issues().await.unwrap();
    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].kind, IssueType::ExternalApiError);

    let history = handle.healing_history().await.unwrap();
    assert_eq!(history.len(), 4);
    let security = history
        .iter()
        .find(|a| a.action == RemediationAction::ApplySecurityPolicy)
        .expect("security recommendation should have been applied");
    assert_eq!(security.status, ActionStatus::Completed);

    // The rejected recommendations left no trace in the history.
    assert!(
        !history
            .iter()
            .any(|a| a.action == RemediationAction::ReprobeNetwork)
    );

    let logs = handle.tail_logs(50).await.unwrap();
    assert!(
        logs.iter()
            .any(|entry| entry.component == "advisory"
                && entry.message.contains("resource exhaustion"))
    );

    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_advisory_failure_never_degrades_health_further() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/analyze"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let mut config = quiet_config();
    let advisory_config = AdvisoryConfig {
        url: format!("{}/analyze", server.uri()),
        confidence_threshold: 0.8,
    };
    config.advisory = Some(advisory_config.clone());
    let advisory: Box<dyn AdvisoryService> = Box::new(HttpAdvisoryClient::new(&advisory_config));

    let source = ScriptedSource::new(vec![failing_metrics(), healthy_metrics()]);
    let (handle, _events) =
        OrchestratorHandle::spawn(config, source, None, Some(advisory), Collaborators::default());

    let health = handle.check_now().await.unwrap();
    assert_eq!(health, HealthStatus::Critical);

    // The failure is audited but produces no issue and no panic.
    let logs = handle.tail_logs(50).await.unwrap();
    assert!(
        logs.iter()
            .any(|entry| entry.component == "advisory" && entry.message.contains("failed"))
    );
    assert!(
        handle
            .active_issues()
            .await
            .unwrap()
            .iter()
            .all(|i| i.component != "advisory")
    );

    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_healthy_cycle_skips_advisory() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/analyze"))
        .respond_with(ResponseTemplate::new(200).set_body_json(advisory_report()))
        .expect(0)
        .mount(&server)
        .await;

    let mut config = quiet_config();
    let advisory_config = AdvisoryConfig {
        url: format!("{}/analyze", server.uri()),
        confidence_threshold: 0.8,
    };
    config.advisory = Some(advisory_config.clone());
    let advisory: Box<dyn AdvisoryService> = Box::new(HttpAdvisoryClient::new(&advisory_config));

    let source = ScriptedSource::new(vec![healthy_metrics()]);
    let (handle, _events) =
        OrchestratorHandle::spawn(config, source, None, Some(advisory), Collaborators::default());

    let health = handle.check_now().await.unwrap();
    assert_eq!(health, HealthStatus::Optimal);

    handle.shutdown().await.unwrap();
}
