//! Command and event types exchanged with the orchestrator actor.

use chrono::{DateTime, Utc};
use tokio::sync::oneshot;

use crate::event_log::LogEntry;
use crate::healing::HealingAction;
use crate::issues::Issue;
use crate::{HealthStatus, PerformanceMetrics};

/// Requests the handle can send into the orchestrator loop.
#[derive(Debug)]
pub enum OrchestratorCommand {
    /// Run a full health cycle immediately, outside the normal cadence.
    CheckNow {
        respond_to: oneshot::Sender<HealthStatus>,
    },
    /// Take a metrics sample immediately.
    SampleNow {
        respond_to: oneshot::Sender<Option<PerformanceMetrics>>,
    },
    GetHealth {
        respond_to: oneshot::Sender<HealthStatus>,
    },
    GetIssues {
        respond_to: oneshot::Sender<Vec<Issue>>,
    },
    GetHistory {
        respond_to: oneshot::Sender<Vec<HealingAction>>,
    },
    GetMetrics {
        respond_to: oneshot::Sender<Option<PerformanceMetrics>>,
    },
    GetLastCheck {
        respond_to: oneshot::Sender<Option<DateTime<Utc>>>,
    },
    TailLogs {
        n: usize,
        respond_to: oneshot::Sender<Vec<LogEntry>>,
    },
    Shutdown,
}

/// Broadcast notifications emitted as the orchestrator works.
#[derive(Debug, Clone)]
pub enum HealthEvent {
    CycleCompleted {
        health: HealthStatus,
        open_issues: usize,
        timestamp: DateTime<Utc>,
    },
    IssueDetected {
        issue: Issue,
    },
    HealingAttempted {
        action: HealingAction,
    },
    MetricsSampled {
        metrics: PerformanceMetrics,
    },
}
