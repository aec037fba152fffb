//! Issue registry - typed health anomalies and their resolution state
//!
//! Issues are owned exclusively by the registry and mutated only through
//! it. A resolved issue is never mutated again; it stays in the registry
//! for audit instead of being deleted.
//!
//! ## De-duplication
//!
//! Reporting is keyed by `(type, component)`: while an unresolved issue
//! with the same key exists, a new report refreshes that issue (description,
//! severity escalation, last-seen timestamp) and returns its id instead of
//! appending a duplicate. Sustained degradation therefore produces one open
//! issue per key, not an unbounded flood. Once an issue is resolved, a new
//! breach of the same key opens a fresh issue.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::healing::ActionId;

/// Registry-scoped issue identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IssueId(pub u64);

impl std::fmt::Display for IssueId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "issue-{}", self.0)
    }
}

/// Closed set of anomaly classifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueType {
    NetworkConnectivity,
    RemoteHostIssue,
    DataCorruption,
    PerformanceDegradation,
    MemoryPressure,
    ExternalApiError,
    WorkerMalfunction,
    SecurityThreat,
}

impl std::fmt::Display for IssueType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            IssueType::NetworkConnectivity => "network connectivity",
            IssueType::RemoteHostIssue => "remote host issue",
            IssueType::DataCorruption => "data corruption",
            IssueType::PerformanceDegradation => "performance degradation",
            IssueType::MemoryPressure => "memory pressure",
            IssueType::ExternalApiError => "external API error",
            IssueType::WorkerMalfunction => "worker malfunction",
            IssueType::SecurityThreat => "security threat",
        };
        write!(f, "{label}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

/// A detected, typed health anomaly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Issue {
    pub id: IssueId,
    pub kind: IssueType,
    pub description: String,
    pub severity: Severity,
    pub component: String,
    pub created_at: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub resolved: bool,
    /// Remediation attempts recorded against this issue, in order.
    pub actions: Vec<ActionId>,
}

/// Owner of all detected issues.
#[derive(Debug, Default)]
pub struct IssueRegistry {
    issues: Vec<Issue>,
    next_id: u64,
}

impl IssueRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report an anomaly. Always succeeds.
    ///
    /// Returns the id of the open issue for `(kind, component)` - either a
    /// freshly appended one or the existing unresolved one, refreshed.
    pub fn report(
        &mut self,
        kind: IssueType,
        description: impl Into<String>,
        severity: Severity,
        component: impl Into<String>,
    ) -> IssueId {
        let description = description.into();
        let component = component.into();

        if let Some(existing) = self
            .issues
            .iter_mut()
            .find(|i| !i.resolved && i.kind == kind && i.component == component)
        {
            existing.description = description;
            existing.severity = existing.severity.max(severity);
            existing.last_seen = Utc::now();
            return existing.id;
        }

        let id = IssueId(self.next_id);
        self.next_id += 1;

        let now = Utc::now();
        self.issues.push(Issue {
            id,
            kind,
            description,
            severity,
            component,
            created_at: now,
            last_seen: now,
            resolved: false,
            actions: Vec::new(),
        });

        id
    }

    /// Mark an issue resolved. Idempotent: resolving an already-resolved or
    /// unknown id is a no-op. Returns whether the call changed anything.
    pub fn resolve(&mut self, id: IssueId) -> bool {
        match self.issues.iter_mut().find(|i| i.id == id) {
            Some(issue) if !issue.resolved => {
                issue.resolved = true;
                true
            }
            _ => false,
        }
    }

    /// Record a remediation attempt against an open issue.
    ///
    /// Resolved issues are immutable, so attaching to one is a no-op.
    pub fn attach_action(&mut self, id: IssueId, action: ActionId) {
        if let Some(issue) = self.issues.iter_mut().find(|i| i.id == id && !i.resolved) {
            issue.actions.push(action);
        }
    }

    pub fn get(&self, id: IssueId) -> Option<&Issue> {
        self.issues.iter().find(|i| i.id == id)
    }

    /// Snapshot of all unresolved issues, safe to hand to other tasks.
    pub fn active_issues(&self) -> Vec<Issue> {
        self.issues.iter().filter(|i| !i.resolved).cloned().collect()
    }

    pub fn active_count(&self) -> usize {
        self.issues.iter().filter(|i| !i.resolved).count()
    }

    /// Full audit snapshot, resolved issues included.
    pub fn all_issues(&self) -> &[Issue] {
        &self.issues
    }
}
