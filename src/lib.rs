pub mod advisory;
pub mod config;
pub mod error;
pub mod event_log;
pub mod healing;
pub mod issues;
pub mod messages;
pub mod metrics;
pub mod orchestrator;
pub mod remote;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Ordered health classification, used both for individual sub-checks and
/// for the aggregate system state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Optimal,
    Good,
    Warning,
    Critical,
    Disconnected,
    Unknown,
}

impl HealthStatus {
    /// Numeric rank for ordering comparisons. Higher is healthier.
    pub fn rank(&self) -> u8 {
        match self {
            HealthStatus::Optimal => 5,
            HealthStatus::Good => 4,
            HealthStatus::Warning => 3,
            HealthStatus::Critical => 2,
            HealthStatus::Disconnected => 1,
            HealthStatus::Unknown => 0,
        }
    }

    /// Map a composite score in `[0, 100]` to a local health status.
    pub fn from_score(score: f64) -> HealthStatus {
        if score >= 90.0 {
            HealthStatus::Optimal
        } else if score >= 75.0 {
            HealthStatus::Good
        } else if score >= 50.0 {
            HealthStatus::Warning
        } else {
            HealthStatus::Critical
        }
    }

    /// Map a remote composite score to a health status.
    ///
    /// Remote hosts get slightly more lenient bands than local checks since
    /// the service-health ratio already weighs in.
    pub fn from_remote_score(score: f64) -> HealthStatus {
        if score >= 85.0 {
            HealthStatus::Optimal
        } else if score >= 70.0 {
            HealthStatus::Good
        } else if score >= 50.0 {
            HealthStatus::Warning
        } else {
            HealthStatus::Critical
        }
    }

    /// Combine several sub-check results into an aggregate status.
    ///
    /// Worst-case with tie-break: any critical sub-result dominates, then
    /// disconnection; two or more warnings escalate to `Warning`, a single
    /// warning yields `Good`, otherwise everything is `Optimal`.
    ///
    /// Pure and total - no I/O, no side effects.
    pub fn combine(parts: &[HealthStatus]) -> HealthStatus {
        if parts.iter().any(|h| *h == HealthStatus::Critical) {
            return HealthStatus::Critical;
        }
        if parts.iter().any(|h| *h == HealthStatus::Disconnected) {
            return HealthStatus::Disconnected;
        }

        match parts.iter().filter(|h| **h == HealthStatus::Warning).count() {
            0 => HealthStatus::Optimal,
            1 => HealthStatus::Good,
            _ => HealthStatus::Warning,
        }
    }

    /// Whether this status warrants remediation or advisory attention.
    pub fn is_degraded(&self) -> bool {
        matches!(
            self,
            HealthStatus::Warning | HealthStatus::Critical | HealthStatus::Disconnected
        )
    }
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            HealthStatus::Optimal => "optimal",
            HealthStatus::Good => "good",
            HealthStatus::Warning => "warning",
            HealthStatus::Critical => "critical",
            HealthStatus::Disconnected => "disconnected",
            HealthStatus::Unknown => "unknown",
        };
        write!(f, "{label}")
    }
}

/// One telemetry sample for a target, local or remote.
///
/// The composite score is always derived via [`PerformanceMetrics::overall_score`],
/// never stored alongside its inputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub cpu_pct: f64,
    pub mem_pct: f64,
    pub disk_pct: f64,
    pub network_latency_ms: f64,
    pub response_time_secs: f64,
    pub error_rate: f64,
    #[serde(default)]
    pub uptime_secs: u64,
    #[serde(default = "Utc::now")]
    pub sampled_at: DateTime<Utc>,
}

impl Default for PerformanceMetrics {
    fn default() -> Self {
        Self {
            cpu_pct: 0.0,
            mem_pct: 0.0,
            disk_pct: 0.0,
            network_latency_ms: 0.0,
            response_time_secs: 0.0,
            error_rate: 0.0,
            uptime_secs: 0,
            sampled_at: Utc::now(),
        }
    }
}

impl PerformanceMetrics {
    /// Composite score in `[0, 100]`, mean of five clamped sub-scores.
    ///
    /// Latency saturates at 100ms, response time at 10s and error rate at
    /// 100% so that a single pathological input cannot push the score
    /// below zero.
    pub fn overall_score(&self) -> f64 {
        let cpu = (100.0 - self.cpu_pct).clamp(0.0, 100.0);
        let mem = (100.0 - self.mem_pct).clamp(0.0, 100.0);
        let latency = (100.0 - self.network_latency_ms.min(100.0)).clamp(0.0, 100.0);
        let response = (100.0 - (self.response_time_secs * 10.0).min(100.0)).clamp(0.0, 100.0);
        let errors = (100.0 - (self.error_rate * 100.0).min(100.0)).clamp(0.0, 100.0);

        (cpu + mem + latency + response + errors) / 5.0
    }

    pub fn status(&self) -> HealthStatus {
        HealthStatus::from_score(self.overall_score())
    }
}

/// Status of one monitored process on the remote host.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteServiceStatus {
    pub name: String,
    pub running: bool,
    pub port: Option<u16>,
    pub cpu_pct: f64,
    pub mem_pct: f64,
    pub pid: Option<u32>,
}

/// Composite score for a remote host: 70% raw performance, 30% fraction of
/// the critical-service set currently running.
pub fn remote_overall_score(
    metrics: &PerformanceMetrics,
    services: &[RemoteServiceStatus],
    critical_services: &[String],
) -> f64 {
    let performance_score = metrics.overall_score();

    let ratio = if critical_services.is_empty() {
        1.0
    } else {
        let running = critical_services
            .iter()
            .filter(|name| {
                services
                    .iter()
                    .any(|svc| svc.name == **name && svc.running)
            })
            .count();
        running as f64 / critical_services.len() as f64
    };

    performance_score * 0.7 + ratio * 100.0 * 0.3
}
