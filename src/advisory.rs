//! Advisory service - optional LLM-backed remediation suggestions
//!
//! The advisory service is an input source for supplementary suggestions,
//! never a dependency for correctness: any failure here is swallowed by the
//! orchestrator, logged at warning level and skipped for that cycle.
//!
//! The orchestrator only acts on recommendations marked auto-applicable
//! whose confidence clears the configured threshold; each accepted entry
//! becomes a synthetic issue that is healed immediately.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::config::AdvisoryConfig;
use crate::error::{MonitorError, MonitorResult};
use crate::event_log::LogEntry;
use crate::issues::{Issue, IssueType, Severity};
use crate::{HealthStatus, PerformanceMetrics};

/// System snapshot shipped to the advisory service.
#[derive(Debug, Clone, Serialize)]
pub struct AdvisoryContext {
    pub health: HealthStatus,
    pub active_issues: Vec<Issue>,
    pub metrics: PerformanceMetrics,
    pub recent_logs: Vec<LogEntry>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecommendationPriority {
    Low,
    Medium,
    High,
    Critical,
}

impl RecommendationPriority {
    pub fn severity(&self) -> Severity {
        match self {
            RecommendationPriority::Low => Severity::Low,
            RecommendationPriority::Medium => Severity::Medium,
            RecommendationPriority::High => Severity::High,
            RecommendationPriority::Critical => Severity::Critical,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecommendationCategory {
    Performance,
    Network,
    System,
    Security,
    Integration,
    /// Anything the service invents that we do not recognise.
    #[serde(other)]
    Other,
}

impl RecommendationCategory {
    /// Issue classification for a synthetic advisory issue. `None` means
    /// the category is not actionable by the healing engine.
    pub fn issue_type(&self) -> Option<IssueType> {
        match self {
            RecommendationCategory::Performance => Some(IssueType::PerformanceDegradation),
            RecommendationCategory::Network => Some(IssueType::NetworkConnectivity),
            RecommendationCategory::System => Some(IssueType::RemoteHostIssue),
            RecommendationCategory::Security => Some(IssueType::SecurityThreat),
            RecommendationCategory::Integration => Some(IssueType::ExternalApiError),
            RecommendationCategory::Other => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recommendation {
    pub title: String,
    pub description: String,
    pub priority: RecommendationPriority,
    pub category: RecommendationCategory,
    pub auto_applicable: bool,
    pub action: String,
    pub confidence: f64,
}

impl Recommendation {
    /// Whether the orchestrator is allowed to act on this entry.
    pub fn applies(&self, threshold: f64) -> bool {
        self.auto_applicable && self.confidence >= threshold
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AdvisoryReport {
    pub analysis: String,
    #[serde(default)]
    pub recommendations: Vec<Recommendation>,
}

/// Capability seam for advisory backends.
#[async_trait]
pub trait AdvisoryService: Send + Sync {
    async fn analyze(&self, context: &AdvisoryContext) -> MonitorResult<AdvisoryReport>;
}

/// HTTP client for a remote advisory endpoint.
pub struct HttpAdvisoryClient {
    client: reqwest::Client,
    url: String,
}

impl HttpAdvisoryClient {
    pub fn new(config: &AdvisoryConfig) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(15))
                .build()
                .expect("Failed to build HTTP client"),
            url: config.url.clone(),
        }
    }
}

#[async_trait]
impl AdvisoryService for HttpAdvisoryClient {
    #[instrument(skip(self, context))]
    async fn analyze(&self, context: &AdvisoryContext) -> MonitorResult<AdvisoryReport> {
        debug!(
            "requesting advisory analysis for {} active issue(s)",
            context.active_issues.len()
        );

        let response = self
            .client
            .post(&self.url)
            .json(context)
            .send()
            .await
            .map_err(|e| MonitorError::Advisory(e.to_string()))?;

        if !response.status().is_success() {
            return Err(MonitorError::Advisory(format!(
                "HTTP {}",
                response.status()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| MonitorError::Advisory(format!("malformed report: {e}")))
    }
}
