//! RemoteExecutor - probes and remediation commands against the remote host
//!
//! All network failure is isolated here: probes return `bool`, commands and
//! queries return typed [`MonitorError`] values. Nothing in this module
//! panics or propagates transport errors to the caller unchanged.
//!
//! ## Wire contract
//!
//! - Reachability: `GET /health`, `/api/status`, `/ping` - tried in order,
//!   first HTTP 200 wins.
//! - Remediation: `POST /<action>` with a JSON body `{service?, params?}`,
//!   answered by `{success, output?}`; non-2xx or transport error is failure.
//! - Telemetry: `GET /account/info` and `GET /services`.

use std::time::Duration;

use serde::Deserialize;
use serde_json::json;
use tracing::{debug, instrument, trace, warn};

use crate::config::RemoteHostConfig;
use crate::error::{MonitorError, MonitorResult};
use crate::{PerformanceMetrics, RemoteServiceStatus};

/// Candidate reachability endpoints, tried in order.
const PROBE_PATHS: [&str; 3] = ["/health", "/api/status", "/ping"];

/// Per-probe timeout.
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Timeout for remediation commands and telemetry queries.
const COMMAND_TIMEOUT: Duration = Duration::from_secs(15);

/// Closed set of remediation commands the remote agent understands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteCommand {
    RestartService { service: String },
    RestartCriticalServices,
    ClearCache,
    OptimizeMemory,
}

impl RemoteCommand {
    pub fn endpoint(&self) -> &'static str {
        match self {
            RemoteCommand::RestartService { .. } => "restart-service",
            RemoteCommand::RestartCriticalServices => "restart-critical-services",
            RemoteCommand::ClearCache => "clear-cache",
            RemoteCommand::OptimizeMemory => "optimize-memory",
        }
    }

    fn body(&self) -> serde_json::Value {
        match self {
            RemoteCommand::RestartService { service } => json!({ "service": service }),
            _ => json!({}),
        }
    }
}

impl std::fmt::Display for RemoteCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RemoteCommand::RestartService { service } => write!(f, "restart service '{service}'"),
            RemoteCommand::RestartCriticalServices => write!(f, "restart critical services"),
            RemoteCommand::ClearCache => write!(f, "clear cache"),
            RemoteCommand::OptimizeMemory => write!(f, "optimize memory"),
        }
    }
}

#[derive(Debug, Deserialize)]
struct CommandResponse {
    success: bool,
    #[serde(default)]
    output: Option<String>,
}

/// Client for one remote host. Cheap to clone - the underlying HTTP
/// connection pool is shared.
#[derive(Debug, Clone)]
pub struct RemoteExecutor {
    client: reqwest::Client,
    base: String,
    host: String,
    token: Option<String>,
}

impl RemoteExecutor {
    pub fn new(config: &RemoteHostConfig) -> Self {
        let label = config
            .display
            .clone()
            .unwrap_or_else(|| config.host.clone());
        Self::with_base(
            format!("http://{}:{}", config.host, config.port),
            label,
            config.token.clone(),
        )
    }

    /// Build an executor against an explicit base URL. Used by tests to
    /// point at a mock server.
    pub fn with_base(base: String, host: String, token: Option<String>) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(COMMAND_TIMEOUT)
                .build()
                .expect("Failed to build HTTP client"),
            base: base.trim_end_matches('/').to_string(),
            host,
            token,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    fn with_token(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.header("X-MONITORING-SECRET", token),
            None => request,
        }
    }

    /// Probe the candidate endpoints in order; reachable as soon as one
    /// answers HTTP 200 within the probe timeout.
    #[instrument(skip(self), fields(host = %self.host))]
    pub async fn test_connectivity(&self) -> bool {
        for path in PROBE_PATHS {
            if self.probe(path).await {
                trace!("probe {path} succeeded");
                return true;
            }
            trace!("probe {path} failed");
        }

        debug!("all probe endpoints failed");
        false
    }

    async fn probe(&self, path: &str) -> bool {
        let url = format!("{}{path}", self.base);
        let request = self.with_token(self.client.get(&url).timeout(PROBE_TIMEOUT));

        match request.send().await {
            Ok(response) => response.status() == reqwest::StatusCode::OK,
            Err(_) => false,
        }
    }

    /// Issue a remediation command. Non-2xx responses, transport errors and
    /// `success: false` replies all surface as [`MonitorError::Remediation`].
    #[instrument(skip(self), fields(host = %self.host))]
    pub async fn execute(&self, command: &RemoteCommand) -> MonitorResult<String> {
        let url = format!("{}/{}", self.base, command.endpoint());
        debug!("executing remote command at {url}");

        let response = self
            .with_token(self.client.post(&url).json(&command.body()))
            .send()
            .await
            .map_err(|e| MonitorError::Remediation(format!("{command:?}: {e}")))?;

        if !response.status().is_success() {
            return Err(MonitorError::Remediation(format!(
                "{command:?}: HTTP {}",
                response.status()
            )));
        }

        let parsed: CommandResponse = response
            .json()
            .await
            .map_err(|e| MonitorError::Remediation(format!("{command:?}: malformed reply: {e}")))?;

        if !parsed.success {
            let output = parsed.output.unwrap_or_else(|| String::from("no output"));
            warn!("remote command rejected: {output}");
            return Err(MonitorError::Remediation(format!("{command:?}: {output}")));
        }

        Ok(parsed.output.unwrap_or_default())
    }

    /// Read-only telemetry query for the remote host itself.
    #[instrument(skip(self), fields(host = %self.host))]
    pub async fn fetch_metrics(&self) -> MonitorResult<PerformanceMetrics> {
        let url = format!("{}/account/info", self.base);
        let response = self.with_token(self.client.get(&url)).send().await?;

        if !response.status().is_success() {
            return Err(MonitorError::Connectivity(format!(
                "metrics query: HTTP {}",
                response.status()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| MonitorError::Connectivity(format!("malformed metrics reply: {e}")))
    }

    /// Status of the monitored processes on the remote host.
    #[instrument(skip(self), fields(host = %self.host))]
    pub async fn fetch_service_status(&self) -> MonitorResult<Vec<RemoteServiceStatus>> {
        let url = format!("{}/services", self.base);
        let response = self.with_token(self.client.get(&url)).send().await?;

        if !response.status().is_success() {
            return Err(MonitorError::Connectivity(format!(
                "service query: HTTP {}",
                response.status()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| MonitorError::Connectivity(format!("malformed service reply: {e}")))
    }
}
