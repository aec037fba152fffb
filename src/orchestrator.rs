//! HealthOrchestrator - the actor that drives the monitoring loop.
//!
//! Owns the issue registry, the healing engine and the audit log outright;
//! no other task ever mutates them. Queries travel over the command channel
//! and are answered through oneshot channels, notifications fan out over a
//! broadcast channel. The periodic cycle and external commands are serviced
//! by the same `select!` loop, so every mutation is serialized.
//!
//! A health cycle runs its sub-checks in a fixed order: local sample,
//! application thresholds, network probe, data integrity, remote host. The
//! remote sub-check is skipped while the host is unreachable - a dead probe
//! already tells us everything a failed metrics fetch would.

use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::{debug, error, info, instrument, warn};

use crate::advisory::{AdvisoryContext, AdvisoryService};
use crate::config::Config;
use crate::error::MonitorError;
use crate::event_log::{EventLog, LogLevel};
use crate::healing::{ActionStatus, Collaborators, HealContext, HealingAction, HealingEngine};
use crate::issues::{Issue, IssueId, IssueRegistry, IssueType, Severity};
use crate::messages::{HealthEvent, OrchestratorCommand};
use crate::metrics::MetricsSource;
use crate::remote::RemoteExecutor;
use crate::{HealthStatus, PerformanceMetrics, RemoteServiceStatus, remote_overall_score};

/// Active issues at or above this count trigger an advisory consultation
/// even while the aggregate status still looks healthy.
const ADVISORY_ISSUE_THRESHOLD: usize = 3;

/// How many audit entries accompany an advisory request.
const ADVISORY_LOG_TAIL: usize = 10;

pub struct HealthOrchestrator<S: MetricsSource> {
    config: Config,
    source: S,
    remote: Option<RemoteExecutor>,
    advisory: Option<Box<dyn AdvisoryService>>,
    collaborators: Collaborators,
    registry: IssueRegistry,
    engine: HealingEngine,
    log: EventLog,
    health: HealthStatus,
    latest_metrics: Option<PerformanceMetrics>,
    remote_services: Vec<RemoteServiceStatus>,
    last_check: Option<DateTime<Utc>>,
    command_rx: mpsc::Receiver<OrchestratorCommand>,
    event_tx: broadcast::Sender<HealthEvent>,
}

impl<S: MetricsSource + 'static> HealthOrchestrator<S> {
    async fn run(mut self) {
        let check_period =
            std::time::Duration::from_secs(self.config.intervals.health_check_secs.max(1));
        let sample_period =
            std::time::Duration::from_secs(self.config.intervals.metrics_sample_secs.max(1));

        // First tick after one full period; a slow cycle makes the loop
        // skip ticks instead of queueing a burst of catch-up cycles.
        let mut check_tick = interval_at(Instant::now() + check_period, check_period);
        check_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut sample_tick = interval_at(Instant::now() + sample_period, sample_period);
        sample_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

        self.log
            .push(LogLevel::Info, "orchestrator", "monitoring started");
        info!("orchestrator running");

        loop {
            tokio::select! {
                _ = check_tick.tick() => {
                    self.run_health_cycle().await;
                }
                _ = sample_tick.tick() => {
                    self.take_sample().await;
                }
                command = self.command_rx.recv() => {
                    match command {
                        Some(OrchestratorCommand::Shutdown) | None => break,
                        Some(command) => self.handle_command(command).await,
                    }
                }
            }
        }

        let cancelled = self.engine.cancel_open_actions();
        self.log.push(
            LogLevel::Info,
            "orchestrator",
            format!("monitoring stopped, {cancelled} open action(s) cancelled"),
        );
        info!("orchestrator stopped");
    }

    async fn handle_command(&mut self, command: OrchestratorCommand) {
        match command {
            OrchestratorCommand::CheckNow { respond_to } => {
                let health = self.run_health_cycle().await;
                let _ = respond_to.send(health);
            }
            OrchestratorCommand::SampleNow { respond_to } => {
                let metrics = self.take_sample().await;
                let _ = respond_to.send(metrics);
            }
            OrchestratorCommand::GetHealth { respond_to } => {
                let _ = respond_to.send(self.health);
            }
            OrchestratorCommand::GetIssues { respond_to } => {
                let _ = respond_to.send(self.registry.active_issues());
            }
            OrchestratorCommand::GetHistory { respond_to } => {
                let _ = respond_to.send(self.engine.history().to_vec());
            }
            OrchestratorCommand::GetMetrics { respond_to } => {
                let _ = respond_to.send(self.latest_metrics.clone());
            }
            OrchestratorCommand::GetLastCheck { respond_to } => {
                let _ = respond_to.send(self.last_check);
            }
            OrchestratorCommand::TailLogs { n, respond_to } => {
                let _ = respond_to.send(self.log.tail(n));
            }
            OrchestratorCommand::Shutdown => {}
        }
    }

    async fn take_sample(&mut self) -> Option<PerformanceMetrics> {
        match self.source.sample().await {
            Ok(metrics) => {
                self.latest_metrics = Some(metrics.clone());
                let _ = self.event_tx.send(HealthEvent::MetricsSampled {
                    metrics: metrics.clone(),
                });
                Some(metrics)
            }
            Err(e) => {
                warn!("metrics sample failed: {e:#}");
                None
            }
        }
    }

    #[instrument(skip(self))]
    async fn run_health_cycle(&mut self) -> HealthStatus {
        debug!("health cycle started");

        let metrics = match self.source.sample().await {
            Ok(m) => {
                self.latest_metrics = Some(m.clone());
                Some(m)
            }
            Err(e) => {
                error!("health cycle could not sample metrics: {e:#}");
                self.log.push(
                    LogLevel::Error,
                    "metrics",
                    format!("sampling failed: {e:#}"),
                );
                None
            }
        };

        let mut parts = Vec::with_capacity(4);

        let app = match &metrics {
            Some(m) => {
                let m = m.clone();
                self.check_app_health(&m)
            }
            None => HealthStatus::Unknown,
        };
        parts.push(app);

        let network = self.check_network_health().await;
        parts.push(network);

        parts.push(self.check_data_integrity().await);

        // A dead probe already covers the remote host.
        if network != HealthStatus::Disconnected {
            if let Some(remote) = self.check_remote_health().await {
                parts.push(remote);
            }
        }

        let combined = HealthStatus::combine(&parts);
        self.health = combined;
        self.last_check = Some(Utc::now());

        self.run_healing_pass().await;
        self.run_advisory_pass(combined).await;

        let open_issues = self.registry.active_count();
        self.log.push(
            LogLevel::Info,
            "orchestrator",
            format!("health cycle complete: {combined}, {open_issues} open issue(s)"),
        );
        let _ = self.event_tx.send(HealthEvent::CycleCompleted {
            health: combined,
            open_issues,
            timestamp: Utc::now(),
        });

        debug!("health cycle finished: {combined}");
        combined
    }

    /// Local application check: composite score plus per-signal thresholds.
    /// A breached threshold can only worsen the sub-status, never improve it.
    fn check_app_health(&mut self, metrics: &PerformanceMetrics) -> HealthStatus {
        let thresholds = self.config.thresholds.clone();
        let mut status = metrics.status();

        if metrics.mem_pct > thresholds.memory_pct {
            self.raise(
                IssueType::MemoryPressure,
                format!("memory usage at {:.1}%", metrics.mem_pct),
                Severity::High,
                "application",
            );
            status = HealthStatus::Critical;
        }
        if metrics.response_time_secs > thresholds.response_time_secs {
            self.raise(
                IssueType::PerformanceDegradation,
                format!("response time at {:.2}s", metrics.response_time_secs),
                Severity::Medium,
                "application",
            );
            if status.rank() > HealthStatus::Warning.rank() {
                status = HealthStatus::Warning;
            }
        }
        if metrics.error_rate > thresholds.error_rate {
            self.raise(
                IssueType::ExternalApiError,
                format!("request error rate at {:.1}%", metrics.error_rate * 100.0),
                Severity::High,
                "application",
            );
            if status.rank() > HealthStatus::Warning.rank() {
                status = HealthStatus::Warning;
            }
        }

        status
    }

    /// Probe the remote host. Without a configured remote there is nothing
    /// to disconnect from.
    async fn check_network_health(&mut self) -> HealthStatus {
        let Some(remote) = self.remote.clone() else {
            return HealthStatus::Optimal;
        };

        let started = std::time::Instant::now();
        let reachable = remote.test_connectivity().await;
        self.source.observe_request(started.elapsed(), reachable);

        if reachable {
            HealthStatus::Optimal
        } else {
            self.raise(
                IssueType::NetworkConnectivity,
                format!("remote host {} is unreachable", remote.host()),
                Severity::Critical,
                "network",
            );
            HealthStatus::Disconnected
        }
    }

    /// Sanity-check injected collaborators: cached data and the worker pool.
    async fn check_data_integrity(&mut self) -> HealthStatus {
        let mut degraded = false;

        let data_ok = match &self.collaborators.store {
            Some(store) => match store.revalidate().await {
                Ok(passed) => passed,
                Err(e) => {
                    warn!("{}", MonitorError::DataIntegrity(e.to_string()));
                    false
                }
            },
            None => true,
        };
        if !data_ok {
            self.raise(
                IssueType::DataCorruption,
                "cached domain data failed its sanity check",
                Severity::Medium,
                "data",
            );
            degraded = true;
        }

        let workers_ok = match &self.collaborators.workers {
            Some(workers) => workers.active_workers().await > 0,
            None => true,
        };
        if !workers_ok {
            self.raise(
                IssueType::WorkerMalfunction,
                "worker pool has no active workers",
                Severity::Medium,
                "workers",
            );
            degraded = true;
        }

        if degraded {
            HealthStatus::Warning
        } else {
            HealthStatus::Optimal
        }
    }

    /// Score the remote host from its own metrics and service inventory.
    async fn check_remote_health(&mut self) -> Option<HealthStatus> {
        let remote = self.remote.clone()?;

        let (metrics, services) = match (
            remote.fetch_metrics().await,
            remote.fetch_service_status().await,
        ) {
            (Ok(m), Ok(s)) => (m, s),
            (Err(e), _) | (_, Err(e)) => {
                self.raise(
                    IssueType::RemoteHostIssue,
                    format!("remote telemetry unavailable: {e}"),
                    Severity::High,
                    "remote",
                );
                return Some(HealthStatus::Warning);
            }
        };

        self.remote_services = services;
        let score = remote_overall_score(
            &metrics,
            &self.remote_services,
            &self.config.critical_services,
        );
        let status = HealthStatus::from_remote_score(score);

        match status {
            HealthStatus::Critical => {
                self.raise(
                    IssueType::RemoteHostIssue,
                    format!("remote host critical (score {score:.1})"),
                    Severity::Critical,
                    "remote",
                );
            }
            HealthStatus::Warning => {
                self.raise(
                    IssueType::RemoteHostIssue,
                    format!("remote host degraded (score {score:.1})"),
                    Severity::High,
                    "remote",
                );
            }
            _ => {}
        }

        Some(status)
    }

    /// Attempt remediation for every open issue that is due this cycle.
    async fn run_healing_pass(&mut self) {
        for issue in self.registry.active_issues() {
            if !self.engine.should_attempt(issue.id) {
                continue;
            }
            self.heal_one(&issue).await;
        }
    }

    async fn heal_one(&mut self, issue: &Issue) {
        let remote = self.remote.clone();
        let critical_services = self.config.critical_services.clone();
        let mut ctx = HealContext {
            metrics_source: &mut self.source,
            remote: remote.as_ref(),
            collaborators: &self.collaborators,
            critical_services: &critical_services,
        };

        let action = self.engine.heal(issue, &mut ctx).await;
        self.registry.attach_action(issue.id, action.id);

        if action.status == ActionStatus::Completed {
            self.registry.resolve(issue.id);
            self.log.push_detailed(
                LogLevel::Info,
                "healing",
                format!("{}: {} succeeded, issue resolved", issue.id, action.action),
                action.result.clone(),
            );
        } else {
            self.log.push_detailed(
                LogLevel::Warning,
                "healing",
                format!("{}: {} failed", issue.id, action.action),
                action.result.clone(),
            );
        }

        let _ = self.event_tx.send(HealthEvent::HealingAttempted { action });
    }

    /// Consult the advisory service when things look bad. Advisory trouble
    /// never degrades health on its own.
    async fn run_advisory_pass(&mut self, health: HealthStatus) {
        let Some(advisory_config) = self.config.advisory.clone() else {
            return;
        };
        if self.advisory.is_none() {
            return;
        }
        if !health.is_degraded() && self.registry.active_count() < ADVISORY_ISSUE_THRESHOLD {
            return;
        }

        let context = AdvisoryContext {
            health,
            active_issues: self.registry.active_issues(),
            metrics: self.latest_metrics.clone().unwrap_or_default(),
            recent_logs: self.log.tail(ADVISORY_LOG_TAIL),
        };

        let report = match &self.advisory {
            Some(service) => service.analyze(&context).await,
            None => return,
        };

        let report = match report {
            Ok(report) => report,
            Err(e) => {
                warn!("advisory request failed: {e}");
                self.log.push(
                    LogLevel::Warning,
                    "advisory",
                    format!("advisory request failed: {e}"),
                );
                return;
            }
        };

        self.log.push(LogLevel::Info, "advisory", report.analysis);

        let threshold = advisory_config.confidence_threshold;
        for recommendation in report
            .recommendations
            .into_iter()
            .filter(|r| r.applies(threshold))
        {
            let Some(kind) = recommendation.category.issue_type() else {
                debug!(
                    "skipping advisory recommendation with unmapped category: {}",
                    recommendation.title
                );
                continue;
            };

            let id = self.raise(
                kind,
                recommendation.description,
                recommendation.priority.severity(),
                "advisory",
            );

            if let Some(issue) = self.registry.get(id).cloned() {
                if self.engine.should_attempt(issue.id) {
                    self.heal_one(&issue).await;
                }
            }
        }
    }

    /// Record an anomaly: de-duplicated registry entry, audit log line and
    /// a broadcast event for genuinely new issues.
    fn raise(
        &mut self,
        kind: IssueType,
        description: impl Into<String>,
        severity: Severity,
        component: &str,
    ) -> IssueId {
        let description = description.into();
        let before = self.registry.active_count();
        let id = self
            .registry
            .report(kind, description.clone(), severity, component);

        let level = if severity >= Severity::High {
            LogLevel::Error
        } else {
            LogLevel::Warning
        };
        self.log.push(level, component, description);

        if self.registry.active_count() > before {
            if let Some(issue) = self.registry.get(id) {
                let _ = self.event_tx.send(HealthEvent::IssueDetected {
                    issue: issue.clone(),
                });
            }
        }

        id
    }
}

/// Cloneable handle to a running orchestrator.
#[derive(Debug, Clone)]
pub struct OrchestratorHandle {
    sender: mpsc::Sender<OrchestratorCommand>,
    event_tx: broadcast::Sender<HealthEvent>,
}

impl OrchestratorHandle {
    /// Spawn the orchestrator onto the runtime and return a handle plus the
    /// initial event subscription.
    pub fn spawn<S: MetricsSource + 'static>(
        config: Config,
        source: S,
        remote: Option<RemoteExecutor>,
        advisory: Option<Box<dyn AdvisoryService>>,
        collaborators: Collaborators,
    ) -> (Self, broadcast::Receiver<HealthEvent>) {
        let (sender, command_rx) = mpsc::channel(16);
        let (event_tx, event_rx) = broadcast::channel(64);

        let orchestrator = HealthOrchestrator {
            log: EventLog::new(config.event_log_cap),
            config,
            source,
            remote,
            advisory,
            collaborators,
            registry: IssueRegistry::new(),
            engine: HealingEngine::new(),
            health: HealthStatus::Unknown,
            latest_metrics: None,
            remote_services: Vec::new(),
            last_check: None,
            command_rx,
            event_tx: event_tx.clone(),
        };
        tokio::spawn(orchestrator.run());

        (Self { sender, event_tx }, event_rx)
    }

    /// Run a full health cycle immediately and wait for its verdict.
    pub async fn check_now(&self) -> anyhow::Result<HealthStatus> {
        self.request(|respond_to| OrchestratorCommand::CheckNow { respond_to })
            .await
    }

    /// Take a metrics sample immediately.
    pub async fn sample_now(&self) -> anyhow::Result<Option<PerformanceMetrics>> {
        self.request(|respond_to| OrchestratorCommand::SampleNow { respond_to })
            .await
    }

    /// Aggregate status from the most recent completed cycle.
    pub async fn current_health(&self) -> anyhow::Result<HealthStatus> {
        self.request(|respond_to| OrchestratorCommand::GetHealth { respond_to })
            .await
    }

    /// Snapshot of all unresolved issues.
    pub async fn active_issues(&self) -> anyhow::Result<Vec<Issue>> {
        self.request(|respond_to| OrchestratorCommand::GetIssues { respond_to })
            .await
    }

    /// Every remediation attempt recorded so far, oldest first.
    pub async fn healing_history(&self) -> anyhow::Result<Vec<HealingAction>> {
        self.request(|respond_to| OrchestratorCommand::GetHistory { respond_to })
            .await
    }

    /// The most recent metrics sample, if any.
    pub async fn latest_metrics(&self) -> anyhow::Result<Option<PerformanceMetrics>> {
        self.request(|respond_to| OrchestratorCommand::GetMetrics { respond_to })
            .await
    }

    /// When the last full health cycle completed, `None` before the first.
    pub async fn last_check(&self) -> anyhow::Result<Option<DateTime<Utc>>> {
        self.request(|respond_to| OrchestratorCommand::GetLastCheck { respond_to })
            .await
    }

    /// The most recent `n` audit entries, oldest first.
    pub async fn tail_logs(&self, n: usize) -> anyhow::Result<Vec<crate::event_log::LogEntry>> {
        self.request(|respond_to| OrchestratorCommand::TailLogs { n, respond_to })
            .await
    }

    pub fn subscribe(&self) -> broadcast::Receiver<HealthEvent> {
        self.event_tx.subscribe()
    }

    /// Ask the orchestrator to stop. Pending actions are finalized as
    /// cancelled before the task exits.
    pub async fn shutdown(&self) -> anyhow::Result<()> {
        use anyhow::Context;
        self.sender
            .send(OrchestratorCommand::Shutdown)
            .await
            .context("orchestrator is not running")
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> OrchestratorCommand,
    ) -> anyhow::Result<T> {
        use anyhow::Context;
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(make(tx))
            .await
            .context("orchestrator is not running")?;
        rx.await.context("orchestrator dropped the request")
    }
}
