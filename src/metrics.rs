//! Metrics sources - where raw telemetry samples come from
//!
//! The orchestrator never reads OS counters directly; it goes through the
//! [`MetricsSource`] capability so that tests can substitute deterministic
//! fakes for real telemetry.
//!
//! [`SystemMetricsSource`] is the production implementation: CPU, memory,
//! disk and uptime come from the OS via `sysinfo`, while network latency,
//! response time and error rate are derived from the request outcomes the
//! orchestrator feeds back through [`MetricsSource::observe_request`].

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use sysinfo::{Disks, System};
use tracing::trace;

use crate::PerformanceMetrics;

/// Smoothing factor for the latency and response-time averages.
const EWMA_ALPHA: f64 = 0.3;

/// Number of recent request outcomes kept for the error-rate window.
const OUTCOME_WINDOW: usize = 50;

/// Capability interface for telemetry sampling.
#[async_trait]
pub trait MetricsSource: Send {
    /// Take a fresh sample. Multi-second latency must be assumed for
    /// sources that reach over the network.
    async fn sample(&mut self) -> anyhow::Result<PerformanceMetrics>;

    /// Feed back the outcome of a network request so the source can track
    /// latency and error rate. Default: ignored.
    fn observe_request(&mut self, latency: Duration, ok: bool) {
        let _ = (latency, ok);
    }
}

/// Production source backed by real OS counters.
pub struct SystemMetricsSource {
    system: System,
    latency_ewma_ms: f64,
    response_ewma_secs: f64,
    outcomes: VecDeque<bool>,
}

impl SystemMetricsSource {
    pub fn new() -> Self {
        Self {
            system: System::new(),
            latency_ewma_ms: 0.0,
            response_ewma_secs: 0.0,
            outcomes: VecDeque::with_capacity(OUTCOME_WINDOW),
        }
    }

    fn error_rate(&self) -> f64 {
        if self.outcomes.is_empty() {
            return 0.0;
        }
        let failures = self.outcomes.iter().filter(|ok| !**ok).count();
        failures as f64 / self.outcomes.len() as f64
    }

    fn disk_pct() -> f64 {
        let disks = Disks::new_with_refreshed_list();
        disks
            .list()
            .iter()
            .filter(|d| d.total_space() > 0)
            .map(|d| {
                let used = d.total_space().saturating_sub(d.available_space());
                used as f64 / d.total_space() as f64 * 100.0
            })
            .fold(0.0, f64::max)
    }
}

impl Default for SystemMetricsSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MetricsSource for SystemMetricsSource {
    async fn sample(&mut self) -> anyhow::Result<PerformanceMetrics> {
        self.system.refresh_cpu_usage();
        self.system.refresh_memory();

        let cpu_pct = self.system.global_cpu_usage() as f64;
        let total_mem = self.system.total_memory();
        let mem_pct = if total_mem > 0 {
            self.system.used_memory() as f64 / total_mem as f64 * 100.0
        } else {
            0.0
        };

        let metrics = PerformanceMetrics {
            cpu_pct,
            mem_pct,
            disk_pct: Self::disk_pct(),
            network_latency_ms: self.latency_ewma_ms,
            response_time_secs: self.response_ewma_secs,
            error_rate: self.error_rate(),
            uptime_secs: System::uptime(),
            sampled_at: Utc::now(),
        };

        trace!(
            "sampled local metrics: cpu {:.1}%, mem {:.1}%, score {:.1}",
            metrics.cpu_pct,
            metrics.mem_pct,
            metrics.overall_score()
        );

        Ok(metrics)
    }

    fn observe_request(&mut self, latency: Duration, ok: bool) {
        let latency_ms = latency.as_secs_f64() * 1000.0;

        if self.outcomes.is_empty() {
            self.latency_ewma_ms = latency_ms;
            self.response_ewma_secs = latency.as_secs_f64();
        } else {
            self.latency_ewma_ms =
                EWMA_ALPHA * latency_ms + (1.0 - EWMA_ALPHA) * self.latency_ewma_ms;
            self.response_ewma_secs =
                EWMA_ALPHA * latency.as_secs_f64() + (1.0 - EWMA_ALPHA) * self.response_ewma_secs;
        }

        while self.outcomes.len() >= OUTCOME_WINDOW {
            self.outcomes.pop_front();
        }
        self.outcomes.push_back(ok);
    }
}
