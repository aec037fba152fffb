//! Helper functions and fakes shared by the integration tests

use std::collections::VecDeque;

use async_trait::async_trait;
use custodian::PerformanceMetrics;
use custodian::config::{Config, Intervals};
use custodian::metrics::MetricsSource;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Metrics source that replays a script, repeating the final sample forever.
pub struct ScriptedSource {
    samples: VecDeque<PerformanceMetrics>,
}

impl ScriptedSource {
    pub fn new(samples: Vec<PerformanceMetrics>) -> Self {
        assert!(!samples.is_empty(), "script needs at least one sample");
        Self {
            samples: samples.into(),
        }
    }
}

#[async_trait]
impl MetricsSource for ScriptedSource {
    async fn sample(&mut self) -> anyhow::Result<PerformanceMetrics> {
        if self.samples.len() > 1 {
            Ok(self.samples.pop_front().unwrap())
        } else {
            Ok(self.samples[0].clone())
        }
    }
}

/// Source whose samples always take longer than the configured check period.
pub struct SlowSource {
    pub delay: std::time::Duration,
}

#[async_trait]
impl MetricsSource for SlowSource {
    async fn sample(&mut self) -> anyhow::Result<PerformanceMetrics> {
        tokio::time::sleep(self.delay).await;
        Ok(healthy_metrics())
    }
}

pub fn healthy_metrics() -> PerformanceMetrics {
    PerformanceMetrics {
        cpu_pct: 10.0,
        mem_pct: 30.0,
        disk_pct: 20.0,
        network_latency_ms: 5.0,
        response_time_secs: 0.1,
        error_rate: 0.0,
        ..PerformanceMetrics::default()
    }
}

/// Everything over its threshold at once; composite score well below 50.
pub fn failing_metrics() -> PerformanceMetrics {
    PerformanceMetrics {
        cpu_pct: 95.0,
        mem_pct: 95.0,
        disk_pct: 90.0,
        network_latency_ms: 50.0,
        response_time_secs: 5.0,
        error_rate: 0.5,
        ..PerformanceMetrics::default()
    }
}

/// Config with intervals long enough that only explicit `check_now` calls
/// drive the loop during a test.
pub fn quiet_config() -> Config {
    Config {
        intervals: Intervals {
            health_check_secs: 3600,
            metrics_sample_secs: 3600,
        },
        ..Config::default()
    }
}

/// Mount a reachable remote host with healthy telemetry on the mock server.
pub async fn mount_healthy_remote(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/account/info"))
        .respond_with(ResponseTemplate::new(200).set_body_json(remote_metrics_json(10.0, 20.0)))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/services"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(services_json(&[
                ("gateway", true),
                ("worker", true),
                ("proxy", true),
            ])),
        )
        .mount(server)
        .await;
}

pub fn remote_metrics_json(cpu_pct: f64, mem_pct: f64) -> serde_json::Value {
    serde_json::json!({
        "cpu_pct": cpu_pct,
        "mem_pct": mem_pct,
        "disk_pct": 15.0,
        "network_latency_ms": 8.0,
        "response_time_secs": 0.2,
        "error_rate": 0.0,
        "uptime_secs": 86400
    })
}

pub fn services_json(services: &[(&str, bool)]) -> serde_json::Value {
    let entries: Vec<serde_json::Value> = services
        .iter()
        .map(|(name, running)| {
            serde_json::json!({
                "name": name,
                "running": running,
                "port": 8080,
                "cpu_pct": 5.0,
                "mem_pct": 10.0,
                "pid": 4242
            })
        })
        .collect();
    serde_json::Value::Array(entries)
}
