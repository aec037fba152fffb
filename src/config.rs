use tracing::trace;

/// Top-level monitor configuration, read from a JSON file.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct Config {
    /// Remote host to probe and remediate. Without it, network and remote
    /// sub-checks are skipped entirely.
    pub remote: Option<RemoteHostConfig>,

    #[serde(default)]
    pub intervals: Intervals,

    #[serde(default)]
    pub thresholds: Thresholds,

    /// Maximum number of retained audit log entries (oldest dropped first).
    #[serde(default = "default_event_log_cap")]
    pub event_log_cap: usize,

    /// Remote services that must be running for the host to count as healthy.
    #[serde(default = "default_critical_services")]
    pub critical_services: Vec<String>,

    /// Optional advisory service for supplementary remediation suggestions.
    pub advisory: Option<AdvisoryConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            remote: None,
            intervals: Intervals::default(),
            thresholds: Thresholds::default(),
            event_log_cap: default_event_log_cap(),
            critical_services: default_critical_services(),
            advisory: None,
        }
    }
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct RemoteHostConfig {
    pub host: String,
    #[serde(default = "default_remote_port")]
    pub port: u16,
    /// Shared secret sent as `X-MONITORING-SECRET` on every request.
    pub token: Option<String>,
    /// Human-friendly name shown in logs in place of the host address.
    pub display: Option<String>,
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct Intervals {
    /// Seconds between full health-check cycles.
    #[serde(default = "default_health_check_secs")]
    pub health_check_secs: u64,

    /// Seconds between standalone metrics samples.
    #[serde(default = "default_metrics_sample_secs")]
    pub metrics_sample_secs: u64,
}

impl Default for Intervals {
    fn default() -> Self {
        Self {
            health_check_secs: default_health_check_secs(),
            metrics_sample_secs: default_metrics_sample_secs(),
        }
    }
}

/// Detection thresholds for the local application check.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct Thresholds {
    #[serde(default = "default_memory_pct")]
    pub memory_pct: f64,

    #[serde(default = "default_response_time_secs")]
    pub response_time_secs: f64,

    #[serde(default = "default_error_rate")]
    pub error_rate: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            memory_pct: default_memory_pct(),
            response_time_secs: default_response_time_secs(),
            error_rate: default_error_rate(),
        }
    }
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct AdvisoryConfig {
    pub url: String,

    /// Only recommendations at or above this confidence are auto-applied.
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f64,
}

fn default_remote_port() -> u16 {
    8080
}

fn default_health_check_secs() -> u64 {
    30
}

fn default_metrics_sample_secs() -> u64 {
    10
}

fn default_event_log_cap() -> usize {
    1000
}

fn default_critical_services() -> Vec<String> {
    vec![
        String::from("gateway"),
        String::from("worker"),
        String::from("proxy"),
    ]
}

fn default_memory_pct() -> f64 {
    90.0
}

fn default_response_time_secs() -> f64 {
    2.0
}

fn default_error_rate() -> f64 {
    0.05
}

fn default_confidence_threshold() -> f64 {
    0.8
}

pub fn read_config_file(path: &str) -> anyhow::Result<Config> {
    let file_content = std::fs::read_to_string(path)?;
    serde_json::from_str(&file_content)
        .map_err(|_| anyhow::anyhow!("Invalid configuration file provided!"))
        .inspect(|config| trace!("loaded config: {config:?}"))
}
