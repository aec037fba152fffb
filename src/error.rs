//! Error types for monitoring and remediation operations

use std::fmt;

/// Result type alias for monitoring operations
pub type MonitorResult<T> = Result<T, MonitorError>;

/// Errors that can occur while probing, remediating or consulting
#[derive(Debug)]
pub enum MonitorError {
    /// The remote host could not be reached or answered garbage
    Connectivity(String),

    /// A remediation command was rejected or failed on the remote side
    Remediation(String),

    /// Cached domain data failed its sanity check
    DataIntegrity(String),

    /// The advisory service was unavailable or returned a malformed report
    Advisory(String),
}

impl fmt::Display for MonitorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MonitorError::Connectivity(msg) => write!(f, "connectivity error: {msg}"),
            MonitorError::Remediation(msg) => write!(f, "remediation failed: {msg}"),
            MonitorError::DataIntegrity(msg) => write!(f, "data integrity error: {msg}"),
            MonitorError::Advisory(msg) => write!(f, "advisory error: {msg}"),
        }
    }
}

impl std::error::Error for MonitorError {}

impl From<reqwest::Error> for MonitorError {
    fn from(err: reqwest::Error) -> Self {
        MonitorError::Connectivity(err.to_string())
    }
}
