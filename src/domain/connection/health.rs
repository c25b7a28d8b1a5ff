//! Health probing policy and the read-only health snapshot.

use serde::Serialize;
use std::time::Duration;

use crate::domain::foundation::Timestamp;

/// Default interval between health checks.
pub const DEFAULT_HEALTH_INTERVAL: Duration = Duration::from_secs(30);
/// Default consecutive failures before a health-failure signal is raised.
pub const DEFAULT_FAILURE_THRESHOLD: u32 = 3;
/// Default timeout for one presence probe.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Health monitoring tunables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthPolicy {
    pub interval: Duration,
    pub failure_threshold: u32,
    pub probe_timeout: Duration,
}

impl Default for HealthPolicy {
    fn default() -> Self {
        Self {
            interval: DEFAULT_HEALTH_INTERVAL,
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
        }
    }
}

/// Diagnostic view of a session's health monitor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthStatus {
    pub monitoring_active: bool,
    pub consecutive_failures: u32,
    pub failure_threshold: u32,
    pub last_check_at: Option<Timestamp>,
}

/// Raised when consecutive health-check failures reach the threshold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthFailure {
    pub consecutive_failures: u32,
    pub reason: String,
}
