//! Daemon health report.
//!
//! The overall status comes from [`PipelineSet::health`]; this module only
//! shapes it, together with per-file states and uptime, into a
//! serializable snapshot. The collect loop logs every change of the
//! overall status.
//!
//! [`PipelineSet::health`]: log_exporter_pipeline::PipelineSet::health

use serde::Serialize;

use log_exporter_core::pipeline::HealthStatus;

/// Health snapshot of the whole daemon.
#[derive(Debug, Clone, Serialize)]
pub struct DaemonHealth {
    /// Overall status of the pipeline set.
    pub status: HealthStatus,
    /// Seconds since the orchestrator was built.
    pub uptime_secs: u64,
    /// Files that could not be opened at startup.
    pub skipped_files: u64,
    /// One entry per pipeline, in configuration order.
    pub files: Vec<FileHealth>,
}

/// Health of one file pipeline.
#[derive(Debug, Clone, Serialize)]
pub struct FileHealth {
    /// Monitored file path.
    pub path: String,
    /// Status derived from the pipeline state.
    pub status: HealthStatus,
}

impl DaemonHealth {
    /// Paths of the pipelines that are not healthy.
    pub fn failing_files(&self) -> Vec<&str> {
        self.files
            .iter()
            .filter(|f| !f.status.is_healthy())
            .map(|f| f.path.as_str())
            .collect()
    }
}

/// Log a change of the overall status.
///
/// Returns `true` when `current` differs from `previous`.
pub fn log_transition(previous: Option<&HealthStatus>, current: &HealthStatus) -> bool {
    if previous == Some(current) {
        return false;
    }
    match current {
        HealthStatus::Healthy => tracing::info!("daemon health is healthy"),
        HealthStatus::Degraded(reason) => {
            tracing::warn!(reason = %reason, "daemon health degraded")
        }
        HealthStatus::Unhealthy(reason) => {
            tracing::warn!(reason = %reason, "daemon health unhealthy")
        }
    }
    true
}
