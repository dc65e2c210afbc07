//! Prometheus metrics HTTP server.
//!
//! Uses the built-in HTTP listener from `metrics-exporter-prometheus`
//! to expose the `/metrics` scrape endpoint. Values are pushed into the
//! recorder by the orchestrator's collect loop, so a scrape never touches
//! pipeline state directly.
//!
//! # Usage
//!
//! ```ignore
//! let config = MetricsConfig::default();
//! install_metrics_recorder(&config)?;
//! // After this, every Collect pass recorded through `exposition::record` is served
//! ```

use std::net::SocketAddr;

use anyhow::Result;
use log_exporter_core::config::MetricsConfig;
use log_exporter_pipeline::exposition;
use metrics_exporter_prometheus::PrometheusBuilder;

/// Parse `listen_addr:port` into a socket address.
pub fn listen_socket(config: &MetricsConfig) -> Result<SocketAddr> {
    format!("{}:{}", config.listen_addr, config.port)
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid metrics listen address: {}", e))
}

/// Install the global metrics recorder and start the HTTP listener.
///
/// This function should be called once per process. It also registers
/// the HELP text of every exported metric and sets the build info gauge.
///
/// # Errors
///
/// - Unsupported endpoint path
/// - Invalid listen address
/// - Socket binding fails or a global recorder is already installed
pub fn install_metrics_recorder(config: &MetricsConfig) -> Result<()> {
    if config.endpoint != "/metrics" {
        return Err(anyhow::anyhow!(
            "unsupported metrics endpoint '{}': only '/metrics' is currently supported",
            config.endpoint
        ));
    }

    let addr = listen_socket(config)?;

    if addr.ip().is_unspecified() {
        tracing::warn!(
            listen_addr = %addr,
            "metrics endpoint is exposed on all interfaces; restrict listen_addr in untrusted networks"
        );
    }

    tracing::info!(listen_addr = %addr, "installing Prometheus metrics recorder");

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| anyhow::anyhow!("failed to install metrics recorder: {}", e))?;

    exposition::describe();
    exposition::record_build_info(env!("CARGO_PKG_VERSION"));

    tracing::info!(listen_addr = %addr, "Prometheus metrics endpoint active");

    Ok(())
}
