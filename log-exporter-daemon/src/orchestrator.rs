//! Pipeline orchestration -- assembly, collect loop, and lifecycle management.
//!
//! The [`Orchestrator`] is the central coordinator of `log-exporter`.
//! It validates configuration, compiles every grok pattern, installs the
//! Prometheus recorder, owns the [`PipelineSet`], and runs the periodic
//! Collect loop until a shutdown signal arrives. Each tick records one
//! collect pass and logs any change of the overall health status.
//! Scrapes read whatever the last tick recorded, so exposed values lag by
//! at most `metrics.scrape_interval_secs`.
//!
//! # Startup Order
//!
//! 1. Validate configuration
//! 2. Load the grok pattern library and resolve every file (grammar errors abort)
//! 3. Install the Prometheus recorder (when metrics are enabled)
//! 4. Open and start one pipeline per file (unopenable files are skipped)
//!
//! # Shutdown
//!
//! The pipeline set is cancelled and each pipeline is awaited until
//! `general.shutdown_timeout_secs` elapses; stragglers are abandoned.

use std::future::Future;
use std::path::Path;
use std::time::{Duration, Instant};

use anyhow::Result;

use log_exporter_core::config::{ExporterConfig, GrokConfig};
use log_exporter_core::pipeline::HealthStatus;
use log_exporter_pipeline::pipeline_set::Collection;
use log_exporter_pipeline::{PatternLibrary, PipelineSet, exposition, resolve_files};

use crate::health::{self, DaemonHealth, FileHealth};
use crate::metrics_server;

/// The main daemon orchestrator.
pub struct Orchestrator {
    /// Loaded and validated configuration.
    config: ExporterConfig,
    /// Every file pipeline of the process.
    set: PipelineSet,
    /// Daemon start time (for uptime reporting).
    start_time: Instant,
    /// Overall status seen by the last collect tick.
    last_status: Option<HealthStatus>,
}

impl Orchestrator {
    /// Load configuration and build the orchestrator.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Configuration file cannot be read or parsed
    /// - Configuration validation fails
    /// - Any grok pattern fails to compile
    pub async fn build(config_path: &Path) -> Result<Self> {
        let config = ExporterConfig::load(config_path)
            .await
            .map_err(|e| anyhow::anyhow!("failed to load config: {}", e))?;
        Self::build_from_config(config).await
    }

    /// Build from an already-loaded configuration.
    pub async fn build_from_config(config: ExporterConfig) -> Result<Self> {
        config
            .validate()
            .map_err(|e| anyhow::anyhow!("config validation failed: {}", e))?;

        let library = load_pattern_library(&config.grok).await?;
        let resolved = resolve_files(&config.files, &library)
            .map_err(|e| anyhow::anyhow!("failed to compile grok pattern: {}", e))?;

        if config.metrics.enabled {
            metrics_server::install_metrics_recorder(&config.metrics)?;
            tracing::info!(port = config.metrics.port, "metrics endpoint enabled");
        }

        let set = PipelineSet::build(resolved, config.tail.clone());
        tracing::info!(files = config.files.len(), "orchestrator initialized");

        Ok(Self {
            config,
            set,
            start_time: Instant::now(),
            last_status: None,
        })
    }

    /// Start every pipeline, run the Collect loop until a shutdown signal,
    /// then stop every pipeline.
    ///
    /// # Shutdown Triggers
    ///
    /// - `SIGTERM` (from systemd, Docker, or `kill`)
    /// - `SIGINT` (Ctrl+C)
    pub async fn run(&mut self) -> Result<()> {
        let signal = wait_for_shutdown_signal()?;
        self.run_until(async {
            let name = signal.await;
            tracing::info!(signal = name, "shutdown signal received");
        })
        .await
    }

    /// Same as [`run`](Self::run) with an injectable shutdown trigger.
    pub async fn run_until<F>(&mut self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let running = self.start();
        if running == 0 {
            tracing::warn!("no file pipeline running; serving only failure metrics");
        }

        let interval = Duration::from_secs(self.config.metrics.scrape_interval_secs.max(1));
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        tracing::info!(interval_secs = interval.as_secs(), "entering collect loop");
        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = ticker.tick() => {
                    self.collect_once();
                    self.observe_health();
                }
            }
        }

        self.shutdown().await;
        Ok(())
    }

    /// Open and start every configured pipeline.
    ///
    /// Returns the number of running pipelines.
    pub fn start(&mut self) -> usize {
        self.set.start()
    }

    /// Run one Collect pass and record it into the metrics recorder.
    pub fn collect_once(&self) -> Collection {
        let collection = self.set.collect();
        if self.config.metrics.enabled {
            exposition::record(&collection);
        }
        collection
    }

    /// Compare the overall status with the previous tick and log a change.
    ///
    /// Returns the new status when it changed, `None` otherwise.
    pub fn observe_health(&mut self) -> Option<HealthStatus> {
        let current = self.set.health();
        if !health::log_transition(self.last_status.as_ref(), &current) {
            return None;
        }
        if !current.is_healthy() {
            let report = self.health();
            tracing::debug!(failing = ?report.failing_files(), skipped = report.skipped_files, "health detail");
        }
        self.last_status = Some(current.clone());
        Some(current)
    }

    /// Overall status recorded by the last collect tick.
    pub fn last_status(&self) -> Option<&HealthStatus> {
        self.last_status.as_ref()
    }

    /// Stop every pipeline, bounded by `general.shutdown_timeout_secs`.
    pub async fn shutdown(&self) {
        let timeout = Duration::from_secs(self.config.general.shutdown_timeout_secs);
        self.set.shutdown(timeout).await;
        tracing::info!(
            uptime_secs = self.start_time.elapsed().as_secs(),
            "log-exporter shut down"
        );
    }

    /// Build a health report from the current pipeline states.
    pub fn health(&self) -> DaemonHealth {
        let files: Vec<FileHealth> = self
            .set
            .iter()
            .map(|pipeline| FileHealth {
                path: pipeline.path_label().to_owned(),
                status: pipeline.health_check(),
            })
            .collect();

        DaemonHealth {
            status: self.set.health(),
            uptime_secs: self.start_time.elapsed().as_secs(),
            skipped_files: self.set.failure_stats().startup_failures(),
            files,
        }
    }

    /// Get a reference to the pipeline set.
    pub fn pipelines(&self) -> &PipelineSet {
        &self.set
    }

    /// Get a reference to the loaded configuration.
    pub fn config(&self) -> &ExporterConfig {
        &self.config
    }
}

/// Build the pattern library: builtins plus the optional pattern directory.
pub async fn load_pattern_library(grok: &GrokConfig) -> Result<PatternLibrary> {
    let mut library = PatternLibrary::with_builtins();
    if !grok.pattern_dir.is_empty() {
        let added = library
            .load_dir(&grok.pattern_dir)
            .await
            .map_err(|e| anyhow::anyhow!("failed to load grok patterns: {}", e))?;
        tracing::info!(dir = %grok.pattern_dir, patterns = added, "loaded grok pattern directory");
    }
    Ok(library)
}

/// Validate configuration and compile every grok pattern without
/// opening any file or binding any socket.
///
/// Returns the number of configured files.
pub async fn check_config(config: &ExporterConfig) -> Result<usize> {
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("config validation failed: {}", e))?;
    let library = load_pattern_library(&config.grok).await?;
    let resolved = resolve_files(&config.files, &library)
        .map_err(|e| anyhow::anyhow!("failed to compile grok pattern: {}", e))?;
    Ok(resolved.len())
}

/// Install SIGTERM/SIGINT handlers and return a future resolving to the
/// name of the first signal received.
///
/// # Errors
///
/// Returns an error if signal handlers cannot be installed.
fn wait_for_shutdown_signal() -> Result<impl Future<Output = &'static str>> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("failed to install SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("failed to install SIGINT handler: {}", e))?;

    Ok(async move {
        tokio::select! {
            _ = sigterm.recv() => "SIGTERM",
            _ = sigint.recv() => "SIGINT",
        }
    })
}
