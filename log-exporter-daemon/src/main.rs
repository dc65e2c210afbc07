use anyhow::Result;
use clap::Parser;

use log_exporter_core::config::ExporterConfig;
use log_exporter_daemon::cli::DaemonCli;
use log_exporter_daemon::logging;
use log_exporter_daemon::orchestrator::{self, Orchestrator};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = DaemonCli::parse();

    let mut config = ExporterConfig::load(&cli.config)
        .await
        .map_err(|e| anyhow::anyhow!("failed to load config {}: {}", cli.config.display(), e))?;

    // CLI overrides win over file and environment
    if let Some(level) = cli.log_level {
        config.general.log_level = level;
    }
    if let Some(format) = cli.log_format {
        config.general.log_format = format;
    }

    if cli.validate {
        let files = orchestrator::check_config(&config).await?;
        println!("configuration OK: {} file(s)", files);
        return Ok(());
    }

    logging::init_tracing(&config.general)?;
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "log-exporter starting");

    let mut orchestrator = Orchestrator::build_from_config(config).await?;
    orchestrator.run().await?;

    Ok(())
}
