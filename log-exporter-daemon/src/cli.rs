//! CLI argument definitions for log-exporter.
//!
//! Uses `clap` v4 derive macros to parse command-line arguments.

use std::path::PathBuf;

use clap::Parser;

/// Tails log files, extracts fields with grok patterns and exposes
/// per-value counters to Prometheus.
#[derive(Parser, Debug)]
#[command(name = "log-exporter")]
#[command(version, about, long_about = None)]
pub struct DaemonCli {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "config.toml")]
    pub config: PathBuf,

    /// Override log level (trace, debug, info, warn, error).
    ///
    /// Takes precedence over the config file and environment variables.
    #[arg(long)]
    pub log_level: Option<String>,

    /// Override log format (json, pretty).
    ///
    /// Takes precedence over the config file and environment variables.
    #[arg(long)]
    pub log_format: Option<String>,

    /// Validate the configuration and every grok pattern, then exit.
    #[arg(long)]
    pub validate: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cli = DaemonCli::parse_from(["log-exporter"]);
        assert_eq!(cli.config, PathBuf::from("config.toml"));
        assert!(cli.log_level.is_none());
        assert!(!cli.validate);
    }

    #[test]
    fn overrides() {
        let cli = DaemonCli::parse_from([
            "log-exporter",
            "-c",
            "/etc/log-exporter/config.toml",
            "--log-level",
            "debug",
            "--log-format",
            "pretty",
            "--validate",
        ]);
        assert_eq!(cli.config, PathBuf::from("/etc/log-exporter/config.toml"));
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
        assert_eq!(cli.log_format.as_deref(), Some("pretty"));
        assert!(cli.validate);
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        DaemonCli::command().debug_assert();
    }
}
