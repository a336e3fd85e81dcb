//! Command-line interface for usagestat
//!
//! Provides argument parsing and subcommand handling for the usagestat binary.

use crate::reporter::ReporterSettings;
use clap::{Parser, Subcommand};

/// Polls component usage counters and reports them to a statistics collector
#[derive(Parser)]
#[command(name = "usagestat")]
#[command(version)]
#[command(about = "Polls component usage counters and reports them to a statistics collector")]
#[command(
    long_about = "usagestat periodically reads the usage counters exposed by the components \
    of an application-server container, accumulates them into named counters, and publishes \
    the totals to a remote statistics collector whenever they change."
)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml", global = true)]
    pub config: String,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Generate a template configuration file
    Config {
        /// Output file path (prints to stdout if not specified)
        #[arg(short, long)]
        output: Option<String>,
    },
}

/// One-line startup banner naming the build and the reporting identity
pub fn version_banner(settings: &ReporterSettings) -> String {
    format!(
        "{} {} reporting as {} {} {} to {}",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        settings.project_name,
        settings.project_type,
        settings.version,
        settings.server
    )
}

/// Generate template configuration content
pub fn generate_config_template() -> &'static str {
    r#"# usagestat Configuration
# ========================
#
# Polling schedule, statistics collector, admin interface and the components
# to poll over HTTP.

# ─────────────────────────────────────────────────────────────────────────────
# ADMIN INTERFACE
# ─────────────────────────────────────────────────────────────────────────────
#
# Serves /health, /metrics, /counters and POST /cycle.

[server]
host = "127.0.0.1"
port = 9464

# ─────────────────────────────────────────────────────────────────────────────
# POLLING
# ─────────────────────────────────────────────────────────────────────────────

[polling]
# Seconds between polling cycles (required, must be greater than 0)
interval_seconds = 60

# Abandon a component that takes longer than this within one cycle (optional)
component_timeout_seconds = 10

# ─────────────────────────────────────────────────────────────────────────────
# STATISTICS COLLECTOR
# ─────────────────────────────────────────────────────────────────────────────
#
# The environment overrides STATS_PROJECT_NAME, STATS_PROJECT_TYPE and
# STATS_PROJECT_VERSION take precedence over the values below. STATS_SERVER is
# used when `server` is not set. A server value that is not a URL falls back
# to the built-in collector.

[reporter]
server = "https://statistics.restcomm.com/rest/"
project_name = "jainslee"
project_type = "community"
timeout_seconds = 10

# ─────────────────────────────────────────────────────────────────────────────
# OBSERVABILITY
# ─────────────────────────────────────────────────────────────────────────────

[observability]
# Log level: "trace", "debug", "info", "warn", "error"
log_level = "info"

# ─────────────────────────────────────────────────────────────────────────────
# COMPONENTS (Optional)
# ─────────────────────────────────────────────────────────────────────────────
#
# Components polled over HTTP. Each must serve:
#   GET  {base_url}/usage          -> {"<name>": <count>, ...}
#   GET  {base_url}/usage/{name}   -> {"value": <count>}
#   POST {base_url}/usage/reset

# [[components]]
# id = "sip-ra"
# base_url = "http://127.0.0.1:8081"
"#
}
