//! usagestat service
//!
//! Starts the polling loop and the admin HTTP interface.

use clap::Parser;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tower_http::trace::TraceLayer;
use usagestat::{
    cli::{self, Cli, Command},
    config::{Config, MAX_TIMEOUT_SECONDS},
    counters::CounterRegistry,
    handlers::{self, AppState},
    metrics::Metrics,
    poller::Poller,
    reporter::{ReporterSettings, StatsReporter},
    source::{HttpMetricSource, SourceRegistry},
    telemetry,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if let Some(Command::Config { output }) = cli.command {
        let template = cli::generate_config_template();
        match output {
            Some(path) => {
                std::fs::write(&path, template)?;
                println!("Configuration template written to {}", path);
            }
            None => print!("{}", template),
        }
        return Ok(());
    }

    // Load configuration
    let config = Config::from_file(&cli.config)?;

    // Initialize telemetry
    telemetry::init(&config.observability.log_level);

    let settings = ReporterSettings::from_env(&config.reporter);
    tracing::info!("{}", cli::version_banner(&settings));

    let reporter = StatsReporter::new(
        settings,
        Duration::from_secs(config.reporter.timeout_seconds),
    )?;

    // Requests to HTTP components are bounded by the per-component timeout, if any
    let directory = Arc::new(SourceRegistry::new());
    let component_timeout = config
        .polling
        .component_timeout()
        .unwrap_or(Duration::from_secs(MAX_TIMEOUT_SECONDS));
    for component in &config.components {
        let source = HttpMetricSource::new(component.base_url(), component_timeout)?;
        directory.register(component.id(), Arc::new(source)).await;
    }

    let poller = Arc::new(
        Poller::new(
            directory,
            Arc::new(CounterRegistry::new()),
            Arc::new(reporter),
            Metrics::new()?,
        )
        .with_component_timeout(config.polling.component_timeout()),
    );
    let polling = poller.clone().spawn(config.polling.interval());

    let app = handlers::router(AppState::new(poller)).layer(TraceLayer::new_for_http());

    // server.host is checked to be an IP address during config validation
    let host: IpAddr = config.server.host.parse()?;
    let addr = SocketAddr::from((host, config.server.port));

    tracing::info!("Admin interface listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Shutting down, waiting for the current polling cycle");
    polling.shutdown().await;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
