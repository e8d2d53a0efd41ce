//! GRC Platform — multi-tenant governance, risk and compliance service.
//!
//! Main entry point that loads configuration, wires the services and starts the server.

use clap::Parser;
use grc_api::ApiServer;
use grc_core::config::AppConfig;
use grc_management::ManagementState;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "grc-server")]
#[command(about = "Multi-tenant governance, risk and compliance platform")]
#[command(version)]
struct Cli {
    /// Node identifier (overrides config)
    #[arg(long, env = "GRC_PLATFORM__NODE_ID")]
    node_id: Option<String>,

    /// HTTP port (overrides config)
    #[arg(long, env = "GRC_PLATFORM__API__HTTP_PORT")]
    http_port: Option<u16>,

    /// Prometheus exporter port (overrides config)
    #[arg(long, env = "GRC_PLATFORM__METRICS__PORT")]
    metrics_port: Option<u16>,

    /// Start without the demo tenant
    #[arg(long, default_value_t = false)]
    no_seed: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "grc_server=info,grc_management=info,grc_platform=info,tower_http=info".into()
            }),
        )
        .json()
        .init();

    let cli = Cli::parse();

    info!("GRC platform starting up");

    // Load configuration
    let mut config = AppConfig::load().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Failed to load config, using defaults");
        AppConfig::default()
    });

    // Apply CLI overrides
    if let Some(node_id) = cli.node_id {
        config.node_id = node_id;
    }
    if let Some(port) = cli.http_port {
        config.api.http_port = port;
    }
    if let Some(port) = cli.metrics_port {
        config.metrics.port = port;
    }
    if cli.no_seed {
        config.seed_demo_data = false;
    }

    info!(
        node_id = %config.node_id,
        http_port = config.api.http_port,
        metrics_port = config.metrics.port,
        seed_demo_data = config.seed_demo_data,
        "Configuration loaded"
    );

    let state = ManagementState::new(&config)?;
    let api_server = ApiServer::new(config.clone(), state);

    // Start metrics exporter
    if let Err(e) = api_server.start_metrics().await {
        error!(error = %e, "Failed to start metrics exporter");
    }

    info!("GRC platform is ready to serve traffic");

    // Start HTTP server (blocks until shutdown)
    api_server.start_http().await?;

    Ok(())
}
