use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use offering_catalog::config::Config;
use offering_catalog::start_server_with_config;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(
    name = "offering-catalog",
    about = "Solution offering catalog service",
    version
)]
struct Args {
    /// Path to a TOML configuration file; CATALOG_* environment
    /// variables override values from the file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the configured listen port.
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let mut config =
        Config::load(args.config.as_deref()).context("failed to load configuration")?;
    if let Some(port) = args.port {
        config.server.port = port;
    }
    tracing::info!("Loaded configuration");

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

    let port = start_server_with_config(config, shutdown_rx).await?;
    tracing::info!(port, "server started");

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutdown requested, draining connections");

    let _ = shutdown_tx.send(());
    tokio::time::sleep(std::time::Duration::from_millis(200)).await;

    tracing::info!("server stopped");
    Ok(())
}
