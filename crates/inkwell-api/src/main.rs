//! Inkwell REST API entry point.
//!
//! Binary name: `inkwell`
//!
//! Loads configuration from the data directory, initializes the database
//! and orchestrator, then serves the HTTP API until interrupted.

mod http;
mod state;

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

use http::router::build_router;
use inkwell_infra::config::load_app_config;
use state::AppState;

#[derive(Parser)]
#[command(name = "inkwell", about = "Multi-tenant streaming chat orchestration service")]
struct Cli {
    /// Data directory holding config.toml and the database.
    #[arg(long, env = "INKWELL_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Bind address override (takes precedence over config.toml).
    #[arg(long)]
    bind: Option<String>,

    /// Export spans via OpenTelemetry (stdout exporter).
    #[arg(long)]
    otel: bool,
}

fn default_data_dir() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    PathBuf::from(home).join(".inkwell")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    inkwell_observe::init_tracing(cli.otel).map_err(|e| anyhow::anyhow!("{e}"))?;

    let data_dir = cli.data_dir.unwrap_or_else(default_data_dir);
    let mut config = load_app_config(&data_dir).await;
    if let Some(bind) = cli.bind {
        config.bind_addr = bind;
    }
    let bind_addr = config.bind_addr.clone();

    let state = AppState::init(data_dir, config).await?;
    let admission = Arc::clone(&state.admission);
    let router = build_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(%bind_addr, "inkwell listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutdown signal received");
            // Releases queued waiters and stops the sweeper; in-flight
            // streams finish as their connections close.
            admission.shutdown();
        })
        .await?;

    inkwell_observe::shutdown_tracing();
    Ok(())
}
