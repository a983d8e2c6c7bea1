use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use matrixd::api;
use matrixd::client::TcpMatrixClient;
use matrixd::config::LoggingConfig;
use matrixd::config::TomlFileStore;
use matrixd::engine::EngineMessage;
use matrixd::Config;
use matrixd::Engine;
use tracing::error;
use tracing::info;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::filter::Targets;
use tracing_subscriber::prelude::*;

/// Control daemon for an HDMI matrix switcher
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Path to the TOML configuration file (also receives renamed inputs/outputs)
    #[arg(default_value = "matrixd.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = Config::from_file(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    init_tracing(&config.logging);

    info!("matrixd starting");
    info!("Loaded config from: {}", args.config.display());

    let matrix = config.matrix;
    info!(
        "Matrix at {}:{} ({} inputs, {} outputs)",
        matrix.host,
        matrix.port,
        matrix.input_names().len(),
        matrix.output_names().len()
    );

    let client = Arc::new(TcpMatrixClient::new(&matrix));
    let config_store = Arc::new(TomlFileStore::new(&args.config));
    let engine = Arc::new(Engine::new(matrix, client, config_store));

    // Initial state before anything can issue commands
    engine.store().request_refresh().await;
    let poller = engine.spawn_poller();

    let engine_task = {
        let engine = engine.clone();
        tokio::spawn(async move { engine.run().await })
    };

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    let api_task = config.api.map(|api_config| {
        let engine = engine.clone();
        tokio::spawn(async move {
            if let Err(e) = api::serve(api_config.listen, api_config.port, engine, shutdown_rx).await
            {
                error!("HTTP API server failed: {}", e);
            }
        })
    });

    info!("Press Ctrl+C to exit");

    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            info!("Received shutdown signal");
        }
        Err(e) => {
            error!("Failed to listen for shutdown signal: {}", e);
        }
    }

    if let Some(task) = api_task {
        let _ = shutdown_tx.send(());
        if let Err(e) = task.await {
            error!("HTTP API task failed: {}", e);
        }
    }

    poller.abort();
    if engine.sender().send(EngineMessage::Shutdown).is_ok() {
        engine_task.await.context("Engine task failed")?;
    }

    info!("matrixd shutdown complete");

    Ok(())
}

fn init_tracing(logging: &LoggingConfig) {
    let mut targets = Targets::new().with_default(LevelFilter::from(logging.level));
    for (target, level) in &logging.overrides {
        targets = targets.with_target(target.clone(), LevelFilter::from(*level));
    }

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(targets)
        .init();
}
