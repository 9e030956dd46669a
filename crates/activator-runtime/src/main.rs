//! # Validator Activator
//!
//! Funds, registers and supervises a Nimiq validator, exposing its state as
//! Prometheus metrics.
//!
//! ```text
//! validator-activator --node-url http://node:8648 --network testnet
//! ```

use activator_runtime::{
    spawn_metrics_server, ActivatorArgs, ActivatorConfig, ActivatorRuntime,
};
use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::watch;
use tracing::{error, info};
use validator_telemetry::{init_telemetry, TelemetryConfig};

#[tokio::main]
async fn main() -> Result<()> {
    let args = ActivatorArgs::parse();
    let config = ActivatorConfig::try_from(args).context("Invalid configuration")?;

    let mut telemetry_config = TelemetryConfig::from_env();
    telemetry_config.network = config.network.as_str().to_string();
    let _telemetry = init_telemetry(telemetry_config)
        .await
        .context("Failed to initialize telemetry")?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        metrics_port = config.metrics_addr.port(),
        "Starting Nimiq validator activator"
    );

    let (_, _metrics_server) = spawn_metrics_server(config.metrics_addr)
        .await
        .context("Failed to start metrics server")?;

    let runtime = ActivatorRuntime::new(config)?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        wait_for_signal().await;
        if shutdown_tx.send(true).is_err() {
            error!("Failed to send shutdown signal");
        }
    });

    if let Err(e) = runtime.run(shutdown_rx).await {
        error!(error = %e, "Validator activator stopped");
        return Err(e.into());
    }

    info!("Shutdown complete");
    Ok(())
}

async fn wait_for_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(e) => {
                error!(error = %e, "Cannot listen for SIGTERM");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }

    info!("Shutdown signal received");
}
