// SPDX-License-Identifier: GPL-3.0-only
mod config;
mod logging;
mod shutdown;
mod storage;
mod utils;
mod watcher;

#[cfg(test)]
mod test_helpers;

use anyhow::Context;
use clap::Parser;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use config::{build_specs, Cli, Config};
use logging::{setup_logging, LogFormat};
use shutdown::ShutdownSignal;
use storage::{LoggingDeleter, MinioClient};
use watcher::{NotifyBackend, WatchCoordinator};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let mut config = Config::load(cli.config.as_deref())?;
    config.apply_cli(&cli);

    // Initialize logging
    setup_logging(&config.log_level, LogFormat::parse(&config.log_format)?)?;

    info!("Starting minio-backup-sidecar v{}", env!("CARGO_PKG_VERSION"));

    // Initialize object storage
    let client = MinioClient::connect(&config.minio)
        .await
        .context("unable to initialize minio")?;
    info!(bucket = %client.bucket(), "Storage initialized");

    let specs = build_specs(&config).context("unable to initialize fs")?;
    info!(paths = specs.len(), "Loaded watch specs");

    let cancel = CancellationToken::new();
    let signal_task = ShutdownSignal::spawn(cancel.clone());

    let coordinator = WatchCoordinator::new(
        Arc::new(NotifyBackend::new()),
        Arc::new(client),
        Arc::new(LoggingDeleter),
    );
    coordinator.run(specs, cancel.clone()).await;

    // Stop listening for signals once every watcher is done
    cancel.cancel();
    if let Err(e) = signal_task.await {
        debug!(error = %e, "Signal task ended abnormally");
    }

    info!("Shutdown complete");
    Ok(())
}
