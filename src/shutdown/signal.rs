// SPDX-License-Identifier: GPL-3.0-only
use std::future::Future;
use std::io;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Turns the first termination request into cancellation of the root scope
pub struct ShutdownSignal;

impl ShutdownSignal {
    /// Listen for SIGINT/SIGTERM (Ctrl+C elsewhere) in the background.
    ///
    /// The task ends after the first signal, or as soon as `cancel` is
    /// cancelled by someone else.
    pub fn spawn(cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(cancel_on(cancel, terminate()))
    }
}

/// Cancel `cancel` once `signal` resolves
pub async fn cancel_on<F>(cancel: CancellationToken, signal: F)
where
    F: Future<Output = io::Result<&'static str>>,
{
    tokio::select! {
        _ = cancel.cancelled() => {}
        received = signal => match received {
            Ok(name) => {
                info!(signal = name, "Received shutdown signal");
                cancel.cancel();
            }
            Err(e) => error!(error = %e, "Unable to listen for shutdown signal"),
        },
    }
}

#[cfg(unix)]
async fn terminate() -> io::Result<&'static str> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut terminate = signal(SignalKind::terminate())?;

    tokio::select! {
        _ = interrupt.recv() => Ok("SIGINT"),
        _ = terminate.recv() => Ok("SIGTERM"),
    }
}

#[cfg(not(unix))]
async fn terminate() -> io::Result<&'static str> {
    tokio::signal::ctrl_c().await?;
    Ok("ctrl-c")
}
