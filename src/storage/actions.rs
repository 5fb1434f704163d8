// SPDX-License-Identifier: GPL-3.0-only
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::config::WatchSpec;
use crate::storage::traits::{Destination, RemoteDeleter, Uploader};
use crate::watcher::debounce::{ActionHandler, ActionKind};

/// Remote deletion is not supported yet; the request is only logged.
#[derive(Debug, Default, Clone)]
pub struct LoggingDeleter;

#[async_trait]
impl RemoteDeleter for LoggingDeleter {
    async fn delete(&self, file: &Path) -> anyhow::Result<()> {
        info!(file = %file.display(), "Delete called but not yet implemented");
        Ok(())
    }
}

/// Runs the upload and delete actions for one watch spec
pub struct ActionRunner {
    uploader: Arc<dyn Uploader>,
    deleter: Arc<dyn RemoteDeleter>,
    destination: Destination,
    delete_on_success: bool,
}

impl ActionRunner {
    pub fn new(
        uploader: Arc<dyn Uploader>,
        deleter: Arc<dyn RemoteDeleter>,
        destination: Destination,
        delete_on_success: bool,
    ) -> Self {
        Self {
            uploader,
            deleter,
            destination,
            delete_on_success,
        }
    }

    pub fn for_spec(spec: &WatchSpec, uploader: Arc<dyn Uploader>, deleter: Arc<dyn RemoteDeleter>) -> Self {
        Self::new(uploader, deleter, spec.destination.clone(), spec.delete_on_success)
    }

    /// Upload `file`, removing the local copy afterwards when configured.
    ///
    /// Failures are logged and reported through the return value only.
    pub async fn upload(&self, file: &Path) -> bool {
        debug!(file = %file.display(), "Uploading file");

        match self.uploader.upload(file, &self.destination).await {
            Ok(receipt) => {
                debug!(file = %file.display(), key = %receipt.key, size = receipt.size, "Upload finished");
                if self.delete_on_success {
                    self.remove_local(file).await;
                }
                true
            }
            Err(e) => {
                error!(file = %file.display(), error = %e, "Failed upload");
                false
            }
        }
    }

    pub async fn delete(&self, file: &Path) {
        if let Err(e) = self.deleter.delete(file).await {
            error!(file = %file.display(), error = %e, "Failed delete");
        }
    }

    async fn remove_local(&self, file: &Path) {
        match tokio::fs::remove_file(file).await {
            Ok(()) => info!(file = %file.display(), "Deleted local file after upload"),
            Err(e) => warn!(file = %file.display(), error = %e, "Unable to delete local file after upload"),
        }
    }
}

#[async_trait]
impl ActionHandler for ActionRunner {
    async fn run(&self, kind: ActionKind, path: &Path) {
        match kind {
            ActionKind::Upload => {
                self.upload(path).await;
            }
            ActionKind::Delete => self.delete(path).await,
        }
    }
}
