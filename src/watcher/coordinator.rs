// SPDX-License-Identifier: GPL-3.0-only
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info};

use crate::config::WatchSpec;
use crate::storage::{ActionRunner, RemoteDeleter, Uploader};
use crate::watcher::path_watcher::PathWatcher;
use crate::watcher::scan::scan_once;
use crate::watcher::traits::WatchBackend;

/// Fans watch specs out to one task each and waits for all of them
pub struct WatchCoordinator {
    backend: Arc<dyn WatchBackend>,
    uploader: Arc<dyn Uploader>,
    deleter: Arc<dyn RemoteDeleter>,
    tracker: TaskTracker,
}

impl WatchCoordinator {
    pub fn new(
        backend: Arc<dyn WatchBackend>,
        uploader: Arc<dyn Uploader>,
        deleter: Arc<dyn RemoteDeleter>,
    ) -> Self {
        Self {
            backend,
            uploader,
            deleter,
            tracker: TaskTracker::new(),
        }
    }

    /// Start a [`PathWatcher`] for every continuous spec and a one-shot scan
    /// for every other spec, then wait until all of them have finished.
    ///
    /// Cancelling `cancel` stops every watcher; pending debounced actions are
    /// dropped rather than awaited.
    pub async fn run(self, specs: Vec<WatchSpec>, cancel: CancellationToken) {
        for spec in specs {
            let spec = Arc::new(spec);
            let runner = Arc::new(ActionRunner::for_spec(
                &spec,
                Arc::clone(&self.uploader),
                Arc::clone(&self.deleter),
            ));

            if spec.watch {
                let mut watcher = PathWatcher::new(
                    Arc::clone(&spec),
                    Arc::clone(&self.backend),
                    runner,
                    cancel.child_token(),
                );
                self.tracker.spawn(async move {
                    if let Err(e) = watcher.run().await {
                        error!(path = %spec.path.display(), error = %e, "Unable to watch path");
                    }
                    debug!(path = %spec.path.display(), state = ?watcher.state(), "Watcher finished");
                });
            } else {
                let cancel = cancel.clone();
                self.tracker.spawn(async move {
                    scan_once(&spec, &runner, &cancel).await;
                });
            }
        }

        info!(tasks = self.tracker.len(), "Waiting for watchers");
        self.tracker.close();
        self.tracker.wait().await;
        info!("All watchers finished");
    }
}
