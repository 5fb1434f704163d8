// SPDX-License-Identifier: GPL-3.0-only
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::config::WatchSpec;
use crate::utils::{is_dir, recursive_dir_list, ListError};
use crate::watcher::debounce::{ActionHandler, ActionKind, DebounceTable};
use crate::watcher::traits::{EventKind, FsEvent, WatchBackend, WatchError, WatchHandle};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatcherState {
    Starting,
    Watching,
    Stopping,
    Stopped,
}

enum Flow {
    Continue,
    Stop,
}

/// Runs one continuous watch spec from start to teardown
pub struct PathWatcher {
    spec: Arc<WatchSpec>,
    backend: Arc<dyn WatchBackend>,
    handler: Arc<dyn ActionHandler>,
    cancel: CancellationToken,
    state: WatcherState,
}

impl PathWatcher {
    /// `cancel` should be a child of the coordinator's token; the watcher
    /// cancels it itself when it runs out of directories to watch.
    pub fn new(
        spec: Arc<WatchSpec>,
        backend: Arc<dyn WatchBackend>,
        handler: Arc<dyn ActionHandler>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            spec,
            backend,
            handler,
            cancel,
            state: WatcherState::Starting,
        }
    }

    pub fn state(&self) -> WatcherState {
        self.state
    }

    fn transition(&mut self, state: WatcherState) {
        debug!(path = %self.spec.path.display(), from = ?self.state, to = ?state, "Watcher state change");
        self.state = state;
    }

    /// Watch until cancelled, until no watched directory is left, or until
    /// the low-level handle goes away.
    ///
    /// Errors are setup failures; the watcher is `Stopped` when this returns.
    pub async fn run(&mut self) -> Result<(), WatchError> {
        if !self.spec.watch {
            self.transition(WatcherState::Stopped);
            return Err(WatchError::NotWatched(self.spec.path.clone()));
        }

        let (mut handle, mut streams) = match self.backend.open() {
            Ok(opened) => opened,
            Err(e) => {
                self.transition(WatcherState::Stopped);
                return Err(e);
            }
        };

        let table = DebounceTable::new(self.spec.wait, Arc::clone(&self.handler), self.cancel.clone());

        let dirs = if self.spec.recursive {
            list_subtree(self.spec.path.clone()).await
        } else {
            vec![self.spec.path.clone()]
        };
        register(handle.as_mut(), &dirs);

        if handle.watch_count() == 0 {
            self.stop(handle.as_mut(), &table);
            return Err(WatchError::NothingWatched(self.spec.path.clone()));
        }

        info!(
            path = %self.spec.path.display(),
            dirs = handle.watch_count(),
            recursive = self.spec.recursive,
            "Watching path"
        );
        debug!(dirs = ?handle.watched(), "Watched directories");
        self.transition(WatcherState::Watching);

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    debug!(path = %self.spec.path.display(), "Watcher cancelled");
                    break;
                }
                event = streams.events.recv() => match event {
                    Some(event) => {
                        if let Flow::Stop = self.handle_event(handle.as_mut(), &table, event).await {
                            info!(path = %self.spec.path.display(), "No directories left to watch");
                            break;
                        }
                    }
                    None => {
                        warn!(path = %self.spec.path.display(), "Event channel closed");
                        break;
                    }
                },
                err = streams.errors.recv() => match err {
                    Some(e) => error!(path = %self.spec.path.display(), error = %e, "Watcher error"),
                    None => {
                        warn!(path = %self.spec.path.display(), "Error channel closed");
                        break;
                    }
                },
            }
        }

        self.stop(handle.as_mut(), &table);
        Ok(())
    }

    async fn handle_event(&self, handle: &mut dyn WatchHandle, table: &DebounceTable, event: FsEvent) -> Flow {
        debug!(path = %event.path.display(), kinds = ?event.kinds, "Received event");

        if event.kinds.contains(EventKind::Create) && is_dir(&event.path).unwrap_or(false) {
            if self.spec.recursive {
                let dirs = list_subtree(event.path.clone()).await;
                register(handle, &dirs);
            } else {
                debug!(path = %event.path.display(), "Ignoring new directory");
            }
        } else {
            for kind in event.kinds.iter() {
                if self.spec.events.contains(kind) {
                    table.record(ActionKind::for_event(kind), event.path.clone());
                }
            }
            trace!(pending = table.len(), "Pending actions");
        }

        if event.kinds.contains(EventKind::Remove) && handle.watch_count() == 0 {
            return Flow::Stop;
        }
        Flow::Continue
    }

    fn stop(&mut self, handle: &mut dyn WatchHandle, table: &DebounceTable) {
        self.transition(WatcherState::Stopping);
        self.cancel.cancel();
        if !table.is_empty() {
            debug!(pending = table.len(), "Dropping pending actions");
        }
        table.shutdown();
        handle.close();
        self.transition(WatcherState::Stopped);
        info!(path = %self.spec.path.display(), "Stopped watching path");
    }
}

fn register(handle: &mut dyn WatchHandle, dirs: &[PathBuf]) {
    for dir in dirs {
        if let Err(e) = handle.add(dir) {
            error!(path = %dir.display(), error = %e, "Unable to watch directory");
        }
    }
}

/// `root` and every directory below it; a failed walk still yields what it found
async fn list_subtree(root: PathBuf) -> Vec<PathBuf> {
    let walk_root = root.clone();
    match tokio::task::spawn_blocking(move || recursive_dir_list(&walk_root)).await {
        Ok(Ok(dirs)) => dirs,
        Ok(Err(ListError { found, source })) => {
            error!(path = %root.display(), error = %source, found = found.len(), "Unable to list directories");
            found
        }
        Err(e) => {
            error!(path = %root.display(), error = %e, "Directory listing task failed");
            Vec::new()
        }
    }
}
