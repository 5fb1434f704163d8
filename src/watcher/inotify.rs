// SPDX-License-Identifier: GPL-3.0-only
use notify::event::{AccessKind, AccessMode, ModifyKind, RenameMode};
use notify::{Config, RecommendedWatcher, RecursiveMode, Watcher as NotifyWatcher};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc;
use tracing::{debug, info, trace};

use crate::watcher::traits::{
    EventKind, EventMask, FsEvent, WatchBackend, WatchError, WatchHandle, WatchStreams,
};

const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

type WatchSet = Arc<Mutex<HashSet<PathBuf>>>;

fn lock(set: &WatchSet) -> MutexGuard<'_, HashSet<PathBuf>> {
    set.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Opens OS-native (inotify on Linux) watches through `notify`
pub struct NotifyBackend {
    channel_capacity: usize,
}

impl NotifyBackend {
    pub fn new() -> Self {
        Self {
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

impl Default for NotifyBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl WatchBackend for NotifyBackend {
    fn open(&self) -> Result<(Box<dyn WatchHandle>, WatchStreams), WatchError> {
        let (event_tx, event_rx) = mpsc::channel(self.channel_capacity);
        let (error_tx, error_rx) = mpsc::channel(self.channel_capacity);

        let watched: WatchSet = Arc::new(Mutex::new(HashSet::new()));
        let watched_clone = Arc::clone(&watched);

        let watcher = RecommendedWatcher::new(
            move |event| {
                handle_static_event(&event_tx, &error_tx, &watched_clone, event);
            },
            Config::default(),
        )
        .map_err(WatchError::Init)?;

        let handle = NotifyHandle {
            watcher: Some(watcher),
            watched,
        };

        Ok((
            Box::new(handle),
            WatchStreams {
                events: event_rx,
                errors: error_rx,
            },
        ))
    }
}

/// Map a notify event kind onto the kinds actions can be bound to
pub fn event_kinds(kind: &notify::EventKind) -> EventMask {
    use notify::EventKind as N;

    match kind {
        N::Create(_) => EventMask::empty().with(EventKind::Create),
        // a file moved into a watched directory is new to us
        N::Modify(ModifyKind::Name(RenameMode::To)) => EventMask::empty().with(EventKind::Create),
        N::Modify(ModifyKind::Data(_)) | N::Modify(ModifyKind::Any) => {
            EventMask::empty().with(EventKind::Write)
        }
        N::Access(AccessKind::Close(AccessMode::Write)) => EventMask::empty().with(EventKind::Write),
        N::Remove(_) => EventMask::empty().with(EventKind::Remove),
        _ => EventMask::empty(),
    }
}

// Runs on notify's own thread, so blocking sends are fine here
fn handle_static_event(
    event_tx: &mpsc::Sender<FsEvent>,
    error_tx: &mpsc::Sender<WatchError>,
    watched: &WatchSet,
    event: notify::Result<notify::Event>,
) {
    match event {
        Ok(event) => {
            let kinds = event_kinds(&event.kind);
            if kinds.is_empty() {
                trace!(kind = ?event.kind, "Ignoring watcher event");
                return;
            }

            for path in event.paths {
                if kinds.contains(EventKind::Remove) && lock(watched).remove(&path) {
                    debug!(path = %path.display(), "Watched directory removed");
                }
                if event_tx.blocking_send(FsEvent::new(path, kinds)).is_err() {
                    trace!("Event receiver closed");
                    return;
                }
            }
        }
        Err(e) => {
            let _ = error_tx.blocking_send(WatchError::Backend(e));
        }
    }
}

pub struct NotifyHandle {
    watcher: Option<RecommendedWatcher>,
    watched: WatchSet,
}

impl WatchHandle for NotifyHandle {
    fn add(&mut self, dir: &Path) -> Result<(), WatchError> {
        let watcher = self.watcher.as_mut().ok_or_else(|| WatchError::Add {
            path: dir.to_path_buf(),
            source: notify::Error::generic("watcher closed"),
        })?;

        watcher
            .watch(dir, RecursiveMode::NonRecursive)
            .map_err(|source| WatchError::Add {
                path: dir.to_path_buf(),
                source,
            })?;

        lock(&self.watched).insert(dir.to_path_buf());
        debug!(path = %dir.display(), "Started watching directory");
        Ok(())
    }

    fn watch_count(&self) -> usize {
        lock(&self.watched).len()
    }

    fn watched(&self) -> Vec<PathBuf> {
        let mut dirs: Vec<PathBuf> = lock(&self.watched).iter().cloned().collect();
        dirs.sort();
        dirs
    }

    fn close(&mut self) {
        // Dropping the watcher stops its event thread, which closes the streams
        if let Some(watcher) = self.watcher.take() {
            drop(watcher);
            lock(&self.watched).clear();
            info!("Stopped watching");
        }
    }
}

impl Drop for NotifyHandle {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, DataChange, MetadataKind, RemoveKind};
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn test_event_kinds_mapping() {
        use notify::EventKind as N;

        assert!(event_kinds(&N::Create(CreateKind::File)).contains(EventKind::Create));
        assert!(event_kinds(&N::Modify(ModifyKind::Data(DataChange::Content))).contains(EventKind::Write));
        assert!(event_kinds(&N::Access(AccessKind::Close(AccessMode::Write))).contains(EventKind::Write));
        assert!(event_kinds(&N::Modify(ModifyKind::Name(RenameMode::To))).contains(EventKind::Create));
        assert!(event_kinds(&N::Remove(RemoveKind::File)).contains(EventKind::Remove));
        assert!(event_kinds(&N::Modify(ModifyKind::Metadata(MetadataKind::Permissions))).is_empty());
        assert!(event_kinds(&N::Access(AccessKind::Read)).is_empty());
    }

    #[test]
    fn test_add_and_close() {
        let temp_dir = TempDir::new().unwrap();
        let (mut handle, _streams) = NotifyBackend::new().open().unwrap();

        handle.add(temp_dir.path()).unwrap();
        assert_eq!(handle.watch_count(), 1);
        assert_eq!(handle.watched(), vec![temp_dir.path().to_path_buf()]);

        handle.close();
        assert_eq!(handle.watch_count(), 0);
        assert!(handle.add(temp_dir.path()).is_err());
    }

    #[test]
    fn test_add_missing_directory_fails() {
        let temp_dir = TempDir::new().unwrap();
        let (mut handle, _streams) = NotifyBackend::new().open().unwrap();

        assert!(handle.add(&temp_dir.path().join("missing")).is_err());
        assert_eq!(handle.watch_count(), 0);
    }

    #[tokio::test]
    async fn test_reports_file_creation() {
        let temp_dir = TempDir::new().unwrap();
        let (mut handle, mut streams) = NotifyBackend::new().open().unwrap();
        handle.add(temp_dir.path()).unwrap();

        let file = temp_dir.path().join("new.txt");
        std::fs::write(&file, "data").unwrap();

        let event = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let event = streams.events.recv().await.unwrap();
                if event.path == file && event.kinds.contains(EventKind::Create) {
                    return event;
                }
            }
        })
        .await
        .unwrap();
        assert_eq!(event.path, file);
    }

    #[tokio::test]
    async fn test_streams_close_after_close() {
        let temp_dir = TempDir::new().unwrap();
        let (mut handle, mut streams) = NotifyBackend::new().open().unwrap();
        handle.add(temp_dir.path()).unwrap();

        handle.close();

        let closed = tokio::time::timeout(Duration::from_secs(5), async {
            while streams.events.recv().await.is_some() {}
        })
        .await;
        assert!(closed.is_ok());
    }
}
