// SPDX-License-Identifier: GPL-3.0-only
use async_trait::async_trait;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::config::WatchSpec;
use crate::storage::{Destination, StorageError, UploadReceipt, Uploader};
use crate::watcher::debounce::{ActionHandler, ActionKind};
use crate::watcher::traits::{
    EventKind, EventMask, FsEvent, WatchBackend, WatchError, WatchHandle, WatchStreams,
};

/// Create a temporary directory for tests
pub fn create_temp_dir() -> tempfile::TempDir {
    tempfile::TempDir::new().expect("Failed to create temp directory")
}

/// A continuous, non-recursive watch on `path` for Create and Write with a 2s wait
pub fn watch_spec(path: impl Into<PathBuf>) -> WatchSpec {
    let path = path.into();
    WatchSpec {
        destination: Destination {
            path: path.to_string_lossy().into_owned(),
            ..Default::default()
        },
        path,
        watch: true,
        recursive: false,
        events: EventMask::empty().with(EventKind::Create).with(EventKind::Write),
        delete_on_success: false,
        wait: Duration::from_secs(2),
    }
}

/// Uploader that records every call and never touches the network
#[derive(Default)]
pub struct RecordingUploader {
    uploads: Mutex<Vec<PathBuf>>,
    fail: bool,
}

impl RecordingUploader {
    pub fn new() -> Self {
        Self::default()
    }

    /// An uploader whose every upload fails
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn uploads(&self) -> Vec<PathBuf> {
        self.uploads.lock().unwrap().clone()
    }
}

#[async_trait]
impl Uploader for RecordingUploader {
    async fn upload(&self, file: &Path, destination: &Destination) -> Result<UploadReceipt, StorageError> {
        self.uploads.lock().unwrap().push(file.to_path_buf());

        let key = destination.object_key(file);
        if self.fail {
            return Err(StorageError::PutObject {
                key,
                status: reqwest::StatusCode::INTERNAL_SERVER_ERROR,
                body: "test failure".to_string(),
            });
        }
        Ok(UploadReceipt { key, size: 0 })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandledAction {
    pub kind: ActionKind,
    pub path: PathBuf,
    pub at: Instant,
}

/// Action handler that records what fired and when
#[derive(Default)]
pub struct RecordingHandler {
    calls: Mutex<Vec<HandledAction>>,
}

impl RecordingHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<HandledAction> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ActionHandler for RecordingHandler {
    async fn run(&self, kind: ActionKind, path: &Path) {
        self.calls.lock().unwrap().push(HandledAction {
            kind,
            path: path.to_path_buf(),
            at: Instant::now(),
        });
    }
}

#[derive(Default)]
struct FakeState {
    events_tx: Option<mpsc::Sender<FsEvent>>,
    errors_tx: Option<mpsc::Sender<WatchError>>,
    streams: Option<WatchStreams>,
    watched: HashSet<PathBuf>,
    added: Vec<PathBuf>,
    fail_add: HashSet<PathBuf>,
    fail_open: bool,
    closed: bool,
}

/// Scripted watch backend. Tests push events through [`FakeBackend::emit`]
/// and inspect which directories the watcher registered.
#[derive(Clone)]
pub struct FakeBackend {
    state: Arc<Mutex<FakeState>>,
}

impl FakeBackend {
    pub fn new() -> Self {
        let (events_tx, events) = mpsc::channel(64);
        let (errors_tx, errors) = mpsc::channel(64);
        let state = FakeState {
            events_tx: Some(events_tx),
            errors_tx: Some(errors_tx),
            streams: Some(WatchStreams { events, errors }),
            ..Default::default()
        };
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    pub fn failing_open() -> Self {
        let backend = Self::new();
        backend.state.lock().unwrap().fail_open = true;
        backend
    }

    pub fn fail_add(&self, dir: impl Into<PathBuf>) {
        self.state.lock().unwrap().fail_add.insert(dir.into());
    }

    /// Every successful registration, in order
    pub fn added(&self) -> Vec<PathBuf> {
        self.state.lock().unwrap().added.clone()
    }

    pub fn watched(&self) -> Vec<PathBuf> {
        let mut dirs: Vec<PathBuf> = self.state.lock().unwrap().watched.iter().cloned().collect();
        dirs.sort();
        dirs
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().unwrap().closed
    }

    /// Deliver an event. Remove events drop the path from the watch set
    /// first, the way a real handle does.
    pub async fn emit(&self, path: impl Into<PathBuf>, kinds: &[EventKind]) {
        let path = path.into();
        let kinds: EventMask = kinds.iter().copied().collect();
        let tx = {
            let mut state = self.state.lock().unwrap();
            if kinds.contains(EventKind::Remove) {
                state.watched.remove(&path);
            }
            state.events_tx.clone()
        };
        if let Some(tx) = tx {
            let _ = tx.send(FsEvent::new(path, kinds)).await;
        }
    }

    pub async fn send_error(&self, message: &str) {
        let tx = self.state.lock().unwrap().errors_tx.clone();
        if let Some(tx) = tx {
            let _ = tx.send(WatchError::Backend(notify::Error::generic(message))).await;
        }
    }

    /// Tear down both streams as if the OS handle went away
    pub fn close_streams(&self) {
        let mut state = self.state.lock().unwrap();
        state.events_tx = None;
        state.errors_tx = None;
    }
}

impl WatchBackend for FakeBackend {
    fn open(&self) -> Result<(Box<dyn WatchHandle>, WatchStreams), WatchError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_open {
            return Err(WatchError::Init(notify::Error::generic("open refused")));
        }
        let streams = state
            .streams
            .take()
            .ok_or_else(|| WatchError::Init(notify::Error::generic("already opened")))?;

        Ok((
            Box::new(FakeHandle {
                state: Arc::clone(&self.state),
            }),
            streams,
        ))
    }
}

struct FakeHandle {
    state: Arc<Mutex<FakeState>>,
}

impl WatchHandle for FakeHandle {
    fn add(&mut self, dir: &Path) -> Result<(), WatchError> {
        let mut state = self.state.lock().unwrap();
        if state.closed || state.fail_add.contains(dir) {
            return Err(WatchError::Add {
                path: dir.to_path_buf(),
                source: notify::Error::generic("add refused"),
            });
        }
        state.watched.insert(dir.to_path_buf());
        state.added.push(dir.to_path_buf());
        Ok(())
    }

    fn watch_count(&self) -> usize {
        self.state.lock().unwrap().watched.len()
    }

    fn watched(&self) -> Vec<PathBuf> {
        let mut dirs: Vec<PathBuf> = self.state.lock().unwrap().watched.iter().cloned().collect();
        dirs.sort();
        dirs
    }

    fn close(&mut self) {
        let mut state = self.state.lock().unwrap();
        state.closed = true;
        state.watched.clear();
        state.events_tx = None;
        state.errors_tx = None;
    }
}
