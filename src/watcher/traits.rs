// SPDX-License-Identifier: GPL-3.0-only
use std::fmt;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc::Receiver;

/// Filesystem change kinds an action can be bound to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Create,
    Write,
    Remove,
}

impl EventKind {
    pub const ALL: [EventKind; 3] = [EventKind::Create, EventKind::Write, EventKind::Remove];

    /// Parse a configured event name; `update` and `delete` are accepted aliases
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "create" => Some(EventKind::Create),
            "write" | "update" => Some(EventKind::Write),
            "remove" | "delete" => Some(EventKind::Remove),
            _ => None,
        }
    }

    fn bit(self) -> u8 {
        match self {
            EventKind::Create => 0b001,
            EventKind::Write => 0b010,
            EventKind::Remove => 0b100,
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EventKind::Create => "create",
            EventKind::Write => "write",
            EventKind::Remove => "remove",
        };
        f.write_str(name)
    }
}

/// A set of [`EventKind`]s
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct EventMask(u8);

impl EventMask {
    pub const fn empty() -> Self {
        Self(0)
    }

    pub fn with(mut self, kind: EventKind) -> Self {
        self.insert(kind);
        self
    }

    pub fn insert(&mut self, kind: EventKind) {
        self.0 |= kind.bit();
    }

    pub fn contains(&self, kind: EventKind) -> bool {
        self.0 & kind.bit() != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = EventKind> {
        let mask = *self;
        EventKind::ALL.into_iter().filter(move |k| mask.contains(*k))
    }
}

impl FromIterator<EventKind> for EventMask {
    fn from_iter<I: IntoIterator<Item = EventKind>>(iter: I) -> Self {
        iter.into_iter().fold(EventMask::empty(), EventMask::with)
    }
}

impl fmt::Debug for EventMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

/// One low-level notification. A single notification may carry several kinds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FsEvent {
    pub path: PathBuf,
    pub kinds: EventMask,
}

impl FsEvent {
    pub fn new(path: impl Into<PathBuf>, kinds: EventMask) -> Self {
        Self {
            path: path.into(),
            kinds,
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum WatchError {
    #[error("unable to setup watcher: {0}")]
    Init(#[source] notify::Error),

    #[error("unable to watch {}: {source}", .path.display())]
    Add {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },

    #[error("watch error: {0}")]
    Backend(#[source] notify::Error),

    #[error("invalid watch spec for {}: watch is false", .0.display())]
    NotWatched(PathBuf),

    #[error("no directory under {} could be watched", .0.display())]
    NothingWatched(PathBuf),
}

/// Event and error channels of an open watch handle. Both close when the
/// handle is closed or torn down.
pub struct WatchStreams {
    pub events: Receiver<FsEvent>,
    pub errors: Receiver<WatchError>,
}

/// An open OS-level watch over a set of directories
pub trait WatchHandle: Send {
    /// Start watching a single directory (not its subdirectories)
    fn add(&mut self, dir: &Path) -> Result<(), WatchError>;

    /// Number of directories currently watched; shrinks when watched
    /// directories are reported removed
    fn watch_count(&self) -> usize;

    /// Currently watched directories
    fn watched(&self) -> Vec<PathBuf>;

    /// Stop watching everything
    fn close(&mut self);
}

pub trait WatchBackend: Send + Sync {
    /// Open a new, empty watch handle
    fn open(&self) -> Result<(Box<dyn WatchHandle>, WatchStreams), WatchError>;
}
