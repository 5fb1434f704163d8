// SPDX-License-Identifier: GPL-3.0-only
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{error, warn};

use crate::config::config::{Config, DestinationOverrides, FileEntry};
use crate::storage::Destination;
use crate::utils::{is_dir, DirError};
use crate::watcher::traits::{EventKind, EventMask};

/// One validated path to upload from, either continuously or once
#[derive(Debug, Clone, PartialEq)]
pub struct WatchSpec {
    pub path: PathBuf,
    /// Watch continuously (true) or scan once (false)
    pub watch: bool,
    pub recursive: bool,
    pub events: EventMask,
    pub delete_on_success: bool,
    /// Quiet period before a debounced action fires
    pub wait: Duration,
    pub destination: Destination,
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("no paths found")]
    NoPaths,

    #[error("unable to parse event {0}")]
    InvalidEvent(String),

    #[error(transparent)]
    Path(#[from] DirError),

    #[error("cannot recursively watch non-directory file: {}", .0.display())]
    RecursiveNonDirectory(PathBuf),

    #[error("cannot set watch without any events: {}", .0.display())]
    NoEvents(PathBuf),

    #[error("cannot watch remove/delete events with delete-on-success: {}", .0.display())]
    DeleteWithRemove(PathBuf),
}

/// Parse event names case-insensitively into a mask
pub fn parse_events<S: AsRef<str>>(names: &[S]) -> Result<EventMask, ConfigError> {
    names
        .iter()
        .map(|name| EventKind::parse(name.as_ref()).ok_or_else(|| ConfigError::InvalidEvent(name.as_ref().to_string())))
        .collect()
}

struct Candidate {
    spec: WatchSpec,
    is_dir: bool,
}

impl Candidate {
    /// Stat `path` and seed a spec from the global settings
    fn new(path: &Path, config: &Config) -> Result<Self, ConfigError> {
        let is_dir = is_dir(path)?;

        let destination = if is_dir {
            Destination {
                path: path.to_string_lossy().into_owned(),
                ..Default::default()
            }
        } else {
            Destination {
                name: path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default(),
                path: path
                    .parent()
                    .map(|p| p.to_string_lossy().into_owned())
                    .unwrap_or_default(),
                ..Default::default()
            }
        };

        Ok(Self {
            spec: WatchSpec {
                path: path.to_path_buf(),
                watch: config.watch,
                recursive: config.recursive,
                events: parse_events(&config.watch_events)?,
                delete_on_success: config.delete_on_success,
                wait: Duration::from_secs(config.wait_time),
                destination,
            },
            is_dir,
        })
    }

    fn apply_entry(&mut self, entry: &FileEntry) -> Result<(), ConfigError> {
        if let Some(val) = entry.watch {
            self.spec.watch = val;
        }
        if let Some(val) = entry.recursive {
            self.spec.recursive = val;
        }
        if let Some(ref val) = entry.events {
            self.spec.events = parse_events(val)?;
        }
        if let Some(val) = entry.delete_on_success {
            self.spec.delete_on_success = val;
        }
        if let Some(val) = entry.wait_time {
            self.spec.wait = Duration::from_secs(val);
        }
        self.apply_destination(&entry.destination);
        Ok(())
    }

    fn apply_destination(&mut self, overrides: &DestinationOverrides) {
        if let Some(ref name) = overrides.name {
            if self.is_dir {
                warn!(
                    path = %self.spec.path.display(),
                    "Setting destination.name for a directory may result in files being overwritten"
                );
            }
            self.spec.destination.name = name.clone();
        }
        if let Some(ref path) = overrides.path {
            self.spec.destination.path = path.clone();
        }
        if let Some(ref content_type) = overrides.content_type {
            self.spec.destination.content_type = content_type.clone();
        }
    }

    fn validate(mut self) -> Result<WatchSpec, ConfigError> {
        let spec = &mut self.spec;

        if spec.watch {
            if !self.is_dir && spec.recursive {
                return Err(ConfigError::RecursiveNonDirectory(spec.path.clone()));
            }
            if spec.events.is_empty() {
                return Err(ConfigError::NoEvents(spec.path.clone()));
            }
        } else {
            spec.recursive = false;
            spec.delete_on_success = false;
            spec.events = EventMask::empty();
        }

        if spec.delete_on_success && spec.events.contains(EventKind::Remove) {
            return Err(ConfigError::DeleteWithRemove(spec.path.clone()));
        }

        Ok(self.spec)
    }
}

/// Build the watch specs for every configured path.
///
/// A path that cannot be stat'ed, or whose event list does not parse, is
/// logged and skipped. A spec that fails validation fails the whole config.
pub fn build_specs(config: &Config) -> Result<Vec<WatchSpec>, ConfigError> {
    let mut candidates = Vec::new();

    for path in &config.path {
        match Candidate::new(path, config) {
            Ok(mut candidate) => {
                if !config.destination.is_empty() {
                    candidate.apply_destination(&config.destination);
                }
                candidates.push(candidate);
            }
            Err(e) => error!(path = %path.display(), error = %e, "Error processing path"),
        }
    }

    for entry in &config.files {
        let candidate = Candidate::new(&entry.path, config).and_then(|mut candidate| {
            candidate.apply_entry(entry)?;
            Ok(candidate)
        });
        match candidate {
            Ok(candidate) => candidates.push(candidate),
            Err(e) => error!(path = %entry.path.display(), error = %e, "Error processing path"),
        }
    }

    if candidates.is_empty() {
        return Err(ConfigError::NoPaths);
    }

    candidates.into_iter().map(Candidate::validate).collect()
}
