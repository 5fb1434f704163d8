// SPDX-License-Identifier: GPL-3.0-only
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(thiserror::Error, Debug)]
pub enum DirError {
    #[error("unable to process path {}: {source}", .path.display())]
    Stat {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("not a directory: {}", .0.display())]
    NotADirectory(PathBuf),

    #[error("unable to process dir {}: {source}", .path.display())]
    ReadDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// A directory walk that stopped early. `found` holds every directory
/// discovered before the failure, in walk order.
#[derive(thiserror::Error, Debug)]
#[error("{source}")]
pub struct ListError {
    pub found: Vec<PathBuf>,
    #[source]
    pub source: DirError,
}

/// Returns whether `path` is a directory (following symlinks for the path itself)
pub fn is_dir(path: &Path) -> Result<bool, DirError> {
    let meta = std::fs::metadata(path).map_err(|source| DirError::Stat {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(meta.is_dir())
}

/// List `root` and every directory below it, depth-first, `root` first.
///
/// Symlinked directories below the root are not followed. If a directory
/// cannot be read the walk stops and the directories found so far are
/// returned inside the error.
pub fn recursive_dir_list(root: &Path) -> Result<Vec<PathBuf>, ListError> {
    let mut found = Vec::new();

    match is_dir(root) {
        Ok(true) => {}
        Ok(false) => {
            return Err(ListError {
                found,
                source: DirError::NotADirectory(root.to_path_buf()),
            });
        }
        Err(source) => return Err(ListError { found, source }),
    }

    match walk(root, &mut found) {
        Ok(()) => Ok(found),
        Err(source) => Err(ListError { found, source }),
    }
}

fn walk(dir: &Path, found: &mut Vec<PathBuf>) -> Result<(), DirError> {
    found.push(dir.to_path_buf());

    let entries = std::fs::read_dir(dir).map_err(|source| DirError::ReadDir {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut children = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| DirError::ReadDir {
            path: dir.to_path_buf(),
            source,
        })?;
        // DirEntry::file_type does not traverse symlinks
        let file_type = entry.file_type().map_err(|source| DirError::Stat {
            path: entry.path(),
            source,
        })?;
        if file_type.is_dir() {
            children.push(entry.path());
        }
    }
    children.sort();

    for child in children {
        walk(&child, found)?;
    }

    Ok(())
}

/// List the files to offer for a one-shot scan.
///
/// A file path yields itself. A directory yields its direct regular-file
/// children only; subdirectories are neither returned nor descended into.
pub fn file_list(path: &Path) -> Result<Vec<PathBuf>, DirError> {
    if !is_dir(path)? {
        return Ok(vec![path.to_path_buf()]);
    }

    let entries = std::fs::read_dir(path).map_err(|source| DirError::ReadDir {
        path: path.to_path_buf(),
        source,
    })?;

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| DirError::ReadDir {
            path: path.to_path_buf(),
            source,
        })?;
        let entry_path = entry.path();
        match std::fs::metadata(&entry_path) {
            Ok(meta) if meta.is_dir() => {}
            Ok(_) => files.push(entry_path),
            Err(e) => {
                debug!(path = %entry_path.display(), error = %e, "Skipping unreadable entry");
            }
        }
    }
    files.sort();

    Ok(files)
}
