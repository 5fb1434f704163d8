// SPDX-License-Identifier: GPL-3.0-only
pub mod coordinator;
pub mod debounce;
pub mod inotify;
pub mod path_watcher;
pub mod scan;
pub mod traits;

pub use coordinator::WatchCoordinator;
pub use inotify::NotifyBackend;
