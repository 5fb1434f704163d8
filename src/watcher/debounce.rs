// SPDX-License-Identifier: GPL-3.0-only
//! Per-watcher debouncing of filesystem actions.
//!
//! Every `(kind, path)` pair owns at most one pending timer. Recording the
//! same key again pushes its deadline out instead of arming a second timer,
//! so a burst of writes to one file produces a single upload once the file
//! has been quiet for the configured wait.
//!
//! Each timer is a tokio task that sleeps until its deadline, then takes the
//! table lock to either pick up a newer deadline or remove its own entry.
//! The action itself runs after the lock is released.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::task::AbortHandle;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::watcher::traits::EventKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    Upload,
    Delete,
}

impl ActionKind {
    /// Create and Write upload the file, Remove deletes it
    pub fn for_event(kind: EventKind) -> Self {
        match kind {
            EventKind::Create | EventKind::Write => ActionKind::Upload,
            EventKind::Remove => ActionKind::Delete,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ActionKey {
    pub kind: ActionKind,
    pub path: PathBuf,
}

#[async_trait]
pub trait ActionHandler: Send + Sync {
    async fn run(&self, kind: ActionKind, path: &Path);
}

struct Timer {
    deadline: Instant,
    task: AbortHandle,
}

type TimerMap = Arc<Mutex<HashMap<ActionKey, Timer>>>;

fn lock(timers: &TimerMap) -> MutexGuard<'_, HashMap<ActionKey, Timer>> {
    timers.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

pub struct DebounceTable {
    wait: Duration,
    handler: Arc<dyn ActionHandler>,
    timers: TimerMap,
    cancel: CancellationToken,
}

impl DebounceTable {
    /// Pending timers are dropped without firing once `cancel` is cancelled
    pub fn new(wait: Duration, handler: Arc<dyn ActionHandler>, cancel: CancellationToken) -> Self {
        Self {
            wait,
            handler,
            timers: Arc::new(Mutex::new(HashMap::new())),
            cancel,
        }
    }

    /// Arm the timer for `(kind, path)`, or push its deadline out if one is pending.
    ///
    /// Must be called from within a tokio runtime.
    pub fn record(&self, kind: ActionKind, path: PathBuf) {
        if self.cancel.is_cancelled() {
            return;
        }

        let deadline = deadline_after(self.wait);
        let key = ActionKey { kind, path };

        let mut timers = lock(&self.timers);
        if let Some(timer) = timers.get_mut(&key) {
            timer.deadline = deadline;
            trace!(kind = ?key.kind, path = %key.path.display(), "Timer reset");
            return;
        }

        debug!(kind = ?key.kind, path = %key.path.display(), "Created timer");
        let task = tokio::spawn(expire(
            Arc::clone(&self.timers),
            key.clone(),
            deadline,
            Arc::clone(&self.handler),
            self.cancel.clone(),
        ))
        .abort_handle();

        timers.insert(key, Timer { deadline, task });
    }

    /// Number of pending timers
    pub fn len(&self) -> usize {
        lock(&self.timers).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[cfg(test)]
    pub fn is_pending(&self, kind: ActionKind, path: &Path) -> bool {
        lock(&self.timers).contains_key(&ActionKey {
            kind,
            path: path.to_path_buf(),
        })
    }

    /// Stop and discard every pending timer without running its action
    pub fn shutdown(&self) {
        let drained: Vec<(ActionKey, Timer)> = lock(&self.timers).drain().collect();
        if !drained.is_empty() {
            debug!(count = drained.len(), "Discarding pending timers");
        }
        for (_, timer) in drained {
            timer.task.abort();
        }
    }
}

impl Drop for DebounceTable {
    fn drop(&mut self) {
        self.shutdown();
    }
}

// Longest wait honoured, about 30 years
const MAX_WAIT: Duration = Duration::from_secs(86400 * 365 * 30);

fn deadline_after(wait: Duration) -> Instant {
    Instant::now() + wait.min(MAX_WAIT)
}

async fn expire(
    timers: TimerMap,
    key: ActionKey,
    mut deadline: Instant,
    handler: Arc<dyn ActionHandler>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                lock(&timers).remove(&key);
                return;
            }
            _ = sleep_until(deadline) => {}
        }

        let next = {
            let mut timers = lock(&timers);
            match timers.get(&key).map(|t| t.deadline) {
                Some(newer) if newer > deadline => Some(newer),
                Some(_) => {
                    timers.remove(&key);
                    None
                }
                None => return,
            }
        };

        match next {
            Some(newer) => deadline = newer,
            None => break,
        }
    }

    trace!(kind = ?key.kind, path = %key.path.display(), "Timer complete");
    handler.run(key.kind, &key.path).await;
}
