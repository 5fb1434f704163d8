// SPDX-License-Identifier: GPL-3.0-only
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::config::WatchSpec;
use crate::storage::ActionRunner;
use crate::utils::file_list;

/// Upload the current contents of a one-shot spec's path once.
///
/// A directory is not descended into. Stops offering files once `cancel`
/// fires; an upload already in flight is allowed to finish.
pub async fn scan_once(spec: &WatchSpec, runner: &ActionRunner, cancel: &CancellationToken) {
    let files = match file_list(&spec.path) {
        Ok(files) => files,
        Err(e) => {
            error!(path = %spec.path.display(), error = %e, "Unable to list files");
            return;
        }
    };

    debug!(path = %spec.path.display(), count = files.len(), "Uploading files once");

    let mut uploaded = 0;
    for file in &files {
        if cancel.is_cancelled() {
            info!(path = %spec.path.display(), "Scan cancelled");
            return;
        }
        if runner.upload(file).await {
            uploaded += 1;
        }
    }

    info!(path = %spec.path.display(), uploaded, total = files.len(), "Finished scan");
}
