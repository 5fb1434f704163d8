// SPDX-License-Identifier: GPL-3.0-only
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Where an uploaded file lands in the bucket
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Destination {
    /// Object name; empty means "use the local file name"
    #[serde(default)]
    pub name: String,

    /// Object prefix inside the bucket; empty means bucket root
    #[serde(default)]
    pub path: String,

    /// Content type; empty means guess from the extension
    #[serde(default, rename = "type")]
    pub content_type: String,
}

impl Destination {
    /// Object key for `file`: `{path}/{name}`, or just `{name}` when path is empty.
    pub fn object_key(&self, file: &Path) -> String {
        let name = if self.name.is_empty() {
            file.file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default()
        } else {
            self.name.clone()
        };

        let prefix = self.path.trim_matches('/');
        let name = name.trim_start_matches('/');
        if prefix.is_empty() {
            name.to_string()
        } else {
            format!("{}/{}", prefix, name)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadReceipt {
    pub key: String,
    pub size: u64,
}

#[derive(thiserror::Error, Debug)]
pub enum StorageError {
    #[error("{0} must be set")]
    MissingSetting(&'static str),

    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("unable to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unable to put {key}: {status} - {body}")]
    PutObject {
        key: String,
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("unable to create bucket {bucket}: {status} - {body}")]
    CreateBucket {
        bucket: String,
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("unable to set retention policy: {status} - {body}")]
    Lifecycle {
        status: reqwest::StatusCode,
        body: String,
    },
}

#[async_trait]
pub trait Uploader: Send + Sync {
    /// Upload a local file to the object named by `destination`
    async fn upload(&self, file: &Path, destination: &Destination) -> Result<UploadReceipt, StorageError>;
}

#[async_trait]
pub trait RemoteDeleter: Send + Sync {
    /// Remove the remote copy of a local file that was deleted
    async fn delete(&self, file: &Path) -> anyhow::Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_object_key_name_only() {
        let dest = Destination {
            name: "backup.tar".to_string(),
            ..Default::default()
        };
        assert_eq!(dest.object_key(&PathBuf::from("/data/a.txt")), "backup.tar");
    }

    #[test]
    fn test_object_key_with_path() {
        let dest = Destination {
            name: "backup.tar".to_string(),
            path: "nightly".to_string(),
            ..Default::default()
        };
        assert_eq!(dest.object_key(&PathBuf::from("/data/a.txt")), "nightly/backup.tar");
    }

    #[test]
    fn test_object_key_falls_back_to_file_name() {
        let dest = Destination {
            path: "/data/".to_string(),
            ..Default::default()
        };
        assert_eq!(dest.object_key(&PathBuf::from("/data/a.txt")), "data/a.txt");
    }

    #[test]
    fn test_object_key_empty_destination() {
        let dest = Destination::default();
        assert_eq!(dest.object_key(&PathBuf::from("/var/log/app.log")), "app.log");
    }

    #[test]
    fn test_destination_from_toml() {
        let dest: Destination = toml::from_str(
            r#"
name = "db.sql"
path = "dumps"
type = "application/sql"
"#,
        )
        .unwrap();
        assert_eq!(dest.name, "db.sql");
        assert_eq!(dest.path, "dumps");
        assert_eq!(dest.content_type, "application/sql");
    }
}
