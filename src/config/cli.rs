// SPDX-License-Identifier: GPL-3.0-only
use clap::Parser;
use std::path::PathBuf;

/// Command-line flags. Every flag is optional and overrides the value from
/// the config file and environment.
#[derive(Debug, Clone, Default, Parser)]
#[command(
    name = "minio-backup-sidecar",
    version,
    about = "Watch files and directories and upload changes to a MinIO bucket",
    long_about = None
)]
pub struct Cli {
    /// Path to the config file (TOML)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Logging level (trace, debug, info, warn, error)
    #[arg(short = 'v', long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Log line format (text, json)
    #[arg(long = "log-format", value_name = "FORMAT")]
    pub log_format: Option<String>,

    /// Hostname of MinIO endpoint
    #[arg(long = "minio.endpoint", value_name = "HOST[:PORT]")]
    pub minio_endpoint: Option<String>,

    /// MinIO access key ID
    #[arg(long = "minio.access-key-id", value_name = "ID")]
    pub minio_access_key_id: Option<String>,

    /// MinIO access key secret
    #[arg(long = "minio.access-key-secret", value_name = "SECRET")]
    pub minio_access_key_secret: Option<String>,

    /// MinIO region
    #[arg(long = "minio.region", value_name = "REGION")]
    pub minio_region: Option<String>,

    /// MinIO bucket name
    #[arg(long = "minio.bucket", value_name = "BUCKET")]
    pub minio_bucket: Option<String>,

    /// Set bucket lifecycle expiration in days
    #[arg(long = "minio.retention", value_name = "DAYS")]
    pub minio_retention: Option<u32>,

    /// Use TLS for the MinIO client
    #[arg(long = "minio.secure", value_name = "BOOL", num_args = 0..=1, require_equals = true, default_missing_value = "true")]
    pub minio_secure: Option<bool>,

    /// Watch paths for changes instead of uploading once
    #[arg(short = 'w', long, value_name = "BOOL", num_args = 0..=1, require_equals = true, default_missing_value = "true")]
    pub watch: Option<bool>,

    /// Watch directory paths recursively
    #[arg(short = 'r', long, value_name = "BOOL", num_args = 0..=1, require_equals = true, default_missing_value = "true")]
    pub recursive: Option<bool>,

    /// Path to watch (repeatable)
    #[arg(long = "path", value_name = "PATH")]
    pub path: Vec<PathBuf>,

    /// Events to watch: create, write, remove (repeatable)
    #[arg(long = "watch-events", value_name = "EVENT")]
    pub watch_events: Vec<String>,

    /// Delete local files after a successful upload
    #[arg(long = "delete-on-success", value_name = "BOOL", num_args = 0..=1, require_equals = true, default_missing_value = "true")]
    pub delete_on_success: Option<bool>,

    /// Seconds without further events before a changed file is uploaded
    #[arg(long = "wait-time", value_name = "SECONDS")]
    pub wait_time: Option<u64>,

    /// Object name in bucket
    #[arg(long = "destination.name", value_name = "NAME")]
    pub destination_name: Option<String>,

    /// Object path in bucket
    #[arg(long = "destination.path", value_name = "PREFIX")]
    pub destination_path: Option<String>,

    /// Object MIME type
    #[arg(long = "destination.type", value_name = "MIME")]
    pub destination_type: Option<String>,

    /// Additional paths to watch
    #[arg(value_name = "PATHS")]
    pub paths: Vec<PathBuf>,
}

impl Cli {
    /// All paths given on the command line, flags first
    pub fn all_paths(&self) -> Vec<PathBuf> {
        self.path.iter().chain(self.paths.iter()).cloned().collect()
    }
}
