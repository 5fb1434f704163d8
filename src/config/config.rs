// SPDX-License-Identifier: GPL-3.0-only
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::config::cli::Cli;

/// Object storage connection settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct MinioSettings {
    /// Hostname (and optional port) of the MinIO endpoint
    #[serde(default)]
    pub endpoint: String,

    #[serde(default)]
    pub access_key_id: String,

    #[serde(default)]
    pub access_key_secret: String,

    #[serde(default)]
    pub region: Option<String>,

    #[serde(default)]
    pub bucket: String,

    /// Lifecycle expiration in days
    #[serde(default)]
    pub retention: Option<u32>,

    /// Use TLS
    #[serde(default = "default_true")]
    pub secure: bool,
}

impl Default for MinioSettings {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            access_key_id: String::new(),
            access_key_secret: String::new(),
            region: None,
            bucket: String::new(),
            retention: None,
            secure: true,
        }
    }
}

/// Destination fields that were explicitly configured
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DestinationOverrides {
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub path: Option<String>,

    #[serde(default, rename = "type")]
    pub content_type: Option<String>,
}

impl DestinationOverrides {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.path.is_none() && self.content_type.is_none()
    }
}

/// A `[[files]]` entry; unset fields inherit the global values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct FileEntry {
    pub path: PathBuf,

    #[serde(default)]
    pub watch: Option<bool>,

    #[serde(default)]
    pub recursive: Option<bool>,

    #[serde(default)]
    pub events: Option<Vec<String>>,

    #[serde(default)]
    pub delete_on_success: Option<bool>,

    #[serde(default)]
    pub wait_time: Option<u64>,

    #[serde(default)]
    pub destination: DestinationOverrides,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    #[serde(default)]
    pub minio: MinioSettings,

    /// Watch paths (true) or upload their contents once (false)
    #[serde(default = "default_true")]
    pub watch: bool,

    /// Watch directories recursively
    #[serde(default)]
    pub recursive: bool,

    /// Events that trigger an action
    #[serde(default = "default_watch_events")]
    pub watch_events: Vec<String>,

    /// Delete local files after a successful upload
    #[serde(default)]
    pub delete_on_success: bool,

    /// Debounce wait in seconds
    #[serde(default = "default_wait_time")]
    pub wait_time: u64,

    /// Paths using the global settings
    #[serde(default)]
    pub path: Vec<PathBuf>,

    /// Destination applied to every global path
    #[serde(default)]
    pub destination: DestinationOverrides,

    /// Paths with their own settings
    #[serde(default)]
    pub files: Vec<FileEntry>,

    /// Logging level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log line format (text, json)
    #[serde(default = "default_log_format")]
    pub log_format: String,
}

fn default_true() -> bool {
    true
}

fn default_watch_events() -> Vec<String> {
    vec!["Create".to_string(), "Write".to_string()]
}

fn default_wait_time() -> u64 {
    2
}

fn default_log_level() -> String {
    String::from("info")
}

fn default_log_format() -> String {
    String::from("text")
}

fn split_list(val: &str) -> Vec<String> {
    val.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

impl Config {
    /// Load configuration from a TOML file with environment variable overrides.
    ///
    /// `path` wins over `CONF_CONFIG`, which wins over `config.toml`. A missing
    /// file means built-in defaults.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let config_path = match path {
            Some(p) => p.to_path_buf(),
            None => PathBuf::from(
                std::env::var("CONF_CONFIG").unwrap_or_else(|_| "config.toml".to_string()),
            ),
        };

        let mut config: Config = if config_path.exists() {
            let contents = std::fs::read_to_string(&config_path)?;
            toml::from_str(&contents)?
        } else {
            Config::default()
        };

        config.apply_env()?;

        Ok(config)
    }

    /// Apply `CONF_*` environment variables
    fn apply_env(&mut self) -> anyhow::Result<()> {
        if let Ok(val) = std::env::var("CONF_MINIO__ENDPOINT") {
            self.minio.endpoint = val;
        }
        if let Ok(val) = std::env::var("CONF_MINIO__ACCESS_KEY_ID") {
            self.minio.access_key_id = val;
        }
        if let Ok(val) = std::env::var("CONF_MINIO__ACCESS_KEY_SECRET") {
            self.minio.access_key_secret = val;
        }
        if let Ok(val) = std::env::var("CONF_MINIO__REGION") {
            self.minio.region = Some(val);
        }
        if let Ok(val) = std::env::var("CONF_MINIO__BUCKET") {
            self.minio.bucket = val;
        }
        if let Ok(val) = std::env::var("CONF_MINIO__RETENTION") {
            self.minio.retention = Some(val.parse()?);
        }
        if let Ok(val) = std::env::var("CONF_MINIO__SECURE") {
            self.minio.secure = val.parse()?;
        }
        if let Ok(val) = std::env::var("CONF_WATCH") {
            self.watch = val.parse()?;
        }
        if let Ok(val) = std::env::var("CONF_RECURSIVE") {
            self.recursive = val.parse()?;
        }
        if let Ok(val) = std::env::var("CONF_WATCH_EVENTS") {
            self.watch_events = split_list(&val);
        }
        if let Ok(val) = std::env::var("CONF_DELETE_ON_SUCCESS") {
            self.delete_on_success = val.parse()?;
        }
        if let Ok(val) = std::env::var("CONF_WAIT_TIME") {
            self.wait_time = val.parse()?;
        }
        if let Ok(val) = std::env::var("CONF_PATH") {
            self.path = split_list(&val).into_iter().map(PathBuf::from).collect();
        }
        if let Ok(val) = std::env::var("CONF_DESTINATION__NAME") {
            self.destination.name = Some(val);
        }
        if let Ok(val) = std::env::var("CONF_DESTINATION__PATH") {
            self.destination.path = Some(val);
        }
        if let Ok(val) = std::env::var("CONF_DESTINATION__TYPE") {
            self.destination.content_type = Some(val);
        }
        if let Ok(val) = std::env::var("CONF_LOG_LEVEL") {
            self.log_level = val;
        }
        if let Ok(val) = std::env::var("CONF_LOG_FORMAT") {
            self.log_format = val;
        }

        Ok(())
    }

    /// Apply command-line flags on top of file and environment values
    pub fn apply_cli(&mut self, cli: &Cli) {
        if let Some(ref val) = cli.minio_endpoint {
            self.minio.endpoint = val.clone();
        }
        if let Some(ref val) = cli.minio_access_key_id {
            self.minio.access_key_id = val.clone();
        }
        if let Some(ref val) = cli.minio_access_key_secret {
            self.minio.access_key_secret = val.clone();
        }
        if let Some(ref val) = cli.minio_region {
            self.minio.region = Some(val.clone());
        }
        if let Some(ref val) = cli.minio_bucket {
            self.minio.bucket = val.clone();
        }
        if let Some(val) = cli.minio_retention {
            self.minio.retention = Some(val);
        }
        if let Some(val) = cli.minio_secure {
            self.minio.secure = val;
        }
        if let Some(val) = cli.watch {
            self.watch = val;
        }
        if let Some(val) = cli.recursive {
            self.recursive = val;
        }
        if !cli.watch_events.is_empty() {
            self.watch_events = cli.watch_events.clone();
        }
        if let Some(val) = cli.delete_on_success {
            self.delete_on_success = val;
        }
        if let Some(val) = cli.wait_time {
            self.wait_time = val;
        }

        let paths = cli.all_paths();
        if !paths.is_empty() {
            self.path = paths;
        }

        if let Some(ref val) = cli.destination_name {
            self.destination.name = Some(val.clone());
        }
        if let Some(ref val) = cli.destination_path {
            self.destination.path = Some(val.clone());
        }
        if let Some(ref val) = cli.destination_type {
            self.destination.content_type = Some(val.clone());
        }
        if let Some(ref val) = cli.log_level {
            self.log_level = val.clone();
        }
        if let Some(ref val) = cli.log_format {
            self.log_format = val.clone();
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            minio: MinioSettings::default(),
            watch: true,
            recursive: false,
            watch_events: default_watch_events(),
            delete_on_success: false,
            wait_time: default_wait_time(),
            path: Vec::new(),
            destination: DestinationOverrides::default(),
            files: Vec::new(),
            log_level: default_log_level(),
            log_format: default_log_format(),
        }
    }
}
