// SPDX-License-Identifier: GPL-3.0-only
pub mod cli;
#[allow(clippy::module_inception)]
pub mod config;
pub mod spec;

pub use cli::Cli;
pub use config::{Config, MinioSettings};
pub use spec::{build_specs, ConfigError, WatchSpec};
