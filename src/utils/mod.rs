// SPDX-License-Identifier: GPL-3.0-only
pub mod dirs;
pub mod endpoint;

pub use dirs::{file_list, is_dir, recursive_dir_list, DirError, ListError};
pub use endpoint::{endpoint_url, host_header};
