// SPDX-License-Identifier: GPL-3.0-only
pub mod actions;
pub mod client;
pub mod sigv4;
pub mod traits;

pub use actions::{ActionRunner, LoggingDeleter};
pub use client::MinioClient;
pub use traits::{Destination, RemoteDeleter, StorageError, UploadReceipt, Uploader};
