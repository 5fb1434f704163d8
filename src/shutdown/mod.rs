// SPDX-License-Identifier: GPL-3.0-only
pub mod signal;

pub use signal::ShutdownSignal;
