// Copyright (c) The testdash Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration support for testdash.
//!
//! The configuration is layered: the embedded [default config](DashboardConfig::DEFAULT_CONFIG)
//! is read first, and a project-specific file is layered on top of it.

mod command;
mod imp;
mod test_threads;

pub use command::*;
pub use imp::*;
pub use test_threads::*;
