// Copyright (c) The testdash Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The run orchestrator and the executor it drives.
//!
//! The main structure in this module is [`RunOrchestrator`]. It runs each target through an
//! [`ExecuteTarget`] implementation, normally [`TestExecutor`], which invokes the external test
//! runner.

mod aggregate;
mod executor;
mod imp;

pub(crate) use aggregate::RunAggregate;
pub use aggregate::RunStats;
pub use executor::*;
pub use imp::*;
