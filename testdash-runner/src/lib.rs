// Copyright (c) The testdash Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

#![warn(missing_docs)]

//! Core functionality for testdash: discovering test targets in a project, running them
//! concurrently through an external test runner, aggregating pass/fail status and line-level
//! coverage, and publishing snapshots of run progress to live subscribers.
//!
//! The entry point is [`dashboard::Dashboard`]. Data flows one way: discovery, then the run
//! orchestrator and its executors, then the coverage parser, then aggregation, then the
//! broadcaster and its subscribers.

pub mod broadcast;
pub mod config;
pub mod coverage;
pub mod dashboard;
pub mod discovery;
pub mod errors;
pub mod project;
pub mod runner;
pub mod snapshot;
mod time;
