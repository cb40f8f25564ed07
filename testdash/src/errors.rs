// Copyright (c) The testdash Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::output::{NO_HEADING_TARGET, Styles};
use camino::Utf8PathBuf;
use owo_colors::OwoColorize;
use std::error::Error;
use testdash_runner::errors::{
    ConfigParseError, DiscoveryError, ProjectValidationError, RunInProgressError,
};
use thiserror::Error;
use tracing::error;

pub(crate) type Result<T, E = ExpectedError> = std::result::Result<T, E>;

/// Documented exit codes for `testdash` failures.
///
/// Unknown or unexpected failures always result in exit code 1.
pub enum TestdashExitCode {}

impl TestdashExitCode {
    /// No errors occurred and testdash exited normally.
    pub const OK: i32 = 0;

    /// No test targets were found in the project.
    pub const NO_TESTS_RUN: i32 = 4;

    /// One or more targets failed.
    pub const TEST_RUN_FAILED: i32 = 100;

    /// Walking the project tree for targets failed.
    pub const DISCOVERY_FAILED: i32 = 104;

    /// Writing output to stdout failed.
    pub const WRITE_OUTPUT_ERROR: i32 = 110;

    /// The configuration or project could not be set up.
    pub const SETUP_ERROR: i32 = 96;
}

// The #[error()] strings are placeholders. Errors are meant to be printed with
// display_to_stderr, which colorizes them.

/// An error that testdash knows how to report.
#[derive(Debug, Error)]
#[doc(hidden)]
pub enum ExpectedError {
    #[error("config parse error")]
    ConfigParse {
        #[from]
        err: ConfigParseError,
    },
    #[error("invalid project")]
    ProjectValidation {
        #[from]
        err: ProjectValidationError,
    },
    #[error("discovery failed")]
    DiscoveryFailed { err: DiscoveryError },
    #[error("no test targets found")]
    NoTargets { project: Utf8PathBuf },
    #[error("test run failed")]
    TestRunFailed { failed: usize, total: usize },
    #[error("error writing output")]
    WriteOutput {
        #[source]
        err: std::io::Error,
    },
    #[error("error serializing config")]
    SerializeConfig {
        #[source]
        err: toml::ser::Error,
    },
    #[error("error serializing JSON")]
    SerializeJson {
        #[source]
        err: serde_json::Error,
    },
    #[error("error building async runtime")]
    RuntimeBuild {
        #[source]
        err: std::io::Error,
    },
    #[error("run already in progress")]
    RunInProgress {
        #[source]
        err: RunInProgressError,
    },
    #[error("run task failed")]
    RunJoin {
        #[source]
        err: tokio::task::JoinError,
    },
}

impl ExpectedError {
    pub(crate) fn write_output(err: std::io::Error) -> Self {
        Self::WriteOutput { err }
    }

    pub(crate) fn serialize_json(err: serde_json::Error) -> Self {
        Self::SerializeJson { err }
    }

    /// Returns the exit code for the process.
    pub fn process_exit_code(&self) -> i32 {
        match self {
            Self::ConfigParse { .. }
            | Self::ProjectValidation { .. }
            | Self::SerializeConfig { .. }
            | Self::SerializeJson { .. }
            | Self::RuntimeBuild { .. }
            | Self::RunInProgress { .. }
            | Self::RunJoin { .. } => TestdashExitCode::SETUP_ERROR,
            Self::DiscoveryFailed { .. } => TestdashExitCode::DISCOVERY_FAILED,
            Self::NoTargets { .. } => TestdashExitCode::NO_TESTS_RUN,
            Self::TestRunFailed { .. } => TestdashExitCode::TEST_RUN_FAILED,
            Self::WriteOutput { .. } => TestdashExitCode::WRITE_OUTPUT_ERROR,
        }
    }

    /// Displays this error to stderr.
    pub fn display_to_stderr(&self, styles: &Styles) {
        let mut next_error = match self {
            Self::ConfigParse { err } => {
                error!(
                    "failed to parse testdash config at `{}`",
                    err.config_file().style(styles.bold)
                );
                Some(err.kind() as &dyn Error)
            }
            Self::ProjectValidation { err } => {
                error!("{err}");
                err.source()
            }
            Self::DiscoveryFailed { err } => {
                error!(
                    "failed to discover test targets under `{}`",
                    err.root().style(styles.bold)
                );
                err.source()
            }
            Self::NoTargets { project } => {
                error!("no test targets found in `{}`", project.style(styles.bold));
                None
            }
            Self::TestRunFailed { failed, total } => {
                error!(
                    "test run failed: {} of {} targets failed",
                    failed.style(styles.fail),
                    total.style(styles.count),
                );
                None
            }
            Self::WriteOutput { err } => {
                error!("error writing output");
                Some(err as &dyn Error)
            }
            Self::SerializeConfig { err } => {
                error!("error serializing config as TOML");
                Some(err as &dyn Error)
            }
            Self::SerializeJson { err } => {
                error!("error serializing output as JSON");
                Some(err as &dyn Error)
            }
            Self::RuntimeBuild { err } => {
                error!("error building tokio runtime");
                Some(err as &dyn Error)
            }
            Self::RunInProgress { err } => {
                error!("{err}");
                None
            }
            Self::RunJoin { err } => {
                error!("run task did not complete");
                Some(err as &dyn Error)
            }
        };

        while let Some(err) = next_error {
            error!(target: NO_HEADING_TARGET, "\nCaused by:\n  {}", err);
            next_error = err.source();
        }
    }
}
