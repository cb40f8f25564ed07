// Copyright (c) The testdash Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Errors produced by testdash.

use camino::Utf8PathBuf;
use config::ConfigError;
use std::{borrow::Cow, fmt, io};
use thiserror::Error;

/// An error that occurred while parsing the config.
#[derive(Debug, Error)]
#[error("failed to parse testdash config at `{config_file}`")]
#[non_exhaustive]
pub struct ConfigParseError {
    config_file: Utf8PathBuf,
    #[source]
    err: ConfigParseErrorKind,
}

impl ConfigParseError {
    pub(crate) fn new(config_file: impl Into<Utf8PathBuf>, err: ConfigParseErrorKind) -> Self {
        Self {
            config_file: config_file.into(),
            err,
        }
    }

    /// Returns the config file for this error.
    pub fn config_file(&self) -> &Utf8PathBuf {
        &self.config_file
    }

    /// Returns the underlying error kind.
    pub fn kind(&self) -> &ConfigParseErrorKind {
        &self.err
    }
}

/// The kind of error that occurred while parsing a config.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigParseErrorKind {
    /// An error occurred while building or deserializing the config.
    #[error(transparent)]
    BuildError(Box<ConfigError>),

    /// A command template in the config was invalid.
    #[error("invalid command template for `[{section}]`")]
    InvalidCommand {
        /// The config section the template was read from.
        section: &'static str,

        /// The underlying error.
        #[source]
        err: CommandTemplateError,
    },
}

/// An error that occurred while parsing a command template.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum CommandTemplateError {
    /// The program name was empty.
    #[error("program name is empty")]
    EmptyProgram,

    /// An argument referenced a placeholder that isn't supported in this section.
    #[error("unknown placeholder `{{{placeholder}}}` in argument `{arg}` (known placeholders: {})", .known.join(", "))]
    UnknownPlaceholder {
        /// The argument containing the placeholder.
        arg: String,

        /// The unknown placeholder name, without braces.
        placeholder: String,

        /// Placeholders that are valid in this position.
        known: Vec<&'static str>,
    },

    /// An argument contained an opening brace without a matching closing brace.
    #[error("unterminated placeholder in argument `{arg}`")]
    UnterminatedPlaceholder {
        /// The argument.
        arg: String,
    },
}

/// Error returned while parsing a [`TestThreads`](crate::config::TestThreads) value from a string.
#[derive(Clone, Debug, Error)]
#[error("unrecognized value for test-threads: {input}")]
pub struct TestThreadsParseError {
    input: Cow<'static, str>,
}

impl TestThreadsParseError {
    pub(crate) fn new(input: impl Into<Cow<'static, str>>) -> Self {
        Self {
            input: input.into(),
        }
    }
}

/// An error that occurred while walking a project tree for test targets.
#[derive(Debug, Error)]
#[error("failed to discover test targets under `{root}`")]
pub struct DiscoveryError {
    root: Utf8PathBuf,
    #[source]
    err: DiscoveryErrorKind,
}

impl DiscoveryError {
    pub(crate) fn new(root: impl Into<Utf8PathBuf>, err: DiscoveryErrorKind) -> Self {
        Self {
            root: root.into(),
            err,
        }
    }

    /// Returns the root directory discovery was started from.
    pub fn root(&self) -> &Utf8PathBuf {
        &self.root
    }

    /// Renders this error and its chain of sources on a single line.
    ///
    /// This is the form that ends up in a snapshot's status message.
    pub fn display_chain(&self) -> impl fmt::Display + '_ {
        DisplayChain(self)
    }
}

/// The kind of error that occurred during discovery.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DiscoveryErrorKind {
    /// An I/O error occurred while traversing the tree.
    #[error("error walking directory tree")]
    Walk(#[from] walkdir::Error),

    /// A path in the tree was not valid UTF-8.
    #[error("path `{}` is not valid UTF-8", .0.display())]
    NonUtf8Path(std::path::PathBuf),
}

/// An error returned when a directory can't be used as a project.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProjectValidationError {
    /// The path doesn't exist or couldn't be accessed.
    #[error("path `{path}` does not exist")]
    NotFound {
        /// The path that was requested.
        path: Utf8PathBuf,

        /// The underlying error.
        #[source]
        err: io::Error,
    },

    /// The path exists but is not a directory.
    #[error("path `{path}` is not a directory")]
    NotADirectory {
        /// The path that was requested.
        path: Utf8PathBuf,
    },

    /// The directory has neither a module manifest nor any source files.
    #[error(
        "directory `{path}` does not appear to be a project (no `{manifest}` or `*{extension}` files found)"
    )]
    NotAProject {
        /// The path that was requested.
        path: Utf8PathBuf,

        /// The manifest file name that was looked for.
        manifest: String,

        /// The source extension that was looked for.
        extension: String,
    },

    /// The path is not valid UTF-8.
    #[error("path `{}` is not valid UTF-8", .path.display())]
    NonUtf8 {
        /// The path that was requested.
        path: std::path::PathBuf,
    },
}

/// An error that occurred while reading a coverage profile from disk.
#[derive(Debug, Error)]
#[error("failed to read coverage profile `{path}`")]
pub struct ProfileReadError {
    path: Utf8PathBuf,
    #[source]
    err: io::Error,
}

impl ProfileReadError {
    pub(crate) fn new(path: impl Into<Utf8PathBuf>, err: io::Error) -> Self {
        Self {
            path: path.into(),
            err,
        }
    }
}

/// An error that occurred while retrieving an HTML coverage report.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum HtmlReportError {
    /// No report with this handle is known.
    #[error("HTML coverage report `{handle}` not found")]
    NotFound {
        /// The handle that was requested.
        handle: String,
    },

    /// The report is known but couldn't be read.
    #[error("error reading HTML coverage report `{path}`")]
    Read {
        /// The path to the report.
        path: Utf8PathBuf,

        /// The underlying error.
        #[source]
        err: io::Error,
    },
}

/// An error that occurred while deleting an expired HTML report.
#[derive(Debug, Error)]
#[error("failed to remove expired HTML report `{path}`")]
pub struct HtmlReportRemoveError {
    path: Utf8PathBuf,
    #[source]
    err: io::Error,
}

impl HtmlReportRemoveError {
    pub(crate) fn new(path: impl Into<Utf8PathBuf>, err: io::Error) -> Self {
        Self {
            path: path.into(),
            err,
        }
    }
}

/// Returned when a run is requested while another run is still active.
#[derive(Clone, Debug, Error)]
#[error("a test run is already in progress for `{project_path}`")]
pub struct RunInProgressError {
    project_path: Utf8PathBuf,
}

impl RunInProgressError {
    pub(crate) fn new(project_path: impl Into<Utf8PathBuf>) -> Self {
        Self {
            project_path: project_path.into(),
        }
    }
}

/// An error that occurred while switching the dashboard to a different project.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SetProjectError {
    /// The new project path failed validation.
    #[error(transparent)]
    Validation(#[from] ProjectValidationError),

    /// A run is active, and the project can't be swapped underneath it.
    #[error(transparent)]
    RunInProgress(#[from] RunInProgressError),
}

struct DisplayChain<'a>(&'a (dyn std::error::Error + 'static));

impl fmt::Display for DisplayChain<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)?;
        let mut source = self.0.source();
        while let Some(err) = source {
            write!(f, ": {err}")?;
            source = err.source();
        }
        Ok(())
    }
}
