// Copyright (c) The testdash Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::{CommandTemplate, REPORT_PLACEHOLDERS, RUNNER_PLACEHOLDERS, TestThreads};
use crate::errors::{ConfigParseError, ConfigParseErrorKind};
use camino::{Utf8Path, Utf8PathBuf};
use config::{Config, ConfigBuilder, File, FileFormat, builder::DefaultState};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Overall configuration for testdash.
///
/// Obtained through [`DashboardConfig::from_sources`], which layers a project-specific file on
/// top of [`DashboardConfig::DEFAULT_CONFIG`].
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct DashboardConfig {
    discovery: DiscoveryConfig,
    project: ProjectConfig,
    runner: RunnerConfig,
    report: ReportConfig,
}

impl DashboardConfig {
    /// The default location of the config within a project: `.config/testdash.toml`.
    pub const CONFIG_PATH: &'static str = ".config/testdash.toml";

    /// Contains the default config as a TOML file.
    ///
    /// Project-specific configuration is layered on top of the default config.
    pub const DEFAULT_CONFIG: &'static str = include_str!("../../default-config.toml");

    /// Reads the config from `config_file` if given, or otherwise from
    /// [`CONFIG_PATH`](Self::CONFIG_PATH) under `project_root` if that file exists.
    ///
    /// An explicitly specified file must exist.
    pub fn from_sources(
        project_root: &Utf8Path,
        config_file: Option<&Utf8Path>,
    ) -> Result<Self, ConfigParseError> {
        let (file, required) = match config_file {
            Some(file) => (file.to_owned(), true),
            None => (project_root.join(Self::CONFIG_PATH), false),
        };

        let builder = Self::make_default_config().add_source(
            File::new(file.as_str(), FileFormat::Toml).required(required),
        );
        Self::build_and_deserialize(&builder).map_err(|err| ConfigParseError::new(file, err))
    }

    /// Parses a config from a TOML string layered on top of the defaults.
    pub fn from_toml_str(toml: &str) -> Result<Self, ConfigParseError> {
        let builder = Self::make_default_config().add_source(File::from_str(toml, FileFormat::Toml));
        Self::build_and_deserialize(&builder)
            .map_err(|err| ConfigParseError::new("<inline>", err))
    }

    /// Returns discovery settings.
    pub fn discovery(&self) -> &DiscoveryConfig {
        &self.discovery
    }

    /// Returns project settings.
    pub fn project(&self) -> &ProjectConfig {
        &self.project
    }

    /// Returns settings for the external test runner.
    pub fn runner(&self) -> &RunnerConfig {
        &self.runner
    }

    /// Returns settings for HTML report generation and retention.
    pub fn report(&self) -> &ReportConfig {
        &self.report
    }

    /// Overrides the number of targets run simultaneously.
    pub fn set_test_threads(&mut self, test_threads: TestThreads) -> &mut Self {
        self.runner.test_threads = test_threads;
        self
    }

    // ---
    // Helper methods
    // ---

    fn make_default_config() -> ConfigBuilder<DefaultState> {
        Config::builder().add_source(File::from_str(Self::DEFAULT_CONFIG, FileFormat::Toml))
    }

    fn build_and_deserialize(
        builder: &ConfigBuilder<DefaultState>,
    ) -> Result<Self, ConfigParseErrorKind> {
        let config = builder
            .build_cloned()
            .map_err(|error| ConfigParseErrorKind::BuildError(Box::new(error)))?;
        let deserialized: DashboardConfigDeserialize = config
            .try_deserialize()
            .map_err(|error| ConfigParseErrorKind::BuildError(Box::new(error)))?;
        deserialized.into_config()
    }
}

impl Default for DashboardConfig {
    fn default() -> Self {
        let builder = Self::make_default_config();
        Self::build_and_deserialize(&builder).expect("default config should be valid")
    }
}

/// Settings for finding test targets under a project root.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct DiscoveryConfig {
    /// A file with this suffix marks its directory as a test target.
    pub test_file_suffix: String,

    /// A file with this extension marks a directory tree as a source project.
    pub source_extension: String,

    /// Directory names pruned from the walk.
    pub skip_dirs: Vec<String>,
}

impl DiscoveryConfig {
    /// Returns true if a directory with this name should be pruned.
    pub fn is_skipped(&self, dir_name: &str) -> bool {
        self.skip_dirs.iter().any(|skip| skip == dir_name)
    }
}

/// Settings describing the layout of a project.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct ProjectConfig {
    /// The module manifest file in the project root, e.g. `go.mod`.
    pub manifest: Utf8PathBuf,
}

/// Settings for invoking the external test runner.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct RunnerConfig {
    #[serde(flatten)]
    command: CommandTemplate,
    test_threads: TestThreads,
}

impl RunnerConfig {
    /// Returns the command template used to run a single target.
    pub fn command(&self) -> &CommandTemplate {
        &self.command
    }

    /// Returns the number of targets to run simultaneously.
    pub fn test_threads(&self) -> TestThreads {
        self.test_threads
    }
}

/// Settings for generating and retaining HTML coverage reports.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct ReportConfig {
    enabled: bool,
    #[serde(flatten)]
    command: CommandTemplate,
    #[serde(with = "humantime_serde")]
    retention: Duration,
    #[serde(with = "humantime_serde")]
    sweep_interval: Duration,
}

impl ReportConfig {
    /// Returns the command template used to render a report, or `None` if report generation is
    /// disabled.
    pub fn command(&self) -> Option<&CommandTemplate> {
        self.enabled.then_some(&self.command)
    }

    /// Returns how long a generated report is kept.
    pub fn retention(&self) -> Duration {
        self.retention
    }

    /// Returns how often expired reports are swept.
    pub fn sweep_interval(&self) -> Duration {
        self.sweep_interval
    }
}

// This is the form of `DashboardConfig` that gets deserialized.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct DashboardConfigDeserialize {
    discovery: DiscoveryConfig,
    project: ProjectConfig,
    runner: RunnerConfigDeserialize,
    report: ReportConfigDeserialize,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct RunnerConfigDeserialize {
    program: String,
    args: Vec<String>,
    test_threads: TestThreads,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct ReportConfigDeserialize {
    enabled: bool,
    program: String,
    args: Vec<String>,
    #[serde(with = "humantime_serde")]
    retention: Duration,
    #[serde(with = "humantime_serde")]
    sweep_interval: Duration,
}

impl DashboardConfigDeserialize {
    fn into_config(self) -> Result<DashboardConfig, ConfigParseErrorKind> {
        let runner_command =
            CommandTemplate::new(self.runner.program, self.runner.args, RUNNER_PLACEHOLDERS)
                .map_err(|err| ConfigParseErrorKind::InvalidCommand {
                    section: "runner",
                    err,
                })?;
        let report_command =
            CommandTemplate::new(self.report.program, self.report.args, REPORT_PLACEHOLDERS)
                .map_err(|err| ConfigParseErrorKind::InvalidCommand {
                    section: "report",
                    err,
                })?;

        Ok(DashboardConfig {
            discovery: self.discovery,
            project: self.project,
            runner: RunnerConfig {
                command: runner_command,
                test_threads: self.runner.test_threads,
            },
            report: ReportConfig {
                enabled: self.report.enabled,
                command: report_command,
                retention: self.report.retention,
                sweep_interval: self.report.sweep_interval,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::CommandTemplateError;
    use camino_tempfile::Utf8TempDir;
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    #[test]
    fn default_config_is_valid() {
        let config = DashboardConfig::default();
        assert_eq!(config.runner().command().program(), "go");
        assert_eq!(config.runner().test_threads(), TestThreads::NumCpus);
        assert_eq!(config.discovery().test_file_suffix, "_test.go");
        assert_eq!(
            config.discovery().skip_dirs,
            [".git", "vendor", "node_modules", ".vscode", ".idea"],
        );
        assert_eq!(config.report().retention(), Duration::from_secs(3600));
        assert_eq!(config.report().sweep_interval(), Duration::from_secs(600));
        assert!(config.report().command().is_some());
    }

    #[test]
    fn project_file_is_layered_over_defaults() {
        let dir = Utf8TempDir::new().expect("created temp dir");
        std::fs::create_dir_all(dir.path().join(".config")).expect("created .config");
        std::fs::write(
            dir.path().join(DashboardConfig::CONFIG_PATH),
            indoc! {r#"
                [runner]
                test-threads = 2

                [report]
                enabled = false
                retention = "30m"
            "#},
        )
        .expect("wrote config");

        let config = DashboardConfig::from_sources(dir.path(), None).expect("config is valid");
        assert_eq!(config.runner().test_threads(), TestThreads::Count(2));
        assert_eq!(config.runner().command().program(), "go");
        assert!(config.report().command().is_none());
        assert_eq!(config.report().retention(), Duration::from_secs(30 * 60));
    }

    #[test]
    fn missing_project_file_uses_defaults() {
        let dir = Utf8TempDir::new().expect("created temp dir");
        let config = DashboardConfig::from_sources(dir.path(), None).expect("config is valid");
        assert_eq!(config.project().manifest, "go.mod");
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let dir = Utf8TempDir::new().expect("created temp dir");
        let file = dir.path().join("nope.toml");
        let err = DashboardConfig::from_sources(dir.path(), Some(&file))
            .expect_err("explicit file must exist");
        assert_eq!(err.config_file(), &file);
    }

    #[test]
    fn invalid_runner_placeholder_is_an_error() {
        let err = DashboardConfig::from_toml_str(indoc! {r#"
            [runner]
            args = ["test", "{output}"]
        "#})
        .expect_err("output is not valid for the runner");
        match err.kind() {
            ConfigParseErrorKind::InvalidCommand { section, err } => {
                assert_eq!(*section, "runner");
                assert!(matches!(err, CommandTemplateError::UnknownPlaceholder { .. }));
            }
            other => panic!("unexpected error kind: {other:?}"),
        }
    }

    #[test]
    fn zero_test_threads_is_an_error() {
        DashboardConfig::from_toml_str(indoc! {r#"
            [runner]
            test-threads = 0
        "#})
        .expect_err("test-threads may not be 0");
    }
}
