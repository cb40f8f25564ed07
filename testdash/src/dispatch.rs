// Copyright (c) The testdash Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{
    ExpectedError,
    errors::{Result, TestdashExitCode},
    output::{OutputContext, OutputOpts, OutputWriter, Styles},
};
use camino::{Utf8Path, Utf8PathBuf};
use clap::{Args, Parser, Subcommand, ValueEnum};
use futures::prelude::*;
use owo_colors::OwoColorize;
use std::{io::Write, pin::pin};
use testdash_runner::{
    config::{DashboardConfig, TestThreads},
    dashboard::Dashboard,
    discovery::discover_targets,
    project::Project,
    runner::{RunOutcome, RunStats},
    snapshot::DashboardSnapshot,
};
use tracing::{debug, info, warn};

/// Discover, run and watch test suites with live coverage aggregation.
///
/// testdash finds every directory in a project that holds tests, runs each one through an external
/// test runner with coverage enabled, and reports pass/fail status and coverage as results arrive.
#[derive(Debug, Parser)]
#[command(version, name = "testdash")]
pub struct TestdashApp {
    /// Project directory
    #[arg(long, short = 'p', global = true, default_value = ".", value_name = "DIR")]
    project: Utf8PathBuf,

    #[command(flatten)]
    config_opts: ConfigOpts,

    #[command(flatten)]
    output: OutputOpts,

    #[command(subcommand)]
    command: Command,
}

impl TestdashApp {
    /// Initializes the output context.
    pub fn init_output(&self) -> OutputContext {
        self.output.init()
    }

    /// Executes the app, returning the process exit code.
    pub fn exec(self, output: OutputContext, output_writer: &mut OutputWriter) -> Result<i32> {
        let mut config = self.config_opts.make_config(&self.project)?;
        match self.command {
            Command::Run {
                message_format,
                test_threads,
                keep_reports,
            } => {
                if let Some(test_threads) = test_threads {
                    config.set_test_threads(test_threads);
                }
                let project = Project::new(&self.project, &config)?;
                let opts = RunOpts {
                    message_format,
                    keep_reports,
                };
                exec_run(project, config, opts, output, output_writer)
            }
            Command::List { message_format } => {
                let project = Project::new(&self.project, &config)?;
                exec_list(&project, &config, message_format, output, output_writer)
            }
            Command::Info { message_format } => {
                let project = Project::new(&self.project, &config)?;
                exec_info(&project, &config, message_format, output, output_writer)
            }
            Command::ShowConfig => exec_show_config(&config, output_writer),
        }
    }
}

#[derive(Debug, Args)]
struct ConfigOpts {
    /// Config file [default: <project>/.config/testdash.toml]
    #[arg(long, global = true, value_name = "PATH")]
    config_file: Option<Utf8PathBuf>,
}

impl ConfigOpts {
    fn make_config(&self, project: &Utf8Path) -> Result<DashboardConfig> {
        Ok(DashboardConfig::from_sources(
            project,
            self.config_file.as_deref(),
        )?)
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run every test target in the project
    ///
    /// Targets run concurrently. Progress is printed as each target completes, followed by a
    /// summary.
    Run {
        /// Output format
        #[arg(long, value_enum, default_value_t, value_name = "FMT")]
        message_format: MessageFormat,

        /// Number of targets to run simultaneously [default: from config]
        #[arg(long, short = 'j', visible_alias = "jobs", value_name = "THREADS")]
        test_threads: Option<TestThreads>,

        /// Keep generated HTML reports on disk after exiting
        #[arg(long)]
        keep_reports: bool,
    },

    /// List test targets in the project
    List {
        /// Output format
        #[arg(long, value_enum, default_value_t, value_name = "FMT")]
        message_format: MessageFormat,
    },

    /// Show the project's identity and targets
    Info {
        /// Output format
        #[arg(long, value_enum, default_value_t, value_name = "FMT")]
        message_format: MessageFormat,
    },

    /// Print the effective configuration as TOML
    ShowConfig,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, ValueEnum)]
enum MessageFormat {
    /// Human-readable output
    #[default]
    Human,

    /// One JSON document per line
    Json,
}

#[derive(Copy, Clone, Debug)]
struct RunOpts {
    message_format: MessageFormat,
    keep_reports: bool,
}

fn exec_run(
    project: Project,
    config: DashboardConfig,
    opts: RunOpts,
    output: OutputContext,
    output_writer: &mut OutputWriter,
) -> Result<i32> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| ExpectedError::RuntimeBuild { err })?;

    let dashboard = Dashboard::new(project, config);
    let styles = output.stdout_styles();
    let reporter = SnapshotReporter::new(opts.message_format, &styles, output.verbose);
    let outcome = runtime.block_on(run_to_completion(&dashboard, reporter, output_writer));

    if opts.keep_reports {
        debug!(
            reports = dashboard.reports().len(),
            "keeping HTML coverage reports"
        );
    } else {
        let result = dashboard.reports().remove_all();
        for err in &result.errors {
            warn!("{err}");
        }
    }

    match outcome? {
        RunOutcome::Completed(stats) if stats.is_success() => Ok(TestdashExitCode::OK),
        RunOutcome::Completed(stats) => Err(ExpectedError::TestRunFailed {
            failed: stats.failed,
            total: stats.total_targets,
        }),
        RunOutcome::NoTargets => Err(ExpectedError::NoTargets {
            project: dashboard.project().root().to_owned(),
        }),
        RunOutcome::DiscoveryFailed(err) => Err(ExpectedError::DiscoveryFailed { err }),
    }
}

async fn run_to_completion(
    dashboard: &Dashboard,
    mut reporter: SnapshotReporter<'_>,
    output_writer: &mut OutputWriter,
) -> Result<RunOutcome> {
    let sweeper = dashboard.spawn_sweeper();
    // The initial snapshot predates the run.
    let (_, mut updates) = dashboard.subscribe().into_parts();
    let handle = dashboard
        .start_run()
        .map_err(|err| ExpectedError::RunInProgress { err })?;

    let mut writer = output_writer.stdout_writer();
    let mut run = pin!(handle.join());

    let outcome = loop {
        tokio::select! {
            biased;

            Some(snapshot) = updates.next() => {
                reporter.write_snapshot(&snapshot, &mut writer)?;
            }
            outcome = &mut run => {
                // Every snapshot is published before the run finishes.
                while let Some(Some(snapshot)) = updates.next().now_or_never() {
                    reporter.write_snapshot(&snapshot, &mut writer)?;
                }
                break outcome.map_err(|err| ExpectedError::RunJoin { err })?;
            }
        }
    };
    sweeper.abort();

    if let Some(stats) = outcome.stats() {
        reporter.write_summary(stats, &mut writer)?;
    }
    writer.flush().map_err(ExpectedError::write_output)?;
    Ok(outcome)
}

/// Prints snapshots as they arrive.
struct SnapshotReporter<'a> {
    message_format: MessageFormat,
    styles: &'a Styles,
    verbose: bool,
    results_written: usize,
}

impl<'a> SnapshotReporter<'a> {
    fn new(message_format: MessageFormat, styles: &'a Styles, verbose: bool) -> Self {
        Self {
            message_format,
            styles,
            verbose,
            results_written: 0,
        }
    }

    fn write_snapshot(
        &mut self,
        snapshot: &DashboardSnapshot,
        writer: &mut dyn Write,
    ) -> Result<()> {
        match self.message_format {
            MessageFormat::Human => self.write_human(snapshot, writer),
            MessageFormat::Json => {
                serde_json::to_writer(&mut *writer, snapshot).map_err(ExpectedError::serialize_json)?;
                writeln!(writer).map_err(ExpectedError::write_output)
            }
        }?;
        writer.flush().map_err(ExpectedError::write_output)
    }

    fn write_human(&mut self, snapshot: &DashboardSnapshot, writer: &mut dyn Write) -> Result<()> {
        let styles = self.styles;
        if let Some(message) = &snapshot.status_message {
            writeln!(writer, "{message}").map_err(ExpectedError::write_output)?;
            return Ok(());
        }

        if snapshot.results.is_empty() {
            writeln!(
                writer,
                "{:>12} {} targets in {}",
                "Starting".style(styles.pass),
                snapshot.total_targets.style(styles.count),
                snapshot.project_path.style(styles.bold),
            )
            .map_err(ExpectedError::write_output)?;
            return Ok(());
        }

        for (index, result) in snapshot
            .results
            .iter()
            .enumerate()
            .skip(self.results_written)
        {
            let status = if result.passed {
                "PASS".style(styles.pass)
            } else {
                "FAIL".style(styles.fail)
            };
            writeln!(
                writer,
                "{:>12} [{:>8.3}s] ({}/{}) {}  coverage: {:.1}%",
                status,
                result.duration.as_secs_f64(),
                index + 1,
                snapshot.total_targets,
                result.target.style(styles.bold),
                result.coverage_percent,
            )
            .map_err(ExpectedError::write_output)?;

            // Output is shown for failures, or for everything when verbose.
            if !result.passed || self.verbose {
                for line in result.output.lines() {
                    writeln!(writer, "    {}", line.style(styles.dimmed))
                        .map_err(ExpectedError::write_output)?;
                }
            }
        }
        self.results_written = snapshot.results.len();
        Ok(())
    }

    fn write_summary(&self, stats: &RunStats, writer: &mut dyn Write) -> Result<()> {
        info!(
            passed = stats.passed,
            failed = stats.failed,
            "run finished in {:.3}s",
            stats.elapsed.as_secs_f64()
        );
        if self.message_format != MessageFormat::Human {
            return Ok(());
        }

        let styles = self.styles;
        let failed = if stats.failed > 0 {
            stats.failed.style(styles.fail).to_string()
        } else {
            stats.failed.style(styles.count).to_string()
        };
        writeln!(writer, "------------").map_err(ExpectedError::write_output)?;
        writeln!(
            writer,
            "{:>12} [{:>8.3}s] {} targets run: {} passed, {} failed; overall coverage {:.1}%",
            "Summary".style(styles.bold),
            stats.elapsed.as_secs_f64(),
            stats.finished.style(styles.count),
            stats.passed.style(styles.count),
            failed,
            stats.overall_coverage_percent,
        )
        .map_err(ExpectedError::write_output)
    }
}

fn exec_list(
    project: &Project,
    config: &DashboardConfig,
    message_format: MessageFormat,
    output: OutputContext,
    output_writer: &mut OutputWriter,
) -> Result<i32> {
    let targets = discover_targets(project.root(), config.discovery())
        .map_err(|err| ExpectedError::DiscoveryFailed { err })?;
    let mut writer = output_writer.stdout_writer();

    match message_format {
        MessageFormat::Human => {
            let styles = output.stdout_styles();
            for target in &targets {
                writeln!(writer, "{}", target.style(styles.bold))
                    .map_err(ExpectedError::write_output)?;
            }
        }
        MessageFormat::Json => {
            serde_json::to_writer(&mut writer, &targets).map_err(ExpectedError::serialize_json)?;
            writeln!(writer).map_err(ExpectedError::write_output)?;
        }
    }
    writer.flush().map_err(ExpectedError::write_output)?;
    Ok(TestdashExitCode::OK)
}

fn exec_info(
    project: &Project,
    config: &DashboardConfig,
    message_format: MessageFormat,
    output: OutputContext,
    output_writer: &mut OutputWriter,
) -> Result<i32> {
    let info = project.info(config.discovery());
    let mut writer = output_writer.stdout_writer();

    match message_format {
        MessageFormat::Human => {
            let styles = output.stdout_styles();
            writeln!(writer, "project: {}", info.project_name.style(styles.bold))
                .map_err(ExpectedError::write_output)?;
            writeln!(writer, "path: {}", info.project_path)
                .map_err(ExpectedError::write_output)?;
            writeln!(writer, "targets found: {}", info.targets_found.style(styles.count))
                .map_err(ExpectedError::write_output)?;
            for target in &info.targets {
                writeln!(writer, "  {target}").map_err(ExpectedError::write_output)?;
            }
        }
        MessageFormat::Json => {
            serde_json::to_writer_pretty(&mut writer, &info)
                .map_err(ExpectedError::serialize_json)?;
            writeln!(writer).map_err(ExpectedError::write_output)?;
        }
    }
    writer.flush().map_err(ExpectedError::write_output)?;
    Ok(TestdashExitCode::OK)
}

fn exec_show_config(config: &DashboardConfig, output_writer: &mut OutputWriter) -> Result<i32> {
    let toml = toml::to_string_pretty(config).map_err(|err| ExpectedError::SerializeConfig { err })?;
    let mut writer = output_writer.stdout_writer();
    writer
        .write_all(toml.as_bytes())
        .and_then(|()| writer.flush())
        .map_err(ExpectedError::write_output)?;
    Ok(TestdashExitCode::OK)
}
