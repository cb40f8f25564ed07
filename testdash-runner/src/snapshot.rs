// Copyright (c) The testdash Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Results and the snapshots published to subscribers.
//!
//! All types here serialize with `snake_case` field names, durations in humantime form and
//! timestamps in RFC 3339, so that a transport layer can forward them as-is.

use crate::{coverage::FileCoverage, discovery::TestTarget, project::Project};
use camino::Utf8PathBuf;
use chrono::{DateTime, Local};
use serde::Serialize;
use std::{sync::Arc, time::Duration};

/// The outcome of running one target.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TestResult {
    /// The target that was run.
    pub target: TestTarget,

    /// Whether the runner exited successfully.
    pub passed: bool,

    /// Combined standard output and standard error from the runner, or a diagnostic message if
    /// the runner couldn't be invoked.
    pub output: String,

    /// Wall time spent running the target.
    #[serde(with = "humantime_serde")]
    pub duration: Duration,

    /// The percentage reported by the runner itself.
    pub coverage_percent: f64,

    /// Per-file coverage parsed from the profile, in profile order.
    pub files: Vec<FileCoverage>,

    /// When the target finished running.
    pub completed_at: DateTime<Local>,

    /// A handle to the rendered HTML report, if one was generated.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub html_report: Option<String>,
}

impl TestResult {
    /// Creates a failed result carrying `output` as its diagnostic, with no coverage data.
    pub fn failed(
        target: TestTarget,
        output: impl Into<String>,
        duration: Duration,
        completed_at: DateTime<Local>,
    ) -> Self {
        Self {
            target,
            passed: false,
            output: output.into(),
            duration,
            coverage_percent: 0.0,
            files: Vec::new(),
            completed_at,
            html_report: None,
        }
    }
}

/// A consistent view of run progress.
///
/// Snapshots are never edited once published: each publish supersedes the previous snapshot.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DashboardSnapshot {
    /// Completed results, in completion order.
    pub results: Vec<Arc<TestResult>>,

    /// Targets that haven't completed yet, in discovery order.
    pub pending_targets: Vec<TestTarget>,

    /// The mean of `coverage_percent` over `results`, or 0 if there are none.
    pub overall_coverage_percent: f64,

    /// The number of targets in the run.
    pub total_targets: usize,

    /// The number of passed results.
    pub passed_count: usize,

    /// When the run that produced this snapshot started, or `None` before the first run.
    pub last_run_at: Option<DateTime<Local>>,

    /// The project root.
    pub project_path: Utf8PathBuf,

    /// The project name.
    pub project_name: String,

    /// A human-readable message for conditions that ended a run early.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_message: Option<String>,
}

impl DashboardSnapshot {
    /// An empty snapshot for a project that hasn't been run yet.
    pub fn idle(project: &Project) -> Self {
        Self {
            results: Vec::new(),
            pending_targets: Vec::new(),
            overall_coverage_percent: 0.0,
            total_targets: 0,
            passed_count: 0,
            last_run_at: None,
            project_path: project.root().to_owned(),
            project_name: project.name().to_owned(),
            status_message: None,
        }
    }

    /// A terminal snapshot carrying only `message`, the project identity and the run time.
    pub fn with_status(project: &Project, last_run_at: DateTime<Local>, message: String) -> Self {
        Self {
            last_run_at: Some(last_run_at),
            status_message: Some(message),
            ..Self::idle(project)
        }
    }

    /// Returns a copy of this snapshot labelled with a different project.
    pub fn relabelled(&self, project: &Project) -> Self {
        Self {
            project_path: project.root().to_owned(),
            project_name: project.name().to_owned(),
            ..self.clone()
        }
    }

    /// The number of failed results.
    pub fn failed_count(&self) -> usize {
        self.results.len() - self.passed_count
    }

    /// Returns true if no targets remain pending.
    pub fn is_complete(&self) -> bool {
        self.pending_targets.is_empty()
    }

    /// Returns the result for `target`, if it has completed.
    pub fn result_for(&self, target: &TestTarget) -> Option<&Arc<TestResult>> {
        self.results.iter().find(|result| &result.target == target)
    }
}
