// Copyright (c) The testdash Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{
    discovery::TestTarget,
    project::Project,
    snapshot::{DashboardSnapshot, TestResult},
};
use camino::Utf8PathBuf;
use chrono::{DateTime, Local};
use indexmap::IndexSet;
use std::{sync::Arc, time::Duration};

/// The running state of one run, folded one result at a time.
#[derive(Clone, Debug)]
pub(crate) struct RunAggregate {
    project_path: Utf8PathBuf,
    project_name: String,
    started_at: DateTime<Local>,
    total_targets: usize,
    pending: IndexSet<TestTarget>,
    results: Vec<Arc<TestResult>>,
    passed: usize,
    coverage_sum: f64,
}

impl RunAggregate {
    pub(crate) fn new(
        project: &Project,
        started_at: DateTime<Local>,
        targets: impl IntoIterator<Item = TestTarget>,
    ) -> Self {
        let pending: IndexSet<_> = targets.into_iter().collect();
        Self {
            project_path: project.root().to_owned(),
            project_name: project.name().to_owned(),
            started_at,
            total_targets: pending.len(),
            pending,
            results: Vec::new(),
            passed: 0,
            coverage_sum: 0.0,
        }
    }

    /// Appends a completed result and returns the snapshot reflecting it.
    pub(crate) fn push(&mut self, result: TestResult) -> DashboardSnapshot {
        self.pending.shift_remove(&result.target);
        if result.passed {
            self.passed += 1;
        }
        self.coverage_sum += result.coverage_percent;
        self.results.push(Arc::new(result));
        self.snapshot()
    }

    pub(crate) fn snapshot(&self) -> DashboardSnapshot {
        DashboardSnapshot {
            results: self.results.clone(),
            pending_targets: self.pending.iter().cloned().collect(),
            overall_coverage_percent: self.overall_coverage_percent(),
            total_targets: self.total_targets,
            passed_count: self.passed,
            last_run_at: Some(self.started_at),
            project_path: self.project_path.clone(),
            project_name: self.project_name.clone(),
            status_message: None,
        }
    }

    pub(crate) fn finish(self, elapsed: Duration) -> RunStats {
        RunStats {
            total_targets: self.total_targets,
            finished: self.results.len(),
            passed: self.passed,
            failed: self.results.len() - self.passed,
            overall_coverage_percent: self.overall_coverage_percent(),
            started_at: self.started_at,
            elapsed,
        }
    }

    fn overall_coverage_percent(&self) -> f64 {
        if self.results.is_empty() {
            0.0
        } else {
            self.coverage_sum / self.results.len() as f64
        }
    }
}

/// Statistics about a completed run.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RunStats {
    /// The number of targets discovered at the start of the run.
    pub total_targets: usize,

    /// The number of targets that produced a result.
    pub finished: usize,

    /// The number of targets that passed.
    pub passed: usize,

    /// The number of targets that failed.
    pub failed: usize,

    /// The mean coverage over all results.
    pub overall_coverage_percent: f64,

    /// When the run started.
    pub started_at: DateTime<Local>,

    /// How long the run took.
    pub elapsed: Duration,
}

impl RunStats {
    /// Returns true if every target passed.
    pub fn is_success(&self) -> bool {
        self.failed == 0 && self.finished == self.total_targets
    }
}
