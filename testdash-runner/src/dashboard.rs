// Copyright (c) The testdash Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The dashboard: the owning facade over a project, its runs and its subscribers.

use crate::{
    broadcast::{SnapshotBroadcaster, Subscription},
    config::DashboardConfig,
    coverage::{FileCoverage, report::HtmlReportStore},
    discovery::TestTarget,
    errors::{HtmlReportError, RunInProgressError, SetProjectError},
    project::{Project, ProjectInfo},
    runner::{RunOrchestrator, RunOutcome, TestExecutor},
    snapshot::DashboardSnapshot,
};
use chrono::Local;
use std::{
    path::Path,
    sync::{
        Arc, Mutex, MutexGuard,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};
use tokio::task::{JoinError, JoinHandle};
use tracing::{info, warn};

/// Owns a project, its current snapshot and subscribers, and the HTML report store.
///
/// `Dashboard` is cheap to clone; clones share the same state. At most one run is active at a
/// time.
#[derive(Clone, Debug)]
pub struct Dashboard {
    inner: Arc<DashboardInner>,
}

#[derive(Debug)]
struct DashboardInner {
    config: DashboardConfig,
    project: Mutex<Project>,
    broadcaster: Arc<SnapshotBroadcaster>,
    reports: Arc<HtmlReportStore>,
    run_in_progress: AtomicBool,
}

impl Dashboard {
    /// Creates a dashboard for `project`. The current snapshot starts out empty.
    pub fn new(project: Project, config: DashboardConfig) -> Self {
        let broadcaster = SnapshotBroadcaster::new(DashboardSnapshot::idle(&project));
        Self {
            inner: Arc::new(DashboardInner {
                config,
                project: Mutex::new(project),
                broadcaster: Arc::new(broadcaster),
                reports: Arc::new(HtmlReportStore::new()),
                run_in_progress: AtomicBool::new(false),
            }),
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &DashboardConfig {
        &self.inner.config
    }

    /// Returns the current project.
    pub fn project(&self) -> Project {
        self.inner.project().clone()
    }

    /// Returns true if a run is active.
    pub fn is_running(&self) -> bool {
        self.inner.run_in_progress.load(Ordering::Acquire)
    }

    /// Starts a run in the background.
    ///
    /// Fails if a run is already active. Must be called from within a tokio runtime.
    pub fn start_run(&self) -> Result<RunHandle, RunInProgressError> {
        let guard = RunGuard::acquire(&self.inner)?;
        let project = self.inner.project().clone();

        let executor = TestExecutor::new(&project, &self.inner.config, self.inner.reports.clone());
        let orchestrator = RunOrchestrator::new(
            project,
            &self.inner.config,
            Arc::new(executor),
            self.inner.broadcaster.clone(),
        );

        let handle = tokio::spawn(async move {
            let outcome = orchestrator.run().await;
            drop(guard);
            outcome
        });
        Ok(RunHandle { handle })
    }

    /// Subscribes to snapshots. The subscription starts with the current snapshot.
    pub fn subscribe(&self) -> Subscription {
        self.inner.broadcaster.subscribe()
    }

    /// Returns the current snapshot.
    pub fn current_snapshot(&self) -> Arc<DashboardSnapshot> {
        self.inner.broadcaster.current()
    }

    /// Returns the number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.inner.broadcaster.subscriber_count()
    }

    /// Switches to a different project.
    ///
    /// The new path is validated first, and the switch is rejected while a run is active. On
    /// success the current snapshot is republished, labelled with the new project.
    pub fn set_project_path(&self, path: impl AsRef<Path>) -> Result<(), SetProjectError> {
        let new_project = Project::new(path, &self.inner.config)?;

        let mut project = self.inner.project();
        if self.is_running() {
            return Err(RunInProgressError::new(project.root()).into());
        }

        info!(from = %project.root(), to = %new_project.root(), "switching project");
        let relabelled = self.inner.broadcaster.current().relabelled(&new_project);
        *project = new_project;
        self.inner.broadcaster.publish(relabelled);
        Ok(())
    }

    /// Returns the project's identity and discoverable targets.
    pub fn project_info(&self) -> ProjectInfo {
        self.project().info(self.inner.config.discovery())
    }

    /// Returns the per-file coverage for `target` from the current snapshot.
    pub fn coverage_files(&self, target: &TestTarget) -> Option<Vec<FileCoverage>> {
        self.current_snapshot()
            .result_for(target)
            .map(|result| result.files.clone())
    }

    /// Returns the styled HTML report for `handle`.
    pub fn html_report(&self, handle: &str) -> Result<String, HtmlReportError> {
        self.inner.reports.styled_html(handle)
    }

    /// Returns the HTML report store.
    pub fn reports(&self) -> &Arc<HtmlReportStore> {
        &self.inner.reports
    }

    /// Spawns a task that periodically deletes expired HTML reports.
    ///
    /// The task runs until aborted. Must be called from within a tokio runtime.
    pub fn spawn_sweeper(&self) -> JoinHandle<()> {
        let reports = self.inner.reports.clone();
        // `interval` panics on a zero period.
        let period = self
            .inner
            .config
            .report()
            .sweep_interval()
            .max(Duration::from_secs(1));
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            // The first tick completes immediately.
            interval.tick().await;
            loop {
                interval.tick().await;
                let result = reports.sweep(Local::now());
                if result.deleted_count > 0 {
                    info!(deleted = result.deleted_count, "swept expired HTML reports");
                }
                for err in &result.errors {
                    warn!("{err}");
                }
            }
        })
    }
}

impl DashboardInner {
    fn project(&self) -> MutexGuard<'_, Project> {
        self.project
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// A handle to a run started by [`Dashboard::start_run`].
#[derive(Debug)]
pub struct RunHandle {
    handle: JoinHandle<RunOutcome>,
}

impl RunHandle {
    /// Waits for the run to finish.
    pub async fn join(self) -> Result<RunOutcome, JoinError> {
        self.handle.await
    }

    /// Returns true if the run has finished.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

/// Marks a run as active until dropped, including when the run task panics.
#[derive(Debug)]
struct RunGuard {
    inner: Arc<DashboardInner>,
}

impl RunGuard {
    fn acquire(inner: &Arc<DashboardInner>) -> Result<Self, RunInProgressError> {
        inner
            .run_in_progress
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| RunInProgressError::new(inner.project().root()))?;
        Ok(Self {
            inner: inner.clone(),
        })
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.inner.run_in_progress.store(false, Ordering::Release);
    }
}
