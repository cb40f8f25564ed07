// Copyright (c) The testdash Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::{ExecuteTarget, RunAggregate, RunStats};
use crate::{
    broadcast::SnapshotBroadcaster,
    config::{DashboardConfig, DiscoveryConfig},
    discovery::{TestTarget, discover_targets},
    errors::DiscoveryError,
    project::Project,
    snapshot::{DashboardSnapshot, TestResult},
    time::stopwatch,
};
use chrono::Local;
use futures::prelude::*;
use std::{any::Any, sync::Arc, time::Duration};
use tokio::task::JoinError;
use tracing::{debug, info, warn};

/// The status message published when a project has no test targets.
pub const NO_TARGETS_MESSAGE: &str = "No tests found in the selected project.";

/// Drives runs for one project: discovery, bounded concurrent execution, and aggregation.
///
/// Every intermediate state is published through the [`SnapshotBroadcaster`].
#[derive(Debug)]
pub struct RunOrchestrator<E> {
    project: Project,
    discovery: DiscoveryConfig,
    test_threads: usize,
    executor: Arc<E>,
    broadcaster: Arc<SnapshotBroadcaster>,
}

impl<E: ExecuteTarget> RunOrchestrator<E> {
    /// Creates a new orchestrator.
    ///
    /// The number of simultaneous executions is taken from `config`.
    pub fn new(
        project: Project,
        config: &DashboardConfig,
        executor: Arc<E>,
        broadcaster: Arc<SnapshotBroadcaster>,
    ) -> Self {
        Self {
            project,
            discovery: config.discovery().clone(),
            test_threads: config.runner().test_threads().compute(),
            executor,
            broadcaster,
        }
    }

    /// Returns the number of targets executed simultaneously.
    pub fn test_threads(&self) -> usize {
        self.test_threads
    }

    /// Performs one run to completion.
    ///
    /// Results are folded in completion order; a snapshot is published at the start of the run
    /// and after every result.
    pub async fn run(&self) -> RunOutcome {
        let stopwatch = stopwatch();
        let started_at = stopwatch.start_time();
        info!(project = %self.project.root(), "starting test run");

        let targets = match discover_targets(self.project.root(), &self.discovery) {
            Ok(targets) => targets,
            Err(err) => {
                let message = err.display_chain().to_string();
                warn!("{message}");
                self.broadcaster.publish(DashboardSnapshot::with_status(
                    &self.project,
                    started_at,
                    message,
                ));
                return RunOutcome::DiscoveryFailed(err);
            }
        };

        if targets.is_empty() {
            info!(project = %self.project.root(), "no test targets found");
            self.broadcaster.publish(DashboardSnapshot::with_status(
                &self.project,
                started_at,
                NO_TARGETS_MESSAGE.to_owned(),
            ));
            return RunOutcome::NoTargets;
        }

        debug!(
            targets = targets.len(),
            test_threads = self.test_threads,
            "running targets",
        );
        let mut aggregate = RunAggregate::new(&self.project, started_at, targets.iter().cloned());
        self.broadcaster.publish(aggregate.snapshot());

        let executor = self.executor.clone();
        let mut completions = stream::iter(targets)
            .map(move |target| execute_blocking(executor.clone(), target))
            .buffer_unordered(self.test_threads);

        while let Some(result) = completions.next().await {
            debug!(target = %result.target, passed = result.passed, "result received");
            self.broadcaster.publish(aggregate.push(result));
        }

        let stats = aggregate.finish(stopwatch.snapshot().duration);
        info!(
            total = stats.total_targets,
            passed = stats.passed,
            failed = stats.failed,
            coverage = format_args!("{:.1}%", stats.overall_coverage_percent),
            elapsed = ?stats.elapsed,
            "test run complete",
        );
        RunOutcome::Completed(stats)
    }
}

/// The way a run ended.
#[derive(Debug)]
pub enum RunOutcome {
    /// Discovery failed, so no targets were run.
    DiscoveryFailed(DiscoveryError),

    /// The project has no test targets.
    NoTargets,

    /// Every discovered target was run.
    Completed(RunStats),
}

impl RunOutcome {
    /// Returns the statistics for a completed run.
    pub fn stats(&self) -> Option<&RunStats> {
        match self {
            Self::Completed(stats) => Some(stats),
            Self::DiscoveryFailed(_) | Self::NoTargets => None,
        }
    }
}

async fn execute_blocking<E: ExecuteTarget>(executor: Arc<E>, target: TestTarget) -> TestResult {
    let task_target = target.clone();
    match tokio::task::spawn_blocking(move || executor.execute(&task_target)).await {
        Ok(result) => result,
        Err(err) => join_error_result(target, err),
    }
}

fn join_error_result(target: TestTarget, err: JoinError) -> TestResult {
    let message = if err.is_panic() {
        format!("test executor panicked: {}", panic_message(err.into_panic()))
    } else {
        "test executor was cancelled".to_owned()
    };
    warn!(%target, "{message}");
    TestResult::failed(target, message, Duration::ZERO, Local::now())
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    match payload.downcast::<String>() {
        Ok(message) => *message,
        Err(payload) => match payload.downcast::<&'static str>() {
            Ok(message) => (*message).to_owned(),
            Err(_) => "<non-string panic payload>".to_owned(),
        },
    }
}
