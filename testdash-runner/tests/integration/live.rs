// Copyright (c) The testdash Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Subscribers and run exclusivity while a run is in flight.

#![cfg(unix)]

use crate::fixtures::*;
use color_eyre::eyre::{Result, eyre};
use futures::prelude::*;
use pretty_assertions::assert_eq;
use std::sync::Arc;
use testdash_runner::{
    broadcast::SnapshotStream, errors::SetProjectError, snapshot::DashboardSnapshot,
};

/// Reads snapshots until one satisfies `pred`.
async fn wait_for(
    updates: &mut SnapshotStream,
    mut pred: impl FnMut(&DashboardSnapshot) -> bool,
) -> Result<Arc<DashboardSnapshot>> {
    let wait = async {
        while let Some(snapshot) = updates.next().await {
            if pred(&*snapshot) {
                return Ok(snapshot);
            }
        }
        Err(eyre!("snapshot stream ended"))
    };
    tokio::time::timeout(TIMEOUT, wait).await?
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn late_subscriber_sees_the_same_progress() -> Result<()> {
    let project = TestProject::new(&["calc", "slow"])?;
    let dashboard = project.dashboard(script_config("1h")?)?;

    let (initial, mut early) = dashboard.subscribe().into_parts();
    assert!(initial.last_run_at.is_none());

    let handle = dashboard.start_run()?;
    let started = wait_for(&mut early, |s| s.total_targets == 2).await?;
    assert!(started.results.is_empty());
    assert_eq!(started.pending_targets.len(), 2);

    let one_done = wait_for(&mut early, |s| s.results.len() == 1).await?;
    assert_eq!(one_done.results[0].target.as_str(), "calc");
    assert_eq!(one_done.pending_targets.len(), 1);

    // Joining mid-run starts from the latest snapshot.
    let (late_initial, mut late) = dashboard.subscribe().into_parts();
    assert_eq!(late_initial, one_done);
    assert_eq!(dashboard.subscriber_count(), 2);

    project.write("release", "")?;
    let early_final = wait_for(&mut early, DashboardSnapshot::is_complete).await?;
    let late_final = wait_for(&mut late, DashboardSnapshot::is_complete).await?;
    assert_eq!(early_final, late_final);
    assert_eq!(early_final.results.len(), 2);

    tokio::time::timeout(TIMEOUT, handle.join()).await??;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn overlapping_runs_are_rejected() -> Result<()> {
    let project = TestProject::new(&["slow"])?;
    let dashboard = project.dashboard(script_config("1h")?)?;
    let (_, mut updates) = dashboard.subscribe().into_parts();

    let handle = dashboard.start_run()?;
    wait_for(&mut updates, |s| s.total_targets == 1).await?;

    assert!(dashboard.is_running());
    dashboard
        .start_run()
        .expect_err("second run is rejected while the first is active");
    let err = dashboard
        .set_project_path(project.root())
        .expect_err("project can't change during a run");
    assert!(matches!(err, SetProjectError::RunInProgress(_)), "{err:?}");

    project.write("release", "")?;
    let outcome = tokio::time::timeout(TIMEOUT, handle.join()).await??;
    assert!(outcome.stats().is_some_and(|stats| stats.is_success()));
    assert!(!dashboard.is_running());

    // The rejected request left no trace; a new run starts normally.
    let outcome = dashboard.start_run()?.join().await?;
    assert_eq!(outcome.stats().map(|stats| stats.passed), Some(1));
    Ok(())
}
