// Copyright (c) The testdash Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::fixtures::*;
use chrono::Local;
use color_eyre::eyre::{Result, ensure};
use pretty_assertions::assert_eq;
use testdash_runner::{
    config::DashboardConfig,
    discovery::TestTarget,
    errors::HtmlReportError,
    runner::{NO_TARGETS_MESSAGE, RunOutcome},
};

#[cfg(unix)]
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn run_collects_results_and_coverage() -> Result<()> {
    let project = TestProject::new(&["calc", "utils"])?;
    let dashboard = project.dashboard(script_config("1h")?)?;

    let outcome = dashboard.start_run()?.join().await?;
    let RunOutcome::Completed(stats) = outcome else {
        panic!("expected a completed run, found {outcome:?}");
    };
    assert_eq!((stats.total_targets, stats.passed, stats.failed), (2, 1, 1));
    assert!(!stats.is_success());
    assert_eq!(stats.overall_coverage_percent, 25.0);
    assert!(!dashboard.is_running());

    let snapshot = dashboard.current_snapshot();
    assert!(snapshot.is_complete());
    assert_eq!(snapshot.passed_count, 1);
    assert_eq!(snapshot.failed_count(), 1);
    assert_eq!(snapshot.overall_coverage_percent, 25.0);

    let calc = snapshot
        .result_for(&TestTarget::new("calc"))
        .expect("calc has a result");
    assert!(calc.passed, "calc output: {}", calc.output);
    assert_eq!(calc.coverage_percent, 50.0);
    assert_eq!(calc.files.len(), 1);
    let file = &calc.files[0];
    assert_eq!(file.filename(), "example.com/calc/calc/calc.go");
    assert_eq!(file.content(), CALC_SOURCE);
    assert_eq!(file.blocks().len(), 2);
    assert_eq!(file.coverage_percent(), 50.0);
    assert_eq!(
        dashboard.coverage_files(&TestTarget::new("calc")).as_deref(),
        Some(calc.files.as_slice()),
    );

    let handle = calc.html_report.as_deref().expect("calc has an HTML report");
    let html = dashboard.html_report(handle)?;
    assert!(html.contains("<style>"), "stylesheet injected: {html}");
    assert!(html.contains("report"));

    let utils = snapshot
        .result_for(&TestTarget::new("utils"))
        .expect("utils has a result");
    assert!(!utils.passed);
    assert!(utils.output.contains("--- FAIL: TestParse"), "{}", utils.output);
    assert_eq!(utils.coverage_percent, 0.0);
    assert!(utils.files.is_empty());
    assert_eq!(utils.html_report, None);

    ensure!(
        project.artifacts(".out")?.is_empty(),
        "coverage profiles are deleted after each target",
    );
    assert_eq!(project.artifacts(".html")?.len(), 1);
    Ok(())
}

#[cfg(unix)]
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn expired_reports_are_swept() -> Result<()> {
    let project = TestProject::new(&["calc"])?;
    let dashboard = project.dashboard(script_config("0s")?)?;

    dashboard.start_run()?.join().await?;
    let snapshot = dashboard.current_snapshot();
    let handle = snapshot.results[0]
        .html_report
        .clone()
        .expect("report generated");
    assert!(dashboard.reports().contains(&handle));

    let result = dashboard.reports().sweep(Local::now());
    assert_eq!(result.deleted_count, 1);
    assert!(result.errors.is_empty());
    assert!(!project.root().join(&handle).exists());

    let err = dashboard
        .html_report(&handle)
        .expect_err("swept reports are not served");
    assert!(matches!(err, HtmlReportError::NotFound { .. }), "{err:?}");
    Ok(())
}

#[tokio::test]
async fn project_without_targets_reports_status() -> Result<()> {
    let project = TestProject::new(&[])?;
    let dashboard = project.dashboard(DashboardConfig::default())?;

    let outcome = dashboard.start_run()?.join().await?;
    assert!(matches!(outcome, RunOutcome::NoTargets), "{outcome:?}");

    let snapshot = dashboard.current_snapshot();
    assert_eq!(snapshot.status_message.as_deref(), Some(NO_TARGETS_MESSAGE));
    assert!(snapshot.results.is_empty());
    assert_eq!(snapshot.total_targets, 0);
    assert!(snapshot.last_run_at.is_some());
    Ok(())
}

#[tokio::test]
async fn missing_runner_produces_failed_results() -> Result<()> {
    let project = TestProject::new(&["calc", "utils"])?;
    let config = DashboardConfig::from_toml_str(indoc::indoc! {r#"
        [runner]
        program = "testdash-no-such-runner"
        args = ["{target}"]
    "#})?;
    let dashboard = project.dashboard(config)?;

    let outcome = dashboard.start_run()?.join().await?;
    let stats = outcome.stats().expect("run completed");
    assert_eq!((stats.finished, stats.failed), (2, 2));

    for result in &dashboard.current_snapshot().results {
        assert!(!result.passed);
        assert!(
            result.output.contains("error invoking test runner"),
            "{}",
            result.output,
        );
        assert_eq!(result.coverage_percent, 0.0);
    }
    Ok(())
}

#[test]
fn project_info_lists_targets() -> Result<()> {
    let project = TestProject::new(&["calc", "utils", "vendor/dep"])?;
    let dashboard = project.dashboard(DashboardConfig::default())?;

    let info = dashboard.project_info();
    assert_eq!(info.project_path, project.root().canonicalize_utf8()?);
    assert_eq!(info.targets_found, 2);
    assert_eq!(
        info.targets,
        [TestTarget::new("calc"), TestTarget::new("utils")]
    );
    Ok(())
}
