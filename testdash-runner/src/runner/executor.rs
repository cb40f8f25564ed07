// Copyright (c) The testdash Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Running a single target.

use crate::{
    config::{CommandTemplate, DashboardConfig},
    coverage::{
        profile::{ParsedProfile, SourceResolver},
        report::{HtmlReportStore, generate_html_report},
        summary::extract_coverage_percent,
    },
    discovery::TestTarget,
    project::Project,
    snapshot::TestResult,
    time::stopwatch,
};
use camino::{Utf8Path, Utf8PathBuf};
use chrono::{DateTime, Local, TimeDelta, Utc};
use std::{
    io,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};
use tracing::{debug, warn};

/// Runs one target to completion, producing exactly one result.
///
/// Implementations never fail: every problem is reported as a failed [`TestResult`] with a
/// diagnostic in its output. `execute` is called on the blocking thread pool.
pub trait ExecuteTarget: Send + Sync + 'static {
    /// Runs `target` and returns its result.
    fn execute(&self, target: &TestTarget) -> TestResult;
}

/// Runs targets by invoking the configured external runner.
#[derive(Clone, Debug)]
pub struct TestExecutor {
    project_root: Utf8PathBuf,
    command: CommandTemplate,
    report: Option<ReportSettings>,
    resolver: SourceResolver,
    reports: Arc<HtmlReportStore>,
}

#[derive(Clone, Debug)]
struct ReportSettings {
    command: CommandTemplate,
    retention: Duration,
}

impl TestExecutor {
    /// Creates an executor for `project`, recording generated reports in `reports`.
    pub fn new(
        project: &Project,
        config: &DashboardConfig,
        reports: Arc<HtmlReportStore>,
    ) -> Self {
        let module_name = project.module_name(&config.project().manifest);
        debug!(
            project = %project.root(),
            module = module_name.as_deref().unwrap_or("<none>"),
            "creating test executor",
        );
        Self {
            project_root: project.root().to_owned(),
            command: config.runner().command().clone(),
            report: config.report().command().map(|command| ReportSettings {
                command: command.clone(),
                retention: config.report().retention(),
            }),
            resolver: SourceResolver::new(project.root(), module_name.as_deref()),
            reports,
        }
    }

    fn run_and_collect(&self, target: &TestTarget, artifacts: &ArtifactNames) -> TestResult {
        let stopwatch = stopwatch();
        let runner_arg = target.runner_arg();
        let vars = [
            ("target", runner_arg.as_str()),
            ("profile", artifacts.profile.as_str()),
        ];
        debug!(%target, command = %self.command.display_expanded(&vars), "running target");

        let output = self.command.to_expression(&self.project_root, &vars).run();
        let elapsed = stopwatch.snapshot();

        let output = match output {
            Ok(output) => output,
            Err(err) => {
                warn!(%target, "error invoking test runner: {err}");
                return TestResult::failed(
                    target.clone(),
                    format!(
                        "error invoking test runner `{}`: {err}",
                        self.command.display_expanded(&vars),
                    ),
                    elapsed.duration,
                    elapsed.end_time(),
                );
            }
        };

        let raw_output = String::from_utf8_lossy(&output.stdout).into_owned();
        let mut result = TestResult {
            target: target.clone(),
            passed: output.status.success(),
            output: raw_output,
            duration: elapsed.duration,
            coverage_percent: 0.0,
            files: Vec::new(),
            completed_at: elapsed.end_time(),
            html_report: None,
        };

        let profile_path = self.project_root.join(&artifacts.profile);
        if !profile_path.is_file() {
            debug!(%target, passed = result.passed, "no coverage profile produced");
            return result;
        }

        result.coverage_percent = extract_coverage_percent(&result.output);
        match ParsedProfile::read(&profile_path) {
            Ok(profile) => {
                if profile.malformed_count() > 0 {
                    warn!(
                        %target,
                        "skipped {} malformed lines in coverage profile",
                        profile.malformed_count(),
                    );
                }
                result.files = profile.into_file_coverage(&self.resolver);
            }
            Err(err) => warn!(%target, "{err}"),
        }

        if let Some(report) = &self.report
            && let Some(path) = generate_html_report(
                &report.command,
                &self.project_root,
                &artifacts.profile,
                &artifacts.html,
            )
        {
            let expires_at = expiry_after(Local::now(), report.retention);
            result.html_report = Some(self.reports.register(path, expires_at));
        }

        debug!(
            %target,
            passed = result.passed,
            coverage = result.coverage_percent,
            files = result.files.len(),
            "target finished",
        );
        result
    }
}

impl ExecuteTarget for TestExecutor {
    fn execute(&self, target: &TestTarget) -> TestResult {
        if !self.project_root.is_dir() {
            return TestResult::failed(
                target.clone(),
                format!("project directory `{}` is not accessible", self.project_root),
                Duration::ZERO,
                Local::now(),
            );
        }

        let artifacts = ArtifactNames::new(target);
        let _profile = RemoveOnDrop(self.project_root.join(&artifacts.profile));
        self.run_and_collect(target, &artifacts)
    }
}

static ARTIFACT_SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// File names, relative to the project root, for one invocation's artifacts.
#[derive(Clone, Debug)]
struct ArtifactNames {
    profile: String,
    html: String,
}

impl ArtifactNames {
    fn new(target: &TestTarget) -> Self {
        let nanos = Utc::now().timestamp_nanos_opt().unwrap_or_default();
        let seq = ARTIFACT_SEQUENCE.fetch_add(1, Ordering::Relaxed);
        let stem = format!("coverage_{}_{nanos}_{seq}", target.sanitized());
        Self {
            profile: format!("{stem}.out"),
            html: format!("{stem}.html"),
        }
    }
}

/// Deletes the file at the path when dropped.
struct RemoveOnDrop(Utf8PathBuf);

impl Drop for RemoveOnDrop {
    fn drop(&mut self) {
        remove_if_exists(&self.0);
    }
}

fn remove_if_exists(path: &Utf8Path) {
    match std::fs::remove_file(path) {
        Ok(()) => debug!(%path, "removed coverage profile"),
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(err) => warn!(%path, "error removing coverage profile: {err}"),
    }
}

fn expiry_after(now: DateTime<Local>, retention: Duration) -> DateTime<Local> {
    TimeDelta::from_std(retention)
        .ok()
        .and_then(|delta| now.checked_add_signed(delta))
        .unwrap_or_else(|| now + TimeDelta::days(36_500))
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino_tempfile::Utf8TempDir;
    use std::collections::HashSet;

    #[test]
    fn artifact_names_are_unique() {
        let target = TestTarget::new("a/b");
        let names: HashSet<_> = (0..1000)
            .map(|_| ArtifactNames::new(&target).profile)
            .collect();
        assert_eq!(names.len(), 1000);

        let names = ArtifactNames::new(&target);
        assert!(names.profile.starts_with("coverage_a_b_"), "{}", names.profile);
        assert!(names.profile.ends_with(".out"));
        assert_eq!(
            names.profile.trim_end_matches(".out"),
            names.html.trim_end_matches(".html"),
        );
    }

    #[test]
    fn expiry_saturates() {
        let now = Local::now();
        assert_eq!(
            expiry_after(now, Duration::from_secs(3600)),
            now + TimeDelta::hours(1)
        );
        assert!(expiry_after(now, Duration::MAX) > now);
    }

    #[test]
    fn inaccessible_root_fails_without_running() {
        let dir = Utf8TempDir::new().expect("created temp dir");
        let root = dir.path().join("project");
        std::fs::create_dir(&root).expect("created project dir");
        std::fs::write(root.join("go.mod"), "module example.com/calc\n").expect("wrote go.mod");

        let config = DashboardConfig::default();
        let project = Project::new(&root, &config).expect("valid project");
        let reports = Arc::new(HtmlReportStore::new());
        let executor = TestExecutor::new(&project, &config, reports.clone());

        std::fs::remove_dir_all(&root).expect("removed project dir");
        let result = executor.execute(&TestTarget::new("calc"));

        assert!(!result.passed);
        assert!(result.output.contains("is not accessible"), "{}", result.output);
        assert_eq!(result.coverage_percent, 0.0);
        assert!(result.files.is_empty());
        assert_eq!(result.html_report, None);
        assert_eq!(result.duration, Duration::ZERO);
        assert!(reports.is_empty());

        // Nothing recreated the root or left a profile next to it.
        assert!(!root.exists());
        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .expect("read temp dir")
            .map(|entry| entry.expect("read entry").file_name())
            .collect();
        assert!(leftovers.is_empty(), "{leftovers:?}");
    }
}
