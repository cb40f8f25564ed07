// Copyright (c) The testdash Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Generated HTML coverage reports and their retention.
//!
//! Reports are rendered by an external command into the project root. Each one is recorded in an
//! [`HtmlReportStore`] under a handle (its file name) together with an expiry time.
//! [`HtmlReportStore::sweep`] deletes reports whose expiry has passed.

use crate::{
    config::CommandTemplate,
    errors::{HtmlReportError, HtmlReportRemoveError},
};
use camino::{Utf8Path, Utf8PathBuf};
use chrono::{DateTime, Local};
use indexmap::IndexMap;
use std::{
    io,
    sync::{Mutex, MutexGuard},
};
use tracing::{debug, info, warn};

/// Stylesheet injected into served reports.
const REPORT_CSS: &str = r#"
/* dark theme for coverage reports */
body {
    background-color: #1a1a1a !important; color: #e0e0e0 !important;
    font-family: 'Segoe UI', Tahoma, Geneva, Verdana, sans-serif !important;
    margin: 0 !important; padding: 20px !important;
}
pre {
    background: #1a1a1a !important; color: #e0e0e0 !important;
}
.cov0 { background-color: rgba(244, 67, 54, 0.3) !important; color: #ffffff !important; }
.cov1, .cov2, .cov3, .cov4, .cov5, .cov6, .cov7, .cov8, .cov9, .cov10 {
    background-color: rgba(76, 175, 80, 0.3) !important; color: #ffffff !important;
}
a { color: #4CAF50 !important; }
* { border-color: #404040 !important; }
"#;

#[derive(Clone, Debug)]
struct ReportEntry {
    path: Utf8PathBuf,
    expires_at: DateTime<Local>,
}

/// Bookkeeping for generated HTML reports, keyed by handle.
#[derive(Debug, Default)]
pub struct HtmlReportStore {
    entries: Mutex<IndexMap<String, ReportEntry>>,
}

impl HtmlReportStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a report at `path`, returning its handle.
    ///
    /// The handle is the report's file name. Registering the same file again replaces its expiry.
    pub fn register(&self, path: Utf8PathBuf, expires_at: DateTime<Local>) -> String {
        let handle = path.file_name().unwrap_or(path.as_str()).to_owned();
        debug!(%handle, %expires_at, "registered HTML coverage report");
        self.lock()
            .insert(handle.clone(), ReportEntry { path, expires_at });
        handle
    }

    /// Returns true if `handle` is currently recorded.
    pub fn contains(&self, handle: &str) -> bool {
        self.lock().contains_key(handle)
    }

    /// Returns the number of recorded reports.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns true if no reports are recorded.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Reads the report for `handle` and injects the dashboard stylesheet.
    ///
    /// Only handles recorded through [`register`](Self::register) are served.
    pub fn styled_html(&self, handle: &str) -> Result<String, HtmlReportError> {
        let path = self
            .lock()
            .get(handle)
            .map(|entry| entry.path.clone())
            .ok_or_else(|| HtmlReportError::NotFound {
                handle: handle.to_owned(),
            })?;
        let html = std::fs::read_to_string(&path)
            .map_err(|err| HtmlReportError::Read { path, err })?;
        Ok(inject_stylesheet(html))
    }

    /// Deletes every report that expired at or before `now`, and forgets it.
    ///
    /// Entries are removed even if deleting the file fails; failures are collected in the result.
    pub fn sweep(&self, now: DateTime<Local>) -> SweepResult {
        self.remove_where(|entry| entry.expires_at <= now)
    }

    /// Deletes every recorded report regardless of expiry, and forgets it.
    pub fn remove_all(&self) -> SweepResult {
        self.remove_where(|_| true)
    }

    fn remove_where(&self, mut pred: impl FnMut(&ReportEntry) -> bool) -> SweepResult {
        let mut entries = self.lock();
        let mut result = SweepResult::default();

        entries.retain(|handle, entry| {
            if !pred(entry) {
                return true;
            }
            match std::fs::remove_file(&entry.path) {
                Ok(()) => {
                    info!(%handle, "removed HTML coverage report");
                    result.deleted_count += 1;
                }
                Err(err) if err.kind() == io::ErrorKind::NotFound => {
                    debug!(%handle, "HTML coverage report was already gone");
                    result.deleted_count += 1;
                }
                Err(err) => {
                    result
                        .errors
                        .push(HtmlReportRemoveError::new(entry.path.clone(), err));
                }
            }
            false
        });

        result
    }

    fn lock(&self) -> MutexGuard<'_, IndexMap<String, ReportEntry>> {
        // Every mutation is a single map operation, so the map is consistent even if poisoned.
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// The outcome of [`HtmlReportStore::sweep`].
#[derive(Debug, Default)]
pub struct SweepResult {
    /// The number of reports that were removed.
    pub deleted_count: usize,

    /// Errors that occurred while deleting files.
    ///
    /// Sweeping continues despite individual errors.
    pub errors: Vec<HtmlReportRemoveError>,
}

/// Runs the report command, producing `output` from `profile` in `project_root`.
///
/// Returns the full path to the report, or `None` if the command failed to start, exited
/// unsuccessfully, or exited successfully without writing the file.
pub(crate) fn generate_html_report(
    command: &CommandTemplate,
    project_root: &Utf8Path,
    profile: &str,
    output: &str,
) -> Option<Utf8PathBuf> {
    let vars = [("profile", profile), ("output", output)];
    let output_path = project_root.join(output);

    match command.to_expression(project_root, &vars).run() {
        Ok(result) if result.status.success() => {
            if output_path.is_file() {
                Some(output_path)
            } else {
                warn!(
                    command = %command.display_expanded(&vars),
                    "HTML report command succeeded but did not write {output_path}",
                );
                None
            }
        }
        Ok(result) => {
            warn!(
                command = %command.display_expanded(&vars),
                "HTML report command failed with {}: {}",
                result.status,
                String::from_utf8_lossy(&result.stdout).trim_end(),
            );
            None
        }
        Err(err) => {
            warn!(
                command = %command.display_expanded(&vars),
                "error running HTML report command: {err}",
            );
            None
        }
    }
}

fn inject_stylesheet(mut html: String) -> String {
    if let Some(index) = html.find("</head>") {
        html.insert_str(index, &format!("\n<style>\n{REPORT_CSS}\n</style>\n"));
    }
    html
}
