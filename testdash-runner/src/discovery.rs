// Copyright (c) The testdash Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Finding test targets in a project tree.
//!
//! A test target is a directory containing at least one file whose name ends with the configured
//! test-file suffix. The walk visits entries sorted by file name and prunes configured
//! infrastructure directories, so the result is stable on an unchanged tree.

use crate::{
    config::DiscoveryConfig,
    errors::{DiscoveryError, DiscoveryErrorKind},
};
use camino::{Utf8Path, Utf8PathBuf};
use indexmap::IndexSet;
use serde::Serialize;
use std::fmt;
use tracing::debug;
use walkdir::{DirEntry, WalkDir};

/// One independently runnable test unit, identified by its directory.
///
/// The canonical form is the directory relative to the project root, `/`-separated, with `.` for
/// the root itself.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(transparent)]
pub struct TestTarget(String);

impl TestTarget {
    /// Creates a target from a relative directory path, normalizing it to canonical form.
    pub fn new(relative_dir: impl AsRef<str>) -> Self {
        let normalized = relative_dir
            .as_ref()
            .split(['/', '\\'])
            .filter(|component| !component.is_empty() && *component != ".")
            .collect::<Vec<_>>()
            .join("/");
        if normalized.is_empty() {
            Self(".".to_owned())
        } else {
            Self(normalized)
        }
    }

    /// Returns the canonical form.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true if this target is the project root.
    pub fn is_root(&self) -> bool {
        self.0 == "."
    }

    /// The form passed to the external runner: `./<dir>`, or `./` for the root.
    pub fn runner_arg(&self) -> String {
        if self.is_root() {
            "./".to_owned()
        } else {
            format!("./{}", self.0)
        }
    }

    /// A form safe to embed in a file name.
    pub fn sanitized(&self) -> String {
        if self.is_root() {
            "root".to_owned()
        } else {
            self.0.replace('/', "_")
        }
    }
}

impl fmt::Display for TestTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Returns the test targets under `root`, in walk order and without duplicates.
///
/// Any traversal error aborts discovery.
pub fn discover_targets(
    root: &Utf8Path,
    config: &DiscoveryConfig,
) -> Result<Vec<TestTarget>, DiscoveryError> {
    let mut targets = IndexSet::new();

    for entry in walk(root, config) {
        let entry = entry.map_err(|err| DiscoveryError::new(root, err.into()))?;
        // Links aren't followed, but a linked test file still marks its directory.
        if entry.file_type().is_dir() {
            continue;
        }
        let path = utf8_path(root, &entry)?;
        if !path
            .file_name()
            .is_some_and(|name| name.ends_with(&config.test_file_suffix))
        {
            continue;
        }

        let dir = path.parent().unwrap_or(root);
        let relative = dir.strip_prefix(root).unwrap_or(dir);
        if targets.insert(TestTarget::new(relative.as_str())) {
            debug!(target = %relative, "discovered test target");
        }
    }

    Ok(targets.into_iter().collect())
}

/// Returns true if any file under `root` has the configured source extension.
///
/// Uses the same pruning walk as [`discover_targets`].
pub fn contains_source_files(
    root: &Utf8Path,
    config: &DiscoveryConfig,
) -> Result<bool, DiscoveryError> {
    for entry in walk(root, config) {
        let entry = entry.map_err(|err| DiscoveryError::new(root, err.into()))?;
        if !entry.file_type().is_dir()
            && entry
                .file_name()
                .to_str()
                .is_some_and(|name| name.ends_with(&config.source_extension))
        {
            return Ok(true);
        }
    }
    Ok(false)
}

fn walk<'a>(
    root: &Utf8Path,
    config: &'a DiscoveryConfig,
) -> impl Iterator<Item = Result<DirEntry, walkdir::Error>> + 'a {
    WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(move |entry| !is_pruned(entry, config))
}

fn is_pruned(entry: &DirEntry, config: &DiscoveryConfig) -> bool {
    // The root is never pruned, whatever its name.
    entry.depth() > 0
        && entry.file_type().is_dir()
        && entry
            .file_name()
            .to_str()
            .is_some_and(|name| config.is_skipped(name))
}

fn utf8_path(root: &Utf8Path, entry: &DirEntry) -> Result<Utf8PathBuf, DiscoveryError> {
    Utf8PathBuf::from_path_buf(entry.path().to_path_buf())
        .map_err(|path| DiscoveryError::new(root, DiscoveryErrorKind::NonUtf8Path(path)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DashboardConfig;
    use camino_tempfile::Utf8TempDir;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    fn touch(root: &Utf8Path, relative: &str) {
        let path = root.join(relative);
        std::fs::create_dir_all(path.parent().expect("has parent")).expect("created dirs");
        std::fs::write(path, "package x\n").expect("wrote file");
    }

    fn fixture_tree() -> Utf8TempDir {
        let dir = Utf8TempDir::new().expect("created temp dir");
        for file in [
            "go.mod",
            "root_test.go",
            "calc/calc.go",
            "calc/calc_test.go",
            "calc/more_test.go",
            "calc/inner/inner_test.go",
            "calc/z_test.go",
            "a/b/c_test.go",
            "utils/strings_test.go",
            "docs/readme.go",
            "vendor/dep/dep_test.go",
            ".git/hooks/hook_test.go",
            "node_modules/pkg/pkg_test.go",
        ] {
            touch(dir.path(), file);
        }
        dir
    }

    #[test]
    fn discovers_one_target_per_directory() {
        let dir = fixture_tree();
        let config = DashboardConfig::default();
        let targets = discover_targets(dir.path(), config.discovery()).expect("discovery works");

        let names: Vec<_> = targets.iter().map(TestTarget::as_str).collect();
        assert_eq!(names, ["a/b", "calc", "calc/inner", ".", "utils"]);
    }

    #[test]
    fn discovery_is_stable() {
        let dir = fixture_tree();
        let config = DashboardConfig::default();
        let first = discover_targets(dir.path(), config.discovery()).expect("discovery works");
        let second = discover_targets(dir.path(), config.discovery()).expect("discovery works");
        assert_eq!(first, second);
    }

    #[test]
    fn no_test_files_means_no_targets() {
        let dir = Utf8TempDir::new().expect("created temp dir");
        touch(dir.path(), "main.go");
        let config = DashboardConfig::default();
        let targets = discover_targets(dir.path(), config.discovery()).expect("discovery works");
        assert!(targets.is_empty());
        assert!(contains_source_files(dir.path(), config.discovery()).expect("walk works"));
    }

    #[test]
    fn source_files_in_pruned_dirs_do_not_count() {
        let dir = Utf8TempDir::new().expect("created temp dir");
        touch(dir.path(), "vendor/dep/dep.go");
        touch(dir.path(), "README.md");
        let config = DashboardConfig::default();
        assert!(!contains_source_files(dir.path(), config.discovery()).expect("walk works"));
    }

    #[cfg(unix)]
    #[test]
    fn symlinked_test_files_mark_their_directory() {
        let dir = Utf8TempDir::new().expect("created temp dir");
        touch(dir.path(), "shared/common_test.go");
        std::fs::create_dir(dir.path().join("linked")).expect("created linked");
        std::os::unix::fs::symlink(
            dir.path().join("shared/common_test.go"),
            dir.path().join("linked/common_test.go"),
        )
        .expect("created symlink");

        let config = DashboardConfig::default();
        let targets = discover_targets(dir.path(), config.discovery()).expect("discovery works");
        let names: Vec<_> = targets.iter().map(TestTarget::as_str).collect();
        assert_eq!(names, ["linked", "shared"]);
    }

    #[test]
    fn missing_root_is_an_error() {
        let dir = Utf8TempDir::new().expect("created temp dir");
        let root = dir.path().join("missing");
        let config = DashboardConfig::default();
        let err = discover_targets(&root, config.discovery()).expect_err("root is missing");
        assert_eq!(err.root(), &root);
    }

    #[test_case("", ".", "./", "root"; "empty")]
    #[test_case(".", ".", "./", "root"; "dot")]
    #[test_case("calc", "calc", "./calc", "calc"; "simple")]
    #[test_case("./a/b/", "a/b", "./a/b", "a_b"; "nested with dot prefix")]
    #[test_case("a\\b", "a/b", "./a/b", "a_b"; "backslashes")]
    fn target_forms(input: &str, canonical: &str, runner_arg: &str, sanitized: &str) {
        let target = TestTarget::new(input);
        assert_eq!(target.as_str(), canonical);
        assert_eq!(target.runner_arg(), runner_arg);
        assert_eq!(target.sanitized(), sanitized);
    }
}
