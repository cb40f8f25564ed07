// Copyright (c) The testdash Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use camino::{Utf8Path, Utf8PathBuf};
use camino_tempfile::Utf8TempDir;
use color_eyre::eyre::{Result, WrapErr};
use indoc::{formatdoc, indoc};
use std::time::Duration;
use testdash_runner::{config::DashboardConfig, dashboard::Dashboard, project::Project};

/// The module name written to every fixture project's `go.mod`.
pub(crate) const MODULE: &str = "example.com/calc";

/// Source for the file covered by the `calc` target's profile.
pub(crate) const CALC_SOURCE: &str = indoc! {"
    package calc

    func Add(a, b int) int { return a + b }

    func Sub(a, b int) int { return a - b }
"};

/// A runner that writes a two-block profile for `./calc`, fails `./utils`, waits for a
/// `release` file before passing `./slow`, and passes everything else without a profile.
pub(crate) const RUNNER_SCRIPT: &str = indoc! {r#"
    case "$1" in
      ./calc)
        printf 'mode: set\nexample.com/calc/calc/calc.go:3.1,3.40 1 1\nexample.com/calc/calc/calc.go:5.1,5.40 1 0\n' > "$2"
        echo 'ok   example.com/calc/calc 0.01s  coverage: 50.0% of statements'
        ;;
      ./utils)
        echo '--- FAIL: TestParse'
        exit 1
        ;;
      ./slow)
        while [ ! -f release ]; do sleep 0.02; done
        echo "ok $1"
        ;;
      *)
        echo "ok $1"
        ;;
    esac
"#};

/// A report generator that writes a minimal HTML page.
pub(crate) const REPORT_SCRIPT: &str =
    r#"printf '<html><head><title>cover</title></head><body>report</body></html>' > "$2""#;

pub(crate) const TIMEOUT: Duration = Duration::from_secs(30);

pub(crate) struct TestProject {
    dir: Utf8TempDir,
}

impl TestProject {
    /// Creates a project with a `go.mod` and test files in each of `targets`.
    pub(crate) fn new(targets: &[&str]) -> Result<Self> {
        let dir = Utf8TempDir::new().wrap_err("failed to create temp dir")?;
        let project = Self { dir };
        project.write("go.mod", &format!("module {MODULE}\n\ngo 1.22\n"))?;
        project.write("calc/calc.go", CALC_SOURCE)?;
        for target in targets {
            project.write(&format!("{target}/x_test.go"), "package x\n")?;
        }
        Ok(project)
    }

    pub(crate) fn root(&self) -> &Utf8Path {
        self.dir.path()
    }

    pub(crate) fn write(&self, rel_path: &str, contents: &str) -> Result<()> {
        let path = self.dir.path().join(rel_path);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).wrap_err_with(|| format!("creating {parent}"))?;
        }
        std::fs::write(&path, contents).wrap_err_with(|| format!("writing {path}"))
    }

    /// Returns files directly under the root whose names start with `coverage_` and end with
    /// `extension`.
    pub(crate) fn artifacts(&self, extension: &str) -> Result<Vec<Utf8PathBuf>> {
        let mut artifacts = Vec::new();
        for entry in self.dir.path().read_dir_utf8()? {
            let entry = entry?;
            let name = entry.file_name();
            if name.starts_with("coverage_") && name.ends_with(extension) {
                artifacts.push(entry.into_path());
            }
        }
        Ok(artifacts)
    }

    pub(crate) fn dashboard(&self, config: DashboardConfig) -> Result<Dashboard> {
        let project = Project::new(self.root(), &config)?;
        Ok(Dashboard::new(project, config))
    }
}

/// Returns a config that runs targets with [`RUNNER_SCRIPT`] and renders reports with
/// [`REPORT_SCRIPT`].
pub(crate) fn script_config(retention: &str) -> Result<DashboardConfig> {
    let toml = formatdoc! {r#"
        [runner]
        program = "sh"
        args = ['-c', '''{runner}''', 'sh', '{{target}}', '{{profile}}']
        test-threads = 2

        [report]
        program = "sh"
        args = ['-c', '''{report}''', 'sh', '{{profile}}', '{{output}}']
        retention = "{retention}"
        "#,
        runner = RUNNER_SCRIPT,
        report = REPORT_SCRIPT,
        retention = retention,
    };
    Ok(DashboardConfig::from_toml_str(&toml)?)
}
