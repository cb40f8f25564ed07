// Copyright (c) The testdash Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The project a dashboard runs against.

use crate::{
    config::{DashboardConfig, DiscoveryConfig},
    discovery::{TestTarget, contains_source_files, discover_targets},
    errors::ProjectValidationError,
};
use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;
use std::path::Path;
use tracing::{debug, warn};

/// A validated project root.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Project {
    root: Utf8PathBuf,
    name: String,
}

impl Project {
    /// Validates `path` as a project root.
    ///
    /// The path must be a directory that either contains the configured module manifest or has at
    /// least one source file somewhere below it (skipping pruned directories).
    pub fn new(
        path: impl AsRef<Path>,
        config: &DashboardConfig,
    ) -> Result<Self, ProjectValidationError> {
        let path = path.as_ref();
        let path = Utf8Path::from_path(path).ok_or_else(|| ProjectValidationError::NonUtf8 {
            path: path.to_owned(),
        })?;

        let root = path
            .canonicalize_utf8()
            .map_err(|err| ProjectValidationError::NotFound {
                path: path.to_owned(),
                err,
            })?;
        if !root.is_dir() {
            return Err(ProjectValidationError::NotADirectory {
                path: path.to_owned(),
            });
        }

        let manifest = &config.project().manifest;
        if !root.join(manifest).is_file() && !has_source_files(&root, config.discovery()) {
            return Err(ProjectValidationError::NotAProject {
                path: path.to_owned(),
                manifest: manifest.to_string(),
                extension: config.discovery().source_extension.clone(),
            });
        }

        let name = root.file_name().unwrap_or(root.as_str()).to_owned();
        Ok(Self { root, name })
    }

    /// The absolute project root.
    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    /// The project's name: the last component of its root.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Reads the module name declared in `manifest` under the project root.
    ///
    /// Returns `None` if the manifest can't be read or has no `module` directive.
    pub fn module_name(&self, manifest: &Utf8Path) -> Option<String> {
        let path = self.root.join(manifest);
        let contents = match std::fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(err) => {
                debug!(%path, "no module manifest: {err}");
                return None;
            }
        };
        let name = parse_module_directive(&contents);
        if name.is_none() {
            debug!(%path, "module manifest has no module directive");
        }
        name
    }

    /// Returns the project's identity and the targets currently discoverable in it.
    ///
    /// A discovery failure is logged and reported as no targets.
    pub fn info(&self, config: &DiscoveryConfig) -> ProjectInfo {
        let targets = discover_targets(&self.root, config).unwrap_or_else(|err| {
            warn!("{}", err.display_chain());
            Vec::new()
        });
        ProjectInfo {
            project_path: self.root.clone(),
            project_name: self.name.clone(),
            targets_found: targets.len(),
            targets,
        }
    }
}

/// A description of a project and the targets found in it.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ProjectInfo {
    /// The absolute project root.
    pub project_path: Utf8PathBuf,

    /// The project's name.
    pub project_name: String,

    /// The number of targets found.
    pub targets_found: usize,

    /// The targets, in discovery order.
    pub targets: Vec<TestTarget>,
}

fn has_source_files(root: &Utf8Path, config: &DiscoveryConfig) -> bool {
    contains_source_files(root, config).unwrap_or_else(|err| {
        debug!("treating project as having no source files: {}", err.display_chain());
        false
    })
}

fn parse_module_directive(contents: &str) -> Option<String> {
    contents.lines().find_map(|line| {
        let name = line.strip_prefix("module ")?.trim();
        (!name.is_empty()).then(|| name.trim_matches('"').to_owned())
    })
}
