// Copyright (c) The testdash Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Parser for line-oriented coverage profiles.
//!
//! A profile looks like:
//!
//! ```text
//! mode: set
//! example.com/calc/calc.go:3.10,5.2 1 1
//! example.com/calc/calc.go:7.1,7.1 1 0
//! ```
//!
//! The grammar is a header line followed by any number of records. Each record is three
//! whitespace-separated fields: `file:startLine.startCol,endLine.endCol`, the number of
//! statements in the block (ignored), and the execution count. A line number or count that isn't
//! a non-negative integer is read as 0, so the block is kept as uncovered.
//!
//! [`ProfileScanner`] yields one [`ProfileLine`] per non-blank line. Malformed records are
//! reported as [`ProfileLine::Malformed`] and skipped by [`ParsedProfile::parse`].

use super::{CoverageBlock, FileCoverage};
use crate::errors::ProfileReadError;
use camino::{Utf8Path, Utf8PathBuf};
use indexmap::IndexMap;
use std::{fmt, iter::Enumerate, str::Lines};
use tracing::{debug, warn};

/// A single line of a coverage profile, as classified by [`ProfileScanner`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ProfileLine<'a> {
    /// The header line. `mode` is the value after `mode:`, if the header had that form.
    Header {
        /// The coverage mode, e.g. `set`, `count` or `atomic`.
        mode: Option<&'a str>,
    },

    /// A well-formed record.
    Record {
        /// The file name exactly as it appears in the profile.
        file: &'a str,

        /// The block described by this record.
        block: CoverageBlock,
    },

    /// A record that couldn't be parsed.
    Malformed {
        /// The 1-based line number within the profile.
        line_number: usize,

        /// The raw text of the line.
        line: &'a str,

        /// Why the line was rejected.
        reason: MalformedReason,
    },
}

/// The reason a profile record was rejected.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum MalformedReason {
    /// The record didn't have exactly three fields.
    FieldCount(usize),

    /// The location had no `:` separating the file from the range.
    MissingFileSeparator,

    /// The range didn't split into exactly two endpoints on `,`.
    InvalidRange,
}

impl fmt::Display for MalformedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FieldCount(count) => write!(f, "expected 3 fields, found {count}"),
            Self::MissingFileSeparator => write!(f, "location has no `:` separator"),
            Self::InvalidRange => write!(f, "range is not of the form `start,end`"),
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum ScanState {
    Header,
    Records,
}

/// A line scanner over coverage profile text.
#[derive(Clone, Debug)]
pub struct ProfileScanner<'a> {
    lines: Enumerate<Lines<'a>>,
    state: ScanState,
}

impl<'a> ProfileScanner<'a> {
    /// Creates a scanner over `text`.
    pub fn new(text: &'a str) -> Self {
        Self {
            lines: text.lines().enumerate(),
            state: ScanState::Header,
        }
    }

    fn scan_record(line_number: usize, line: &'a str) -> ProfileLine<'a> {
        match parse_record(line) {
            Ok((file, block)) => ProfileLine::Record { file, block },
            Err(reason) => ProfileLine::Malformed {
                line_number,
                line,
                reason,
            },
        }
    }
}

impl<'a> Iterator for ProfileScanner<'a> {
    type Item = ProfileLine<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let (index, line) = self.lines.next()?;
            match self.state {
                ScanState::Header => {
                    // The first line is always the header, whatever it contains.
                    self.state = ScanState::Records;
                    let mode = line.trim().strip_prefix("mode:").map(str::trim);
                    return Some(ProfileLine::Header { mode });
                }
                ScanState::Records => {
                    if line.trim().is_empty() {
                        continue;
                    }
                    return Some(Self::scan_record(index + 1, line));
                }
            }
        }
    }
}

fn parse_record(line: &str) -> Result<(&str, CoverageBlock), MalformedReason> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    let [location, _num_statements, count] = fields[..] else {
        return Err(MalformedReason::FieldCount(fields.len()));
    };

    // Split on the last colon: only the range is guaranteed to be colon-free.
    let (file, range) = location
        .rsplit_once(':')
        .ok_or(MalformedReason::MissingFileSeparator)?;

    let mut endpoints = range.split(',');
    let (Some(start), Some(end), None) = (endpoints.next(), endpoints.next(), endpoints.next())
    else {
        return Err(MalformedReason::InvalidRange);
    };

    let block = CoverageBlock::new(
        endpoint_line(start),
        endpoint_line(end),
        count.parse().unwrap_or(0),
    );
    Ok((file, block))
}

fn endpoint_line(endpoint: &str) -> u32 {
    // `line.col`: the line is the leading component.
    let line = endpoint.split('.').next().unwrap_or(endpoint);
    line.parse().unwrap_or(0)
}

/// A parsed coverage profile: blocks grouped by file, in order of first appearance.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ParsedProfile {
    mode: Option<String>,
    blocks: IndexMap<String, Vec<CoverageBlock>>,
    malformed: usize,
}

impl ParsedProfile {
    /// Parses profile text, skipping (and logging) malformed records.
    pub fn parse(text: &str) -> Self {
        let mut profile = Self::default();
        for line in ProfileScanner::new(text) {
            match line {
                ProfileLine::Header { mode } => {
                    profile.mode = mode.map(str::to_owned);
                }
                ProfileLine::Record { file, block } => {
                    profile
                        .blocks
                        .entry(file.to_owned())
                        .or_default()
                        .push(block);
                }
                ProfileLine::Malformed {
                    line_number,
                    line,
                    reason,
                } => {
                    debug!(line_number, line, %reason, "skipping malformed coverage profile line");
                    profile.malformed += 1;
                }
            }
        }
        profile
    }

    /// Reads and parses the profile at `path`.
    pub fn read(path: &Utf8Path) -> Result<Self, ProfileReadError> {
        let text = std::fs::read_to_string(path).map_err(|err| ProfileReadError::new(path, err))?;
        Ok(Self::parse(&text))
    }

    /// The coverage mode from the header, if present.
    pub fn mode(&self) -> Option<&str> {
        self.mode.as_deref()
    }

    /// Blocks grouped by file name, in order of first appearance.
    pub fn blocks(&self) -> &IndexMap<String, Vec<CoverageBlock>> {
        &self.blocks
    }

    /// The number of records that were skipped as malformed.
    pub fn malformed_count(&self) -> usize {
        self.malformed
    }

    /// Reads the source for each file in the profile, producing one [`FileCoverage`] per
    /// readable file.
    ///
    /// Files that can't be read are logged and left out.
    pub fn into_file_coverage(self, resolver: &SourceResolver) -> Vec<FileCoverage> {
        self.blocks
            .into_iter()
            .filter_map(|(filename, blocks)| {
                let path = resolver.resolve(&filename);
                match std::fs::read(&path) {
                    Ok(bytes) => {
                        let content = String::from_utf8(bytes).unwrap_or_else(|err| {
                            String::from_utf8_lossy(err.as_bytes()).into_owned()
                        });
                        Some(FileCoverage::new(filename, content, blocks))
                    }
                    Err(err) => {
                        warn!(%path, "error reading covered source file: {err}");
                        None
                    }
                }
            })
            .collect()
    }
}

/// Maps file names from a coverage profile onto paths in the project tree.
#[derive(Clone, Debug)]
pub struct SourceResolver {
    project_root: Utf8PathBuf,
    module_prefix: Option<String>,
}

impl SourceResolver {
    /// Creates a new resolver. If `module_name` is given, profile paths starting with
    /// `<module_name>/` have that prefix removed before being joined to `project_root`.
    pub fn new(project_root: impl Into<Utf8PathBuf>, module_name: Option<&str>) -> Self {
        Self {
            project_root: project_root.into(),
            module_prefix: module_name.map(|name| format!("{name}/")),
        }
    }

    /// Returns the path to read for a profile file name.
    pub fn resolve(&self, filename: &str) -> Utf8PathBuf {
        let path = Utf8Path::new(filename);
        if path.is_absolute() {
            return path.to_owned();
        }
        let relative = self
            .module_prefix
            .as_deref()
            .and_then(|prefix| filename.strip_prefix(prefix))
            .unwrap_or(filename);
        self.project_root.join(relative)
    }
}
