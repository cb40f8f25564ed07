// Copyright (c) The testdash Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Line-level coverage data.
//!
//! The external test runner writes a coverage profile for each target. [`profile`] turns that
//! text into [`FileCoverage`] values, [`summary`] extracts the runner's own percentage from its
//! output, and [`report`] keeps track of rendered HTML reports.

pub mod profile;
pub mod report;
pub mod summary;

use serde::Serialize;

/// One statement range reported by a coverage profile, with its execution count.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
pub struct CoverageBlock {
    start_line: u32,
    end_line: u32,
    count: u64,
    covered: bool,
}

impl CoverageBlock {
    /// Creates a new block. The block is covered if it executed at least once.
    pub fn new(start_line: u32, end_line: u32, count: u64) -> Self {
        Self {
            start_line,
            end_line,
            count,
            covered: count > 0,
        }
    }

    /// The first line of the range.
    pub fn start_line(&self) -> u32 {
        self.start_line
    }

    /// The last line of the range.
    pub fn end_line(&self) -> u32 {
        self.end_line
    }

    /// The number of times the range was executed.
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Whether the range executed at all.
    pub fn is_covered(&self) -> bool {
        self.covered
    }
}

/// Coverage for a single source file, along with the file's contents.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FileCoverage {
    filename: String,
    content: String,
    blocks: Vec<CoverageBlock>,
    coverage: f64,
}

impl FileCoverage {
    /// Creates a new `FileCoverage`, computing its percentage from `blocks`.
    pub fn new(
        filename: impl Into<String>,
        content: impl Into<String>,
        blocks: Vec<CoverageBlock>,
    ) -> Self {
        let coverage = block_coverage_percent(&blocks);
        Self {
            filename: filename.into(),
            content: content.into(),
            blocks,
            coverage,
        }
    }

    /// The file name as it appears in the coverage profile.
    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// The full source text of the file.
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Blocks in profile order.
    pub fn blocks(&self) -> &[CoverageBlock] {
        &self.blocks
    }

    /// The percentage of blocks that are covered, or 0 if there are no blocks.
    pub fn coverage_percent(&self) -> f64 {
        self.coverage
    }
}

/// Returns `100 * covered / total` over `blocks`, or 0 for an empty slice.
///
/// Blocks are counted, not statements or lines.
pub fn block_coverage_percent(blocks: &[CoverageBlock]) -> f64 {
    if blocks.is_empty() {
        return 0.0;
    }
    let covered = blocks.iter().filter(|block| block.is_covered()).count();
    covered as f64 / blocks.len() as f64 * 100.0
}
