// Copyright (c) The testdash Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Extracting the runner's own coverage summary from its output.

use itertools::Itertools;

/// The token preceding the percentage in runner output, e.g. `coverage: 87.5% of statements`.
const COVERAGE_MARKER: &str = "coverage:";

/// Returns the percentage printed after the first parsable `coverage:` token in `output`.
///
/// The value must be on the same line as its label. Returns 0 if no `coverage:` token is
/// followed by a number.
pub fn extract_coverage_percent(output: &str) -> f64 {
    output
        .lines()
        .flat_map(|line| line.split_whitespace().tuple_windows())
        .filter(|(label, _)| *label == COVERAGE_MARKER)
        .find_map(|(_, value)| value.trim_end_matches('%').parse::<f64>().ok())
        .filter(|percent| percent.is_finite())
        .unwrap_or(0.0)
}
