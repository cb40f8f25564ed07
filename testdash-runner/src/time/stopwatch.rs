// Copyright (c) The testdash Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Stopwatch for tracking how long it takes to run a target.
//!
//! Results track a completion time and a duration. For that we use a combination of a
//! `DateTime` (realtime clock) and an `Instant` (monotonic clock): the duration always comes from
//! the monotonic clock, and the completion time is the realtime start plus that duration.

use chrono::{DateTime, Local, TimeDelta};
use std::time::{Duration, Instant};

pub(crate) fn stopwatch() -> StopwatchStart {
    StopwatchStart::new()
}

/// The start state of a stopwatch.
#[derive(Clone, Debug)]
pub(crate) struct StopwatchStart {
    start_time: DateTime<Local>,
    instant: Instant,
}

impl StopwatchStart {
    fn new() -> Self {
        Self {
            // These two syscalls will happen imperceptibly close to each other, which is good
            // enough for our purposes.
            start_time: Local::now(),
            instant: Instant::now(),
        }
    }

    pub(crate) fn start_time(&self) -> DateTime<Local> {
        self.start_time
    }

    pub(crate) fn snapshot(&self) -> StopwatchSnapshot {
        StopwatchSnapshot {
            start_time: self.start_time,
            duration: self.instant.elapsed(),
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub(crate) struct StopwatchSnapshot {
    pub(crate) start_time: DateTime<Local>,
    pub(crate) duration: Duration,
}

impl StopwatchSnapshot {
    pub(crate) fn end_time(&self) -> DateTime<Local> {
        TimeDelta::from_std(self.duration)
            .ok()
            .and_then(|delta| self.start_time.checked_add_signed(delta))
            .unwrap_or(self.start_time)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn end_time_follows_monotonic_duration() {
        let start = stopwatch();
        std::thread::sleep(Duration::from_millis(50));
        let end = start.snapshot();

        assert!(end.duration >= Duration::from_millis(50));
        assert_eq!(end.start_time, start.start_time());
        assert!(end.end_time() >= start.start_time() + TimeDelta::milliseconds(50));
    }
}
