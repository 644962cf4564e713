// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Helpful functions and types for tests.

use crate::{
    metadata::StaticMetadata,
    ops::{ExecuteError, Executor, OpOutcome, Operation, Task},
    spw::SpectralWindow,
};

type Matcher = Box<dyn Fn(&Operation) -> bool>;

/// Records every operation it's given. By default, operations succeed with
/// an empty diagnostic; canned outcomes can be given for specific
/// operations.
pub(crate) struct RecordingExecutor {
    pub(crate) ops: Vec<Operation>,
    responses: Vec<(Task, Matcher, OpOutcome)>,
    dry_run: bool,
}

impl RecordingExecutor {
    pub(crate) fn new() -> RecordingExecutor {
        RecordingExecutor {
            ops: vec![],
            responses: vec![],
            dry_run: false,
        }
    }

    /// Record operations, but report being a dry run.
    pub(crate) fn dry_run() -> RecordingExecutor {
        RecordingExecutor {
            dry_run: true,
            ..RecordingExecutor::new()
        }
    }

    /// Respond with `outcome` to operations of `task` for which `matcher` is
    /// true. The first registered response that matches wins.
    pub(crate) fn respond<F>(mut self, task: Task, matcher: F, outcome: OpOutcome) -> Self
    where
        F: Fn(&Operation) -> bool + 'static,
    {
        self.responses.push((task, Box::new(matcher), outcome));
        self
    }

    pub(crate) fn tasks(&self) -> Vec<Task> {
        self.ops.iter().map(|op| op.task).collect()
    }

    pub(crate) fn rendered(&self) -> Vec<String> {
        self.ops.iter().map(|op| op.render()).collect()
    }

    pub(crate) fn of(&self, task: Task) -> Vec<&Operation> {
        self.ops.iter().filter(|op| op.task == task).collect()
    }
}

impl Executor for RecordingExecutor {
    fn execute(&mut self, op: &Operation) -> Result<OpOutcome, ExecuteError> {
        self.ops.push(op.clone());
        let outcome = self
            .responses
            .iter()
            .find(|(task, matcher, _)| *task == op.task && matcher(op))
            .map(|(_, _, outcome)| outcome.clone())
            .unwrap_or_else(|| OpOutcome::success(""));
        Ok(outcome)
    }

    fn is_dry_run(&self) -> bool {
        self.dry_run
    }
}

pub(crate) fn strings(s: &[&str]) -> Vec<String> {
    s.iter().map(|s| s.to_string()).collect()
}

pub(crate) fn window(
    id: u32,
    nchan: usize,
    min_ghz: f64,
    max_ghz: f64,
    width_mhz: f64,
) -> SpectralWindow {
    SpectralWindow::from_hz(id, nchan, min_ghz * 1e9, max_ghz * 1e9, width_mhz * 1e6)
}

/// A small dataset with three windows; 0 and 1 overlap, 2 is on its own.
///
/// - 3C286: flux and bandpass calibrator, all windows
/// - 3C48: another flux calibrator, all windows
/// - J1407+2827: phase calibrator, all windows
/// - NGC1: target, all windows
/// - NGC2: target, window 2 only
pub(crate) fn fixture_metadata() -> StaticMetadata {
    let mut builder = StaticMetadata::builder()
        .window(window(0, 1000, 1.40, 1.42, 0.02))
        .window(window(1, 1000, 1.415, 1.435, 0.02))
        .window(window(2, 512, 1.60, 1.62, 0.02))
        .field("3C286", &[0, 1, 2])
        .field("3C48", &[0, 1, 2])
        .field("J1407+2827", &[0, 1, 2])
        .field("NGC1", &[0, 1, 2])
        .field("NGC2", &[2]);
    for ant in ["ea01", "ea02", "ea03", "ea04", "ea05"] {
        builder = builder.antenna(ant);
    }
    builder.build()
}
