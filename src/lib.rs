// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

/*!
Calibration planning and driving for interferometric radio-astronomy
observations.

Field roles (targets and flux, bandpass and phase calibrators) are checked
against a dataset, an ordered chain of calibration solves is run and applied to
every field, and the calibrated targets are split into their own datasets.
The processing itself is done by an external package; this crate decides what
to run, and in what order.
 */

pub mod chain;
mod cli;
pub mod config;
pub mod constants;
pub mod flagging;
pub mod metadata;
pub mod ops;
pub mod pipeline;
pub mod roles;
pub mod split;
pub mod spw;
pub mod workspace;

#[cfg(test)]
mod tests;

use crossbeam_utils::atomic::AtomicCell;

lazy_static::lazy_static! {
    /// Are progress bars being drawn? This should only ever be enabled by CLI
    /// code.
    static ref PROGRESS_BARS: AtomicCell<bool> = AtomicCell::new(false);
}

// Re-exports.
pub use cli::{Calplan, CalplanError};
