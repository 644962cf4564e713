// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Errors associated with solving for and applying calibration tables.

use thiserror::Error;

use super::CalTableKind;
use crate::{metadata::MetadataError, ops::OperationError, roles::Role, spw::GroupingError};

#[derive(Error, Debug)]
pub enum ChainError {
    #[error("The {step} step needs the {missing} table, but it hasn't been produced")]
    MissingInputTable {
        step: String,
        missing: CalTableKind,
    },

    #[error("The manual flux density '{value}' for '{calibrator}' is not a number")]
    BadManualFluxDensity { calibrator: String, value: String },

    #[error("There are {fluxcal} flux calibrators but {fluxmod} flux models")]
    FluxModelCount { fluxcal: usize, fluxmod: usize },

    #[error("There are no targets to calibrate")]
    NoTargets,

    #[error("No {} has been assigned for {slot}", role.description())]
    Unassigned { role: Role, slot: String },

    #[error(transparent)]
    Operation(#[from] OperationError),

    #[error(transparent)]
    Grouping(#[from] GroupingError),

    #[error(transparent)]
    Metadata(#[from] MetadataError),

    #[error(transparent)]
    IO(#[from] std::io::Error),
}
