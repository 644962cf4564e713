// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Errors associated with field roles.

use thiserror::Error;

use super::{ResolveError, Role};
use crate::spw::GroupingError;

#[derive(Error, Debug)]
pub enum RoleError {
    #[error("There are no targets listed in the configuration")]
    NoTargets,

    #[error("The number of entries in '{role}' ({found}) does not match the expected number ({expected}); {role} = {list:?}")]
    ConfigInconsistency {
        role: Role,
        expected: usize,
        found: usize,
        list: Vec<String>,
    },

    #[error("Illegal name for a {}: '{name}' is not a field of the dataset", role.description())]
    UnknownFieldName { role: Role, name: String },

    #[error("A flux model cannot be automatically assigned to the flux calibrator '{calibrator}'")]
    MissingFluxModel { calibrator: String },

    #[error("The flux model '{model}' for '{calibrator}' is non-standard and is not indicated as a manual flux scale (man_mod)")]
    NonStandardFluxModel { calibrator: String, model: String },

    #[error("'{refant}' is not a valid reference antenna; valid antenna names are: {antennas}")]
    InvalidRefAnt { refant: String, antennas: String },

    #[error(transparent)]
    Grouping(#[from] GroupingError),

    #[error(transparent)]
    Resolve(#[from] ResolveError),
}
