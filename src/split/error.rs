// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Errors associated with splitting targets.

use thiserror::Error;

use crate::{metadata::MetadataError, ops::OperationError, spw::GroupingError};

#[derive(Error, Debug)]
pub enum SplitError {
    #[error("Refusing to use '{src_dir}' as the split output directory ([global] src_dir), because {reason}; everything in it would be removed")]
    UnsafeSrcDir {
        src_dir: String,
        reason: &'static str,
    },

    #[error("The target '{target}' has no name to split it under")]
    MissingTargetName { target: String },

    #[error(transparent)]
    Operation(#[from] OperationError),

    #[error(transparent)]
    Grouping(#[from] GroupingError),

    #[error(transparent)]
    Metadata(#[from] MetadataError),

    #[error(transparent)]
    IO(#[from] std::io::Error),
}
