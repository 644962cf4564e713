// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Errors associated with flagging.

use thiserror::Error;

use crate::{ops::OperationError, roles::ResolveError};

#[derive(Error, Debug)]
pub enum FlagError {
    #[error(transparent)]
    Operation(#[from] OperationError),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    IO(#[from] std::io::Error),
}
