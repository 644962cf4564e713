// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use thiserror::Error;

use crate::{
    chain::ChainError, config::ConfigError, flagging::FlagError, roles::RoleError,
    split::SplitError,
};

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Roles(#[from] RoleError),

    #[error(transparent)]
    Flag(#[from] FlagError),

    #[error(transparent)]
    Chain(#[from] ChainError),

    #[error(transparent)]
    Split(#[from] SplitError),
}
