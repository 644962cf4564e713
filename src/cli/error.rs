// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Error type for all calplan-related errors. This should be the *only* error
//! enum that is publicly visible.

use thiserror::Error;

use crate::{
    chain::ChainError,
    config::ConfigError,
    flagging::FlagError,
    metadata::MetadataError,
    ops::{ExecuteError, OperationError},
    pipeline::PipelineError,
    roles::{ResolveError, RoleError},
    spw::GroupingError,
    split::SplitError,
};

/// The *only* publicly visible error from calplan. Each message should say
/// what the user can do about it, unless it's "generic".
#[derive(Error, Debug)]
pub enum CalplanError {
    /// An error related to the configuration file.
    #[error("{0}\n\nCheck the configuration file; it must have a [global] table with a project_name.")]
    Config(String),

    /// An error related to the dataset metadata file.
    #[error("{0}\n\nThe metadata file is set with 'metadata' in the [global] table of the configuration (default: <project_name>.metadata.json).")]
    Metadata(String),

    /// An error related to field roles.
    #[error("{0}\n\nCheck the [calibration] table of the configuration, or set 'interactive = true' in [global] to repair it.")]
    Roles(String),

    /// An error related to grouping spectral windows.
    #[error("{0}\n\nSet the window combination for this field manually with 'man_comb_spws' in the [calibration] table.")]
    Grouping(String),

    /// Input was needed, but couldn't be given.
    #[error("{0}")]
    Input(String),

    /// An error related to the calibration chain.
    #[error("{0}\n\nIf a processing operation failed, its output is shown above; try turning up verbosity (-v or -vv) for more.")]
    Calibration(String),

    /// An error related to flagging.
    #[error("{0}")]
    Flagging(String),

    /// An error related to splitting targets.
    #[error("{0}")]
    Split(String),

    /// An error related to running processing operations.
    #[error("{0}\n\nThe command used is set with 'command' in the [executor] table of the configuration.")]
    Executor(String),

    /// A generic error that can't be clarified further, e.g. IO errors.
    #[error("{0}")]
    Generic(String),
}

// When changing the error propagation below, ensure `Self::from(e)` uses the
// correct `e`!

impl From<PipelineError> for CalplanError {
    fn from(e: PipelineError) -> Self {
        match e {
            PipelineError::Config(e) => Self::from(e),
            PipelineError::Roles(e) => Self::from(e),
            PipelineError::Flag(e) => Self::from(e),
            PipelineError::Chain(e) => Self::from(e),
            PipelineError::Split(e) => Self::from(e),
        }
    }
}

impl From<ConfigError> for CalplanError {
    fn from(e: ConfigError) -> Self {
        let s = e.to_string();
        match e {
            ConfigError::Read { .. } | ConfigError::Parse { .. } | ConfigError::NotATable { .. } => {
                Self::Config(s)
            }
            ConfigError::Edit { .. } | ConfigError::Write { .. } | ConfigError::UnknownKey(_) => {
                Self::Generic(s)
            }
        }
    }
}

impl From<MetadataError> for CalplanError {
    fn from(e: MetadataError) -> Self {
        let s = e.to_string();
        match e {
            MetadataError::UnsupportedExt { .. }
            | MetadataError::Parse { .. }
            | MetadataError::UndescribedWindow { .. } => Self::Metadata(s),
            MetadataError::UnknownField { .. } | MetadataError::UnknownWindow { .. } => {
                Self::Roles(s)
            }
            MetadataError::IO(e) => Self::from(e),
        }
    }
}

impl From<RoleError> for CalplanError {
    fn from(e: RoleError) -> Self {
        let s = e.to_string();
        match e {
            RoleError::NoTargets
            | RoleError::ConfigInconsistency { .. }
            | RoleError::UnknownFieldName { .. }
            | RoleError::MissingFluxModel { .. }
            | RoleError::NonStandardFluxModel { .. }
            | RoleError::InvalidRefAnt { .. } => Self::Roles(s),
            RoleError::Grouping(e) => Self::from(e),
            RoleError::Resolve(e) => Self::from(e),
        }
    }
}

impl From<GroupingError> for CalplanError {
    fn from(e: GroupingError) -> Self {
        let s = e.to_string();
        match e {
            GroupingError::AmbiguousBandGrouping { .. }
            | GroupingError::UnknownWindow { .. }
            | GroupingError::RepeatedWindow { .. } => Self::Grouping(s),
            GroupingError::Metadata(e) => Self::from(e),
        }
    }
}

impl From<ResolveError> for CalplanError {
    fn from(e: ResolveError) -> Self {
        let s = e.to_string();
        match e {
            ResolveError::NonInteractive { .. } => Self::Roles(s),
            ResolveError::EndOfInput { .. } => Self::Input(s),
            ResolveError::IO(e) => Self::from(e),
        }
    }
}

impl From<ChainError> for CalplanError {
    fn from(e: ChainError) -> Self {
        let s = e.to_string();
        match e {
            ChainError::MissingInputTable { .. } => Self::Calibration(s),
            ChainError::BadManualFluxDensity { .. }
            | ChainError::FluxModelCount { .. }
            | ChainError::NoTargets
            | ChainError::Unassigned { .. } => Self::Roles(s),
            ChainError::Operation(e) => match e {
                OperationError::Execute(e) => Self::from(e),
                _ => Self::Calibration(s),
            },
            ChainError::Grouping(e) => Self::from(e),
            ChainError::Metadata(e) => Self::from(e),
            ChainError::IO(e) => Self::from(e),
        }
    }
}

impl From<FlagError> for CalplanError {
    fn from(e: FlagError) -> Self {
        let s = e.to_string();
        match e {
            FlagError::Operation(OperationError::Execute(e)) => Self::from(e),
            FlagError::Operation(_) => Self::Flagging(s),
            FlagError::Resolve(e) => Self::from(e),
            FlagError::IO(e) => Self::from(e),
        }
    }
}

impl From<SplitError> for CalplanError {
    fn from(e: SplitError) -> Self {
        let s = e.to_string();
        match e {
            SplitError::MissingTargetName { .. } => Self::Roles(s),
            SplitError::UnsafeSrcDir { .. } => Self::Split(s),
            SplitError::Operation(OperationError::Execute(e)) => Self::from(e),
            SplitError::Operation(_) => Self::Split(s),
            SplitError::Grouping(e) => Self::from(e),
            SplitError::Metadata(e) => Self::from(e),
            SplitError::IO(e) => Self::from(e),
        }
    }
}

impl From<ExecuteError> for CalplanError {
    fn from(e: ExecuteError) -> Self {
        Self::Executor(e.to_string())
    }
}

impl From<std::io::Error> for CalplanError {
    fn from(e: std::io::Error) -> Self {
        Self::Generic(e.to_string())
    }
}
