// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Errors associated with the configuration file.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Couldn't read the configuration file '{file}': {err}")]
    Read { file: String, err: std::io::Error },

    #[error("Couldn't parse the configuration file '{file}': {err}")]
    Parse { file: String, err: toml::de::Error },

    #[error("Couldn't edit the configuration file '{file}': {err}")]
    Edit {
        file: String,
        err: toml_edit::TomlError,
    },

    #[error("Couldn't write the configuration file '{file}': {err}")]
    Write { file: String, err: std::io::Error },

    #[error("'{key}' in the configuration file is not a table")]
    NotATable { key: &'static str },

    #[error("'{0}' is not a key that can be written to the configuration")]
    UnknownKey(String),
}
