// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The pipeline configuration file.
//!
//! The configuration is a TOML file with `[global]`, `[importdata]`,
//! `[flagging]`, `[calibration]` and `[executor]` tables. It is read into a
//! [`PipelineConfig`]. Changes to the field roles are written back by
//! editing the original document, so every other key and all comments are
//! left alone.
//!
//! At the end of a run the configuration is compared with the backup made by
//! the previous run, and then backed up again.

mod error;
#[cfg(test)]
mod tests;

pub use error::ConfigError;

use std::{
    fmt::Display,
    path::{Path, PathBuf},
};

use itertools::Itertools;
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::{
    constants::{DEFAULT_EXECUTOR_COMMAND, DEFAULT_SRC_DIR},
    flagging::FlagParams,
    roles::{FieldRoleSet, RoleValue},
    workspace::Workspace,
};

/// The table that field roles live in.
const CALIBRATION_TABLE: &str = "calibration";

/// Appended to the configuration's file name to get its backup.
const BACKUP_SUFFIX: &str = ".backup";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalSection {
    /// The dataset is `<project_name>.ms`.
    pub project_name: String,

    /// Ask for input when something needs repairing.
    #[serde(default)]
    pub interactive: bool,

    /// Where split targets are written.
    #[serde(default = "default_src_dir")]
    pub src_dir: String,

    /// The file describing the dataset's fields, antennas and spectral
    /// windows. Defaults to `<project_name>.metadata.json`.
    #[serde(default)]
    pub metadata: Option<PathBuf>,
}

fn default_src_dir() -> String {
    DEFAULT_SRC_DIR.to_string()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImportSection {
    /// Is this JVLA data? Antenna position corrections are only looked up
    /// for JVLA data.
    #[serde(default)]
    pub jvla: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutorSection {
    /// The command line that processing operations are handed to.
    #[serde(default = "default_command")]
    pub command: String,
}

impl Default for ExecutorSection {
    fn default() -> Self {
        ExecutorSection {
            command: default_command(),
        }
    }
}

fn default_command() -> String {
    DEFAULT_EXECUTOR_COMMAND.to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub global: GlobalSection,

    #[serde(default)]
    pub importdata: ImportSection,

    #[serde(default)]
    pub flagging: FlagParams,

    #[serde(default)]
    pub calibration: FieldRoleSet,

    #[serde(default)]
    pub executor: ExecutorSection,
}

/// A configuration, and the file it came from.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
    pub config: PipelineConfig,
}

impl ConfigStore {
    pub fn read<P: AsRef<Path>>(path: P) -> Result<ConfigStore, ConfigError> {
        let path = path.as_ref();
        debug!("Reading configuration from {}", path.display());
        let contents = std::fs::read_to_string(path).map_err(|err| ConfigError::Read {
            file: path.display().to_string(),
            err,
        })?;
        let config = toml::from_str(&contents).map_err(|err| ConfigError::Parse {
            file: path.display().to_string(),
            err,
        })?;
        Ok(ConfigStore {
            path: path.to_path_buf(),
            config,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Operations are run from the directory containing the configuration.
    pub fn workspace(&self) -> Workspace {
        let root = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        Workspace::new(root, &self.config.global.project_name)
    }

    /// The path to the dataset metadata file.
    pub fn metadata_file(&self) -> PathBuf {
        let file = match &self.config.global.metadata {
            Some(f) => f.clone(),
            None => PathBuf::from(format!(
                "{}.metadata.json",
                self.config.global.project_name
            )),
        };
        self.workspace().local(file)
    }

    /// Write the given keys of `roles` to the `[calibration]` table of the
    /// configuration file, and keep them in memory too. Nothing else in the
    /// file is touched.
    pub fn persist(&mut self, roles: &FieldRoleSet, keys: &[&str]) -> Result<(), ConfigError> {
        self.config.calibration = roles.clone();
        if keys.is_empty() {
            return Ok(());
        }

        let file = self.path.display().to_string();
        let contents = std::fs::read_to_string(&self.path).map_err(|err| ConfigError::Read {
            file: file.clone(),
            err,
        })?;
        let mut doc: toml_edit::Document = contents.parse().map_err(|err| ConfigError::Edit {
            file: file.clone(),
            err,
        })?;

        let table = doc
            .entry(CALIBRATION_TABLE)
            .or_insert(toml_edit::table())
            .as_table_mut()
            .ok_or(ConfigError::NotATable {
                key: CALIBRATION_TABLE,
            })?;
        for &key in keys {
            let value = roles
                .value(key)
                .ok_or_else(|| ConfigError::UnknownKey(key.to_string()))?;
            table[key] = to_item(value);
        }

        std::fs::write(&self.path, doc.to_string()).map_err(|err| ConfigError::Write { file, err })?;
        info!(
            "Updated [{CALIBRATION_TABLE}] {} in {}",
            keys.iter().join(", "),
            self.path.display()
        );
        Ok(())
    }

    /// The backup of the configuration, e.g. `proj.toml.backup` next to
    /// `proj.toml`.
    pub fn backup_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(BACKUP_SUFFIX);
        self.path.with_file_name(name)
    }

    /// How the configuration file differs from its backup. `None` if there is
    /// no backup yet.
    pub fn diff_backup(&self) -> Result<Option<Vec<ParamChange>>, ConfigError> {
        let backup = self.backup_path();
        if !backup.exists() {
            debug!("No configuration backup at {}", backup.display());
            return Ok(None);
        }
        let previous = read_flat(&backup)?;
        let current = read_flat(&self.path)?;

        let mut changes = vec![];
        for (key, new) in &current {
            match previous.get(key) {
                None => changes.push(ParamChange::Added {
                    key: key.clone(),
                    value: new.to_string(),
                }),
                Some(old) if old != new => changes.push(ParamChange::Changed {
                    key: key.clone(),
                    old: old.to_string(),
                    new: new.to_string(),
                }),
                Some(_) => (),
            }
        }
        for (key, old) in &previous {
            if !current.contains_key(key) {
                changes.push(ParamChange::Removed {
                    key: key.clone(),
                    value: old.to_string(),
                });
            }
        }
        Ok(Some(changes))
    }

    /// Copy the configuration file to [`ConfigStore::backup_path`].
    pub fn backup(&self) -> Result<PathBuf, ConfigError> {
        let backup = self.backup_path();
        std::fs::copy(&self.path, &backup).map_err(|err| ConfigError::Write {
            file: backup.display().to_string(),
            err,
        })?;
        Ok(backup)
    }
}

/// A difference between the configuration and its backup. Keys are
/// `<table>.<key>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamChange {
    Added { key: String, value: String },
    Removed { key: String, value: String },
    Changed { key: String, old: String, new: String },
}

impl Display for ParamChange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParamChange::Added { key, value } => write!(f, "{key} was added ({value})"),
            ParamChange::Removed { key, value } => write!(f, "{key} was removed (was {value})"),
            ParamChange::Changed { key, old, new } => write!(f, "{key} changed from {old} to {new}"),
        }
    }
}

/// Read a TOML file, with every key of every table at the top level.
fn read_flat(path: &Path) -> Result<toml::Table, ConfigError> {
    let file = path.display().to_string();
    let contents = std::fs::read_to_string(path).map_err(|err| ConfigError::Read {
        file: file.clone(),
        err,
    })?;
    let table: toml::Table =
        toml::from_str(&contents).map_err(|err| ConfigError::Parse { file, err })?;

    let mut flat = toml::Table::new();
    for (name, value) in table {
        match value {
            toml::Value::Table(t) => {
                for (key, value) in t {
                    flat.insert(format!("{name}.{key}"), value);
                }
            }
            value => {
                flat.insert(name, value);
            }
        }
    }
    Ok(flat)
}

fn to_item(value: RoleValue) -> toml_edit::Item {
    match value {
        RoleValue::List(l) => {
            toml_edit::value(l.iter().map(|s| s.as_str()).collect::<toml_edit::Array>())
        }
        RoleValue::Bool(b) => toml_edit::value(b),
        RoleValue::Str(s) => toml_edit::value(s),
    }
}
