// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Where things live on disk.
//!
//! Processing operations are run from the workspace root, so paths given to
//! them are relative to it (e.g. `./cal_tabs/delays.cal`). Files written by
//! this crate are resolved against the root with [`Workspace::local`].

use std::path::{Path, PathBuf};

use log::debug;

use crate::constants::{CAL_TABS_DIR, SUMMARY_DIR};

#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
    vis: String,
}

impl Workspace {
    /// The dataset is `<project_name>.ms` inside `root`.
    pub fn new<P: AsRef<Path>>(root: P, project_name: &str) -> Workspace {
        Workspace {
            root: root.as_ref().to_path_buf(),
            vis: format!("{project_name}.ms"),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The dataset, relative to the root.
    pub fn vis(&self) -> &str {
        &self.vis
    }

    /// The path to a calibration table, relative to the root.
    pub fn cal_table(&self, name: &str) -> String {
        format!("./{CAL_TABS_DIR}/{name}")
    }

    /// The path to a summary file, relative to the root.
    pub fn summary_file(&self, name: &str) -> String {
        format!("./{SUMMARY_DIR}/{name}")
    }

    /// Resolve a root-relative path.
    pub fn local<P: AsRef<Path>>(&self, relative: P) -> PathBuf {
        let relative = relative.as_ref();
        match relative.strip_prefix(".") {
            Ok(r) => self.root.join(r),
            Err(_) => self.root.join(relative),
        }
    }

    /// Make the output directories for summaries and calibration tables.
    pub fn create_dirs(&self) -> std::io::Result<()> {
        for dir in [SUMMARY_DIR, CAL_TABS_DIR] {
            let dir = self.root.join(dir);
            if !dir.exists() {
                debug!("Creating directory {}", dir.display());
                std::fs::create_dir_all(&dir)?;
            }
        }
        Ok(())
    }

    /// Does the dataset have a saved flag version with this name?
    pub fn has_flag_version(&self, name: &str) -> bool {
        self.root
            .join(format!("{}.flagversions", self.vis))
            .join(format!("flags.{name}"))
            .is_dir()
    }
}
