// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Splitting calibrated targets into their own datasets.
//!
//! A target observed in several spectral windows gets one output per band
//! group, named after the group (e.g. `NGC1.spw0+1`), unless all of its
//! windows are merged into a single group. A mosaic gets one output per
//! target name, covering all of that name's fields.

mod error;

pub use error::SplitError;

use std::path::{Component, Path, PathBuf};

use itertools::Itertools;
use log::{debug, info};

use crate::{
    metadata::DatasetMetadata,
    ops::{run_checked, Executor, Operation, Task},
    roles::FieldRoleSet,
    spw::{group_windows, BandGroup},
    workspace::Workspace,
};

/// What splitting did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SplitReport {
    /// The names of the output datasets, without the `.split` extension.
    pub outputs: Vec<String>,

    /// The configuration keys that were changed by splitting.
    pub changed_keys: Vec<&'static str>,
}

pub struct Splitter<'a, M: ?Sized, E: ?Sized> {
    meta: &'a M,
    workspace: &'a Workspace,
    executor: &'a mut E,

    /// Where outputs are written, relative to the workspace root.
    src_dir: &'a str,
}

impl<'a, M, E> Splitter<'a, M, E>
where
    M: DatasetMetadata + ?Sized,
    E: Executor + ?Sized,
{
    pub fn new(
        meta: &'a M,
        workspace: &'a Workspace,
        executor: &'a mut E,
        src_dir: &'a str,
    ) -> Splitter<'a, M, E> {
        Splitter {
            meta,
            workspace,
            executor,
            src_dir,
        }
    }

    fn output_vis(&self, name: &str) -> String {
        format!("{}/{name}.split", self.src_dir)
    }

    /// Remove anything already in the source directory, and make sure it
    /// exists. A dry run only says what would be removed.
    fn clear_src_dir(&self, dir: &Path) -> Result<(), SplitError> {
        if self.executor.is_dry_run() {
            if dir.exists() {
                info!("Dry run; not removing old split outputs in {}", dir.display());
            }
            return Ok(());
        }
        if dir.exists() {
            info!("Removing old split outputs in {}", dir.display());
            std::fs::remove_dir_all(dir)?;
        }
        std::fs::create_dir_all(dir)?;
        Ok(())
    }

    /// Write a listing of an output dataset to
    /// `./summary/<name>.listobs.summary`, replacing any old listing.
    fn listobs(&mut self, name: &str) -> Result<(), SplitError> {
        let file = self
            .workspace
            .summary_file(&format!("{name}.listobs.summary"));
        let local = self.workspace.local(&file);
        if local.exists() && !self.executor.is_dry_run() {
            debug!("Removing {}", local.display());
            std::fs::remove_file(&local)?;
        }
        info!("Writing listobs summary for split data set to: {file}");
        let op = Operation::new(Task::Listobs)
            .param("vis", self.output_vis(name))
            .param("listfile", file);
        run_checked(self.executor, &op)?;
        Ok(())
    }

    fn transform(
        &mut self,
        name: &str,
        fields: &str,
        spw: &str,
        combine: bool,
    ) -> Result<(), SplitError> {
        let mut op = Operation::new(Task::Mstransform)
            .param("vis", self.workspace.vis())
            .param("outputvis", self.output_vis(name))
            .param("field", fields)
            .param("spw", spw);
        if combine {
            op = op.param("combinespws", true);
        }
        run_checked(self.executor, &op)?;
        self.listobs(name)
    }

    fn split_one(&mut self, name: &str, field: &str) -> Result<(), SplitError> {
        info!("Splitting {field} into separate file: {name}.split.");
        let op = Operation::new(Task::Split)
            .param("vis", self.workspace.vis())
            .param("outputvis", self.output_vis(name))
            .param("field", field);
        run_checked(self.executor, &op)?;
        self.listobs(name)
    }

    /// Split every target. `roles` is updated if the target names change,
    /// or if whether the targets are a mosaic wasn't set.
    pub fn split(&mut self, roles: &mut FieldRoleSet) -> Result<SplitReport, SplitError> {
        info!("Starting split fields.");
        let dir = check_src_dir(self.workspace, self.src_dir)?;
        if !self.executor.is_dry_run() {
            self.workspace.create_dirs()?;
        }
        self.clear_src_dir(&dir)?;

        let mut report = SplitReport::default();
        let mosaic = match roles.mosaic {
            Some(m) => m,
            None => {
                roles.mosaic = Some(false);
                report.changed_keys.push("mosaic");
                false
            }
        };

        if mosaic {
            info!("The configuration indicates that this data set is a mosaic.");
            for name in roles.target_names.iter().unique() {
                info!("All observations of {name} will now be split off into a separate MS.");
                let fields: Vec<&String> = roles
                    .targets
                    .iter()
                    .zip(roles.target_names.iter())
                    .filter(|(_, n)| *n == name)
                    .map(|(f, _)| f)
                    .collect();
                let mut spws = vec![];
                for field in &fields {
                    spws.extend(self.meta.spectral_windows_for_field(field)?);
                }
                let spws = spws.into_iter().sorted().dedup().join(",");
                self.transform(name, &fields.iter().join(","), &spws, true)?;
                report.outputs.push(name.clone());
            }
        } else {
            let mut new_names = Vec::with_capacity(roles.target_names.len());
            for (i, field) in roles.targets.iter().enumerate() {
                let name = roles
                    .target_names
                    .get(i)
                    .ok_or_else(|| SplitError::MissingTargetName {
                        target: field.clone(),
                    })?;
                let surfaced = self.split_target(field, name, roles.manual_combination(field))?;
                new_names.extend(surfaced.iter().cloned());
                report.outputs.extend(surfaced);
            }

            if new_names != roles.target_names {
                info!("Updating the configuration to set target names with separate SPWs.");
                info!("Replacing old target names ({:?})", roles.target_names);
                info!("With new target names: {new_names:?}");
                roles.target_names = new_names;
                report.changed_keys.push("target_names");
            }
        }

        info!("Completed split fields.");
        Ok(report)
    }

    /// Split a single target; returns the names of its outputs.
    fn split_target(
        &mut self,
        field: &str,
        name: &str,
        manual: Option<&[Vec<u32>]>,
    ) -> Result<Vec<String>, SplitError> {
        let windows = self.meta.windows_for_field(field)?;
        if windows.len() == 1 {
            self.split_one(name, field)?;
            return Ok(vec![name.to_string()]);
        }

        let grouping = group_windows(field, &windows, manual)?;
        let surfaced: Vec<(String, BandGroup)> = grouping
            .surfaced_names(name)
            .into_iter()
            .map(|(n, g)| (n, g.clone()))
            .collect();
        for (output, group) in &surfaced {
            if group.is_merged() {
                info!("SPWs {:?} will now be combined for {name}.", group.spws());
                self.transform(output, field, &group.selection(), true)?;
            } else {
                info!("SPW {} of {name} will be split into a separate MS.", group.first());
                self.transform(output, field, &group.selection(), false)?;
            }
        }
        Ok(surfaced.into_iter().map(|(n, _)| n).collect())
    }
}

/// Check that `src_dir` names a directory inside the workspace (and not the
/// workspace itself), and return its full path. Everything in this directory
/// is removed before splitting.
pub fn check_src_dir(workspace: &Workspace, src_dir: &str) -> Result<PathBuf, SplitError> {
    let unsafe_dir = |reason: &'static str| SplitError::UnsafeSrcDir {
        src_dir: src_dir.to_string(),
        reason,
    };
    if src_dir.trim().is_empty() {
        return Err(unsafe_dir("it is empty"));
    }

    let relative = Path::new(src_dir);
    let mut depth = 0;
    for component in relative.components() {
        match component {
            Component::Normal(_) => depth += 1,
            Component::CurDir => (),
            Component::ParentDir => return Err(unsafe_dir("it refers to a parent directory")),
            Component::RootDir | Component::Prefix(_) => {
                return Err(unsafe_dir("it is not relative to the workspace"))
            }
        }
    }
    if depth == 0 {
        return Err(unsafe_dir("it is the workspace itself"));
    }

    let dir = workspace.local(relative);
    // A symlink may still lead somewhere else.
    if dir.exists() {
        let root = workspace.root().canonicalize()?;
        let resolved = dir.canonicalize()?;
        if resolved == root || !resolved.starts_with(&root) {
            return Err(unsafe_dir("it resolves to a directory outside the workspace"));
        }
    }
    Ok(dir)
}
