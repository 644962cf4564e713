// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Running the whole calibration pipeline.
//!
//! A full run goes through the same stages every time:
//!
//! 1. restore (or save) the original flags, then apply manual and basic
//!    flags and TFCrop; save the "initial" flag version;
//! 2. check the reference antenna and the field roles, writing any repairs
//!    back to the configuration;
//! 3. solve and apply the calibration chain;
//! 4. unless disabled, flag with rflag, extend flags and calibrate again;
//! 5. save the "final" flag version and split off the targets;
//! 6. log how the configuration differs from the last run's, and back it up.
//!
//! A dry run executes nothing and leaves everything on disk as it was,
//! including the configuration.

mod error;
#[cfg(test)]
mod tests;

pub use error::PipelineError;

use log::{info, warn};

use crate::{
    chain::{
        apply::{apply_all, build_plans, ApplyPlan, ApplyReport},
        solve, CalChain, ChainContext,
    },
    cli::Warn,
    config::{ConfigStore, ParamChange},
    flagging::{FlagVersion, Flagger},
    metadata::DatasetMetadata,
    ops::Executor,
    roles::{FieldRoleSet, Resolver, ValidationReport, Validator},
    split::{check_src_dir, SplitReport, Splitter},
    workspace::Workspace,
};

/// What a full run did.
#[derive(Debug, Clone)]
pub struct RunReport {
    /// One report per calibration pass.
    pub passes: Vec<ApplyReport>,

    pub split: SplitReport,

    /// Differences from the last run's configuration; `None` if this is the
    /// first run.
    pub param_changes: Option<Vec<ParamChange>>,
}

pub struct Pipeline<'a, M: ?Sized, E: ?Sized, R: ?Sized> {
    store: &'a mut ConfigStore,
    meta: &'a M,
    executor: &'a mut E,
    resolver: &'a mut R,
    workspace: Workspace,
}

impl<'a, M, E, R> Pipeline<'a, M, E, R>
where
    M: DatasetMetadata + ?Sized,
    E: Executor + ?Sized,
    R: Resolver + ?Sized,
{
    pub fn new(
        store: &'a mut ConfigStore,
        meta: &'a M,
        executor: &'a mut E,
        resolver: &'a mut R,
    ) -> Pipeline<'a, M, E, R> {
        let workspace = store.workspace();
        Pipeline {
            store,
            meta,
            executor,
            resolver,
            workspace,
        }
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    fn roles(&self) -> FieldRoleSet {
        self.store.config.calibration.clone()
    }

    /// Keep `roles`, writing `keys` to the configuration file unless this is
    /// a dry run.
    fn persist(&mut self, roles: &FieldRoleSet, keys: &[&str]) -> Result<(), PipelineError> {
        if self.executor.is_dry_run() {
            if !keys.is_empty() {
                info!(
                    "Dry run; not writing [calibration] {} to {}",
                    keys.join(", "),
                    self.store.path().display()
                );
            }
            self.store.config.calibration = roles.clone();
            return Ok(());
        }
        self.store.persist(roles, keys)?;
        Ok(())
    }

    /// Validate (and repair) the field roles. Repairs are written to the
    /// configuration.
    pub fn set_fields(&mut self) -> Result<ValidationReport, PipelineError> {
        let mut roles = self.roles();
        let report = Validator::new(self.meta, &mut *self.resolver).validate(&mut roles)?;
        self.persist(&roles, &report.changed_keys)?;
        Ok(report)
    }

    /// Make sure the reference antenna is valid. A new one is written to the
    /// configuration.
    pub fn select_refant(&mut self) -> Result<(), PipelineError> {
        let mut roles = self.roles();
        if Validator::new(self.meta, &mut *self.resolver).select_refant(&mut roles)? {
            self.persist(&roles, &["refant"])?;
        }
        Ok(())
    }

    /// Solve for the calibration chain and apply it to every field.
    pub fn calibrate(&mut self) -> Result<ApplyReport, PipelineError> {
        let roles = self.roles();
        let ctx = ChainContext {
            meta: self.meta,
            roles: &roles,
            workspace: &self.workspace,
            jvla: self.store.config.importdata.jvla,
        };
        let chain = solve(&ctx, &mut *self.executor)?;
        let plans = build_plans(&ctx, &chain)?;
        let report = apply_all(&plans, self.workspace.vis(), &mut *self.executor)?;
        for (field, reason) in &report.uncorrected {
            format!("Calibration could not be applied to {field}: {reason}").warn();
        }
        Ok(report)
    }

    /// The apply plans that calibrating would use. Nothing is run, and
    /// nothing is written to the configuration.
    pub fn plan(&mut self) -> Result<Vec<ApplyPlan>, PipelineError> {
        let mut roles = self.roles();
        let report = Validator::new(self.meta, &mut *self.resolver).validate(&mut roles)?;
        if report.changed {
            warn!(
                "Field roles would be changed ({}); these changes have not been saved",
                report.changed_keys.join(", ")
            );
        }
        let ctx = ChainContext {
            meta: self.meta,
            roles: &roles,
            workspace: &self.workspace,
            jvla: self.store.config.importdata.jvla,
        };
        let chain = CalChain::planned(&ctx)?;
        Ok(build_plans(&ctx, &chain)?)
    }

    /// Split off the targets. Changed target names are written to the
    /// configuration.
    pub fn split(&mut self) -> Result<SplitReport, PipelineError> {
        let mut roles = self.roles();
        let src_dir = self.store.config.global.src_dir.clone();
        let report =
            Splitter::new(self.meta, &self.workspace, &mut *self.executor, &src_dir).split(&mut roles)?;
        self.persist(&roles, &report.changed_keys)?;
        Ok(report)
    }

    /// Log how the configuration differs from the last run's, then back it
    /// up for the next run.
    pub fn record_params(&mut self) -> Result<Option<Vec<ParamChange>>, PipelineError> {
        let changes = self.store.diff_backup()?;
        match &changes {
            None => info!("No earlier configuration to compare with."),
            Some(c) if c.is_empty() => info!("The configuration is the same as the last run's."),
            Some(c) => {
                info!("The configuration has changed since the last run:");
                for change in c {
                    info!("  {change}");
                }
            }
        }
        if self.executor.is_dry_run() {
            info!("Dry run; not backing up {}", self.store.path().display());
        } else {
            let backup = self.store.backup()?;
            info!("Backed up the configuration to {}", backup.display());
        }
        Ok(changes)
    }

    /// Run everything.
    pub fn run(&mut self) -> Result<RunReport, PipelineError> {
        // Everything in the source directory is removed when splitting, so
        // check it before doing anything.
        check_src_dir(&self.workspace, &self.store.config.global.src_dir)?;
        let params = self.store.config.flagging.clone();
        {
            let mut flagger = Flagger::new(&self.workspace, &mut *self.executor);
            flagger.original()?;
            if !flagger.manual(&mut *self.resolver)? {
                info!("No manual flags were applied.");
            }
            flagger.base(&params)?;
            if params.no_tfcrop {
                info!("Skipping TFCrop.");
            } else {
                flagger.tfcrop(&params)?;
            }
            flagger.checkpoint(FlagVersion::Initial)?;
        }

        self.select_refant()?;
        self.set_fields()?;
        let mut passes = vec![self.calibrate()?];

        if params.no_rflag {
            info!("Skipping rflag and a second round of calibration.");
        } else {
            {
                let mut flagger = Flagger::new(&self.workspace, &mut *self.executor);
                flagger.rflag(&params)?;
                flagger.checkpoint(FlagVersion::Rflag)?;
                flagger.extend()?;
                flagger.checkpoint(FlagVersion::Extended)?;
            }
            passes.push(self.calibrate()?);
        }

        Flagger::new(&self.workspace, &mut *self.executor).checkpoint(FlagVersion::Final)?;
        let split = self.split()?;
        let param_changes = self.record_params()?;
        Ok(RunReport {
            passes,
            split,
            param_changes,
        })
    }
}
