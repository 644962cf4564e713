// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Flagging passes, and named snapshots of the dataset's flags.
//!
//! Flags are checkpointed at fixed points of a run (see [`FlagVersion`]).
//! Entering a checkpoint deletes any old snapshot with that name, saves the
//! current flags under it and writes a summary of them.

mod error;

pub use error::FlagError;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter};

use crate::{
    constants::*,
    ops::{run_checked, run_unchecked, Executor, Operation, Task},
    roles::{parse_yes_no, NeedsInput, Resolver},
    workspace::Workspace,
};

/// The named flag snapshots, in the order they're made.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumIter)]
pub enum FlagVersion {
    /// The flags before anything was done.
    #[strum(serialize = "Original")]
    Original,

    /// After basic and automated flagging.
    #[strum(serialize = "initial")]
    Initial,

    #[strum(serialize = "rflag")]
    Rflag,

    #[strum(serialize = "extended")]
    Extended,

    #[strum(serialize = "final")]
    Final,
}

/// The `[flagging]` section of the configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlagParams {
    /// Antennas shadowed by more than this are flagged \[metres\].
    pub shadow_tol: f64,

    /// Flag this much of the start of every scan \[seconds\].
    pub quack_int: f64,

    pub timecutoff: f64,
    pub freqcutoff: f64,

    /// Deviation threshold for rflag.
    pub rthresh: f64,

    /// Don't run TFCrop.
    pub no_tfcrop: bool,

    /// Don't run rflag (and so don't calibrate a second time).
    pub no_rflag: bool,
}

impl Default for FlagParams {
    fn default() -> Self {
        FlagParams {
            shadow_tol: DEFAULT_SHADOW_TOL,
            quack_int: DEFAULT_QUACK_INT,
            timecutoff: DEFAULT_TIME_CUTOFF,
            freqcutoff: DEFAULT_FREQ_CUTOFF,
            rthresh: DEFAULT_RFLAG_THRESHOLD,
            no_tfcrop: false,
            no_rflag: false,
        }
    }
}

/// Runs flagging operations on a dataset.
pub struct Flagger<'a, E: ?Sized> {
    workspace: &'a Workspace,
    executor: &'a mut E,
}

impl<'a, E: Executor + ?Sized> Flagger<'a, E> {
    pub fn new(workspace: &'a Workspace, executor: &'a mut E) -> Flagger<'a, E> {
        Flagger {
            workspace,
            executor,
        }
    }

    fn flagmanager(&self, mode: &str, version: FlagVersion) -> Operation {
        Operation::new(Task::Flagmanager)
            .param("vis", self.workspace.vis())
            .param("mode", mode)
            .param("versionname", version.to_string())
    }

    pub fn restore(&mut self, version: FlagVersion) -> Result<(), FlagError> {
        info!("Restoring flag version from: {version}.");
        let op = self.flagmanager("restore", version);
        run_checked(self.executor, &op)?;
        Ok(())
    }

    pub fn save(&mut self, version: FlagVersion) -> Result<(), FlagError> {
        info!("Saving flag version as: {version}.");
        let op = self.flagmanager("save", version);
        run_checked(self.executor, &op)?;
        Ok(())
    }

    /// Delete a snapshot. The snapshot may not exist, so a failure here is
    /// only logged.
    pub fn delete(&mut self, version: FlagVersion) -> Result<(), FlagError> {
        info!("Removing flag version: {version}.");
        let op = self.flagmanager("delete", version);
        let outcome = run_unchecked(self.executor, &op)?;
        if !outcome.is_success() {
            debug!("Couldn't remove flag version {version}: {}", outcome.diagnostic);
        }
        Ok(())
    }

    /// Write a summary of the current flags to
    /// `./summary/<dataset>.<version>flags.summary`.
    pub fn summary(&mut self, version: FlagVersion) -> Result<(), FlagError> {
        let file = self.workspace.summary_file(&format!(
            "{}.{version}flags.summary",
            self.workspace.vis()
        ));
        info!("Starting writing flag summary to: {file}.");
        let op = Operation::new(Task::Flagdata)
            .param("vis", self.workspace.vis())
            .param("mode", "summary");
        let outcome = run_checked(self.executor, &op)?;
        if self.executor.is_dry_run() {
            info!("Dry run; not writing {file}");
            return Ok(());
        }
        self.workspace.create_dirs()?;
        std::fs::write(self.workspace.local(&file), outcome.diagnostic)?;
        info!("Completed writing flag summary.");
        Ok(())
    }

    /// Enter a checkpoint: delete, save, then summarise.
    pub fn checkpoint(&mut self, version: FlagVersion) -> Result<(), FlagError> {
        self.delete(version)?;
        self.save(version)?;
        self.summary(version)
    }

    /// Restore the original flags if they were saved by an earlier run,
    /// otherwise save them.
    pub fn original(&mut self) -> Result<(), FlagError> {
        let version = FlagVersion::Original;
        if self.workspace.has_flag_version(&version.to_string()) {
            self.restore(version)
        } else {
            self.save(version)
        }
    }

    /// Apply the flag commands in the manual flags file. A missing or empty
    /// file only produces a warning. If the resolver is interactive, the user
    /// must first confirm that the file is ready. Returns whether any flags
    /// were applied.
    pub fn manual<R: Resolver + ?Sized>(&mut self, resolver: &mut R) -> Result<bool, FlagError> {
        info!("Starting manual flagging.");
        if resolver.is_interactive() {
            let request = NeedsInput::yes_no(format!(
                "Manual flags from '{MANUAL_FLAGS_FILE}' are about to be applied. Do you want to proceed"
            ))
            .choices(["y", "n"]);
            while parse_yes_no(&resolver.resolve(&request)?) != Some(true) {}
        }

        info!("Applying flags from {MANUAL_FLAGS_FILE}");
        let path = self.workspace.local(MANUAL_FLAGS_FILE);
        let contents = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("'{MANUAL_FLAGS_FILE}' does not exist. Continuing without manual flagging.");
                return Ok(false);
            }
            Err(e) => return Err(e.into()),
        };
        let commands: Vec<String> = contents
            .lines()
            .map(|l| l.trim())
            .filter(|l| !l.is_empty())
            .map(|l| l.to_string())
            .collect();
        if commands.is_empty() {
            warn!("The file is empty. Continuing without manual flagging.");
            return Ok(false);
        }

        let op = Operation::new(Task::Flagdata)
            .param("vis", self.workspace.vis())
            .param("mode", "list")
            .param("action", "apply")
            .param("inpfile", commands);
        run_checked(self.executor, &op)?;
        info!("Completed manual flagging.");
        Ok(true)
    }

    /// Flag shadowed antennas, zero amplitudes and the start of every scan.
    pub fn base(&mut self, params: &FlagParams) -> Result<(), FlagError> {
        info!("Starting basic flagging.");
        let vis = self.workspace.vis();

        info!(
            "Flagging antennae with more than {} m of shadowing.",
            params.shadow_tol
        );
        let op = Operation::new(Task::Flagdata)
            .param("vis", vis)
            .param("mode", "shadow")
            .param("tolerance", params.shadow_tol)
            .param("flagbackup", false);
        run_checked(self.executor, &op)?;

        info!("Flagging zero amplitude data.");
        let op = Operation::new(Task::Flagdata)
            .param("vis", vis)
            .param("mode", "clip")
            .param("clipzeros", true)
            .param("flagbackup", false);
        run_checked(self.executor, &op)?;

        info!("Flagging first {} s of every scan.", params.quack_int);
        let op = Operation::new(Task::Flagdata)
            .param("vis", vis)
            .param("mode", "quack")
            .param("quackinterval", params.quack_int)
            .param("quackmode", "beg")
            .param("flagbackup", false);
        run_checked(self.executor, &op)?;

        info!("Completed basic flagging.");
        Ok(())
    }

    pub fn tfcrop(&mut self, params: &FlagParams) -> Result<(), FlagError> {
        info!("Starting running TFCrop.");
        let op = Operation::new(Task::Flagdata)
            .param("vis", self.workspace.vis())
            .param("mode", "tfcrop")
            .param("action", "apply")
            .param("display", "")
            .param("timecutoff", params.timecutoff)
            .param("freqcutoff", params.freqcutoff)
            .param("flagbackup", false);
        run_checked(self.executor, &op)?;
        info!("Completed running TFCrop.");
        Ok(())
    }

    /// Flag the corrected data with rflag.
    pub fn rflag(&mut self, params: &FlagParams) -> Result<(), FlagError> {
        info!(
            "Starting running rflag with a threshold of {}.",
            params.rthresh
        );
        let op = Operation::new(Task::Flagdata)
            .param("vis", self.workspace.vis())
            .param("mode", "rflag")
            .param("action", "apply")
            .param("datacolumn", "corrected")
            .param("freqdevscale", params.rthresh)
            .param("timedevscale", params.rthresh)
            .param("display", "")
            .param("flagbackup", false);
        run_checked(self.executor, &op)?;
        info!("Completed running rflag.");
        Ok(())
    }

    /// Extend flags across polarisations, then grow them in time and
    /// frequency.
    pub fn extend(&mut self) -> Result<(), FlagError> {
        info!("Starting extending existing flags.");
        let extend = || {
            Operation::new(Task::Flagdata)
                .param("vis", self.workspace.vis())
                .param("mode", "extend")
                .param("spw", "")
        };
        let op = extend()
            .param("extendpols", true)
            .param("action", "apply")
            .param("display", "")
            .param("flagbackup", false);
        run_checked(self.executor, &op)?;
        let op = extend()
            .param("growtime", EXTEND_GROW_TIME)
            .param("growfreq", EXTEND_GROW_FREQ)
            .param("action", "apply")
            .param("display", "")
            .param("flagbackup", false);
        run_checked(self.executor, &op)?;
        info!("Completed extending existing flags.");
        Ok(())
    }
}
