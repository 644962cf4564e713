// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::{
    path::{Path, PathBuf},
    process::{Command, Stdio},
};

use log::{info, trace};

use super::{ExecuteError, Executor, OpOutcome, Operation};

/// Logs operations without running them. Every operation succeeds with an
/// empty diagnostic.
#[derive(Debug, Default)]
pub struct DryRunExecutor {
    num_operations: usize,
}

impl DryRunExecutor {
    pub fn new() -> DryRunExecutor {
        DryRunExecutor::default()
    }

    /// How many operations have been "run"?
    pub fn num_operations(&self) -> usize {
        self.num_operations
    }
}

impl Executor for DryRunExecutor {
    fn execute(&mut self, op: &Operation) -> Result<OpOutcome, ExecuteError> {
        info!("Dry run; not executing {}", op.task);
        self.num_operations += 1;
        Ok(OpOutcome::success(""))
    }

    fn is_dry_run(&self) -> bool {
        true
    }
}

/// Runs each operation by handing its task-call rendering to an external
/// command line, e.g. `casa --nologger --nogui -c`. The combined stdout and
/// stderr of the command is the diagnostic.
#[derive(Debug, Clone)]
pub struct ScriptExecutor {
    program: String,
    args: Vec<String>,
    work_dir: Option<PathBuf>,
}

impl ScriptExecutor {
    /// Make a new executor from a shell-like command line.
    pub fn new(command_line: &str) -> Result<ScriptExecutor, ExecuteError> {
        let mut words = shlex::split(command_line)
            .ok_or_else(|| ExecuteError::BadCommand(command_line.to_string()))?
            .into_iter();
        let program = words
            .next()
            .ok_or_else(|| ExecuteError::BadCommand(command_line.to_string()))?;
        Ok(ScriptExecutor {
            program,
            args: words.collect(),
            work_dir: None,
        })
    }

    /// Run commands in this directory rather than the current one.
    pub fn with_work_dir<P: AsRef<Path>>(mut self, dir: P) -> ScriptExecutor {
        self.work_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }
}

impl Executor for ScriptExecutor {
    fn execute(&mut self, op: &Operation) -> Result<OpOutcome, ExecuteError> {
        let call = op.render();
        trace!("Running {} {:?} {call}", self.program, self.args);

        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .arg(&call)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = &self.work_dir {
            command.current_dir(dir);
        }
        let output = command.output().map_err(|err| ExecuteError::Spawn {
            program: self.program.clone(),
            err,
        })?;

        let mut diagnostic = String::from_utf8_lossy(&output.stdout).into_owned();
        diagnostic.push_str(&String::from_utf8_lossy(&output.stderr));
        if output.status.success() {
            Ok(OpOutcome::success(diagnostic))
        } else {
            Ok(OpOutcome::failure(output.status.code(), diagnostic))
        }
    }
}
