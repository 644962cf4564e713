// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Processing operations.
//!
//! Everything that touches the data (flagging, solving, applying, splitting)
//! is done by an external package. Here, each such call is an [`Operation`]:
//! a task name and an ordered set of parameters. An [`Executor`] runs an
//! operation and hands back an [`OpOutcome`], whose diagnostic text is
//! inspected for problems.

mod executors;

pub use executors::{DryRunExecutor, ScriptExecutor};

use std::fmt::Write;

use indexmap::IndexMap;
use itertools::Itertools;
use log::{debug, info};
use regex::Regex;
use strum_macros::{Display, EnumIter, EnumString};
use thiserror::Error;

lazy_static::lazy_static! {
    static ref SEVERE: Regex = Regex::new(r"(?m)^.*\bSEVERE\b.*$").unwrap();
}

/// The tasks of the external processing package used by this pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum Task {
    Flagdata,
    Flagmanager,
    Setjy,
    Gencal,
    Gaincal,
    Bandpass,
    Fluxscale,
    Applycal,
    Split,
    Mstransform,
    Listobs,
}

/// The value of a single operation parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Str(String),
    Bool(bool),
    Int(i64),
    Float(f64),
    StrList(Vec<String>),
    FloatList(Vec<f64>),
}

impl ParamValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_str_list(&self) -> Option<&[String]> {
        match self {
            ParamValue::StrList(l) => Some(l),
            _ => None,
        }
    }
}

fn quote(s: &str) -> String {
    format!("'{}'", s.replace('\\', "\\\\").replace('\'', "\\'"))
}

fn float(f: f64) -> String {
    // Debug formatting always includes a decimal point.
    format!("{f:?}")
}

impl std::fmt::Display for ParamValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParamValue::Str(s) => write!(f, "{}", quote(s)),
            ParamValue::Bool(true) => write!(f, "True"),
            ParamValue::Bool(false) => write!(f, "False"),
            ParamValue::Int(i) => write!(f, "{i}"),
            ParamValue::Float(v) => write!(f, "{}", float(*v)),
            ParamValue::StrList(l) => write!(f, "[{}]", l.iter().map(|s| quote(s)).join(", ")),
            ParamValue::FloatList(l) => write!(f, "[{}]", l.iter().map(|v| float(*v)).join(", ")),
        }
    }
}

impl From<&str> for ParamValue {
    fn from(s: &str) -> Self {
        ParamValue::Str(s.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(s: String) -> Self {
        ParamValue::Str(s)
    }
}

impl From<&String> for ParamValue {
    fn from(s: &String) -> Self {
        ParamValue::Str(s.clone())
    }
}

impl From<bool> for ParamValue {
    fn from(b: bool) -> Self {
        ParamValue::Bool(b)
    }
}

impl From<i64> for ParamValue {
    fn from(i: i64) -> Self {
        ParamValue::Int(i)
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        ParamValue::Float(v)
    }
}

impl From<Vec<String>> for ParamValue {
    fn from(l: Vec<String>) -> Self {
        ParamValue::StrList(l)
    }
}

impl From<Vec<f64>> for ParamValue {
    fn from(l: Vec<f64>) -> Self {
        ParamValue::FloatList(l)
    }
}

/// A single call of a processing task.
#[derive(Debug, Clone, PartialEq)]
pub struct Operation {
    pub task: Task,
    pub params: IndexMap<String, ParamValue>,
}

impl Operation {
    pub fn new(task: Task) -> Operation {
        Operation {
            task,
            params: IndexMap::new(),
        }
    }

    /// Add a parameter. Parameters keep the order in which they're added.
    pub fn param<V: Into<ParamValue>>(mut self, key: &str, value: V) -> Operation {
        self.params.insert(key.to_string(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.params.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(|v| v.as_str())
    }

    /// Render this operation as a task call, e.g.
    /// `flagdata(vis='x.ms', mode='clip', clipzeros=True)`.
    pub fn render(&self) -> String {
        let mut s = format!("{}(", self.task);
        for (i, (k, v)) in self.params.iter().enumerate() {
            if i > 0 {
                s.push_str(", ");
            }
            // Writing into a String can't fail.
            let _ = write!(s, "{k}={v}");
        }
        s.push(')');
        s
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.render())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpStatus {
    Success,

    /// The operation didn't succeed. An exit code is included if one is
    /// available.
    Failure(Option<i32>),
}

/// What running an operation produced.
#[derive(Debug, Clone, PartialEq)]
pub struct OpOutcome {
    pub status: OpStatus,

    /// All text the operation emitted.
    pub diagnostic: String,
}

impl OpOutcome {
    pub fn success<S: Into<String>>(diagnostic: S) -> OpOutcome {
        OpOutcome {
            status: OpStatus::Success,
            diagnostic: diagnostic.into(),
        }
    }

    pub fn failure<S: Into<String>>(code: Option<i32>, diagnostic: S) -> OpOutcome {
        OpOutcome {
            status: OpStatus::Failure(code),
            diagnostic: diagnostic.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == OpStatus::Success
    }

    pub fn mentions(&self, pattern: &str) -> bool {
        self.diagnostic.contains(pattern)
    }

    /// Lines of the diagnostic that report a severe problem.
    pub fn severe_lines(&self) -> Vec<&str> {
        SEVERE.find_iter(&self.diagnostic).map(|m| m.as_str()).collect()
    }
}

/// Something that can run processing operations.
pub trait Executor {
    fn execute(&mut self, op: &Operation) -> Result<OpOutcome, ExecuteError>;

    /// Are operations only being logged? If so, callers must not touch
    /// anything on disk either.
    fn is_dry_run(&self) -> bool {
        false
    }
}

impl<E: Executor + ?Sized> Executor for &mut E {
    fn execute(&mut self, op: &Operation) -> Result<OpOutcome, ExecuteError> {
        (**self).execute(op)
    }

    fn is_dry_run(&self) -> bool {
        (**self).is_dry_run()
    }
}

impl<E: Executor + ?Sized> Executor for Box<E> {
    fn execute(&mut self, op: &Operation) -> Result<OpOutcome, ExecuteError> {
        (**self).execute(op)
    }

    fn is_dry_run(&self) -> bool {
        (**self).is_dry_run()
    }
}

/// Run an operation, and treat a failed status or any severe diagnostic line
/// as an error.
pub fn run_checked<E: Executor + ?Sized>(
    executor: &mut E,
    op: &Operation,
) -> Result<OpOutcome, OperationError> {
    let outcome = run_unchecked(executor, op)?;
    check_outcome(op, &outcome)?;
    Ok(outcome)
}

/// Run an operation without checking the outcome; the caller decides what is
/// a failure.
pub fn run_unchecked<E: Executor + ?Sized>(
    executor: &mut E,
    op: &Operation,
) -> Result<OpOutcome, OperationError> {
    info!("Executing command: {op}");
    let outcome = executor.execute(op)?;
    debug!("{} finished with status {:?}", op.task, outcome.status);
    Ok(outcome)
}

pub fn check_outcome(op: &Operation, outcome: &OpOutcome) -> Result<(), OperationError> {
    let severe = outcome.severe_lines();
    if !severe.is_empty() {
        return Err(OperationError::Severe {
            task: op.task,
            lines: severe.join("\n"),
        });
    }
    if !outcome.is_success() {
        return Err(OperationError::Failed {
            task: op.task,
            diagnostic: outcome.diagnostic.clone(),
        });
    }
    Ok(())
}

#[derive(Error, Debug)]
pub enum OperationError {
    #[error("The {task} operation failed:\n{diagnostic}")]
    Failed { task: Task, diagnostic: String },

    #[error("The {task} operation reported a severe error:\n{lines}")]
    Severe { task: Task, lines: String },

    #[error(transparent)]
    Execute(#[from] ExecuteError),
}

#[derive(Error, Debug)]
pub enum ExecuteError {
    #[error("The executor command '{0}' could not be parsed into a program and arguments")]
    BadCommand(String),

    #[error("Couldn't run '{program}': {err}")]
    Spawn {
        program: String,
        err: std::io::Error,
    },
}
