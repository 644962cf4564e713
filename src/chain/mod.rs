// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The calibration chain.
//!
//! Calibration is an ordered series of solve steps. Each step produces a
//! calibration table, and each declares which earlier tables must be applied
//! on the fly while it solves. [`CalChain`] keeps the tables produced so far
//! and hands out the inputs of each step, failing if a declared input is
//! missing.

pub mod apply;
mod error;
mod solve;

pub use error::ChainError;
pub use solve::{solve, ChainContext};

use itertools::Itertools;
use strum::IntoEnumIterator;
use strum_macros::{Display, EnumIter};

use crate::{metadata::DatasetMetadata, workspace::Workspace};

/// The kinds of calibration table, in the order they're produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display, EnumIter)]
pub enum CalTableKind {
    #[strum(serialize = "antenna position")]
    AntPos,
    #[strum(serialize = "gain curve")]
    GainCurve,
    #[strum(serialize = "delay")]
    Delay,
    #[strum(serialize = "bandpass phase")]
    BpPhase,
    #[strum(serialize = "bandpass")]
    Bandpass,
    #[strum(serialize = "integration phase")]
    IntPhase,
    #[strum(serialize = "scan phase")]
    ScanPhase,
    #[strum(serialize = "amplitude")]
    Amplitude,
    #[strum(serialize = "flux scale")]
    FluxScale,
}

/// Which field's solutions are used when a table is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectorClass {
    /// Never field-specific.
    Blank,

    /// Solutions from the band's bandpass calibrator.
    BandLevel,

    /// Solutions varying with time, from the nearest relevant calibrator.
    TimeDependent,
}

impl CalTableKind {
    pub fn file_name(self) -> &'static str {
        match self {
            CalTableKind::AntPos => "antpos.cal",
            CalTableKind::GainCurve => "gaincurve.cal",
            CalTableKind::Delay => "delays.cal",
            CalTableKind::BpPhase => "bpphase.gcal",
            CalTableKind::Bandpass => "bandpass.bcal",
            CalTableKind::IntPhase => "intphase.gcal",
            CalTableKind::ScanPhase => "scanphase.gcal",
            CalTableKind::Amplitude => "amp.gcal",
            CalTableKind::FluxScale => "fluxsol.cal",
        }
    }

    /// Is this table used by every later step? The bandpass-phase table
    /// is only used to solve for the bandpass.
    pub fn is_carried(self) -> bool {
        self != CalTableKind::BpPhase
    }

    /// Only the antenna position table may be absent from a step's inputs.
    pub fn is_optional(self) -> bool {
        self == CalTableKind::AntPos
    }

    pub fn selector_class(self) -> SelectorClass {
        match self {
            CalTableKind::AntPos | CalTableKind::GainCurve => SelectorClass::Blank,
            CalTableKind::Delay | CalTableKind::BpPhase | CalTableKind::Bandpass => {
                SelectorClass::BandLevel
            }
            CalTableKind::IntPhase
            | CalTableKind::ScanPhase
            | CalTableKind::Amplitude
            | CalTableKind::FluxScale => SelectorClass::TimeDependent,
        }
    }

    /// The tables that must be applied while solving for this one.
    pub fn declared_inputs(self) -> Vec<CalTableKind> {
        use CalTableKind::*;
        match self {
            AntPos | GainCurve => vec![],
            Delay => vec![AntPos, GainCurve],
            BpPhase => vec![AntPos, GainCurve, Delay],
            Bandpass => vec![AntPos, GainCurve, Delay, BpPhase],
            IntPhase => vec![AntPos, GainCurve, Delay, Bandpass],
            ScanPhase => {
                let mut v = IntPhase.declared_inputs();
                v.push(IntPhase);
                v
            }
            Amplitude => {
                let mut v = ScanPhase.declared_inputs();
                v.push(ScanPhase);
                v
            }
            FluxScale => vec![Amplitude],
        }
    }
}

/// A calibration table produced by one step of the chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalTable {
    pub kind: CalTableKind,

    /// Relative to the workspace root.
    pub path: String,

    /// The kinds of the tables that were applied while solving for this one.
    pub inputs: Vec<CalTableKind>,
}

/// The tables produced so far by a calibration run.
#[derive(Debug, Clone)]
pub struct CalChain {
    tables: Vec<CalTable>,
    discarded: Vec<CalTableKind>,
    workspace: Workspace,
}

impl CalChain {
    pub fn new(workspace: &Workspace) -> CalChain {
        CalChain {
            tables: vec![],
            discarded: vec![],
            workspace: workspace.clone(),
        }
    }

    /// The chain that solving would produce if every step succeeded. Nothing
    /// is run.
    pub fn planned<M: DatasetMetadata + ?Sized>(
        ctx: &ChainContext<M>,
    ) -> Result<CalChain, ChainError> {
        let mut chain = CalChain::new(ctx.workspace);
        for kind in CalTableKind::iter() {
            match kind {
                CalTableKind::AntPos if !ctx.jvla => continue,
                CalTableKind::FluxScale if !ctx.needs_flux_scale() => continue,
                _ => (),
            }
            chain.record(kind)?;
        }
        Ok(chain)
    }

    pub fn path(&self, kind: CalTableKind) -> String {
        self.workspace.cal_table(kind.file_name())
    }

    pub fn get(&self, kind: CalTableKind) -> Option<&CalTable> {
        self.tables.iter().find(|t| t.kind == kind)
    }

    pub fn contains(&self, kind: CalTableKind) -> bool {
        self.get(kind).is_some()
    }

    pub fn tables(&self) -> &[CalTable] {
        &self.tables
    }

    pub fn is_discarded(&self, kind: CalTableKind) -> bool {
        self.discarded.contains(&kind)
    }

    /// The tables to apply while solving for `kind`. An absent optional
    /// table is skipped; any other absent table is an error.
    pub fn inputs_for(&self, kind: CalTableKind) -> Result<Vec<&CalTable>, ChainError> {
        let mut inputs = vec![];
        for input in kind.declared_inputs() {
            match self.get(input) {
                Some(t) => inputs.push(t),
                None if input.is_optional() => (),
                None => {
                    return Err(ChainError::MissingInputTable {
                        step: kind.to_string(),
                        missing: input,
                    })
                }
            }
        }
        Ok(inputs)
    }

    /// Paths of the inputs for `kind`, ready to be given to an operation.
    pub fn input_paths(&self, kind: CalTableKind) -> Result<Vec<String>, ChainError> {
        Ok(self
            .inputs_for(kind)?
            .into_iter()
            .map(|t| t.path.clone())
            .collect())
    }

    /// Record that the table for `kind` has been produced.
    pub fn record(&mut self, kind: CalTableKind) -> Result<&CalTable, ChainError> {
        let inputs = self
            .inputs_for(kind)?
            .into_iter()
            .map(|t| t.kind)
            .collect();
        self.tables.retain(|t| t.kind != kind);
        self.tables.push(CalTable {
            kind,
            path: self.path(kind),
            inputs,
        });
        Ok(&self.tables[self.tables.len() - 1])
    }

    /// Drop a table; it's omitted from everything that follows.
    pub fn discard(&mut self, kind: CalTableKind) {
        self.tables.retain(|t| t.kind != kind);
        if !self.discarded.contains(&kind) {
            self.discarded.push(kind);
        }
    }

    /// All tables that are carried forward, in production order.
    pub fn accumulated(&self) -> Vec<&CalTable> {
        CalTableKind::iter()
            .filter(|k| k.is_carried())
            .filter_map(|k| self.get(k))
            .collect()
    }

    pub(crate) fn describe(&self) -> String {
        self.tables.iter().map(|t| t.path.as_str()).join(", ")
    }
}
