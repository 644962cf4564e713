// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Applying calibration tables to fields.
//!
//! Each field gets an [`ApplyPlan`]: the tables to apply, and for each table,
//! which field's solutions to use. Calibrators are corrected with their own
//! solutions (bandpass calibrators) or with those of the band's bandpass
//! calibrator (flux calibrators). Targets use the band's bandpass calibrator
//! for band-level tables and their phase calibrator for everything that
//! varies with time.

use indexmap::IndexMap;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use itertools::Itertools;
use log::{debug, info, warn};

use super::{CalChain, CalTable, CalTableKind, ChainContext, ChainError, SelectorClass};
use crate::{
    metadata::{DatasetMetadata, MetadataError},
    ops::{run_checked, Executor, Operation, OperationError, Task},
    roles::Role,
    PROGRESS_BARS,
};

/// Which field's solutions are used when applying a table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    /// Solutions aren't field-specific.
    Blank,

    /// The field being corrected.
    SelfField,

    /// Another field.
    Linked(String),
}

impl Selector {
    /// `Linked`, unless `name` is the field being corrected.
    fn pick(field: &str, name: &str) -> Selector {
        if field == name {
            Selector::SelfField
        } else {
            Selector::Linked(name.to_string())
        }
    }

    /// The gain field given to the apply operation.
    pub fn resolve<'a>(&'a self, field: &'a str) -> &'a str {
        match self {
            Selector::Blank => "",
            Selector::SelfField => field,
            Selector::Linked(name) => name,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApplyPlan {
    pub field: String,

    /// The tables to apply, in order, and whose solutions to use.
    pub tables: Vec<(CalTable, Selector)>,

    /// Restrict the correction to these windows. `None` means all.
    pub spw: Option<String>,
}

impl ApplyPlan {
    /// Does this plan apply a table of this kind?
    pub fn uses(&self, kind: CalTableKind) -> bool {
        self.tables.iter().any(|(t, _)| t.kind == kind)
    }

    pub fn gaintable(&self) -> Vec<String> {
        self.tables.iter().map(|(t, _)| t.path.clone()).collect()
    }

    pub fn gainfield(&self) -> Vec<String> {
        self.tables
            .iter()
            .map(|(_, s)| s.resolve(&self.field).to_string())
            .collect()
    }

    /// A one-line description, e.g. "NGC2 (SPW 2): gain curve, delay,
    /// bandpass, ... (solutions from 3C286, J1407+2827)".
    pub fn summary(&self) -> String {
        let kinds = self.tables.iter().map(|(t, _)| t.kind).join(", ");
        let sources = self
            .gainfield()
            .into_iter()
            .filter(|f| !f.is_empty())
            .unique()
            .join(", ");
        match &self.spw {
            Some(spw) => format!("{} (SPW {spw}): {kinds} (solutions from {sources})", self.field),
            None => format!("{}: {kinds} (solutions from {sources})", self.field),
        }
    }

    pub fn to_operation(&self, vis: &str) -> Operation {
        let mut op = Operation::new(Task::Applycal)
            .param("vis", vis)
            .param("field", &self.field);
        if let Some(spw) = &self.spw {
            op = op.param("spw", spw);
        }
        op.param("gaintable", self.gaintable())
            .param("gainfield", self.gainfield())
            .param("calwt", false)
    }
}

/// Build a plan for `field`. Band-level tables use `band_level`'s solutions
/// and time-dependent tables use `time_dependent`'s. The flux-scale table is
/// only included if `with_flux` is true, in which case it must exist.
fn plan(
    chain: &CalChain,
    field: &str,
    band_level: &str,
    time_dependent: &str,
    with_flux: bool,
    spw: Option<String>,
) -> Result<ApplyPlan, ChainError> {
    let mut tables = vec![];
    for table in chain.accumulated() {
        if table.kind == CalTableKind::FluxScale {
            continue;
        }
        let selector = match table.kind.selector_class() {
            SelectorClass::Blank => Selector::Blank,
            SelectorClass::BandLevel => Selector::pick(field, band_level),
            SelectorClass::TimeDependent => Selector::pick(field, time_dependent),
        };
        tables.push((table.clone(), selector));
    }
    if with_flux {
        let flux = chain
            .get(CalTableKind::FluxScale)
            .ok_or_else(|| ChainError::MissingInputTable {
                step: format!("applying calibration to {field}"),
                missing: CalTableKind::FluxScale,
            })?;
        tables.push((flux.clone(), Selector::pick(field, time_dependent)));
    }
    Ok(ApplyPlan {
        field: field.to_string(),
        tables,
        spw,
    })
}

fn assigned<'a>(list: &'a [String], i: usize, role: Role, slot: String) -> Result<&'a str, ChainError> {
    list.get(i)
        .map(|s| s.as_str())
        .ok_or(ChainError::Unassigned { role, slot })
}

/// Build the plans for every calibrator and target, in the order they should
/// be applied. Identical plans are only included once.
pub fn build_plans<M>(ctx: &ChainContext<M>, chain: &CalChain) -> Result<Vec<ApplyPlan>, ChainError>
where
    M: DatasetMetadata + ?Sized,
{
    let roles = ctx.roles;
    let bands = ctx.bands()?;
    let mut plans: Vec<ApplyPlan> = vec![];
    let mut push = |p: ApplyPlan| {
        if plans.contains(&p) {
            debug!("Already applying calibration to {} in the same way", p.field);
        } else {
            plans.push(p);
        }
    };

    for (i, group) in bands.groups.iter().enumerate() {
        let slot = format!("SPW {}", group.selection());
        let bandcal = assigned(&roles.bandcal, i, Role::BandCal, slot.clone())?;
        let fluxcal = assigned(&roles.fluxcal, i, Role::FluxCal, slot)?;
        if bandcal == fluxcal {
            push(plan(chain, bandcal, bandcal, bandcal, false, None)?);
        } else {
            push(plan(chain, bandcal, bandcal, bandcal, true, None)?);
            push(plan(chain, fluxcal, bandcal, fluxcal, true, None)?);
        }
    }

    for (i, target) in roles.targets.iter().enumerate() {
        let phasecal = assigned(&roles.phasecal, i, Role::PhaseCal, target.clone())?;

        // The windows of this target, keyed by the bandpass calibrator for
        // each window's band.
        let mut by_bandcal: IndexMap<&str, Vec<u32>> = IndexMap::new();
        for spw in ctx.meta.spectral_windows_for_field(target)? {
            let band = bands
                .band_of(spw)
                .ok_or(MetadataError::UnknownWindow { spw })?;
            let bandcal = assigned(&roles.bandcal, band, Role::BandCal, format!("SPW {spw}"))?;
            by_bandcal.entry(bandcal).or_default().push(spw);
        }

        let phasecal_is_fluxcal = roles.fluxcal.iter().any(|f| f == phasecal);
        for (bandcal, spws) in by_bandcal {
            let spw = Some(spws.iter().join(","));
            if phasecal_is_fluxcal {
                push(plan(chain, target, bandcal, phasecal, false, spw)?);
            } else {
                push(plan(chain, phasecal, bandcal, phasecal, true, spw.clone())?);
                push(plan(chain, target, bandcal, phasecal, true, spw)?);
            }
        }
    }

    Ok(plans)
}

/// Which fields were corrected, and which weren't.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplyReport {
    pub corrected: Vec<String>,

    /// Fields for which at least one apply failed, with the reason.
    pub uncorrected: Vec<(String, String)>,
}

impl ApplyReport {
    pub fn all_corrected(&self) -> bool {
        self.uncorrected.is_empty()
    }
}

fn make_apply_progress_bar(num_plans: usize) -> ProgressBar {
    ProgressBar::with_draw_target(
        Some(num_plans as _),
        if PROGRESS_BARS.load() {
            ProgressDrawTarget::stdout()
        } else {
            ProgressDrawTarget::hidden()
        },
    )
    .with_style(
        ProgressStyle::default_bar()
            .template("{msg}: [{wide_bar:.blue}] {pos:3}/{len:3} ({elapsed_precise}<{eta_precise})")
            .unwrap()
            .progress_chars("=> "),
    )
    .with_position(0)
    .with_message("Applying calibration")
}

/// Run every plan. If an apply fails, its field is reported as uncorrected
/// and the remaining plans are still run. Only a failure to run the
/// executor at all is an error.
pub fn apply_all<E: Executor + ?Sized>(
    plans: &[ApplyPlan],
    vis: &str,
    executor: &mut E,
) -> Result<ApplyReport, ChainError> {
    let pb = make_apply_progress_bar(plans.len());
    let mut failures: IndexMap<&str, Option<String>> = IndexMap::new();
    for plan in plans {
        info!("Applying calibration to {}", plan.summary());
        debug!(
            "Tables: [{}]; gain fields: [{}]",
            plan.gaintable().join(", "),
            plan.gainfield().join(", ")
        );
        let op = plan.to_operation(vis);
        let status = failures.entry(plan.field.as_str()).or_insert(None);
        match run_checked(executor, &op) {
            Ok(_) => (),
            Err(OperationError::Execute(e)) => return Err(OperationError::Execute(e).into()),
            Err(e) => {
                warn!("Could not apply calibration to {}: {e}", plan.field);
                if status.is_none() {
                    *status = Some(e.to_string());
                }
            }
        }
        pb.inc(1);
    }
    pb.finish_with_message("Finished applying calibration");

    let mut report = ApplyReport::default();
    for (field, failure) in failures {
        match failure {
            None => report.corrected.push(field.to_string()),
            Some(reason) => report.uncorrected.push((field.to_string(), reason)),
        }
    }
    Ok(report)
}
