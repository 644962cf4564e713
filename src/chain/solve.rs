// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Solving for the calibration tables.

use std::io::Write;

use indexmap::IndexMap;
use itertools::Itertools;
use log::{debug, info, warn};

use super::{CalChain, CalTableKind, ChainError};
use crate::{
    constants::{is_std_flux_model, GAINCAL_MIN_SNR, NO_ANTPOS_OFFSETS},
    metadata::DatasetMetadata,
    ops::{check_outcome, run_checked, run_unchecked, Executor, Operation, Task},
    roles::FieldRoleSet,
    spw::{bands_for_fields, Grouping},
    workspace::Workspace,
};

/// Everything the calibration steps need to know.
pub struct ChainContext<'a, M: ?Sized> {
    pub meta: &'a M,

    /// Validated field roles.
    pub roles: &'a FieldRoleSet,

    pub workspace: &'a Workspace,

    /// Should antenna position corrections be looked up? (JVLA data only.)
    pub jvla: bool,
}

impl<'a, M: DatasetMetadata + ?Sized> ChainContext<'a, M> {
    /// The union of the windows that any target was observed in, sorted.
    pub fn target_spws(&self) -> Result<Vec<u32>, ChainError> {
        if self.roles.targets.is_empty() {
            return Err(ChainError::NoTargets);
        }
        let mut spws = vec![];
        for target in &self.roles.targets {
            spws.extend(self.meta.spectral_windows_for_field(target)?);
        }
        spws.sort_unstable();
        spws.dedup();
        Ok(spws)
    }

    /// The bands that flux and bandpass calibrators are assigned to.
    pub fn bands(&self) -> Result<Grouping, ChainError> {
        Ok(bands_for_fields(self.meta, &self.roles.targets)?)
    }

    /// The flux scale is only transferred when some calibrator isn't a flux
    /// calibrator.
    pub fn needs_flux_scale(&self) -> bool {
        let fluxcals = &self.roles.fluxcal;
        self.roles
            .calibrators()
            .iter()
            .any(|c| !fluxcals.contains(c))
    }
}

/// Warn about windows without any phase calibrator or target.
fn check_window_coverage<M: DatasetMetadata + ?Sized>(ctx: &ChainContext<M>, spws: &[u32]) {
    for &spw in spws {
        let fields = ctx.meta.fields_for_window(spw);
        if !ctx.roles.phasecal.iter().any(|p| fields.contains(p)) {
            warn!("No phase calibrator for SPW {spw}.");
        }
        if !ctx.roles.targets.iter().any(|t| fields.contains(t)) {
            warn!("No targets in SPW {spw}.");
        }
    }
}

/// Load a flux model into each distinct flux calibrator.
fn load_flux_models<M, E>(ctx: &ChainContext<M>, executor: &mut E) -> Result<(), ChainError>
where
    M: DatasetMetadata + ?Sized,
    E: Executor + ?Sized,
{
    if ctx.roles.fluxcal.len() != ctx.roles.fluxmod.len() {
        return Err(ChainError::FluxModelCount {
            fluxcal: ctx.roles.fluxcal.len(),
            fluxmod: ctx.roles.fluxmod.len(),
        });
    }

    let vis = ctx.workspace.vis();
    let mut loaded: IndexMap<&str, &str> = IndexMap::new();
    for (cal, model) in ctx.roles.fluxcal.iter().zip(ctx.roles.fluxmod.iter()) {
        if let Some(&previous) = loaded.get(cal.as_str()) {
            if previous != model.as_str() {
                warn!("The flux model for {cal} has already been set as {previous}, but it does not match the current model ({model}).");
                warn!("The former will not be replaced. Check the flux model assignments in the configuration.");
            }
            continue;
        }
        loaded.insert(cal.as_str(), model.as_str());

        info!("Load model for flux calibrator {cal} ({model}).");
        let op = Operation::new(Task::Setjy)
            .param("vis", vis)
            .param("field", cal)
            .param("scalebychan", true);
        let op = if is_std_flux_model(model) {
            op.param("model", model)
        } else if ctx.roles.man_mod {
            let flux_density: f64 =
                model
                    .trim()
                    .parse()
                    .map_err(|_| ChainError::BadManualFluxDensity {
                        calibrator: cal.clone(),
                        value: model.clone(),
                    })?;
            op.param("fluxdensity", vec![flux_density, 0.0, 0.0, 0.0])
                .param("standard", "manual")
        } else {
            warn!("The flux model for {cal} ({model}) cannot be recognised. The setjy task will not be run. Fluxes will be incorrect.");
            continue;
        };
        run_checked(executor, &op)?;
    }
    Ok(())
}

/// A gain-solving operation; the declared input tables and the window
/// selection are added by [`solve_step`].
fn gain_solve(task: Task, vis: &str, field: &str, table: &str, refant: &str) -> Operation {
    Operation::new(task)
        .param("vis", vis)
        .param("field", field)
        .param("caltable", table)
        .param("refant", refant)
}

fn solve_step<E: Executor + ?Sized>(
    executor: &mut E,
    chain: &mut CalChain,
    kind: CalTableKind,
    op: Operation,
    spw: &str,
) -> Result<(), ChainError> {
    let op = op
        .param("gaintable", chain.input_paths(kind)?)
        .param("spw", spw);
    run_checked(executor, &op)?;
    let table = chain.record(kind)?;
    debug!(
        "Produced {} (inputs: [{}])",
        table.path,
        table.inputs.iter().join(", ")
    );
    Ok(())
}

/// Run every solve step in order, and return the tables produced.
pub fn solve<M, E>(ctx: &ChainContext<M>, executor: &mut E) -> Result<CalChain, ChainError>
where
    M: DatasetMetadata + ?Sized,
    E: Executor + ?Sized,
{
    use CalTableKind::*;

    info!("Starting calibration.");
    if !executor.is_dry_run() {
        ctx.workspace.create_dirs()?;
    }
    let spws = ctx.target_spws()?;
    check_window_coverage(ctx, &spws);
    let spw = spws.iter().join(",");

    let vis = ctx.workspace.vis();
    let refant = ctx.roles.refant.as_str();
    let bandcals = ctx.roles.bandcal.iter().unique().join(",");
    let calfields = ctx.roles.calibrators().join(",");
    let mut chain = CalChain::new(ctx.workspace);

    if ctx.jvla {
        let path = chain.path(AntPos);
        info!("Looking up antenna position offsets ({path}).");
        let op = Operation::new(Task::Gencal)
            .param("vis", vis)
            .param("caltable", &path)
            .param("caltype", "antpos")
            .param("antenna", "");
        let outcome = run_unchecked(executor, &op)?;
        if outcome.mentions(NO_ANTPOS_OFFSETS) {
            info!("No antenna position offsets were found.");
            info!("Ignoring this step for the remainder of calibration.");
            chain.discard(AntPos);
        } else {
            check_outcome(&op, &outcome)?;
            chain.record(AntPos)?;
        }
    }

    let path = chain.path(GainCurve);
    info!("Calibrating gain vs elevation ({path}).");
    let op = Operation::new(Task::Gencal)
        .param("vis", vis)
        .param("caltable", &path)
        .param("caltype", "gceff");
    run_checked(executor, &op)?;
    chain.record(GainCurve)?;

    load_flux_models(ctx, executor)?;

    let path = chain.path(Delay);
    info!("Calibrating delays for bandpass calibrators {bandcals} ({path}).");
    let op = gain_solve(Task::Gaincal, vis, &bandcals, &path, refant).param("gaintype", "K");
    solve_step(executor, &mut chain, Delay, op, &spw)?;

    let path = chain.path(BpPhase);
    info!("Make bandpass calibrator phase solutions for {bandcals} ({path}).");
    let op = gain_solve(Task::Gaincal, vis, &bandcals, &path, refant)
        .param("calmode", "p")
        .param("solint", "int")
        .param("combine", "")
        .param("minsnr", GAINCAL_MIN_SNR);
    solve_step(executor, &mut chain, BpPhase, op, &spw)?;

    let path = chain.path(Bandpass);
    info!("Determining bandpass solution(s) ({path}).");
    let op = gain_solve(Task::Bandpass, vis, &bandcals, &path, refant)
        .param("solint", "inf")
        .param("solnorm", true);
    solve_step(executor, &mut chain, Bandpass, op, &spw)?;

    let path = chain.path(IntPhase);
    info!("Calculating phase calibrations on integration timescales ({path}).");
    let op = gain_solve(Task::Gaincal, vis, &calfields, &path, refant)
        .param("calmode", "p")
        .param("solint", "int")
        .param("minsnr", GAINCAL_MIN_SNR);
    solve_step(executor, &mut chain, IntPhase, op, &spw)?;

    let path = chain.path(ScanPhase);
    info!("Calculating phase calibrations on scan timescales ({path}).");
    let op = gain_solve(Task::Gaincal, vis, &calfields, &path, refant)
        .param("calmode", "p")
        .param("solint", "inf")
        .param("minsnr", GAINCAL_MIN_SNR);
    solve_step(executor, &mut chain, ScanPhase, op, &spw)?;

    let path = chain.path(Amplitude);
    info!("Calculating amplitude calibrations ({path}).");
    let op = gain_solve(Task::Gaincal, vis, &calfields, &path, refant)
        .param("calmode", "ap")
        .param("solint", "inf")
        .param("minsnr", GAINCAL_MIN_SNR);
    solve_step(executor, &mut chain, Amplitude, op, &spw)?;

    if ctx.needs_flux_scale() {
        scale_fluxes(ctx, executor, &mut chain, &spw)?;
    } else {
        debug!("All calibrators are flux calibrators; not transferring the flux scale");
    }

    info!("Calibration tables: {}", chain.describe());
    Ok(chain)
}

fn scale_fluxes<M, E>(
    ctx: &ChainContext<M>,
    executor: &mut E,
    chain: &mut CalChain,
    spw: &str,
) -> Result<(), ChainError>
where
    M: DatasetMetadata + ?Sized,
    E: Executor + ?Sized,
{
    let vis = ctx.workspace.vis();
    // The only input is the amplitude table.
    let amp = chain.input_paths(CalTableKind::FluxScale)?.join(",");
    let path = chain.path(CalTableKind::FluxScale);
    info!("Applying flux scale to calibrators ({path}).");
    let op = Operation::new(Task::Fluxscale)
        .param("vis", vis)
        .param("caltable", amp)
        .param("fluxtable", &path)
        .param("reference", ctx.roles.fluxcal.iter().unique().join(","))
        .param("incremental", true);
    let outcome = run_checked(executor, &op)?;
    chain.record(CalTableKind::FluxScale)?;

    let summary = ctx
        .workspace
        .local(ctx.workspace.summary_file(&format!("{vis}.flux.summary")));
    if executor.is_dry_run() {
        info!("Dry run; not writing {}", summary.display());
        return Ok(());
    }
    info!("Writing calibrator fluxes summary to: {}.", summary.display());
    let mut file = std::fs::File::create(&summary)?;
    writeln!(file, "Spectral windows: {spw}")?;
    file.write_all(outcome.diagnostic.as_bytes())?;
    Ok(())
}
