// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Validating, and if necessary repairing, field roles.

use itertools::Itertools;
use log::{info, warn};

use super::{
    parse_yes_no, FieldRoleSet, InputKind, NeedsInput, Resolver, Role, RoleError,
};
use crate::{
    constants::{is_std_flux_model, std_flux_model, STD_FLUX_MODELS},
    metadata::DatasetMetadata,
    spw::{bands_for_fields, Grouping},
};

/// The result of validating a [`FieldRoleSet`].
#[derive(Debug, Clone)]
pub struct ValidationReport {
    /// Was anything changed?
    pub changed: bool,

    /// The persisted keys that were changed.
    pub changed_keys: Vec<&'static str>,

    /// The bands of the targets' windows.
    pub bands: Grouping,
}

/// Checks field roles against a dataset. When something is wrong and the
/// resolver is interactive, the problem is repaired by asking questions.
/// Otherwise, the problem is an error.
pub struct Validator<'a, M: ?Sized, R: ?Sized> {
    meta: &'a M,
    resolver: &'a mut R,
}

impl<'a, M, R> Validator<'a, M, R>
where
    M: DatasetMetadata + ?Sized,
    R: Resolver + ?Sized,
{
    pub fn new(meta: &'a M, resolver: &'a mut R) -> Validator<'a, M, R> {
        Validator { meta, resolver }
    }

    fn interactive(&self) -> bool {
        self.resolver.is_interactive()
    }

    /// Ask a question. A blank answer gives the default, if there is one.
    fn ask(&mut self, request: &NeedsInput) -> Result<String, RoleError> {
        let answer = self.resolver.resolve(request)?;
        let answer = answer.trim();
        match &request.default {
            Some(default) if answer.is_empty() => Ok(default.clone()),
            _ => Ok(answer.to_string()),
        }
    }

    fn ask_yes_no(&mut self, question: &str) -> Result<bool, RoleError> {
        let request = NeedsInput::yes_no(question).choices(["y", "n"]);
        loop {
            if let Some(answer) = parse_yes_no(&self.ask(&request)?) {
                return Ok(answer);
            }
        }
    }

    fn ask_field(&mut self, question: String) -> Result<String, RoleError> {
        let meta = self.meta;
        let request =
            NeedsInput::new(InputKind::FieldName, question).choices(meta.fields().iter().cloned());
        loop {
            let answer = self.ask(&request)?;
            if meta.has_field(&answer) {
                return Ok(answer);
            }
            warn!("'{answer}' is not a valid field name.");
        }
    }

    /// Make sure the reference antenna is an antenna of the dataset. Returns
    /// whether it was changed.
    pub fn select_refant(&mut self, roles: &mut FieldRoleSet) -> Result<bool, RoleError> {
        info!("Starting reference antenna selection.");
        let meta = self.meta;
        let antennas = meta.antennas();
        if antennas.contains(&roles.refant) {
            info!("Reference antenna already set as: {}.", roles.refant);
            return Ok(false);
        }
        if !self.interactive() {
            return Err(RoleError::InvalidRefAnt {
                refant: roles.refant.clone(),
                antennas: antennas.join(", "),
            });
        }

        warn!("No valid reference antenna set. Requesting user input.");
        let request = NeedsInput::new(
            InputKind::AntennaName,
            "Please select a reference antenna by name",
        )
        .choices(antennas.iter().cloned());
        loop {
            let answer = self.ask(&request)?;
            if antennas.contains(&answer) {
                roles.refant = answer;
                break;
            }
            warn!("'{answer}' is not a valid antenna name.");
        }
        info!("Reference antenna set as: {}.", roles.refant);
        Ok(true)
    }

    /// Validate all field roles, in order: targets, target names, flux and
    /// bandpass calibrators, flux models, and phase calibrators.
    pub fn validate(&mut self, roles: &mut FieldRoleSet) -> Result<ValidationReport, RoleError> {
        info!("Starting set field purposes.");
        let before = roles.clone();

        self.targets(roles)?;
        self.target_names(roles)?;

        let bands = bands_for_fields(self.meta, &roles.targets)?;
        info!(
            "The targets were observed in {} band(s): {}",
            bands.num_bands(),
            bands.groups.iter().map(|g| g.selection()).join("; ")
        );
        self.calibrators(roles, Role::FluxCal, &bands)?;
        self.calibrators(roles, Role::BandCal, &bands)?;
        self.flux_models(roles)?;
        self.phase_calibrators(roles)?;

        let changed_keys = roles.changed_keys(&before);
        if changed_keys.is_empty() {
            info!("No changes made to preset target and calibrator fields.");
        } else {
            info!("Field roles changed: {}", changed_keys.join(", "));
        }
        info!("Completed setting field purposes.");
        Ok(ValidationReport {
            changed: !changed_keys.is_empty(),
            changed_keys,
            bands,
        })
    }

    fn targets(&mut self, roles: &mut FieldRoleSet) -> Result<(), RoleError> {
        for i in 0..roles.targets.len() {
            if !self.meta.has_field(&roles.targets[i]) {
                if !self.interactive() {
                    return Err(RoleError::UnknownFieldName {
                        role: Role::Target,
                        name: roles.targets[i].clone(),
                    });
                }
                warn!("'{}' is not a valid target field.", roles.targets[i]);
                roles.targets[i] = self.ask_field(format!(
                    "Please select a replacement for target field '{}' by name",
                    roles.targets[i]
                ))?;
            }
        }

        if roles.targets.is_empty() {
            if !self.interactive() {
                return Err(RoleError::NoTargets);
            }
            warn!("No target field(s) set. Requesting user input.");
            self.add_targets(roles)?;
        } else {
            info!("Target field(s) already set as: {:?}.", roles.targets);
            if self.interactive() && self.ask_yes_no("Do you want to add another target (y/n)")? {
                self.add_targets(roles)?;
            }
        }
        Ok(())
    }

    fn add_targets(&mut self, roles: &mut FieldRoleSet) -> Result<(), RoleError> {
        loop {
            let target = self.ask_field("Please select a target field by name".to_string())?;
            info!("{target} set as a target field.");
            roles.targets.push(target);
            if !self.ask_yes_no("Do you want to add another target (y/n)")? {
                return Ok(());
            }
        }
    }

    fn target_names(&mut self, roles: &mut FieldRoleSet) -> Result<(), RoleError> {
        let n = roles.targets.len();
        let names = &mut roles.target_names;
        if names.len() < n {
            warn!("There are more target fields than target names. Appending blanks.");
            names.resize(n, String::new());
        } else if names.len() > n {
            warn!("There are more target names than target fields.");
            info!("Current target names: {names:?}");
            // Names may carry window suffixes from a previous split.
            let stripped = names
                .iter()
                .map(|name| match name.find(".spw") {
                    Some(i) => name[..i].to_string(),
                    None => name.clone(),
                })
                .collect::<Vec<_>>();
            let unique = stripped.into_iter().unique().collect::<Vec<_>>();
            if unique.len() < names.len() {
                warn!("The target names will now be set to: {unique:?}");
                *names = unique;
            }
            if names.len() > n {
                warn!("The target name list will now be truncated to match the number of targets.");
                names.truncate(n);
            }
        }

        if self.interactive() {
            info!(
                "Current target names set as {:?} for the targets {:?}",
                roles.target_names, roles.targets
            );
            if self.ask_yes_no("Do you want to revise these names (y/n)")? {
                info!("Note: Target names should NOT include spaces.");
                for i in 0..roles.target_names.len() {
                    let request = NeedsInput::new(
                        InputKind::TargetName,
                        format!("Enter simple name for target {}", roles.targets[i]),
                    )
                    .default_answer(roles.target_names[i].clone());
                    roles.target_names[i] = self.ask(&request)?;
                }
            }
        }

        if roles.target_names.len() != n {
            warn!(
                "The number of targets ({n}) and simple names ({}) do not match.",
                roles.target_names.len()
            );
            info!("The original field names will be used.");
            info!("Replacing simple names: {:?}", roles.target_names);
            info!("With original field names: {:?}", roles.targets);
            roles.target_names = roles.targets.clone();
        } else if roles.target_names.iter().any(|n| n.trim().is_empty()) {
            let unnamed = roles
                .targets
                .iter()
                .zip(roles.target_names.iter())
                .filter(|(_, name)| name.trim().is_empty())
                .map(|(t, _)| t.as_str())
                .collect::<Vec<_>>();
            warn!("The following targets have no simple names set: {unnamed:?}");
            info!("The original field names will be used.");
            for (name, target) in roles.target_names.iter_mut().zip(roles.targets.iter()) {
                if name.trim().is_empty() {
                    *name = target.clone();
                }
            }
        }
        info!("Target names set as: {:?}.", roles.target_names);
        Ok(())
    }

    fn calibrators(
        &mut self,
        roles: &mut FieldRoleSet,
        role: Role,
        bands: &Grouping,
    ) -> Result<(), RoleError> {
        let slot = |i: usize| format!("SPW {}", bands.groups[i].selection());
        self.repair_list(roles.list_mut(role), role, bands.num_bands(), slot)
    }

    fn phase_calibrators(&mut self, roles: &mut FieldRoleSet) -> Result<(), RoleError> {
        let targets = roles.targets.clone();
        self.repair_list(&mut roles.phasecal, Role::PhaseCal, targets.len(), |i| {
            targets[i].clone()
        })
    }

    /// Make `list` have `expected` entries, each of which is a field of the
    /// dataset.
    fn repair_list<F>(
        &mut self,
        list: &mut Vec<String>,
        role: Role,
        expected: usize,
        slot: F,
    ) -> Result<(), RoleError>
    where
        F: Fn(usize) -> String,
    {
        let meta = self.meta;
        let desc = role.description();
        let unknown = list.iter().find(|c| !meta.has_field(c)).cloned();
        if unknown.is_none() && list.len() == expected {
            info!("{desc}s already set as: {list:?}.");
            return Ok(());
        }

        if !self.interactive() {
            if let Some(name) = unknown {
                return Err(RoleError::UnknownFieldName { role, name });
            }
            return Err(RoleError::ConfigInconsistency {
                role,
                expected,
                found: list.len(),
                list: list.clone(),
            });
        }

        if list.len() != expected {
            warn!("Incorrect number of {desc}s set. Requesting user input.");
        } else {
            warn!("At least one {desc} is incorrect. Please revise the list.");
        }
        info!("Current {desc}s: {list:?}");
        if list.len() > expected {
            warn!(
                "Too many {desc}s set. The following will be truncated: {:?}",
                &list[expected..]
            );
            list.truncate(expected);
        }
        if list.len() < expected {
            warn!("Too few {desc}s set.");
            list.resize(expected, String::new());
        }
        for i in 0..expected {
            if !meta.has_field(&list[i]) {
                list[i] = self.ask_field(format!("Enter {desc} for {}", slot(i)))?;
            }
        }
        info!("{desc}s set as: {list:?}.");
        Ok(())
    }

    fn flux_models(&mut self, roles: &mut FieldRoleSet) -> Result<(), RoleError> {
        let n = roles.fluxcal.len();
        let interactive = self.interactive();

        if roles.fluxmod.is_empty() {
            if !interactive {
                warn!("There is no flux calibrator model listed in the configuration.");
            }
            let mut models = Vec::with_capacity(n);
            for cal in &roles.fluxcal {
                match std_flux_model(cal) {
                    Some(model) => models.push(model.to_string()),
                    None if !interactive => {
                        return Err(RoleError::MissingFluxModel {
                            calibrator: cal.clone(),
                        })
                    }
                    None => {
                        warn!("A flux model cannot be automatically assigned to {cal}.");
                        models.push(String::new());
                    }
                }
            }
            roles.fluxmod = models;
            info!("Flux models automatically set as: {:?}.", roles.fluxmod);
        }

        if roles.fluxmod.len() != n {
            if !interactive {
                return Err(RoleError::ConfigInconsistency {
                    role: Role::FluxModel,
                    expected: n,
                    found: roles.fluxmod.len(),
                    list: roles.fluxmod.clone(),
                });
            }
            warn!("Incorrect number of flux models set. Requesting user input.");
            if roles.fluxmod.len() > n {
                warn!(
                    "Too many flux models set. The following will be truncated: {:?}",
                    &roles.fluxmod[n..]
                );
                roles.fluxmod.truncate(n);
            } else {
                roles.fluxmod.resize(n, String::new());
            }
        }

        let non_standard = (0..n)
            .filter(|&i| !is_std_flux_model(&roles.fluxmod[i]))
            .collect::<Vec<_>>();
        if non_standard.is_empty() {
            info!("Flux models set as: {:?}.", roles.fluxmod);
            return Ok(());
        }

        if !interactive {
            if roles.man_mod {
                warn!("Proceeding with non-standard flux model(s) assumed to be a manual flux scale.");
                return Ok(());
            }
            let i = non_standard[0];
            return Err(RoleError::NonStandardFluxModel {
                calibrator: roles.fluxcal[i].clone(),
                model: roles.fluxmod[i].clone(),
            });
        }

        for i in non_standard {
            let calibrator = roles.fluxcal[i].clone();
            let current = roles.fluxmod[i].clone();
            if roles.man_mod && !current.trim().is_empty() {
                warn!("Using '{current}' as a manual flux scale for {calibrator}.");
                continue;
            }
            let (model, manual) = self.ask_flux_model(&calibrator, &current)?;
            roles.fluxmod[i] = model;
            if manual {
                roles.man_mod = true;
            }
        }
        info!("Flux models set as: {:?}.", roles.fluxmod);
        Ok(())
    }

    /// Returns the model, and whether it's a manual flux density.
    fn ask_flux_model(
        &mut self,
        calibrator: &str,
        current: &str,
    ) -> Result<(String, bool), RoleError> {
        let request = NeedsInput::new(
            InputKind::FluxModel,
            format!("Enter flux model for calibrator {calibrator}"),
        )
        .default_answer(current)
        .choices(STD_FLUX_MODELS);
        loop {
            let model = self.ask(&request)?;
            if is_std_flux_model(&model) {
                return Ok((model, false));
            }
            if model.is_empty() {
                continue;
            }
            let question = format!(
                "'{model}' is not one of the standard models ({}). Is this a manually defined flux model (y/n)",
                STD_FLUX_MODELS.join(", ")
            );
            if self.ask_yes_no(&question)? {
                return Ok((model, true));
            }
        }
    }
}
