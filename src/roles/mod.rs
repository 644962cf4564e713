// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The roles played by the fields of a dataset (science targets, flux,
//! bandpass and phase calibrators), and validating and repairing them.

mod error;
mod resolver;
mod validate;

pub use error::RoleError;
pub use resolver::{
    parse_yes_no, BatchResolver, InputKind, NeedsInput, ResolveError, Resolver, ScriptedResolver,
    TerminalResolver,
};
pub use validate::{ValidationReport, Validator};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};

/// A list of field roles, named as they are in the configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumIter, EnumString)]
pub enum Role {
    #[strum(serialize = "targets")]
    Target,
    #[strum(serialize = "target_names")]
    TargetName,
    #[strum(serialize = "fluxcal")]
    FluxCal,
    #[strum(serialize = "fluxmod")]
    FluxModel,
    #[strum(serialize = "bandcal")]
    BandCal,
    #[strum(serialize = "phasecal")]
    PhaseCal,
}

impl Role {
    /// A human-readable description.
    pub fn description(self) -> &'static str {
        match self {
            Role::Target => "target",
            Role::TargetName => "target name",
            Role::FluxCal => "flux calibrator",
            Role::FluxModel => "flux model",
            Role::BandCal => "bandpass calibrator",
            Role::PhaseCal => "phase calibrator",
        }
    }
}

/// Which fields play which roles. This is the `[calibration]` section of the
/// configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldRoleSet {
    #[serde(default)]
    pub targets: Vec<String>,

    /// A simple name for each target (no spaces); used to name outputs.
    #[serde(default)]
    pub target_names: Vec<String>,

    /// One flux calibrator per band.
    #[serde(default)]
    pub fluxcal: Vec<String>,

    /// One flux model per flux calibrator.
    #[serde(default)]
    pub fluxmod: Vec<String>,

    /// One bandpass calibrator per band.
    #[serde(default)]
    pub bandcal: Vec<String>,

    /// One phase calibrator per target.
    #[serde(default)]
    pub phasecal: Vec<String>,

    /// The reference antenna.
    #[serde(default)]
    pub refant: String,

    /// Are the targets a mosaic? `None` if the configuration doesn't say.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mosaic: Option<bool>,

    /// Are the non-standard flux models manual flux densities?
    #[serde(default)]
    pub man_mod: bool,

    /// Manual spectral window combinations, per field.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub man_comb_spws: Option<IndexMap<String, Vec<Vec<u32>>>>,
}

/// A value held under a key of [`FieldRoleSet`] that gets written back to the
/// configuration.
#[derive(Debug, Clone, PartialEq)]
pub enum RoleValue<'a> {
    List(&'a [String]),
    Bool(bool),
    Str(&'a str),
}

impl FieldRoleSet {
    /// The keys that the role validator may change, in the order they're
    /// persisted.
    pub const PERSISTED_KEYS: [&'static str; 7] = [
        "targets",
        "target_names",
        "fluxcal",
        "fluxmod",
        "bandcal",
        "phasecal",
        "man_mod",
    ];

    pub fn list(&self, role: Role) -> &[String] {
        match role {
            Role::Target => &self.targets,
            Role::TargetName => &self.target_names,
            Role::FluxCal => &self.fluxcal,
            Role::FluxModel => &self.fluxmod,
            Role::BandCal => &self.bandcal,
            Role::PhaseCal => &self.phasecal,
        }
    }

    pub fn list_mut(&mut self, role: Role) -> &mut Vec<String> {
        match role {
            Role::Target => &mut self.targets,
            Role::TargetName => &mut self.target_names,
            Role::FluxCal => &mut self.fluxcal,
            Role::FluxModel => &mut self.fluxmod,
            Role::BandCal => &mut self.bandcal,
            Role::PhaseCal => &mut self.phasecal,
        }
    }

    /// Get the value of a key by its configuration name.
    pub fn value(&self, key: &str) -> Option<RoleValue> {
        let v = match key {
            "targets" => RoleValue::List(&self.targets),
            "target_names" => RoleValue::List(&self.target_names),
            "fluxcal" => RoleValue::List(&self.fluxcal),
            "fluxmod" => RoleValue::List(&self.fluxmod),
            "bandcal" => RoleValue::List(&self.bandcal),
            "phasecal" => RoleValue::List(&self.phasecal),
            "man_mod" => RoleValue::Bool(self.man_mod),
            "refant" => RoleValue::Str(&self.refant),
            "mosaic" => RoleValue::Bool(self.mosaic.unwrap_or(false)),
            _ => return None,
        };
        Some(v)
    }

    /// Which persisted keys differ between `self` and `other`?
    pub fn changed_keys(&self, other: &FieldRoleSet) -> Vec<&'static str> {
        Self::PERSISTED_KEYS
            .into_iter()
            .filter(|k| self.value(k) != other.value(k))
            .collect()
    }

    /// All calibrator fields (flux, bandpass, then phase), without
    /// duplicates.
    pub fn calibrators(&self) -> Vec<String> {
        let mut cals: Vec<String> = vec![];
        for cal in self
            .fluxcal
            .iter()
            .chain(self.bandcal.iter())
            .chain(self.phasecal.iter())
        {
            if !cals.contains(cal) {
                cals.push(cal.clone());
            }
        }
        cals
    }

    /// The manual window combination for a field, if one is set.
    pub fn manual_combination(&self, field: &str) -> Option<&[Vec<u32>]> {
        self.man_comb_spws
            .as_ref()
            .and_then(|m| m.get(field))
            .map(|v| v.as_slice())
    }
}
