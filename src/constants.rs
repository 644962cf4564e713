// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Useful constants.

/// Directory for summaries (flag summaries, listings, flux summaries).
pub const SUMMARY_DIR: &str = "summary";

/// Directory for calibration tables.
pub const CAL_TABS_DIR: &str = "cal_tabs";

/// File holding manual flag commands, one per line.
pub const MANUAL_FLAGS_FILE: &str = "manual_flags.list";

/// The standard flux-density models that can be loaded by name.
pub const STD_FLUX_MODELS: [&str; 4] = ["3C48_L.im", "3C138_L.im", "3C286_L.im", "3C147_L.im"];

/// Known aliases of the standard flux calibrators and the model each one uses.
pub const STD_FLUX_NAMES: [(&str, &str); 16] = [
    ("0134+329", "3C48_L.im"),
    ("0137+331", "3C48_L.im"),
    ("3C48", "3C48_L.im"),
    ("J0137+3309", "3C48_L.im"),
    ("0518+165", "3C138_L.im"),
    ("0521+166", "3C138_L.im"),
    ("3C138", "3C138_L.im"),
    ("J0521+1638", "3C138_L.im"),
    ("1328+307", "3C286_L.im"),
    ("1331+305", "3C286_L.im"),
    ("3C286", "3C286_L.im"),
    ("J1331+3030", "3C286_L.im"),
    ("0538+498", "3C147_L.im"),
    ("0542+498", "3C147_L.im"),
    ("3C147", "3C147_L.im"),
    ("J0542+4951", "3C147_L.im"),
];

/// Diagnostic text emitted when there are no antenna position corrections
/// to be made.
pub const NO_ANTPOS_OFFSETS: &str = "No offsets found";

/// Minimum SNR used for all gain solutions.
pub const GAINCAL_MIN_SNR: f64 = 2.0;

/// Flags are grown in time by this percentage when extending flags.
pub const EXTEND_GROW_TIME: f64 = 75.0;

/// Flags are grown in frequency by this percentage when extending flags.
pub const EXTEND_GROW_FREQ: f64 = 90.0;

/// Default shadowing tolerance \[metres\].
pub const DEFAULT_SHADOW_TOL: f64 = 0.0;

/// Default length of data flagged at the start of each scan \[seconds\].
pub const DEFAULT_QUACK_INT: f64 = 5.0;

/// Default TFCrop time cutoff.
pub const DEFAULT_TIME_CUTOFF: f64 = 4.0;

/// Default TFCrop frequency cutoff.
pub const DEFAULT_FREQ_CUTOFF: f64 = 3.0;

/// Default rflag deviation threshold.
pub const DEFAULT_RFLAG_THRESHOLD: f64 = 5.0;

/// Default directory where split targets are written.
pub const DEFAULT_SRC_DIR: &str = "src";

/// Default command used to run processing operations.
pub const DEFAULT_EXECUTOR_COMMAND: &str = "casa --nologger --nogui --log2term -c";

/// Look up the standard flux model for a calibrator name.
pub fn std_flux_model(calibrator: &str) -> Option<&'static str> {
    STD_FLUX_NAMES
        .iter()
        .find(|(name, _)| *name == calibrator)
        .map(|(_, model)| *model)
}

/// Is this one of the standard flux models?
pub fn is_std_flux_model(model: &str) -> bool {
    STD_FLUX_MODELS.contains(&model)
}
