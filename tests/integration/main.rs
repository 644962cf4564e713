// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Integration tests.
//!
//! Some help for laying out these tests was taken from:
//! https://matklad.github.io/2021/02/27/delete-cargo-integration-tests.html

mod no_stderr;
mod subcommands;

use std::{
    path::{Path, PathBuf},
    process::Output,
    str::from_utf8,
};

use assert_cmd::{output::OutputError, Command};
use indoc::indoc;
use tempfile::TempDir;

fn calplan() -> Command {
    Command::cargo_bin("calplan").unwrap()
}

fn get_cmd_output(result: Result<Output, OutputError>) -> (String, String) {
    let output = match result {
        Ok(o) => o,
        Err(o) => o.as_output().unwrap().clone(),
    };
    (
        from_utf8(&output.stdout).unwrap().to_string(),
        from_utf8(&output.stderr).unwrap().to_string(),
    )
}

/// Three windows; 0 and 1 overlap with matching channels, 2 is on its own.
/// NGC2 was only observed in window 2.
const METADATA: &str = r#"{
    "antennas": ["ea01", "ea02", "ea03"],
    "fields": [
        {"name": "3C286", "spws": [0, 1, 2]},
        {"name": "J1407+2827", "spws": [0, 1, 2]},
        {"name": "NGC1", "spws": [0, 1, 2]},
        {"name": "NGC2", "spws": [2]}
    ],
    "spectral_windows": [
        {"id": 0, "nchan": 1000, "min_freq_hz": 1.40e9, "max_freq_hz": 1.42e9, "chan_width_hz": 2e4},
        {"id": 1, "nchan": 1000, "min_freq_hz": 1.415e9, "max_freq_hz": 1.435e9, "chan_width_hz": 2e4},
        {"id": 2, "nchan": 512, "min_freq_hz": 1.60e9, "max_freq_hz": 1.62e9, "chan_width_hz": 2e4}
    ]
}"#;

const CONFIG: &str = indoc! {r#"
    [global]
    project_name = "proj"

    [flagging]
    no_tfcrop = true

    # Roles of the fields.
    [calibration]
    targets = ["NGC1", "NGC2"]
    target_names = ["NGC1", "NGC2"]
    fluxcal = ["3C286", "3C286"]
    fluxmod = []
    bandcal = ["3C286", "3C286"]
    phasecal = ["J1407+2827", "J1407+2827"]
    refant = "ea01"
"#};

/// A directory with a configuration and metadata file. Returns the path to the
/// configuration.
fn make_project(config: &str) -> (TempDir, PathBuf) {
    let tmp_dir = TempDir::new().expect("couldn't make tmp dir");
    let config_file = tmp_dir.path().join("proj.toml");
    std::fs::write(&config_file, config).unwrap();
    std::fs::write(tmp_dir.path().join("proj.metadata.json"), METADATA).unwrap();
    (tmp_dir, config_file)
}

fn path_str(p: &Path) -> String {
    p.display().to_string()
}
