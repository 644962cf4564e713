// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use crate::{calplan, get_cmd_output, make_project, path_str, CONFIG};

#[test]
fn test_dry_run() {
    let (tmp_dir, config) = make_project(CONFIG);
    let old_output = tmp_dir.path().join("src").join("NGC1.split");
    std::fs::create_dir_all(&old_output).unwrap();
    let before = std::fs::read_to_string(&config).unwrap();
    let cmd = calplan()
        .args(["--no-progress-bars", "--dry-run", "run", &path_str(&config)])
        .ok();
    assert!(cmd.is_ok(), "dry run failed: {}", cmd.err().unwrap());
    let (stdout, _) = get_cmd_output(cmd);

    assert!(stdout.contains("calplan run complete."));
    assert!(stdout.contains("Executing command: applycal("));
    assert!(stdout.contains("Executing command: flagdata(vis='proj.ms', mode='rflag'"));
    assert!(!stdout.contains("mode='tfcrop'"));
    assert!(stdout.contains("Dry run; not writing [calibration] fluxmod"));
    assert!(stdout.contains("Dry run; not removing old split outputs"));

    // Nothing on disk was touched.
    assert_eq!(std::fs::read_to_string(&config).unwrap(), before);
    assert!(old_output.is_dir());
    assert!(!tmp_dir.path().join("summary").exists());
    assert!(!tmp_dir.path().join("proj.toml.backup").exists());
}

#[test]
fn test_unsafe_src_dir_fails() {
    let (tmp_dir, config) = make_project(&CONFIG.replace(
        r#"project_name = "proj""#,
        "project_name = \"proj\"\nsrc_dir = \".\"",
    ));
    let cmd = calplan()
        .args(["--no-progress-bars", "run", &path_str(&config)])
        .ok();
    assert!(cmd.is_err());
    let (_, stderr) = get_cmd_output(cmd);
    assert!(stderr.contains("[global] src_dir"));
    assert!(config.exists());
    assert!(tmp_dir.path().join("proj.metadata.json").exists());
}

#[test]
fn test_plan_runs_nothing() {
    let (_tmp_dir, config) = make_project(CONFIG);
    let before = std::fs::read_to_string(&config).unwrap();
    let cmd = calplan().args(["plan", &path_str(&config)]).ok();
    assert!(cmd.is_ok(), "plan failed: {}", cmd.err().unwrap());
    let (stdout, _) = get_cmd_output(cmd);

    assert!(stdout.contains("Calibration apply plans"));
    assert!(stdout.contains("NGC2 (SPW 2)"));
    assert!(stdout.contains("./cal_tabs/"));
    assert!(!stdout.contains("Executing command"));
    assert_eq!(std::fs::read_to_string(&config).unwrap(), before);
}

#[test]
fn test_bad_refant_fails() {
    let (_tmp_dir, config) = make_project(&CONFIG.replace("ea01", "ea99"));
    let cmd = calplan()
        .args(["--dry-run", "--non-interactive", "run", &path_str(&config)])
        .ok();
    assert!(cmd.is_err());
    let (_, stderr) = get_cmd_output(cmd);
    assert!(stderr.contains("'ea99' is not a valid reference antenna"));
    assert!(stderr.contains("[calibration]"));
}

#[test]
fn test_unknown_field_fails() {
    let (_tmp_dir, config) = make_project(&CONFIG.replace(r#"["NGC1", "NGC2"]"#, r#"["NGC1", "NGC3"]"#));
    let cmd = calplan()
        .args(["--non-interactive", "set-fields", &path_str(&config)])
        .ok();
    assert!(cmd.is_err());
    let (_, stderr) = get_cmd_output(cmd);
    assert!(stderr.contains("'NGC3' is not a field of the dataset"));
}

#[test]
fn test_missing_config_fails() {
    let tmp_dir = tempfile::TempDir::new().unwrap();
    let cmd = calplan()
        .args(["plan", &path_str(&tmp_dir.path().join("nope.toml"))])
        .ok();
    assert!(cmd.is_err());
    let (_, stderr) = get_cmd_output(cmd);
    assert!(stderr.contains("Couldn't read the configuration file"));
}
