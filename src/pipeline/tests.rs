// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::path::PathBuf;

use indoc::{formatdoc, indoc};
use tempfile::TempDir;

use super::*;
use crate::{
    ops::Task,
    roles::{BatchResolver, RoleError, ScriptedResolver},
    split::SplitError,
    tests::{fixture_metadata, strings, RecordingExecutor},
};

const CALIBRATION: &str = indoc! {r#"
    [calibration]
    targets = ["NGC1", "NGC2"]
    target_names = ["NGC1", "NGC2"]
    fluxcal = ["3C286", "3C286"]
    fluxmod = ["3C286_L.im", "3C286_L.im"]
    bandcal = ["3C286", "3C286"]
    phasecal = ["J1407+2827", "J1407+2827"]
    refant = "ea01"
"#};

fn write_config(flagging: &str, calibration: &str) -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("proj.toml");
    let contents = formatdoc! {r#"
        [global]
        project_name = "proj"

        [flagging]
        {flagging}

        {calibration}
    "#};
    std::fs::write(&path, contents).unwrap();
    (dir, path)
}

/// (mode, versionname) of every flag manager operation.
fn flag_versions(executor: &RecordingExecutor) -> Vec<(String, String)> {
    executor
        .of(Task::Flagmanager)
        .into_iter()
        .map(|op| {
            (
                op.get_str("mode").unwrap().to_string(),
                op.get_str("versionname").unwrap().to_string(),
            )
        })
        .collect()
}

fn position(executor: &RecordingExecutor, task: Task, mode: Option<&str>) -> Vec<usize> {
    executor
        .ops
        .iter()
        .enumerate()
        .filter(|(_, op)| op.task == task && (mode.is_none() || op.get_str("mode") == mode))
        .map(|(i, _)| i)
        .collect()
}

#[test]
fn a_full_run_goes_through_every_stage() {
    let (dir, path) = write_config("", CALIBRATION);
    let mut store = ConfigStore::read(&path).unwrap();
    let meta = fixture_metadata();
    let mut executor = RecordingExecutor::new();
    let mut resolver = BatchResolver;
    let report = Pipeline::new(&mut store, &meta, &mut executor, &mut resolver)
        .run()
        .unwrap();

    let versions = flag_versions(&executor);
    let versions: Vec<(&str, &str)> = versions
        .iter()
        .map(|(m, v)| (m.as_str(), v.as_str()))
        .collect();
    assert_eq!(
        versions,
        vec![
            ("save", "Original"),
            ("delete", "initial"),
            ("save", "initial"),
            ("delete", "rflag"),
            ("save", "rflag"),
            ("delete", "extended"),
            ("save", "extended"),
            ("delete", "final"),
            ("save", "final"),
        ]
    );

    // Calibration happens on either side of rflag.
    let rflag = position(&executor, Task::Flagdata, Some("rflag"));
    let applies = position(&executor, Task::Applycal, None);
    let bandpasses = position(&executor, Task::Bandpass, None);
    assert_eq!(rflag.len(), 1);
    assert_eq!(bandpasses.len(), 2);
    assert!(bandpasses[0] < rflag[0] && rflag[0] < bandpasses[1]);
    assert!(applies.iter().any(|&i| i < rflag[0]));
    assert!(applies.iter().any(|&i| i > rflag[0]));
    let tfcrop = position(&executor, Task::Flagdata, Some("tfcrop"));
    assert_eq!(tfcrop.len(), 1);

    assert_eq!(report.passes.len(), 2);
    assert!(report.passes.iter().all(|p| p.all_corrected()));
    assert_eq!(
        report.split.outputs,
        strings(&["NGC1.spw0+1", "NGC1.spw2", "NGC2"])
    );
    // Splitting comes last.
    let last = executor.ops.last().unwrap();
    assert_eq!(last.task, Task::Listobs);

    // Summaries of every checkpoint were written.
    for version in ["initial", "rflag", "extended", "final"] {
        assert!(dir
            .path()
            .join("summary")
            .join(format!("proj.ms.{version}flags.summary"))
            .exists());
    }

    // The split outputs were written back, and the configuration backed up.
    let reread = ConfigStore::read(&path).unwrap();
    assert_eq!(reread.config.calibration.target_names, report.split.outputs);
    assert_eq!(reread.config.calibration.mosaic, Some(false));
    assert_eq!(report.param_changes, None);
    assert_eq!(
        std::fs::read_to_string(dir.path().join("proj.toml.backup")).unwrap(),
        std::fs::read_to_string(&path).unwrap()
    );
}

#[test]
fn a_second_run_reports_configuration_changes() {
    let (_dir, path) = write_config("no_rflag = true", CALIBRATION);
    let meta = fixture_metadata();
    let mut resolver = BatchResolver;

    let mut store = ConfigStore::read(&path).unwrap();
    let mut executor = RecordingExecutor::new();
    Pipeline::new(&mut store, &meta, &mut executor, &mut resolver)
        .run()
        .unwrap();

    let contents = std::fs::read_to_string(&path)
        .unwrap()
        .replace(r#"refant = "ea01""#, r#"refant = "ea02""#);
    std::fs::write(&path, contents).unwrap();
    let mut store = ConfigStore::read(&path).unwrap();
    let mut executor = RecordingExecutor::new();
    let report = Pipeline::new(&mut store, &meta, &mut executor, &mut resolver)
        .run()
        .unwrap();

    assert_eq!(
        report.param_changes,
        Some(vec![ParamChange::Changed {
            key: "calibration.refant".to_string(),
            old: r#""ea01""#.to_string(),
            new: r#""ea02""#.to_string(),
        }])
    );
}

#[test]
fn a_dry_run_leaves_the_workspace_alone() {
    // Missing flux models are repaired, but that mustn't be written anywhere.
    let calibration = CALIBRATION.replace(r#"["3C286_L.im", "3C286_L.im"]"#, "[]");
    let (dir, path) = write_config("", &calibration);
    let old_output = dir.path().join("src").join("NGC1.split");
    std::fs::create_dir_all(&old_output).unwrap();
    let before = std::fs::read_to_string(&path).unwrap();

    let mut store = ConfigStore::read(&path).unwrap();
    let meta = fixture_metadata();
    let mut executor = RecordingExecutor::dry_run();
    let mut resolver = BatchResolver;
    let report = Pipeline::new(&mut store, &meta, &mut executor, &mut resolver)
        .run()
        .unwrap();

    assert_eq!(report.passes.len(), 2);
    assert_eq!(
        report.split.outputs,
        strings(&["NGC1.spw0+1", "NGC1.spw2", "NGC2"])
    );
    // The repairs are kept in memory only.
    assert_eq!(
        store.config.calibration.fluxmod,
        strings(&["3C286_L.im", "3C286_L.im"])
    );
    assert_eq!(std::fs::read_to_string(&path).unwrap(), before);
    assert!(old_output.is_dir());
    assert!(!dir.path().join("proj.toml.backup").exists());
    assert!(!dir.path().join("summary").exists());
    assert!(!dir.path().join("cal_tabs").exists());
}

#[test]
fn an_unsafe_source_directory_stops_a_run_before_it_starts() {
    let (dir, path) = write_config("", CALIBRATION);
    let contents = std::fs::read_to_string(&path)
        .unwrap()
        .replace(r#"project_name = "proj""#, "project_name = \"proj\"\nsrc_dir = \".\"");
    std::fs::write(&path, contents).unwrap();

    let mut store = ConfigStore::read(&path).unwrap();
    assert_eq!(store.config.global.src_dir, ".");
    let meta = fixture_metadata();
    let mut executor = RecordingExecutor::new();
    let mut resolver = BatchResolver;
    let result = Pipeline::new(&mut store, &meta, &mut executor, &mut resolver).run();

    assert!(matches!(
        result,
        Err(PipelineError::Split(SplitError::UnsafeSrcDir { .. }))
    ));
    assert!(executor.ops.is_empty());
    assert!(path.exists());
    // Only the configuration is there.
    assert_eq!(dir.path().read_dir().unwrap().count(), 1);
}

#[test]
fn refinement_can_be_skipped() {
    let (_dir, path) = write_config("no_tfcrop = true\nno_rflag = true", CALIBRATION);
    let mut store = ConfigStore::read(&path).unwrap();
    let meta = fixture_metadata();
    let mut executor = RecordingExecutor::new();
    let mut resolver = BatchResolver;
    let report = Pipeline::new(&mut store, &meta, &mut executor, &mut resolver)
        .run()
        .unwrap();

    assert_eq!(report.passes.len(), 1);
    assert!(position(&executor, Task::Flagdata, Some("tfcrop")).is_empty());
    assert!(position(&executor, Task::Flagdata, Some("rflag")).is_empty());
    assert_eq!(position(&executor, Task::Bandpass, None).len(), 1);
    let versions: Vec<String> = flag_versions(&executor)
        .into_iter()
        .filter(|(m, _)| m == "save")
        .map(|(_, v)| v)
        .collect();
    assert_eq!(versions, strings(&["Original", "initial", "final"]));
}

#[test]
fn repaired_roles_are_written_back() {
    let calibration = CALIBRATION.replace(r#"["3C286_L.im", "3C286_L.im"]"#, "[]");
    let (_dir, path) = write_config("", &calibration);
    let mut store = ConfigStore::read(&path).unwrap();
    let meta = fixture_metadata();
    let mut executor = RecordingExecutor::new();
    let mut resolver = BatchResolver;

    let report = Pipeline::new(&mut store, &meta, &mut executor, &mut resolver)
        .set_fields()
        .unwrap();
    assert!(report.changed);
    assert_eq!(report.changed_keys, vec!["fluxmod"]);
    assert!(executor.ops.is_empty());

    let contents = std::fs::read_to_string(&path).unwrap();
    assert!(contents.contains(r#"fluxmod = ["3C286_L.im", "3C286_L.im"]"#));

    // Nothing more to repair.
    let mut store = ConfigStore::read(&path).unwrap();
    let report = Pipeline::new(&mut store, &meta, &mut executor, &mut resolver)
        .set_fields()
        .unwrap();
    assert!(!report.changed);
    assert_eq!(std::fs::read_to_string(&path).unwrap(), contents);
}

#[test]
fn a_bad_reference_antenna_stops_a_batch_run() {
    let calibration = CALIBRATION.replace(r#"refant = "ea01""#, r#"refant = "ea99""#);
    let (_dir, path) = write_config("", &calibration);
    let mut store = ConfigStore::read(&path).unwrap();
    let meta = fixture_metadata();
    let mut executor = RecordingExecutor::new();
    let mut resolver = BatchResolver;
    let result = Pipeline::new(&mut store, &meta, &mut executor, &mut resolver).run();

    assert!(matches!(
        result,
        Err(PipelineError::Roles(RoleError::InvalidRefAnt { refant, .. })) if refant == "ea99"
    ));
    // Flagging happened, but nothing was solved.
    assert!(!executor.of(Task::Flagdata).is_empty());
    assert!(executor.of(Task::Gaincal).is_empty());
}

#[test]
fn a_chosen_reference_antenna_is_written_back() {
    let calibration = CALIBRATION.replace(r#"refant = "ea01""#, r#"refant = """#);
    let (_dir, path) = write_config("", &calibration);
    let mut store = ConfigStore::read(&path).unwrap();
    let meta = fixture_metadata();
    let mut executor = RecordingExecutor::new();
    let mut resolver = ScriptedResolver::new(["ea9", "ea03"]);
    Pipeline::new(&mut store, &meta, &mut executor, &mut resolver)
        .select_refant()
        .unwrap();

    assert_eq!(resolver.remaining(), 0);
    assert_eq!(store.config.calibration.refant, "ea03");
    let reread = ConfigStore::read(&path).unwrap();
    assert_eq!(reread.config.calibration.refant, "ea03");
}

#[test]
fn planning_runs_nothing() {
    let (_dir, path) = write_config("", CALIBRATION);
    let before = std::fs::read_to_string(&path).unwrap();
    let mut store = ConfigStore::read(&path).unwrap();
    let meta = fixture_metadata();
    let mut executor = RecordingExecutor::new();
    let mut resolver = BatchResolver;
    let plans = Pipeline::new(&mut store, &meta, &mut executor, &mut resolver)
        .plan()
        .unwrap();

    assert!(executor.ops.is_empty());
    assert_eq!(std::fs::read_to_string(&path).unwrap(), before);
    let fields: Vec<&str> = plans.iter().map(|p| p.field.as_str()).collect();
    // The phase calibrator is applied separately for each target's windows.
    assert_eq!(
        fields,
        vec!["3C286", "J1407+2827", "NGC1", "J1407+2827", "NGC2"]
    );
    assert_eq!(plans[3].spw.as_deref(), Some("2"));
    assert!(plans.iter().all(|p| !p.gaintable().is_empty()));
}
