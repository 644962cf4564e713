// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use indoc::indoc;
use serial_test::serial;
use tempfile::TempDir;

use super::*;
use crate::tests::strings;

const CONFIG: &str = indoc! {r#"
    # Pipeline settings.
    [global]
    project_name = "proj"
    interactive = false

    [importdata]
    jvla = true

    [flagging]
    quack_int = 10.0 # seconds

    [calibration]
    # Fields to image.
    targets = ["NGC1"]
    target_names = ["NGC1"]
    fluxcal = ["3C286"]
    fluxmod = ["3C286_L.im"]
    bandcal = ["3C286"]
    phasecal = ["J1407+2827"]
    refant = ""
"#};

fn write_config(contents: &str) -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("proj.toml");
    std::fs::write(&path, contents).unwrap();
    (dir, path)
}

#[test]
fn sections_are_read() {
    let (dir, path) = write_config(CONFIG);
    let store = ConfigStore::read(&path).unwrap();
    let config = &store.config;

    assert_eq!(config.global.project_name, "proj");
    assert_eq!(config.global.src_dir, DEFAULT_SRC_DIR);
    assert!(config.importdata.jvla);
    assert_eq!(config.flagging.quack_int, 10.0);
    assert_eq!(
        config.flagging.rthresh,
        crate::constants::DEFAULT_RFLAG_THRESHOLD
    );
    assert_eq!(config.calibration.phasecal, strings(&["J1407+2827"]));
    assert_eq!(config.calibration.mosaic, None);
    assert_eq!(config.executor.command, DEFAULT_EXECUTOR_COMMAND);

    assert_eq!(store.workspace().root(), dir.path());
    assert_eq!(store.workspace().vis(), "proj.ms");
    assert_eq!(store.metadata_file(), dir.path().join("proj.metadata.json"));
}

#[test]
fn metadata_file_can_be_given() {
    let (dir, path) = write_config(indoc! {r#"
        [global]
        project_name = "proj"
        metadata = "meta/fields.yaml"
    "#});
    let store = ConfigStore::read(path).unwrap();
    assert_eq!(
        store.metadata_file(),
        dir.path().join("meta").join("fields.yaml")
    );
    assert_eq!(store.config.calibration, FieldRoleSet::default());
}

#[test]
fn missing_global_section_is_an_error() {
    let (_dir, path) = write_config("[calibration]\ntargets = []\n");
    let result = ConfigStore::read(path);
    assert!(matches!(result, Err(ConfigError::Parse { .. })));
}

#[test]
fn missing_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let result = ConfigStore::read(dir.path().join("nope.toml"));
    assert!(matches!(result, Err(ConfigError::Read { .. })));
}

#[test]
fn persisting_only_touches_the_given_keys() {
    let (_dir, path) = write_config(CONFIG);
    let mut store = ConfigStore::read(&path).unwrap();

    let mut roles = store.config.calibration.clone();
    roles.phasecal = strings(&["J1407+2827", "3C48"]);
    roles.refant = "ea02".to_string();
    // Not persisted, so the file keeps its old value.
    roles.targets = strings(&["NGC1", "NGC2"]);
    store.persist(&roles, &["phasecal", "refant"]).unwrap();

    let contents = std::fs::read_to_string(&path).unwrap();
    assert!(contents.contains("# Pipeline settings."));
    assert!(contents.contains("# Fields to image."));
    assert!(contents.contains("quack_int = 10.0 # seconds"));
    assert!(contents.contains(r#"phasecal = ["J1407+2827", "3C48"]"#));
    assert!(contents.contains(r#"refant = "ea02""#));
    assert!(contents.contains(r#"targets = ["NGC1"]"#));

    // The in-memory copy has everything.
    assert_eq!(store.config.calibration, roles);

    let reread = ConfigStore::read(&path).unwrap();
    assert_eq!(reread.config.calibration.phasecal, roles.phasecal);
    assert_eq!(reread.config.calibration.targets, strings(&["NGC1"]));
}

#[test]
fn persisting_creates_the_calibration_table() {
    let (_dir, path) = write_config(indoc! {r#"
        [global]
        project_name = "proj"
    "#});
    let mut store = ConfigStore::read(&path).unwrap();
    let roles = FieldRoleSet {
        mosaic: Some(true),
        man_mod: true,
        ..Default::default()
    };
    store.persist(&roles, &["mosaic", "man_mod"]).unwrap();

    let reread = ConfigStore::read(&path).unwrap();
    assert_eq!(reread.config.calibration.mosaic, Some(true));
    assert!(reread.config.calibration.man_mod);
}

#[test]
fn persisting_an_unknown_key_is_an_error() {
    let (_dir, path) = write_config(CONFIG);
    let mut store = ConfigStore::read(&path).unwrap();
    let roles = store.config.calibration.clone();
    let result = store.persist(&roles, &["fluxcal", "nonsense"]);
    assert!(matches!(result, Err(ConfigError::UnknownKey(k)) if k == "nonsense"));
}

#[test]
fn calibration_must_be_a_table() {
    let (_dir, path) = write_config(indoc! {r#"
        calibration = 5

        [global]
        project_name = "proj"
    "#});
    // This file can't be read into a store, so make one by hand.
    let mut store = ConfigStore {
        path: path.clone(),
        config: PipelineConfig {
            global: GlobalSection {
                project_name: "proj".to_string(),
                interactive: false,
                src_dir: DEFAULT_SRC_DIR.to_string(),
                metadata: None,
            },
            importdata: ImportSection::default(),
            flagging: FlagParams::default(),
            calibration: FieldRoleSet::default(),
            executor: ExecutorSection::default(),
        },
    };
    let roles = FieldRoleSet::default();
    let result = store.persist(&roles, &["refant"]);
    assert!(matches!(result, Err(ConfigError::NotATable { .. })));
}

#[test]
#[serial]
fn a_bare_file_name_is_relative_to_the_working_directory() {
    let (dir, _path) = write_config(CONFIG);
    let cwd = std::env::current_dir().unwrap();
    std::env::set_current_dir(dir.path()).unwrap();
    let store = ConfigStore::read("proj.toml");
    std::env::set_current_dir(cwd).unwrap();

    let store = store.unwrap();
    assert_eq!(store.workspace().root(), Path::new("."));
    assert_eq!(store.metadata_file(), PathBuf::from("./proj.metadata.json"));
}

#[test]
fn changes_since_the_last_backup_are_found() {
    let (_dir, path) = write_config(CONFIG);
    let mut store = ConfigStore::read(&path).unwrap();
    assert_eq!(store.backup_path(), path.with_file_name("proj.toml.backup"));
    assert_eq!(store.diff_backup().unwrap(), None);

    let backup = store.backup().unwrap();
    assert_eq!(
        std::fs::read_to_string(backup).unwrap(),
        std::fs::read_to_string(&path).unwrap()
    );
    assert_eq!(store.diff_backup().unwrap(), Some(vec![]));

    let mut roles = store.config.calibration.clone();
    roles.refant = "ea02".to_string();
    roles.mosaic = Some(false);
    store.persist(&roles, &["refant", "mosaic"]).unwrap();
    let contents = std::fs::read_to_string(&path)
        .unwrap()
        .replace("quack_int = 10.0 # seconds\n", "");
    std::fs::write(&path, contents).unwrap();

    let changes = store.diff_backup().unwrap().unwrap();
    assert_eq!(
        changes,
        vec![
            ParamChange::Added {
                key: "calibration.mosaic".to_string(),
                value: "false".to_string()
            },
            ParamChange::Changed {
                key: "calibration.refant".to_string(),
                old: r#""""#.to_string(),
                new: r#""ea02""#.to_string()
            },
            ParamChange::Removed {
                key: "flagging.quack_int".to_string(),
                value: "10.0".to_string()
            },
        ]
    );
    assert_eq!(
        changes[1].to_string(),
        r#"calibration.refant changed from "" to "ea02""#
    );
}
