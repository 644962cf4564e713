// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use clap::Parser;

use super::*;
use crate::{
    chain::{apply::Selector, CalTable, CalTableKind},
    roles::{Role, RoleError},
};

#[test]
fn global_args_go_anywhere() {
    let args = Calplan::try_parse_from([
        "calplan",
        "-vv",
        "run",
        "proj.toml",
        "--dry-run",
        "--non-interactive",
    ])
    .unwrap();
    assert_eq!(args.global_opts.verbosity, 2);
    assert!(args.global_opts.dry_run);
    assert!(args.global_opts.non_interactive);
    assert!(!args.global_opts.no_progress_bars);
    assert_eq!(args.command.name(), "run");
    assert_eq!(args.command.config(), &PathBuf::from("proj.toml"));
}

#[test]
fn subcommands_are_inferred() {
    let args = Calplan::try_parse_from(["calplan", "set", "proj.toml"]).unwrap();
    assert_eq!(args.command.name(), "set-fields");
    let args = Calplan::try_parse_from(["calplan", "pl", "proj.toml"]).unwrap();
    assert_eq!(args.command.name(), "plan");
}

#[test]
fn a_config_is_required() {
    assert!(Calplan::try_parse_from(["calplan", "split"]).is_err());
}

#[test]
fn plans_are_described_with_their_gain_fields() {
    let table = |kind: CalTableKind, path: &str| CalTable {
        kind,
        path: path.to_string(),
        inputs: vec![],
    };
    let plan = ApplyPlan {
        field: "NGC1".to_string(),
        tables: vec![
            (table(CalTableKind::GainCurve, "./cal_tabs/gaincurve.cal"), Selector::Blank),
            (
                table(CalTableKind::Bandpass, "./cal_tabs/bpass.cal"),
                Selector::Linked("3C286".to_string()),
            ),
        ],
        spw: Some("0,1".to_string()),
    };
    let lines: Vec<String> = describe_plan(&plan).into_iter().map(|l| l.into_owned()).collect();
    assert_eq!(
        lines,
        vec![
            "NGC1 (SPW 0,1)",
            "./cal_tabs/gaincurve.cal",
            "./cal_tabs/bpass.cal [3C286]",
        ]
    );
}

#[test]
fn role_errors_suggest_a_fix() {
    let e = CalplanError::from(RoleError::UnknownFieldName {
        role: Role::PhaseCal,
        name: "J0000".to_string(),
    });
    assert!(matches!(e, CalplanError::Roles(_)));
    let message = e.to_string();
    assert!(message.contains("'J0000' is not a field of the dataset"));
    assert!(message.contains("[calibration]"));
}
