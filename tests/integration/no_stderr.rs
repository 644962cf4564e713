// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Tests to ensure there is no stderr output for successful commands.

use crate::{calplan, get_cmd_output, make_project, path_str, CONFIG};

#[test]
fn test_set_fields_no_stderr() {
    let (_tmp_dir, config) = make_project(CONFIG);
    let cmd = calplan()
        .args(["--non-interactive", "set-fields", &path_str(&config)])
        .ok();
    assert!(cmd.is_ok(), "set-fields failed: {}", cmd.err().unwrap());
    let (_, stderr) = get_cmd_output(cmd);
    assert!(stderr.is_empty(), "stderr wasn't empty: {stderr}");
}

#[test]
fn test_dry_run_no_stderr() {
    let (_tmp_dir, config) = make_project(CONFIG);
    let cmd = calplan()
        .args(["--no-progress-bars", "--dry-run", "run", &path_str(&config)])
        .ok();
    assert!(cmd.is_ok(), "dry run failed: {}", cmd.err().unwrap());
    let (_, stderr) = get_cmd_output(cmd);
    assert!(stderr.is_empty(), "stderr wasn't empty: {stderr}");
}
