// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use super::{printers::draw_blocks, InfoPrinter};

#[test]
fn single_lines_branch_until_the_last() {
    let mut printer = InfoPrinter::new("title".into());
    printer.push_line("one".into());
    printer.push_line("two".into());
    assert_eq!(printer.lines(), vec!["├ one", "└ two"]);
}

#[test]
fn blocks_continue_with_a_bar() {
    let mut printer = InfoPrinter::new("title".into());
    printer.push_block(vec!["field".into(), "table 1".into(), "table 2".into()]);
    printer.push_block(vec![]);
    printer.push_block(vec!["other".into(), "table".into()]);
    assert_eq!(
        printer.lines(),
        vec!["├ field", "│ table 1", "│ table 2", "├ other", "│ table"]
    );
}

#[test]
fn nothing_to_draw() {
    assert!(draw_blocks(&[]).is_empty());
}
