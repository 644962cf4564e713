// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

/// Pretty printers for reporting information.
use std::{borrow::Cow, sync::Mutex};

const VERTICAL: char = '│';
const UP_AND_RIGHT: char = '└';
const VERTICAL_AND_RIGHT: char = '├';

lazy_static::lazy_static! {
    static ref WARNING_PRINTER: Mutex<Vec<Block>> = Mutex::new(vec![]);
}

type Block = Vec<Cow<'static, str>>;

/// Draw blocks of lines as a tree. The first line of each block gets a
/// branch; continuation lines hang off a vertical bar.
pub(super) fn draw_blocks(blocks: &[Block]) -> Vec<String> {
    let num_blocks = blocks.len();
    let mut lines = vec![];
    for (i_block, block) in blocks.iter().enumerate() {
        let num_lines = block.len();
        let last_block = i_block + 1 == num_blocks;
        for (i_line, line) in block.iter().enumerate() {
            let symbol = match (i_line, num_lines, last_block) {
                (0, 1, true) => UP_AND_RIGHT,
                (0, _, _) => VERTICAL_AND_RIGHT,
                _ => VERTICAL,
            };
            lines.push(format!("{symbol} {line}"));
        }
    }
    lines
}

pub(crate) struct InfoPrinter {
    title: Cow<'static, str>,
    blocks: Vec<Block>,
}

impl InfoPrinter {
    pub(crate) fn new(title: Cow<'static, str>) -> Self {
        Self {
            title,
            blocks: vec![],
        }
    }

    pub(crate) fn push_line(&mut self, line: Cow<'static, str>) {
        self.blocks.push(vec![line]);
    }

    pub(crate) fn push_block(&mut self, block: Block) {
        if !block.is_empty() {
            self.blocks.push(block);
        }
    }

    pub(super) fn lines(&self) -> Vec<String> {
        draw_blocks(&self.blocks)
    }

    pub(crate) fn display(self) {
        log::info!("{}", console::style(&self.title).bold());
        for line in self.lines() {
            log::info!("{line}");
        }
        log::info!("");
    }
}

pub(crate) trait Warn {
    fn warn(self);
}

impl Warn for &'static str {
    fn warn(self) {
        Cow::from(self).warn();
    }
}

impl Warn for String {
    fn warn(self) {
        Cow::from(self).warn();
    }
}

impl Warn for Cow<'static, str> {
    fn warn(self) {
        vec![self].warn();
    }
}

impl Warn for Vec<Cow<'static, str>> {
    fn warn(self) {
        if let Ok(mut blocks) = WARNING_PRINTER.lock() {
            blocks.push(self);
        }
    }
}

/// Print out any warnings that have been collected during a run, then forget
/// them.
pub(crate) fn display_warnings() {
    log::debug!("Displaying warnings");
    let Ok(mut blocks) = WARNING_PRINTER.lock() else {
        return;
    };
    if blocks.is_empty() {
        return;
    }

    log::warn!("{}", console::style("Warnings").bold());
    for line in draw_blocks(&blocks) {
        log::warn!("{line}");
    }
    log::warn!("");
    blocks.clear();
}
