// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Things shared by all subcommands.

mod printers;
#[cfg(test)]
mod tests;

pub(super) use printers::InfoPrinter;
pub(crate) use printers::{display_warnings, Warn};
