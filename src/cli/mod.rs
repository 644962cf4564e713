// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Command-line interface code.
//!
//! Only 3 things should be public in this module: `Calplan`, `Calplan::run`,
//! and `CalplanError`.

mod common;
mod error;
#[cfg(test)]
mod tests;

pub(crate) use common::{display_warnings, Warn};
pub use error::CalplanError;

use std::{borrow::Cow, path::PathBuf};

use clap::{AppSettings, Args, Parser, Subcommand};
use itertools::Itertools;
use log::info;

use self::common::InfoPrinter;
use crate::{
    chain::apply::ApplyPlan,
    config::ConfigStore,
    metadata::StaticMetadata,
    ops::{DryRunExecutor, Executor, ScriptExecutor},
    pipeline::Pipeline,
    roles::{BatchResolver, FieldRoleSet, Resolver, TerminalResolver},
    PROGRESS_BARS,
};

// Add build-time information from the "built" crate.
include!(concat!(env!("OUT_DIR"), "/built.rs"));

#[derive(Debug, Parser)]
#[clap(
    version,
    author,
    about = r#"Plans and drives the calibration of interferometric radio-astronomy datasets.
Everything about a dataset is controlled by its TOML configuration file."#
)]
#[clap(global_setting(AppSettings::DeriveDisplayOrder))]
#[clap(disable_help_subcommand = true)]
#[clap(infer_subcommands = true)]
#[clap(propagate_version = true)]
#[clap(infer_long_args = true)]
pub struct Calplan {
    #[clap(flatten)]
    global_opts: GlobalArgs,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Debug, Args)]
struct GlobalArgs {
    /// Don't draw progress bars.
    #[clap(long)]
    #[clap(global = true)]
    no_progress_bars: bool,

    /// The verbosity of the program. Increase by specifying multiple times
    /// (e.g. -vv). The default is to print only high-level information.
    #[clap(short, long, parse(from_occurrences))]
    #[clap(global = true)]
    verbosity: u8,

    /// Don't run any processing operations; only log what would be run.
    #[clap(long)]
    #[clap(global = true)]
    dry_run: bool,

    /// Never ask for input, even if the configuration says to. Anything that
    /// needs repairing is an error.
    #[clap(long)]
    #[clap(global = true)]
    non_interactive: bool,
}

#[derive(Debug, Subcommand)]
#[clap(arg_required_else_help = true)]
enum Command {
    #[clap(about = "Run the whole pipeline: flagging, calibration, flagging refinement, recalibration and splitting.")]
    Run(ConfigArgs),

    #[clap(about = "Check the field roles in the configuration against the dataset, repairing them if necessary.")]
    SetFields(ConfigArgs),

    #[clap(about = "Print how calibration would be applied to each field, without running anything.")]
    Plan(ConfigArgs),

    #[clap(about = "Split the targets into their own datasets.")]
    Split(ConfigArgs),
}

#[derive(Debug, Args)]
struct ConfigArgs {
    /// Path to the pipeline configuration file.
    #[clap(name = "CONFIG", parse(from_os_str))]
    config: PathBuf,
}

impl Command {
    fn name(&self) -> &'static str {
        match self {
            Command::Run(_) => "run",
            Command::SetFields(_) => "set-fields",
            Command::Plan(_) => "plan",
            Command::Split(_) => "split",
        }
    }

    fn config(&self) -> &PathBuf {
        match self {
            Command::Run(a) | Command::SetFields(a) | Command::Plan(a) | Command::Split(a) => {
                &a.config
            }
        }
    }
}

impl Calplan {
    pub fn run(self) -> Result<(), CalplanError> {
        // Set up logging.
        let GlobalArgs {
            verbosity,
            dry_run,
            no_progress_bars,
            non_interactive,
        } = self.global_opts;
        setup_logging(verbosity).expect("Failed to initialise logging.");
        // Enable progress bars if the user didn't say "no progress bars".
        if !no_progress_bars {
            PROGRESS_BARS.store(true);
        }

        // Print the version of calplan and its build-time information.
        let sub_command = self.command.name();
        info!("calplan {} {}", sub_command, env!("CARGO_PKG_VERSION"));
        display_build_info();

        let mut store = ConfigStore::read(self.command.config())?;
        let workspace = store.workspace();
        let metadata_file = store.metadata_file();
        let meta = StaticMetadata::read(&metadata_file)?;

        let mut executor: Box<dyn Executor> = if dry_run {
            Box::new(DryRunExecutor::new())
        } else {
            Box::new(
                ScriptExecutor::new(&store.config.executor.command)?
                    .with_work_dir(workspace.root()),
            )
        };
        let interactive = store.config.global.interactive && !non_interactive;
        let mut resolver: Box<dyn Resolver> = if interactive {
            Box::new(TerminalResolver::stdio())
        } else {
            Box::new(BatchResolver)
        };

        let mut printer = InfoPrinter::new(format!("calplan {sub_command}").into());
        printer.push_block(vec![
            format!("Configuration: {}", store.path().display()).into(),
            format!("Dataset:       {}", workspace.vis()).into(),
            format!("Metadata:      {}", metadata_file.display()).into(),
        ]);
        let mode: Cow<'static, str> = match (dry_run, interactive) {
            (true, true) => "Dry run, interactive".into(),
            (true, false) => "Dry run, non-interactive".into(),
            (false, true) => "Interactive".into(),
            (false, false) => "Non-interactive".into(),
        };
        printer.push_line(mode);
        printer.display();

        let mut pipeline = Pipeline::new(&mut store, &meta, &mut *executor, &mut *resolver);
        match self.command {
            Command::Run(_) => {
                let report = pipeline.run()?;
                let mut printer = InfoPrinter::new("Pipeline summary".into());
                for (i, pass) in report.passes.iter().enumerate() {
                    let mut block: Vec<Cow<'static, str>> = vec![format!(
                        "Calibration pass {}: {} field(s) corrected",
                        i + 1,
                        pass.corrected.len()
                    )
                    .into()];
                    for (field, _) in &pass.uncorrected {
                        block.push(format!("{field} was not corrected").into());
                    }
                    printer.push_block(block);
                }
                printer.push_line(
                    format!("Split outputs: {}", report.split.outputs.iter().join(", ")).into(),
                );
                printer.display();
            }

            Command::SetFields(_) => {
                let report = pipeline.set_fields()?;
                let title = if report.changed {
                    format!("Field roles (changed: {})", report.changed_keys.join(", "))
                } else {
                    "Field roles (unchanged)".to_string()
                };
                let mut printer = InfoPrinter::new(title.into());
                printer.push_block(describe_roles(&store.config.calibration));
                printer.display();
            }

            Command::Plan(_) => {
                let plans = pipeline.plan()?;
                let mut printer = InfoPrinter::new("Calibration apply plans".into());
                for plan in &plans {
                    printer.push_block(describe_plan(plan));
                }
                printer.display();
            }

            Command::Split(_) => {
                let report = pipeline.split()?;
                let mut printer = InfoPrinter::new("Split outputs".into());
                printer.push_block(
                    report
                        .outputs
                        .into_iter()
                        .map(|o| format!("{o}.split").into())
                        .collect(),
                );
                printer.display();
            }
        }

        display_warnings();
        info!("calplan {} complete.", sub_command);
        Ok(())
    }
}

fn describe_roles(roles: &FieldRoleSet) -> Vec<Cow<'static, str>> {
    vec![
        format!("Targets:       {:?}", roles.targets).into(),
        format!("Target names:  {:?}", roles.target_names).into(),
        format!("Flux cals:     {:?}", roles.fluxcal).into(),
        format!("Flux models:   {:?}", roles.fluxmod).into(),
        format!("Bandpass cals: {:?}", roles.bandcal).into(),
        format!("Phase cals:    {:?}", roles.phasecal).into(),
        format!("Ref. antenna:  {}", roles.refant).into(),
    ]
}

fn describe_plan(plan: &ApplyPlan) -> Vec<Cow<'static, str>> {
    let mut block: Vec<Cow<'static, str>> = vec![match &plan.spw {
        Some(spw) => format!("{} (SPW {spw})", plan.field).into(),
        None => plan.field.clone().into(),
    }];
    for (table, gainfield) in plan.gaintable().into_iter().zip(plan.gainfield()) {
        if gainfield.is_empty() {
            block.push(table.into());
        } else {
            block.push(format!("{table} [{gainfield}]").into());
        }
    }
    block
}

/// Activate a logger. All log messages are put onto `stdout`. `env_logger`
/// automatically only uses colours and fancy symbols if we're on a tty (e.g. a
/// terminal); piped output will be formatted sensibly. Source code lines are
/// displayed in log messages when verbosity >= 3.
fn setup_logging(verbosity: u8) -> Result<(), log::SetLoggerError> {
    let mut builder = env_logger::Builder::from_default_env();
    builder.target(env_logger::Target::Stdout);
    builder.format_target(false);
    match verbosity {
        0 => builder.filter_level(log::LevelFilter::Info),
        1 => builder.filter_level(log::LevelFilter::Debug),
        2 => builder.filter_level(log::LevelFilter::Trace),
        _ => {
            builder.filter_level(log::LevelFilter::Trace);
            builder.format(|buf, record| {
                use std::io::Write;

                let timestamp = buf.timestamp();
                let level = record.level();
                let target = record.target();
                let line = record.line().unwrap_or(0);
                let message = record.args();

                writeln!(buf, "[{timestamp} {level} {target}:{line}] {message}")
            })
        }
    };
    builder.try_init()
}

/// Write many info-level log lines of how this executable was compiled.
fn display_build_info() {
    let dirty = match GIT_DIRTY {
        Some(true) => " (dirty)",
        _ => "",
    };
    match GIT_COMMIT_HASH_SHORT {
        Some(hash) => {
            info!("Compiled on git commit hash: {hash}{dirty}");
        }
        None => info!("Compiled on git commit hash: <no git info>"),
    }
    if let Some(hr) = GIT_HEAD_REF {
        info!("            git head ref: {}", hr);
    }
    info!("            {}", BUILT_TIME_UTC);
    info!("         with compiler {}", RUSTC_VERSION);
    info!("");
}
