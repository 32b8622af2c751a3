//! `hlab check` — Validate the catalog and print the report.

use std::process::ExitCode;

use clap::Args;
use homelab_compose::pipeline;

use super::InputArgs;
use crate::output;

/// Arguments for the `check` command.
#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Catalog, override, and configuration inputs.
    #[command(flatten)]
    pub input: InputArgs,
}

/// Executes the `check` command.
///
/// Runs the full pipeline without writing a manifest and prints the summary.
///
/// # Errors
///
/// Returns an error if inputs are malformed or dependencies form a cycle.
pub fn execute(args: &CheckArgs) -> anyhow::Result<ExitCode> {
    let inputs = args.input.load()?;
    let outcome = pipeline::run(
        &inputs.catalog,
        &inputs.overrides,
        &inputs.hints,
        &inputs.config,
    )?;

    print!("{}", outcome.summary());
    Ok(output::exit_code(outcome.report()))
}
