//! `hlab emit` — Write the manifest for the resolved catalog.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, ValueEnum};
use homelab_common::config::ManifestFormat;
use homelab_compose::pipeline::{self, Outcome};

use super::InputArgs;
use crate::output;

/// Manifest serialization selectable on the command line.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum FormatArg {
    /// Compose-file YAML.
    Compose,
    /// JSON manifest.
    Json,
}

impl From<FormatArg> for ManifestFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Compose => Self::Compose,
            FormatArg::Json => Self::Json,
        }
    }
}

/// Arguments for the `emit` subcommand.
#[derive(Args, Debug)]
pub struct EmitArgs {
    /// Catalog, override, and configuration inputs.
    #[command(flatten)]
    pub input: InputArgs,

    /// Write the manifest to a file instead of stdout.
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Manifest format; overrides the configuration file.
    #[arg(long, value_enum)]
    pub format: Option<FormatArg>,

    /// Project name written at the top of the manifest.
    #[arg(long)]
    pub project_name: Option<String>,
}

/// Executes the `emit` command.
///
/// The summary goes to stderr so stdout carries only the manifest.
///
/// # Errors
///
/// Returns an error if inputs are malformed, dependencies form a cycle,
/// or the output file cannot be written.
pub fn execute(args: &EmitArgs) -> anyhow::Result<ExitCode> {
    let mut inputs = args.input.load()?;
    if let Some(format) = args.format {
        inputs.config.format = format.into();
    }
    if let Some(name) = &args.project_name {
        inputs.config.project_name = Some(name.clone());
    }

    let outcome = pipeline::run(
        &inputs.catalog,
        &inputs.overrides,
        &inputs.hints,
        &inputs.config,
    )?;
    eprint!("{}", outcome.summary());

    if let Outcome::Emitted { manifest, .. } = &outcome {
        output::write_manifest(args.output.as_deref(), manifest)?;
    }
    Ok(output::exit_code(outcome.report()))
}
