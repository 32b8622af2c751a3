//! CLI command definitions and dispatch.

pub mod check;
pub mod emit;
pub mod plan;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use homelab_common::config::EngineConfig;
use homelab_common::constants::DEFAULT_CATALOG_FILE;
use homelab_common::types::Severity;
use homelab_compose::catalog::{ServiceDefinition, load_catalog_file};
use homelab_compose::overrides::{OverrideSet, load_overrides_file};
use homelab_compose::planner::DependencyHints;

/// hlab — Homelab catalog validator and compose manifest generator.
#[derive(Parser, Debug)]
#[command(name = "hlab", version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Command,

    /// Emit logs as JSON lines on stderr.
    #[arg(long, global = true)]
    pub log_json: bool,
}

/// Available CLI subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Validate the catalog with overrides applied and print the report.
    Check(check::CheckArgs),
    /// Print the startup order and tiers.
    Plan(plan::PlanArgs),
    /// Validate, plan, and write the manifest.
    Emit(emit::EmitArgs),
}

/// Inputs shared by every subcommand.
#[derive(Args, Debug)]
pub struct InputArgs {
    /// Path to the service catalog (JSON array of records).
    #[arg(long, default_value = DEFAULT_CATALOG_FILE)]
    pub catalog: PathBuf,

    /// Path to host overrides (JSON mapping of service name to override).
    #[arg(long)]
    pub overrides: Option<PathBuf>,

    /// Path to dependency hints (JSON mapping of service name to names it starts after).
    #[arg(long)]
    pub depends: Option<PathBuf>,

    /// Path to engine configuration (JSON).
    #[arg(long, env = "HLAB_CONFIG")]
    pub config: Option<PathBuf>,

    /// Report unresolved placeholder paths as warnings instead of errors.
    #[arg(long)]
    pub lenient: bool,
}

/// Everything a pipeline run needs, loaded from disk.
pub struct Inputs {
    /// Loaded catalog.
    pub catalog: Vec<ServiceDefinition>,
    /// Host overrides.
    pub overrides: OverrideSet,
    /// Declared dependencies.
    pub hints: DependencyHints,
    /// Engine configuration.
    pub config: EngineConfig,
}

impl InputArgs {
    /// Reads all input files.
    ///
    /// # Errors
    ///
    /// Returns an error if any file is missing or malformed.
    pub fn load(&self) -> anyhow::Result<Inputs> {
        let catalog = load_catalog_file(&self.catalog)?;
        let overrides = match &self.overrides {
            Some(path) => load_overrides_file(path)?,
            None => OverrideSet::new(),
        };
        let hints = match &self.depends {
            Some(path) => load_hints(path)?,
            None => DependencyHints::new(),
        };
        let mut config = match &self.config {
            Some(path) => EngineConfig::from_file(path)?,
            None => EngineConfig::default(),
        };
        if self.lenient {
            config.placeholder_severity = Severity::Warning;
        }
        Ok(Inputs {
            catalog,
            overrides,
            hints,
            config,
        })
    }
}

fn load_hints(path: &Path) -> anyhow::Result<DependencyHints> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading dependency hints from {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("parsing dependency hints in {}", path.display()))
}

/// Dispatches the parsed CLI command to its handler.
///
/// # Errors
///
/// Returns an error if the command execution fails.
pub fn execute(cli: Cli) -> anyhow::Result<ExitCode> {
    match cli.command {
        Command::Check(args) => check::execute(&args),
        Command::Plan(args) => plan::execute(&args),
        Command::Emit(args) => emit::execute(&args),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_emit_with_inputs() {
        let cli = Cli::try_parse_from([
            "hlab",
            "emit",
            "--catalog",
            "stack.json",
            "--overrides",
            "host.json",
            "--lenient",
            "--output",
            "compose.yaml",
        ])
        .expect("should parse");
        let Command::Emit(args) = cli.command else {
            panic!("expected emit");
        };
        assert_eq!(args.input.catalog, PathBuf::from("stack.json"));
        assert!(args.input.lenient);
        assert_eq!(args.output, Some(PathBuf::from("compose.yaml")));
    }

    #[test]
    fn load_reads_hints_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let catalog = dir.path().join("catalog.json");
        let depends = dir.path().join("depends.json");
        std::fs::write(
            &catalog,
            r#"[{ "name": "gitea", "image": "gitea/gitea" }, { "name": "caddy", "image": "caddy" }]"#,
        )
        .expect("write catalog");
        std::fs::write(&depends, r#"{ "caddy": ["gitea"] }"#).expect("write hints");

        let args = InputArgs {
            catalog,
            overrides: None,
            depends: Some(depends),
            config: None,
            lenient: true,
        };
        let inputs = args.load().expect("should load");
        assert_eq!(inputs.catalog.len(), 2);
        assert!(inputs.hints["caddy"].contains("gitea"));
        assert_eq!(inputs.config.placeholder_severity, Severity::Warning);
    }
}
