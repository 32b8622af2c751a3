//! `hlab plan` — Display the startup order before emitting.

use std::process::ExitCode;

use clap::Args;
use homelab_compose::{overrides, planner};

use super::InputArgs;

/// Arguments for the `plan` command.
#[derive(Args, Debug)]
pub struct PlanArgs {
    /// Catalog, override, and configuration inputs.
    #[command(flatten)]
    pub input: InputArgs,
}

/// Executes the `plan` command.
///
/// Resolves overrides and prints the startup tiers. Validation findings
/// do not stop planning here; use `hlab check` for those.
///
/// # Errors
///
/// Returns an error if inputs are malformed or dependencies form a cycle.
pub fn execute(args: &PlanArgs) -> anyhow::Result<ExitCode> {
    let inputs = args.input.load()?;
    let resolution = overrides::resolve(&inputs.catalog, &inputs.overrides);
    let plan = planner::plan(&resolution.services, &inputs.hints)?;

    println!("Startup plan for: {}", args.input.catalog.display());
    println!();
    for (tier, names) in plan.tiers().iter().enumerate() {
        println!("  tier {tier}");
        for name in names {
            let after = plan
                .services
                .iter()
                .find(|s| s.name == *name)
                .map(|s| s.start_after.join(", "))
                .unwrap_or_default();
            if after.is_empty() {
                println!("    + {name}");
            } else {
                println!("    + {name} (after {after})");
            }
        }
    }
    println!();
    println!("  {} service(s) planned.", plan.services.len());

    Ok(ExitCode::SUCCESS)
}
