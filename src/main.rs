//! Caravan CLI - workspace solution deployment and reconciliation tool
//!
//! Usage: caravan <COMMAND>
//!
//! Commands:
//!   deploy  Deploy a packaged solution into a customer workspace
//!   update  Update an existing customer workspace from a packaged solution
//!   export  Export a workspace as a packaged solution folder

mod cli;

use std::path::Path;

use anyhow::{bail, Context, Result};
use clap::Parser;

use caravan::reconcile::ReconcileOptions;
use caravan::{ArtifactType, Config, SolutionPackage};

fn main() {
    let cli = cli::Cli::parse();
    if let Err(err) = run(cli) {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

fn run(cli: cli::Cli) -> Result<()> {
    let config = Config::load_or_default(Some(Path::new(".")));

    match cli.command {
        cli::Commands::Deploy {
            solution,
            customer,
            parameters,
            prune,
        } => deploy(&config, &solution, &customer, &parameters, prune, None),
        cli::Commands::Update {
            solution,
            customer,
            parameters,
            only_type,
            prune,
        } => {
            let only_type = only_type
                .as_deref()
                .map(cli::parse_artifact_type)
                .transpose()?;
            deploy(&config, &solution, &customer, &parameters, prune, only_type)
        }
        cli::Commands::Export { workspace, out } => bail!(
            "cannot export workspace '{}' to {}: no remote API client is configured in this build",
            workspace,
            out.display()
        ),
    }
}

fn deploy(
    config: &Config,
    solution: &Path,
    customer: &str,
    parameters: &[String],
    prune: bool,
    only_type: Option<ArtifactType>,
) -> Result<()> {
    let source = SolutionPackage::load(solution)
        .with_context(|| format!("loading packaged solution from {}", solution.display()))?
        .into_source();
    let plan = cli::build_plan(customer, parameters)?;

    let mut options = ReconcileOptions::new(customer)
        .with_prune(prune)
        .with_only_type(only_type);
    options.workspace_prefix = config.workspace.name_prefix.clone();
    options.capacity_id = config.workspace.capacity_id.clone();

    // everything up to the remote client is wired; the client itself is
    // not part of this build
    bail!(
        "loaded {} artifacts and {} parameters for workspace '{}', but no remote API \
         client is configured in this build",
        source.artifacts.len(),
        plan.parameters().count(),
        options.workspace_name()
    )
}
