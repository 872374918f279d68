use std::path::PathBuf;

use anyhow::{bail, Result};
use caravan::{ArtifactType, DeploymentPlan};
use clap::{Parser, Subcommand};

/// Caravan - workspace solution deployment and reconciliation tool
#[derive(Parser, Debug)]
#[command(name = "caravan")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Deploy a packaged solution into a customer workspace
    Deploy {
        /// Path to the packaged solution folder
        #[arg(short, long)]
        solution: PathBuf,

        /// Customer name; the target workspace is named from it
        #[arg(short, long)]
        customer: String,

        /// Deployment parameter (repeatable)
        #[arg(short, long = "parameter", value_name = "NAME=SOURCE=TARGET")]
        parameters: Vec<String>,

        /// Delete target artifacts with no source counterpart
        #[arg(long)]
        prune: bool,
    },

    /// Update an existing customer workspace from a packaged solution
    Update {
        /// Path to the packaged solution folder
        #[arg(short, long)]
        solution: PathBuf,

        /// Customer name; the target workspace is named from it
        #[arg(short, long)]
        customer: String,

        /// Deployment parameter (repeatable)
        #[arg(short, long = "parameter", value_name = "NAME=SOURCE=TARGET")]
        parameters: Vec<String>,

        /// Restrict the update to one artifact type
        #[arg(long = "type", value_name = "TYPE")]
        only_type: Option<String>,

        /// Delete target artifacts with no source counterpart
        #[arg(long)]
        prune: bool,
    },

    /// Export a workspace as a packaged solution folder
    Export {
        /// Workspace display name
        #[arg(short, long)]
        workspace: String,

        /// Output directory
        #[arg(short, long)]
        out: PathBuf,
    },
}

/// Parse one `--parameter NAME=SOURCE=TARGET` argument
pub fn parse_parameter(raw: &str) -> Result<(String, String, String)> {
    let mut parts = raw.splitn(3, '=');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(name), Some(source), Some(target)) if !name.is_empty() => Ok((
            name.to_string(),
            source.to_string(),
            target.to_string(),
        )),
        _ => bail!("invalid parameter '{raw}': expected NAME=SOURCE=TARGET"),
    }
}

/// Build the deployment plan from repeated `--parameter` arguments
pub fn build_plan(customer: &str, parameters: &[String]) -> Result<DeploymentPlan> {
    let mut plan = DeploymentPlan::new(customer);
    for raw in parameters {
        let (name, source, target) = parse_parameter(raw)?;
        plan.add_parameter(name, source, target)?;
    }
    Ok(plan)
}

/// Parse the `--type` value of `update`
pub fn parse_artifact_type(raw: &str) -> Result<ArtifactType> {
    match ArtifactType::parse(raw) {
        Some(t) => Ok(t),
        None => bail!(
            "unknown artifact type '{raw}': expected one of StorageContainer, Notebook, \
             Pipeline, SemanticModel, Report"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_parameter_splits_on_first_two_equals() {
        let (name, source, target) =
            parse_parameter("webPath=https://src/data/=https://dst/data/").unwrap();
        assert_eq!(name, "webPath");
        assert_eq!(source, "https://src/data/");
        assert_eq!(target, "https://dst/data/");
    }

    #[test]
    fn parse_parameter_keeps_equals_in_target() {
        let (_, _, target) = parse_parameter("storageServer=a=b=c").unwrap();
        assert_eq!(target, "b=c");
    }

    #[test]
    fn parse_parameter_rejects_short_forms() {
        assert!(parse_parameter("webPath=only-source").is_err());
        assert!(parse_parameter("=a=b").is_err());
    }

    #[test]
    fn build_plan_rejects_duplicate_names() {
        let err = build_plan(
            "Contoso",
            &["webPath=a=b".to_string(), "webPath=c=d".to_string()],
        )
        .unwrap_err();
        assert!(err.to_string().contains("webPath"));
    }

    #[test]
    fn parse_artifact_type_accepts_known_names() {
        assert_eq!(
            parse_artifact_type("Notebook").unwrap(),
            ArtifactType::Notebook
        );
        assert!(parse_artifact_type("Dashboard").is_err());
    }
}
